//! Processing pipeline
//!
//! Stages run in insertion order (index 0 first), each feeding its output
//! to the next. An empty pipeline, or one with every stage bypassed, copies
//! input to output.

use crate::engine::buffer::{DEFAULT_BLOCK_SIZE, DEFAULT_SAMPLE_RATE};
use crate::engine::processor::{clamp_block_size, for_each_sub_block, StreamProcessor};
use crate::error::{RigError, Result};

/// One slot in the pipeline
pub struct Stage {
    id: String,
    bypassed: bool,
    processor: Box<dyn StreamProcessor>,
}

impl Stage {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }

    pub fn processor(&self) -> &dyn StreamProcessor {
        self.processor.as_ref()
    }

    pub fn processor_mut(&mut self) -> &mut dyn StreamProcessor {
        self.processor.as_mut()
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("id", &self.id)
            .field("kind", &self.processor.kind())
            .field("bypassed", &self.bypassed)
            .finish()
    }
}

/// Ordered chain of stream processors
#[derive(Debug)]
pub struct ProcessingPipeline {
    stages: Vec<Stage>,
    scratch: Vec<f32>,
    sample_rate: f64,
    block_size: usize,
}

impl ProcessingPipeline {
    /// Create an empty pipeline at the default rate and block size
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            scratch: vec![0.0; DEFAULT_BLOCK_SIZE],
            sample_rate: DEFAULT_SAMPLE_RATE,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }

    /// Append a stage and return its id
    ///
    /// The stage is not reset; call [`StreamProcessor::reset`] on the
    /// pipeline once all stages are in place.
    pub fn add(&mut self, processor: Box<dyn StreamProcessor>) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        tracing::debug!(stage_id = %id, kind = processor.kind(), "stage added");
        self.stages.push(Stage {
            id: id.clone(),
            bypassed: false,
            processor,
        });
        id
    }

    /// Remove a stage by id
    pub fn remove(&mut self, stage_id: &str) -> Result<Box<dyn StreamProcessor>> {
        let index = self.position(stage_id)?;
        Ok(self.stages.remove(index).processor)
    }

    /// Get a stage by id
    pub fn get(&self, stage_id: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id == stage_id)
    }

    /// Get a mutable stage by id
    pub fn get_mut(&mut self, stage_id: &str) -> Option<&mut Stage> {
        self.stages.iter_mut().find(|s| s.id == stage_id)
    }

    /// Bypass or re-enable a stage
    pub fn set_bypass(&mut self, stage_id: &str, bypassed: bool) -> Result<()> {
        let index = self.position(stage_id)?;
        self.stages[index].bypassed = bypassed;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Stage> {
        self.stages.iter()
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    fn position(&self, stage_id: &str) -> Result<usize> {
        self.stages
            .iter()
            .position(|s| s.id == stage_id)
            .ok_or_else(|| RigError::StageNotFound {
                stage_id: stage_id.to_string(),
            })
    }
}

impl Default for ProcessingPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamProcessor for ProcessingPipeline {
    fn render(&mut self, input: &[f32], output: &mut [f32]) {
        let stages = &mut self.stages;
        let scratch = &mut self.scratch;

        for_each_sub_block(input, output, scratch.len(), |inp, out| {
            let mut first = true;
            for stage in stages.iter_mut().filter(|s| !s.bypassed) {
                if first {
                    stage.processor.render(inp, out);
                    first = false;
                } else {
                    let tmp = &mut scratch[..out.len()];
                    tmp.copy_from_slice(out);
                    stage.processor.render(tmp, out);
                }
            }
            if first {
                out.copy_from_slice(inp);
            }
        });
    }

    fn check_sample_rate(&self, sample_rate: f64) -> Result<()> {
        self.stages
            .iter()
            .try_for_each(|s| s.processor.check_sample_rate(sample_rate))
    }

    /// Reset every stage, bypassed ones included
    ///
    /// All stages are checked first so a rejected rate leaves every stage as
    /// it was.
    fn reset(&mut self, sample_rate: f64, block_size_hint: usize) -> Result<()> {
        crate::engine::processor::validate_sample_rate(sample_rate, self.sample_rate)?;
        self.check_sample_rate(sample_rate)?;

        let block_size = clamp_block_size(block_size_hint);
        for stage in &mut self.stages {
            stage.processor.reset(sample_rate, block_size)?;
        }
        self.sample_rate = sample_rate;
        self.block_size = block_size;
        self.scratch = vec![0.0; block_size];
        tracing::debug!(
            sample_rate,
            block_size,
            stages = self.stages.len(),
            "pipeline reset"
        );
        Ok(())
    }

    fn prewarm(&mut self) {
        for stage in &mut self.stages {
            stage.processor.prewarm();
        }
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn kind(&self) -> &'static str {
        "pipeline"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Multiplies by a constant and remembers the previous input
    struct ScaleDelay {
        gain: f32,
        last: f32,
        rate: f64,
    }

    impl ScaleDelay {
        fn boxed(gain: f32) -> Box<dyn StreamProcessor> {
            Box::new(Self {
                gain,
                last: 0.0,
                rate: DEFAULT_SAMPLE_RATE,
            })
        }
    }

    impl StreamProcessor for ScaleDelay {
        fn render(&mut self, input: &[f32], output: &mut [f32]) {
            for (x, y) in input.iter().zip(output.iter_mut()) {
                *y = self.last * self.gain;
                self.last = *x;
            }
        }

        fn check_sample_rate(&self, sample_rate: f64) -> Result<()> {
            if sample_rate == 48000.0 {
                Ok(())
            } else {
                Err(RigError::UnsupportedSampleRate {
                    requested: sample_rate,
                    expected: 48000.0,
                })
            }
        }

        fn reset(&mut self, sample_rate: f64, _block_size_hint: usize) -> Result<()> {
            self.check_sample_rate(sample_rate)?;
            self.rate = sample_rate;
            self.last = 0.0;
            Ok(())
        }

        fn prewarm(&mut self) {
            self.last = 0.0;
        }

        fn sample_rate(&self) -> f64 {
            self.rate
        }

        fn kind(&self) -> &'static str {
            "scale_delay"
        }
    }

    #[test]
    fn test_empty_pipeline_is_identity() {
        let mut pipeline = ProcessingPipeline::new();
        assert!(pipeline.is_empty());
        let out = pipeline.process_to_vec(&[0.1, -0.2, 0.3]).unwrap();
        assert_eq!(out, vec![0.1, -0.2, 0.3]);
    }

    #[test]
    fn test_stages_run_in_order() {
        let mut pipeline = ProcessingPipeline::new();
        pipeline.add(ScaleDelay::boxed(2.0));
        pipeline.add(ScaleDelay::boxed(3.0));
        assert_eq!(pipeline.len(), 2);

        let out = pipeline.process_to_vec(&[1.0, 0.0, 0.0, 0.0]).unwrap();
        assert_eq!(out, vec![0.0, 0.0, 6.0, 0.0]);
    }

    #[test]
    fn test_bypass_and_remove() {
        let mut pipeline = ProcessingPipeline::new();
        let a = pipeline.add(ScaleDelay::boxed(2.0));
        let b = pipeline.add(ScaleDelay::boxed(3.0));

        pipeline.set_bypass(&a, true).unwrap();
        assert!(pipeline.get(&a).unwrap().is_bypassed());
        let out = pipeline.process_to_vec(&[1.0, 0.0]).unwrap();
        assert_eq!(out, vec![0.0, 3.0]);

        let removed = pipeline.remove(&b).unwrap();
        assert_eq!(removed.kind(), "scale_delay");
        let err = pipeline.remove(&b).err().unwrap();
        assert_eq!(err.error_code(), "STAGE_NOT_FOUND");
        assert!(pipeline.set_bypass("missing", true).is_err());
    }

    #[test]
    fn test_blocks_larger_than_scratch() {
        let mut pipeline = ProcessingPipeline::new();
        pipeline.add(ScaleDelay::boxed(1.0));
        pipeline.add(ScaleDelay::boxed(1.0));
        pipeline.reset(48000.0, 4).unwrap();
        assert_eq!(pipeline.block_size(), 4);

        let input: Vec<f32> = (1..=10).map(|i| i as f32).collect();
        let out = pipeline.process_to_vec(&input).unwrap();
        let mut expected = vec![0.0, 0.0];
        expected.extend(&input[..8]);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_rejected_rate_leaves_stages() {
        let mut pipeline = ProcessingPipeline::new();
        let id = pipeline.add(ScaleDelay::boxed(1.0));
        pipeline.process_to_vec(&[0.5]).unwrap();

        assert!(pipeline.reset(44100.0, 64).is_err());
        assert_eq!(pipeline.sample_rate(), 48000.0);
        assert_eq!(pipeline.get(&id).unwrap().processor().sample_rate(), 48000.0);
        assert_eq!(pipeline.process_to_vec(&[0.0]).unwrap(), vec![0.5]);
    }

    #[test]
    fn test_invalid_buffer_rejected() {
        let mut pipeline = ProcessingPipeline::new();
        pipeline.add(ScaleDelay::boxed(1.0));
        let mut out = [0.0; 3];
        assert!(pipeline.process(&[0.0; 2], &mut out).is_err());
    }
}
