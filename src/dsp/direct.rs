//! Direct-form FIR convolution
//!
//! The delay line is stored twice back to back so the most recent `L`
//! inputs are always one contiguous slice, newest first.

use super::impulse::ImpulseResponse;

#[derive(Debug, Clone)]
pub struct DirectConvolver {
    taps: Vec<f32>,
    delay: Vec<f32>,
    pos: usize,
}

impl DirectConvolver {
    pub fn new(ir: &ImpulseResponse) -> Self {
        let len = ir.len();
        Self {
            taps: ir.taps().to_vec(),
            delay: vec![0.0; 2 * len],
            pos: 0,
        }
    }

    pub fn reset(&mut self) {
        self.delay.fill(0.0);
        self.pos = 0;
    }

    pub fn process(&mut self, input: &[f32], output: &mut [f32]) {
        let len = self.taps.len();
        for (x, y) in input.iter().zip(output.iter_mut()) {
            self.pos = if self.pos == 0 { len - 1 } else { self.pos - 1 };
            self.delay[self.pos] = *x;
            self.delay[self.pos + len] = *x;

            let window = &self.delay[self.pos..self.pos + len];
            *y = self.taps.iter().zip(window).map(|(h, v)| h * v).sum();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streams_three_taps() {
        let ir = ImpulseResponse::new(vec![1.0, 0.5, 0.25], 48000.0).unwrap();
        let mut conv = DirectConvolver::new(&ir);
        let mut out = Vec::new();
        for x in [1.0, 0.0, 0.0, 0.0, 0.0] {
            let mut y = [0.0];
            conv.process(&[x], &mut y);
            out.push(y[0]);
        }
        assert_eq!(out, vec![1.0, 0.5, 0.25, 0.0, 0.0]);
    }

    #[test]
    fn test_single_tap_is_gain() {
        let ir = ImpulseResponse::new(vec![0.5], 48000.0).unwrap();
        let mut conv = DirectConvolver::new(&ir);
        let mut out = [0.0; 3];
        conv.process(&[2.0, -4.0, 1.0], &mut out);
        assert_eq!(out, [1.0, -2.0, 0.5]);
    }
}
