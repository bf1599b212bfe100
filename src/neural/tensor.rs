//! Dense weight containers and the flat-weight reader
//!
//! Model files store every parameter in one flat vector. Layers pull their
//! share off a `WeightCursor` in construction order; once the network is
//! built the cursor must be exhausted, otherwise the topology and the weights
//! disagree.

use crate::engine::HistoryRing;
use crate::error::{RigError, Result};

/// Most history values (frames times channels) one stream of a model may keep
pub const MAX_HISTORY_VALUES: usize = 1 << 24;

/// Multiply layer dimensions, failing on overflow
pub fn checked_size(dims: &[usize]) -> Result<usize> {
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| RigError::load("model", format!("layer dimensions {:?} overflow", dims)))
}

/// Sequential reader over a flat weight vector
#[derive(Debug)]
pub struct WeightCursor<'a> {
    weights: &'a [f32],
    pos: usize,
}

impl<'a> WeightCursor<'a> {
    pub fn new(weights: &'a [f32]) -> Self {
        Self { weights, pos: 0 }
    }

    /// Take the next `n` weights
    pub fn take(&mut self, n: usize) -> Result<&'a [f32]> {
        let end = self.pos.saturating_add(n);
        if end > self.weights.len() {
            return Err(RigError::load(
                "model",
                format!(
                    "weights exhausted: needed {} more at offset {}, only {} provided",
                    n,
                    self.pos,
                    self.weights.len()
                ),
            ));
        }
        let slice = &self.weights[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Take a single weight
    pub fn take_one(&mut self) -> Result<f32> {
        Ok(self.take(1)?[0])
    }

    /// Number of weights consumed so far
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Require that every weight was consumed
    pub fn finish(self) -> Result<()> {
        if self.pos != self.weights.len() {
            return Err(RigError::load(
                "model",
                format!(
                    "weight count mismatch: topology uses {} but {} provided",
                    self.pos,
                    self.weights.len()
                ),
            ));
        }
        Ok(())
    }
}

/// Row-major dense matrix
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Read `rows * cols` weights, row by row
    pub fn read(rows: usize, cols: usize, cursor: &mut WeightCursor<'_>) -> Result<Self> {
        Ok(Self {
            rows,
            cols,
            data: cursor.take(checked_size(&[rows, cols])?)?.to_vec(),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        self.data[row * self.cols + col] = value;
    }

    /// `out += self * x`
    #[inline]
    pub fn mul_add(&self, x: &[f32], out: &mut [f32]) {
        debug_assert_eq!(x.len(), self.cols);
        debug_assert!(out.len() >= self.rows);
        for (row, acc) in self.data.chunks_exact(self.cols).zip(out.iter_mut()) {
            *acc += row.iter().zip(x).map(|(w, v)| w * v).sum::<f32>();
        }
    }
}

/// Pointwise (kernel size 1) convolution
#[derive(Debug, Clone)]
pub struct Conv1x1 {
    weight: Matrix,
    bias: Option<Vec<f32>>,
}

impl Conv1x1 {
    pub fn read(
        in_channels: usize,
        out_channels: usize,
        bias: bool,
        cursor: &mut WeightCursor<'_>,
    ) -> Result<Self> {
        let weight = Matrix::read(out_channels, in_channels, cursor)?;
        let bias = if bias {
            Some(cursor.take(out_channels)?.to_vec())
        } else {
            None
        };
        Ok(Self { weight, bias })
    }

    pub fn out_channels(&self) -> usize {
        self.weight.rows()
    }

    /// `out = bias + W x`
    #[inline]
    pub fn apply(&self, x: &[f32], out: &mut [f32]) {
        let out = &mut out[..self.weight.rows()];
        match &self.bias {
            Some(bias) => out.copy_from_slice(bias),
            None => out.fill(0.0),
        }
        self.weight.mul_add(x, out);
    }

    /// `out += W x` (bias ignored)
    #[inline]
    pub fn apply_add(&self, x: &[f32], out: &mut [f32]) {
        self.weight.mul_add(x, out);
    }
}

/// Dilated causal convolution over a history ring
///
/// Tap `k` of a kernel of size `K` multiplies the input
/// `dilation * (K - 1 - k)` steps in the past, so the last tap sees the
/// newest frame.
#[derive(Debug, Clone)]
pub struct DilatedConv {
    taps: Vec<Matrix>,
    bias: Option<Vec<f32>>,
    dilation: usize,
    span: usize,
    in_channels: usize,
    out_channels: usize,
}

impl DilatedConv {
    /// Read weights in (out channel, in channel, tap) order, then the bias
    pub fn read(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        dilation: usize,
        bias: bool,
        cursor: &mut WeightCursor<'_>,
    ) -> Result<Self> {
        if kernel_size == 0 || dilation == 0 {
            return Err(RigError::load(
                "model",
                format!(
                    "invalid convolution: kernel size {} dilation {}",
                    kernel_size, dilation
                ),
            ));
        }
        let span = dilation
            .checked_mul(kernel_size - 1)
            .and_then(|s| s.checked_add(1))
            .filter(|&s| s.saturating_mul(in_channels.max(1)) <= MAX_HISTORY_VALUES)
            .ok_or_else(|| {
                RigError::load(
                    "model",
                    format!(
                        "convolution history too long: kernel size {} dilation {} over {} channels",
                        kernel_size, dilation, in_channels
                    ),
                )
            })?;

        let flat = cursor.take(checked_size(&[out_channels, in_channels, kernel_size])?)?;
        let mut taps = vec![Matrix::zeros(out_channels, in_channels); kernel_size];
        for (idx, w) in flat.chunks_exact(kernel_size).enumerate() {
            let (i, j) = (idx / in_channels, idx % in_channels);
            for (tap, &value) in taps.iter_mut().zip(w) {
                tap.set(i, j, value);
            }
        }
        let bias = if bias {
            Some(cursor.take(out_channels)?.to_vec())
        } else {
            None
        };
        Ok(Self {
            taps,
            bias,
            dilation,
            span,
            in_channels,
            out_channels,
        })
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    /// Number of frames of history the convolution reads, newest included
    pub fn span(&self) -> usize {
        self.span
    }

    /// Values held by this convolution's history ring
    pub fn history_len(&self) -> usize {
        self.in_channels * self.span
    }

    /// A zeroed ring large enough for this convolution's input
    pub fn history(&self) -> HistoryRing {
        HistoryRing::new(self.in_channels, self.span())
    }

    /// `out = bias + sum_k W_k x[t - dilation * (K - 1 - k)]`
    #[inline]
    pub fn apply(&self, history: &HistoryRing, out: &mut [f32]) {
        let out = &mut out[..self.out_channels];
        match &self.bias {
            Some(bias) => out.copy_from_slice(bias),
            None => out.fill(0.0),
        }
        let last = self.taps.len() - 1;
        for (k, tap) in self.taps.iter().enumerate() {
            tap.mul_add(history.frame(self.dilation * (last - k)), out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_exhaustion() {
        let weights = [1.0, 2.0, 3.0];
        let mut cursor = WeightCursor::new(&weights);
        assert_eq!(cursor.take(2).unwrap(), &[1.0, 2.0]);
        assert!(cursor.take(2).is_err());
        assert_eq!(cursor.take_one().unwrap(), 3.0);
        assert!(cursor.finish().is_ok());
    }

    #[test]
    fn test_cursor_leftover_fails() {
        let weights = [1.0, 2.0];
        let mut cursor = WeightCursor::new(&weights);
        cursor.take_one().unwrap();
        let err = cursor.finish().unwrap_err();
        assert!(err.to_string().contains("mismatch"));
    }

    #[test]
    fn test_matrix_mul_add() {
        let weights = [1.0, 2.0, 3.0, 4.0];
        let m = Matrix::read(2, 2, &mut WeightCursor::new(&weights)).unwrap();
        let mut out = [1.0, 1.0];
        m.mul_add(&[1.0, 1.0], &mut out);
        assert_eq!(out, [4.0, 8.0]);
    }

    #[test]
    fn test_conv1x1_bias() {
        // 1 in, 2 out: weights [2, 3], bias [1, -1]
        let weights = [2.0, 3.0, 1.0, -1.0];
        let conv = Conv1x1::read(1, 2, true, &mut WeightCursor::new(&weights)).unwrap();
        let mut out = [0.0; 2];
        conv.apply(&[2.0], &mut out);
        assert_eq!(out, [5.0, 5.0]);
    }

    #[test]
    fn test_dilated_conv_reads_past() {
        // 1 in, 1 out, kernel 2, dilation 3: y = 0.5 * x[t-3] + 1.0 * x[t]
        let weights = [0.5, 1.0];
        let conv = DilatedConv::read(1, 1, 2, 3, false, &mut WeightCursor::new(&weights)).unwrap();
        assert_eq!(conv.span(), 4);

        let mut ring = conv.history();
        let mut outputs = Vec::new();
        for x in [1.0, 0.0, 0.0, 0.0, 0.0] {
            ring.push(&[x]);
            let mut out = [0.0];
            conv.apply(&ring, &mut out);
            outputs.push(out[0]);
        }
        assert_eq!(outputs, vec![1.0, 0.0, 0.0, 0.5, 0.0]);
    }

    #[test]
    fn test_dilated_conv_tap_order() {
        // 1 in, 2 out, kernel 2: out 0 taps [1, 2], out 1 taps [3, 4]
        let weights = [1.0, 2.0, 3.0, 4.0];
        let conv = DilatedConv::read(1, 2, 2, 1, false, &mut WeightCursor::new(&weights)).unwrap();
        let mut ring = conv.history();
        ring.push(&[1.0]);
        ring.push(&[10.0]);
        let mut out = [0.0; 2];
        conv.apply(&ring, &mut out);
        assert_eq!(out, [1.0 + 20.0, 3.0 + 40.0]);
    }

    #[test]
    fn test_dilated_conv_rejects_huge_dilation() {
        let weights = [0.5, 1.0];
        for dilation in [1 << 62, usize::MAX, MAX_HISTORY_VALUES] {
            let err = DilatedConv::read(1, 1, 2, dilation, false, &mut WeightCursor::new(&weights))
                .unwrap_err();
            assert_eq!(err.error_code(), "LOAD_ERROR");
        }
    }

    #[test]
    fn test_oversized_channels_fail_before_allocating() {
        let weights = [1.0; 4];
        let err = DilatedConv::read(1 << 40, 1 << 40, 2, 1, false, &mut WeightCursor::new(&weights))
            .unwrap_err();
        assert_eq!(err.error_code(), "LOAD_ERROR");
        assert!(Matrix::read(usize::MAX, 2, &mut WeightCursor::new(&weights)).is_err());
        assert!(checked_size(&[usize::MAX, 2]).is_err());
    }

    #[test]
    fn test_cursor_take_does_not_overflow() {
        let weights = [1.0];
        let mut cursor = WeightCursor::new(&weights);
        cursor.take_one().unwrap();
        assert!(cursor.take(usize::MAX).is_err());
    }
}
