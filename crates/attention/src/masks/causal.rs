//! Builders for causal and sliding-window attention masks.
//!
//! The full mask is computed once for `max_len` positions with shape
//! `[1, 1, max_len, max_len]` and sliced down to the live sequence length at
//! every forward call.

use candle_core::{Device, Result, Tensor};

use crate::core::AttentionError;

/// Construct a causal mask, optionally restricted to a look-back `window`.
///
/// Entry `(q, k)` is `1` iff `k <= q` and, when a window is set,
/// `q - k <= window`.
pub fn build_causal_window_mask(
    device: &Device,
    max_len: usize,
    window: Option<usize>,
) -> Result<Tensor> {
    let mut data = vec![0u8; max_len * max_len];
    for q in 0..max_len {
        let row_start = q * max_len;
        let first = window.map_or(0, |w| q.saturating_sub(w));
        for k in first..=q {
            data[row_start + k] = 1;
        }
    }
    Tensor::from_vec(data, (1, 1, max_len, max_len), device)
}

/// Slice a precomputed `[1, 1, max_len, max_len]` mask to `[1, 1, seq_len, seq_len]`.
///
/// Sequences longer than the precomputed mask are rejected instead of being
/// silently truncated.
pub fn slice_mask(mask: &Tensor, seq_len: usize) -> std::result::Result<Tensor, AttentionError> {
    let (_, _, rows, cols) = mask.dims4()?;
    let max_len = rows.min(cols);
    if seq_len > max_len {
        return Err(AttentionError::SequenceTooLong { seq_len, max_len });
    }
    Ok(mask.narrow(2, 0, seq_len)?.narrow(3, 0, seq_len)?)
}
