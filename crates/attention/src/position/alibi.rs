//! ALiBi (Attention with Linear Biases) building blocks.
//!
//! Instead of adding position information to embeddings, ALiBi adds a
//! head-specific linear penalty to the attention scores:
//!
//! ```text
//! score[h, i, j] = q_i · k_j / scale + m[h] * (j - i)
//! ```
//!
//! The slopes form a geometric sequence: with `x = (2^8)^(1/num_heads)`,
//! head `h` (zero based) uses `m[h] = x^-(h + 1)`. For causal attention
//! `j <= i`, so the bias is non-positive and grows with distance.

use candle_core::{bail, DType, Device, Result, Tensor};

/// Raw slope values for `num_heads` heads, strictly decreasing in `(0, 1]`.
pub fn slope_values(num_heads: usize) -> Vec<f32> {
    let x = 256f64.powf(1.0 / num_heads as f64);
    (0..num_heads)
        .map(|head| x.powi(-(head as i32 + 1)) as f32)
        .collect()
}

/// Slopes shaped `[num_heads, 1, 1]` so they broadcast against `[.., num_heads, q, k]`.
pub fn alibi_slopes(num_heads: usize, device: &Device) -> Result<Tensor> {
    if num_heads == 0 {
        bail!("alibi slopes require at least one head");
    }
    Tensor::from_vec(slope_values(num_heads), (num_heads, 1, 1), device)
}

/// Pairwise offsets `R[i][j] = j - i` as an `i64` matrix `[seq_len, seq_len]`.
pub fn relative_positions(seq_len: usize, device: &Device) -> Result<Tensor> {
    let data = (0..seq_len as i64)
        .flat_map(|row| (0..seq_len as i64).map(move |col| col - row))
        .collect::<Vec<_>>();
    Tensor::from_vec(data, (seq_len, seq_len), device)
}

/// Bias tensor `[1, num_heads, seq_len, seq_len]` built from `slopes` (`[num_heads, 1, 1]`).
pub fn alibi_bias(slopes: &Tensor, seq_len: usize) -> Result<Tensor> {
    let positions = relative_positions(seq_len, slopes.device())?.to_dtype(slopes.dtype())?;
    slopes.broadcast_mul(&positions)?.unsqueeze(0)
}

/// Converts `bias` to `dtype` only when needed.
pub(crate) fn bias_as(bias: Tensor, dtype: DType) -> Result<Tensor> {
    if bias.dtype() == dtype {
        Ok(bias)
    } else {
        bias.to_dtype(dtype)
    }
}
