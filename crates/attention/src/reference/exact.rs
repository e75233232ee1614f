//! Reference CPU-friendly attention kernel.
//!
//! The exact path prioritises numerical fidelity and mirrors the semantics
//! described by the [`Attention`](crate::core::Attention) trait. Every step is
//! composed from differentiable Candle ops so gradients flow back to the
//! projections that produced `q`, `k` and `v`.

use std::sync::OnceLock;

use candle_core::{DType, Tensor, D};
use candle_nn::ops::softmax;

use crate::core::{Attention, AttentionError, AttentionOutput};
use crate::masks::MASK_DTYPE;

/// Numerically stable scaled dot-product attention with additive bias and boolean mask.
#[derive(Debug)]
pub struct ExactAttention {
    scale: f64,
    first_call: OnceLock<()>,
}

impl ExactAttention {
    /// Kernel dividing raw scores by `scale`.
    pub fn with_scale(scale: f64) -> Self {
        Self {
            scale,
            first_call: OnceLock::new(),
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }
}

fn broadcast_target(
    name: &str,
    tensor: &Tensor,
    target: (usize, usize, usize, usize),
) -> Result<Tensor, AttentionError> {
    let (batch, heads, q_len, k_len) = target;
    let (tb, th, tq, tk) = tensor.dims4().map_err(|_| AttentionError::InvalidShape {
        context: format!("{name} must have shape [batch|1, heads|1, q_len, k_len]"),
    })?;
    let fits = |actual: usize, expected: usize| actual == expected || actual == 1;
    if !fits(tb, batch) || !fits(th, heads) || tq != q_len || tk != k_len {
        return Err(AttentionError::InvalidShape {
            context: format!(
                "{name} shape mismatch: expected [{batch}|1, {heads}|1, {q_len}, {k_len}] got [{tb}, {th}, {tq}, {tk}]"
            ),
        });
    }
    Ok(tensor.broadcast_as(target)?)
}

impl Attention for ExactAttention {
    fn attend(
        &self,
        q: &Tensor,
        k: &Tensor,
        v: &Tensor,
        bias: Option<&Tensor>,
        mask: Option<&Tensor>,
    ) -> Result<AttentionOutput, AttentionError> {
        if self.first_call.set(()).is_ok() {
            log::info!(
                "attention::reference init scale={:.4} bias={} mask={}",
                self.scale,
                bias.is_some(),
                mask.is_some()
            );
        }

        let device = q.device();
        if !device.same_device(k.device()) || !device.same_device(v.device()) {
            return Err(AttentionError::InvalidShape {
                context: "q, k, v must reside on the same device".to_string(),
            });
        }

        let dtype = q.dtype();
        if dtype != k.dtype() || dtype != v.dtype() {
            return Err(AttentionError::InvalidShape {
                context: "q, k, v must share the same dtype".to_string(),
            });
        }
        if !matches!(dtype, DType::F32 | DType::F64 | DType::F16 | DType::BF16) {
            return Err(AttentionError::UnsupportedDType {
                requested: format!("{dtype:?}"),
            });
        }

        let (batch, heads, q_len, head_dim) =
            q.dims4().map_err(|_| AttentionError::InvalidShape {
                context: "q must have shape [batch, heads, seq_len, head_dim]".to_string(),
            })?;
        let (kb, kh, k_len, kd) = k.dims4().map_err(|_| AttentionError::InvalidShape {
            context: "k must have shape [batch, heads, seq_len, head_dim]".to_string(),
        })?;
        let (vb, vh, vk, vd) = v.dims4().map_err(|_| AttentionError::InvalidShape {
            context: "v must have shape [batch, heads, seq_len, head_dim]".to_string(),
        })?;
        if kb != batch || kh != heads || kd != head_dim {
            return Err(AttentionError::InvalidShape {
                context: format!(
                    "k shape mismatch: expected [{batch}, {heads}, ?, {head_dim}] got [{kb}, {kh}, {k_len}, {kd}]"
                ),
            });
        }
        if vb != batch || vh != heads || vk != k_len || vd != head_dim {
            return Err(AttentionError::InvalidShape {
                context: format!(
                    "v shape mismatch: expected [{batch}, {heads}, {k_len}, {head_dim}] got [{vb}, {vh}, {vk}, {vd}]"
                ),
            });
        }

        let target = (batch, heads, q_len, k_len);
        let k_t = k.transpose(2, 3)?.contiguous()?;
        let mut scores = (q.contiguous()?.matmul(&k_t)? / self.scale)?;

        if let Some(bias) = bias {
            if bias.dtype() != dtype {
                return Err(AttentionError::UnsupportedDType {
                    requested: format!("bias dtype {:?} differs from q {dtype:?}", bias.dtype()),
                });
            }
            scores = scores.add(&broadcast_target("bias", bias, target)?)?;
        }

        if let Some(mask) = mask {
            if !device.same_device(mask.device()) {
                return Err(AttentionError::InvalidShape {
                    context: "mask must reside on the same device as q".to_string(),
                });
            }
            if mask.dtype() != MASK_DTYPE {
                return Err(AttentionError::UnsupportedDType {
                    requested: format!(
                        "mask expects dtype {MASK_DTYPE:?}, got {:?}",
                        mask.dtype()
                    ),
                });
            }
            let mask = broadcast_target("mask", mask, target)?;
            let blocked = Tensor::new(f32::NEG_INFINITY, device)?
                .to_dtype(dtype)?
                .broadcast_as(target)?;
            scores = mask.where_cond(&scores, &blocked)?;
        }

        let weights = softmax(&scores, D::Minus1)?;
        let context = weights.matmul(&v.contiguous()?)?;
        Ok(AttentionOutput { context, weights })
    }
}
