//! Lightweight validation helpers shared across layer components.
//!
//! These routines provide concise shape and dtype assertions that can be wired
//! into constructors or forward paths. They return `candle_core::Result<()>`
//! so call sites can propagate errors without panicking. Every helper takes a
//! `context` label that is prefixed to the error message.

use candle_core::{Error, Result, Tensor};

/// Ensures a tensor has exactly `rank` dimensions.
pub fn expect_rank(context: &str, tensor: &Tensor, rank: usize) -> Result<()> {
    let dims = tensor.dims();
    if dims.len() == rank {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{context}: expected rank {rank}, got shape {dims:?}"
        )))
    }
}

/// Ensures a tensor matches the expected dimensions exactly.
pub fn expect_shape(context: &str, tensor: &Tensor, expected: &[usize]) -> Result<()> {
    let actual = tensor.dims();
    if actual == expected {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{context}: expected shape {expected:?}, got {actual:?}"
        )))
    }
}

/// Validates the `(batch, seq, hidden)` convention with a known hidden size.
pub fn expect_batch_seq_hidden(context: &str, tensor: &Tensor, hidden: usize) -> Result<()> {
    match tensor.dims() {
        [_, _, actual_hidden] if *actual_hidden == hidden => Ok(()),
        dims => Err(Error::Msg(format!(
            "{context}: expected (batch, seq, {hidden}) layout, got {dims:?}"
        ))),
    }
}

/// Checks that two tensors share a dtype.
pub fn expect_same_dtype(
    context: &str,
    tensor: &Tensor,
    other_context: &str,
    other: &Tensor,
) -> Result<()> {
    if tensor.dtype() == other.dtype() {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{context} has dtype {:?} but {other_context} has dtype {:?}",
            tensor.dtype(),
            other.dtype()
        )))
    }
}
