//! Inverted dropout with an explicit training switch.
//!
//! Masks are drawn from a seeded 64-bit linear congruential generator so that
//! two modules built with the same seed drop the same elements, which keeps
//! training runs reproducible without a global RNG. Kept activations are
//! scaled by `1 / (1 - p)` so the expected value is unchanged.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use candle_core::{DType, Error, Result, Tensor};

/// Dropout module that is active only while in training mode.
pub struct Dropout {
    probability: f32,
    rng: Mutex<Lcg64>,
    training: AtomicBool,
}

impl Clone for Dropout {
    fn clone(&self) -> Self {
        let state = match self.rng.lock() {
            Ok(guard) => guard.clone(),
            // A poisoned generator only loses its position in the stream.
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        Self {
            probability: self.probability,
            rng: Mutex::new(state),
            training: AtomicBool::new(self.is_training()),
        }
    }
}

impl fmt::Debug for Dropout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dropout")
            .field("probability", &self.probability)
            .field("training", &self.is_training())
            .finish()
    }
}

impl Dropout {
    /// Creates a dropout module in training mode.
    ///
    /// `probability` must lie in `[0, 1)`; zero makes the module an identity.
    pub fn new(probability: f32, seed: u64) -> Result<Self> {
        if !(0.0..1.0).contains(&probability) {
            return Err(Error::Msg(format!(
                "dropout probability must be in [0, 1), got {probability}"
            )));
        }
        Ok(Self {
            probability,
            rng: Mutex::new(Lcg64::new(seed)),
            training: AtomicBool::new(true),
        })
    }

    pub fn probability(&self) -> f32 {
        self.probability
    }

    /// Enables or disables dropout.
    pub fn set_training(&self, training: bool) {
        self.training.store(training, Ordering::Relaxed);
    }

    pub fn is_training(&self) -> bool {
        self.training.load(Ordering::Relaxed)
    }

    /// Applies dropout to `input`; identity in evaluation mode or when `p == 0`.
    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        if !self.is_training() || self.probability == 0.0 {
            return Ok(input.clone());
        }

        let keep_prob = 1.0 - self.probability;
        let total = input.elem_count();
        let mask_data = {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| Error::Msg("dropout RNG mutex poisoned".into()))?;
            (0..total)
                .map(|_| {
                    if rng.next_f32() < keep_prob {
                        1.0f32 / keep_prob
                    } else {
                        0.0f32
                    }
                })
                .collect::<Vec<_>>()
        };
        let mask = Tensor::from_vec(mask_data, input.dims(), input.device())?;
        let mask = if input.dtype() == DType::F32 {
            mask
        } else {
            mask.to_dtype(input.dtype())?
        };
        input.mul(&mask)
    }
}

/// Simple 64-bit linear congruential generator for deterministic dropout masks.
#[derive(Debug, Clone)]
struct Lcg64 {
    state: u64,
}

impl Lcg64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        // Knuth's MMIX multiplier.
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    fn next_f32(&mut self) -> f32 {
        const SCALE: f64 = 1.0 / ((1u64 << 53) as f64);
        let bits = self.next_u64() >> 11;
        (bits as f64 * SCALE) as f32
    }
}
