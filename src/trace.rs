use ndarray::prelude::*;

use crate::error::RecoveryError;

/// A sequence of real ground-motion samples with a sample rate and epoch.
///
/// Owned by the caller of the recovery pipeline; the core only reads it.
#[derive(Debug, Clone)]
pub struct Trace {
    data: Array1<f64>,
    sample_rate: f64,
    epoch: f64,
    name: String,
}

impl Trace {
    /// Validated constructor: the sample rate must be positive and finite
    /// and every sample finite.
    pub fn new(
        data: Array1<f64>,
        sample_rate: f64,
        epoch: f64,
        name: impl Into<String>,
    ) -> Result<Self, RecoveryError> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(RecoveryError::BadTrace(format!(
                "sample rate must be positive and finite, got {}",
                sample_rate
            )));
        }
        if !epoch.is_finite() {
            return Err(RecoveryError::BadTrace("non-finite epoch".to_string()));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(RecoveryError::BadTrace(
                "trace contains a non-finite sample".to_string(),
            ));
        }
        Ok(Trace {
            data,
            sample_rate,
            epoch,
            name: name.into(),
        })
    }

    pub fn zeros(
        nsamp: usize,
        sample_rate: f64,
        epoch: f64,
        name: impl Into<String>,
    ) -> Result<Self, RecoveryError> {
        Trace::new(Array1::zeros(nsamp), sample_rate, epoch, name)
    }

    pub fn data(&self) -> ArrayView1<f64> {
        self.data.view()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn epoch(&self) -> f64 {
        self.epoch
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn duration(&self) -> f64 {
        self.data.len() as f64 / self.sample_rate
    }

    /// Add another trace sample-by-sample, used when stacking signal
    /// injections and noise realizations.
    pub fn add(&mut self, other: &Trace) -> Result<(), RecoveryError> {
        if self.sample_rate != other.sample_rate {
            return Err(RecoveryError::SampleRateMismatch {
                a: self.sample_rate,
                b: other.sample_rate,
            });
        }
        if self.data.len() != other.data.len() {
            return Err(RecoveryError::LengthMismatch {
                a: self.data.len(),
                b: other.data.len(),
            });
        }
        self.data += &other.data;
        Ok(())
    }

    /// Add a raw sample array in place (same length required).
    pub fn add_samples(&mut self, samples: &Array1<f64>) -> Result<(), RecoveryError> {
        if self.data.len() != samples.len() {
            return Err(RecoveryError::LengthMismatch {
                a: self.data.len(),
                b: samples.len(),
            });
        }
        self.data += samples;
        Ok(())
    }
}
