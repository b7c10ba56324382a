use std::error::Error;
use std::fmt;

/// Errors raised by the recovery pipeline. Configuration problems are fatal
/// and surface immediately; solver non-convergence is reported through
/// `SolveReport` instead and never appears here.
#[derive(Debug)]
pub enum RecoveryError {
    /// A station referenced by a pair is absent from the station layout.
    MissingStation(String),
    /// A requested channel has no trace on the given station.
    MissingChannel { station: String, channel: String },
    /// Two traces being cross-correlated disagree on sample rate.
    SampleRateMismatch { a: f64, b: f64 },
    /// Two traces being cross-correlated disagree on length.
    LengthMismatch { a: usize, b: usize },
    /// Segment length / overlap do not satisfy segment > overlap >= 0, or
    /// the traces are shorter than one segment.
    BadSegmentation(String),
    /// Malformed trace construction (non-finite samples, bad sample rate).
    BadTrace(String),
    /// The analysis frequency falls outside the computed one-sided band.
    FrequencyOutOfBand { requested: f64, nyquist: f64 },
    /// Inconsistent recovery configuration (empty wave-type/channel lists,
    /// duplicate wave-type tags, ...).
    BadConfig(String),
    /// Block layout does not tile the solution vector exactly.
    ShapeMismatch { expected: usize, actual: usize },
    /// Malformed event metadata (bad time string, out-of-range coordinates).
    BadEvent(String),
}

impl fmt::Display for RecoveryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecoveryError::MissingStation(name) => {
                write!(f, "station '{}' is not in the station layout", name)
            }
            RecoveryError::MissingChannel { station, channel } => {
                write!(f, "station '{}' has no '{}' channel", station, channel)
            }
            RecoveryError::SampleRateMismatch { a, b } => {
                write!(f, "sample rate mismatch: {} Hz vs {} Hz", a, b)
            }
            RecoveryError::LengthMismatch { a, b } => {
                write!(f, "trace length mismatch: {} vs {} samples", a, b)
            }
            RecoveryError::BadSegmentation(msg) => write!(f, "bad segmentation: {}", msg),
            RecoveryError::BadTrace(msg) => write!(f, "bad trace: {}", msg),
            RecoveryError::FrequencyOutOfBand { requested, nyquist } => write!(
                f,
                "analysis frequency {} Hz is outside the computed band [0, {} Hz]",
                requested, nyquist
            ),
            RecoveryError::BadConfig(msg) => write!(f, "bad configuration: {}", msg),
            RecoveryError::ShapeMismatch { expected, actual } => write!(
                f,
                "block layout covers {} cells but the solution has {}",
                expected, actual
            ),
            RecoveryError::BadEvent(msg) => write!(f, "bad event: {}", msg),
        }
    }
}

impl Error for RecoveryError {}
