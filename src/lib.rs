//! Directional recovery of seismic wavefields from array cross-spectra.
//!
//! The pipeline inverts per-station-pair, per-channel-pair cross-spectral
//! densities at one analysis frequency against a directional sensitivity
//! model: design vectors for the requested wave types (P, S, Rayleigh) are
//! stacked and folded into a normal-equations system, its real projection
//! is solved with LSQR, and the solution is reshaped into per-direction
//! amplitude maps over a shared sky grid.

pub mod args;
pub mod csd;
pub mod error;
pub mod event;
pub mod orf;
pub mod recovery;
pub mod solver;
pub mod station;
pub mod synth;
pub mod trace;
