//! Linear algebra helpers.
//!
//! Sparse products over `sprs` matrices and a spectral norm estimate.

pub mod sparse;
pub mod spectral;
