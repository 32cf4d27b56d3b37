//! Engine error type.
//!
//! The per-frame analysis path never fails; it degrades to zero output on
//! bad input. Errors only surface from the validation surface (configuration
//! and metadata tempo).

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("metadata BPM {0} outside valid range (0, 300]")]
    InvalidMetadataBpm(f32),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
