//! Error types for fallible resource construction.

use thiserror::Error;

/// Failure to build a shader program on the device.
///
/// Program construction is the one construction-fatal condition in the
/// pipeline: a binding built from a failed program is kept around in a
/// broken state and every draw through it is a logged no-op, so a bad
/// shader never aborts a frame.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProgramError {
    #[error("vertex shader failed to compile: {0}")]
    VertexCompile(String),
    #[error("fragment shader failed to compile: {0}")]
    FragmentCompile(String),
    #[error("program failed to link: {0}")]
    Link(String),
}
