//! Error types for Nebula.

use thiserror::Error;

/// Top-level error type for background engine operations.
///
/// None of these are meant to reach the host application: engines log them
/// and fall back to rendering nothing.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The drawing surface could not produce a 2D context.
    #[error("2D drawing surface unavailable: {0}")]
    SurfaceUnavailable(String),

    /// No GPU context could be created for the host element.
    #[error("GPU context unavailable: {0}")]
    ContextUnavailable(String),

    /// No window or host surface exists yet; construction must be deferred.
    #[error("host environment not available yet")]
    EnvironmentUnavailable,

    /// An operation was attempted on a disposed engine or controller.
    #[error("operation `{0}` called after dispose")]
    DisposedMisuse(&'static str),

    /// `init` was called on an engine that is already running.
    #[error("engine already initialized")]
    AlreadyInitialized,

    /// GPU-related errors
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),
}

impl EngineError {
    /// Whether this error only means "try again later".
    #[must_use]
    pub const fn is_deferral(&self) -> bool {
        matches!(self, Self::EnvironmentUnavailable)
    }
}

/// GPU-specific errors.
#[derive(Debug, Error)]
pub enum GpuError {
    /// Failed to initialize GPU
    #[error("GPU initialization failed: {0}")]
    InitFailed(String),

    /// Shader compilation error
    #[error("Shader compilation failed: {0}")]
    ShaderError(String),

    /// Buffer allocation failed
    #[error("Buffer allocation failed: {0}")]
    BufferAlloc(String),

    /// Presenting or acquiring a frame failed
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// A resource id did not refer to a live resource
    #[error("Unknown GPU resource: {0}")]
    UnknownResource(String),
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
