use thiserror::Error;

/// Everything the engine can report to its caller.
#[derive(Debug, Error)]
pub enum LifeError {
    /// The grid buffers for a `width` x `height` run could not be allocated.
    #[error("could not allocate a {width}x{height} grid")]
    Allocation { width: usize, height: usize },

    /// The background execution context could not be created.
    #[error("could not start the simulation runtime: {0}")]
    Runtime(#[from] std::io::Error),

    /// A configured pattern name is not in the catalogue.
    #[error("unknown pattern {0:?}")]
    UnknownPattern(String),
}

pub type Result<T> = std::result::Result<T, LifeError>;
