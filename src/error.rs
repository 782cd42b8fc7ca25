use thiserror::Error as ThisError;

/// Errors reported by graph construction and solver entry points.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum Error {
    /// A node id outside the current node arena.
    #[error("invalid node id {0}")]
    InvalidNode(usize),

    /// An arc id outside the current arc arena.
    #[error("invalid arc id {0}")]
    InvalidArc(usize),

    /// The caller drove the API outside its contract.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
