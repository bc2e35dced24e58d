//! Persistence errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid transcript location: {0}")]
    InvalidLocation(String),
}

impl From<PersistenceError> for voicebot_core::Error {
    fn from(err: PersistenceError) -> Self {
        voicebot_core::Error::Transcript(err.to_string())
    }
}
