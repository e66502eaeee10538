use thiserror::Error;

use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum BlindError {
    #[error("Invalid blind configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("State store failure: {0}")]
    Store(String),
}
