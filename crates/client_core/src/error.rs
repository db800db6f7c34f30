use thiserror::Error;

use crate::normalize::DanglingReference;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid request url for {target}: {reason}")]
    InvalidUrl { target: String, reason: String },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("malformed forest payload: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
    #[error("engine is detached from its store")]
    Detached,
    #[error("payload references {} missing instance(s)", .0.len())]
    DanglingReferences(Vec<DanglingReference>),
}
