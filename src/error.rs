//! Error handling for the Mandob core engine

use std::fmt;
use thiserror::Error;

use crate::model::SimType;

/// Unified error type for the Mandob core engine
#[derive(Error, Debug)]
pub enum Error {
    /// Network or HTTP related errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The remote store answered with an error marker or a non-success status
    #[error("Remote store error: {0}")]
    Remote(String),

    /// Credential resolution failed both locally and remotely.
    /// Carries no detail about which of the two checks failed.
    #[error("identity not found")]
    IdentityNotFound,

    /// A transfer payload could not be decoded as JSON or armored JSON
    #[error("invalid transfer payload: {0}")]
    Decode(String),

    /// Pre-check failure: not enough good stock for the requested quantity
    #[error("insufficient stock for {0}")]
    InsufficientStock(SimType),

    /// Pre-check failure: not enough damaged stock for the requested quantity
    #[error("insufficient damaged stock for {0}")]
    InsufficientDamagedStock(SimType),

    /// An identity with the same username already exists
    #[error("username already taken: {0}")]
    DuplicateUsername(String),

    /// Seeded identities cannot be deleted
    #[error("seeded users cannot be deleted")]
    ProtectedUser,

    /// The operation requires an active session
    #[error("no active session")]
    NotLoggedIn,
}

impl Error {
    /// Create a new remote store error
    pub fn remote<T: fmt::Display>(msg: T) -> Self {
        Error::Remote(msg.to_string())
    }

    /// Create a new transfer decode error
    pub fn decode<T: fmt::Display>(msg: T) -> Self {
        Error::Decode(msg.to_string())
    }

    /// Create a new configuration error
    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Error::Config(msg.to_string())
    }
}
