//! Configuration options and storage key layout for the Mandob client

use std::time::Duration;

use url::Url;

use crate::error::Error;

/// Local storage key holding the shared identity list
pub const USERS_KEY: &str = "mister_mandob_users_v2";

/// Local storage key holding the last active username (remembered session)
pub const SESSION_KEY: &str = "mister_mandob_session_v2";

/// Prefix for per-user data snapshot keys
pub const DATA_PREFIX: &str = "mister_mandob_data_";

/// Local storage key for a user's data snapshot
pub fn data_key(username: &str) -> String {
    format!("{}{}", DATA_PREFIX, username)
}

/// Configuration options for the Mandob client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Base URL of the remote snapshot store
    pub api_url: Url,

    /// Quiet period before a mutation is pushed to the remote store
    pub debounce: Duration,

    /// The request timeout applied to remote operations
    pub request_timeout: Option<Duration>,
}

impl ClientOptions {
    /// Create options for a remote store endpoint, validating the URL
    pub fn new(api_url: &str) -> Result<Self, Error> {
        let api_url = Url::parse(api_url)?;
        Ok(Self {
            api_url,
            debounce: Duration::from_secs(3),
            request_timeout: Some(Duration::from_secs(30)),
        })
    }

    /// Set the debounce quiet period for automatic pushes
    pub fn with_debounce(mut self, value: Duration) -> Self {
        self.debounce = value;
        self
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }
}
