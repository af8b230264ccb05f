use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::error::CoreError;

/// Endpoint and API key used for every remote request.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCredentials {
    pub endpoint: Url,
    pub key: String,
}

impl SyncCredentials {
    pub fn new(endpoint: &str, key: impl Into<String>) -> Result<Self, CoreError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| CoreError::InvalidData(format!("invalid endpoint {endpoint}: {e}")))?;
        let key = key.into();
        if key.is_empty() {
            return Err(CoreError::InvalidData("empty api key".into()));
        }
        Ok(Self { endpoint, key })
    }
}

impl fmt::Debug for SyncCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncCredentials")
            .field("endpoint", &self.endpoint.as_str())
            .field("key", &"<redacted>")
            .finish()
    }
}
