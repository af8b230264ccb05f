//! Remote gateway: turns a queued operation into one HTTP request.
//!
//! Operations whose payload carries a positive id are updates addressed by
//! that id; everything else is a create. Every request carries the queued
//! operation id as an `Idempotency-Key`, so a retried create after a lost
//! response can be deduplicated by servers that honour the header. Any 2xx
//! counts as delivered, with or without a usable row in the body.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use resync_core::{QueuedOperation, Record, SyncCredentials, Table};
use serde_json::Value;
use tracing::{debug, warn};

use crate::credentials::CredentialStore;
use crate::error::SyncError;

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";
pub const API_KEY_HEADER: &str = "apikey";
const REST_PREFIX: &str = "rest/v1";

#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn send(&self, op: &QueuedOperation) -> Result<Record, SyncError>;
}

/// What a queued operation turns into on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayRequest {
    Create { table: Table },
    Update { table: Table, id: i64 },
}

impl GatewayRequest {
    pub fn for_operation(op: &QueuedOperation) -> Self {
        match op.payload.remote_id() {
            Some(id) => Self::Update {
                table: op.table,
                id,
            },
            None => Self::Create { table: op.table },
        }
    }

    pub fn table(&self) -> Table {
        match self {
            Self::Create { table } | Self::Update { table, .. } => *table,
        }
    }

    /// Best local guess at the server row when the response carried none.
    fn echo(&self, op: &QueuedOperation) -> Record {
        let mut record = op.payload.clone();
        record.id = match self {
            Self::Create { .. } => None,
            Self::Update { id, .. } => Some(*id),
        };
        record
    }

    fn url(&self, endpoint: &reqwest::Url) -> Result<reqwest::Url, SyncError> {
        let base = endpoint.as_str().trim_end_matches('/');
        let raw = match self {
            Self::Create { table } => format!("{base}/{REST_PREFIX}/{table}"),
            Self::Update { table, id } => format!("{base}/{REST_PREFIX}/{table}?id=eq.{id}"),
        };
        reqwest::Url::parse(&raw)
            .map_err(|e| SyncError::InvalidResponse(format!("bad request url {raw}: {e}")))
    }
}

/// Gateway speaking the REST dialect of the remote backend over reqwest.
pub struct HttpGateway {
    client: Client,
    credentials: CredentialStore,
    timeout: Duration,
}

impl HttpGateway {
    pub fn new(credentials: CredentialStore, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            credentials,
            timeout,
        }
    }

    fn build(
        &self,
        request: GatewayRequest,
        creds: &SyncCredentials,
        op: &QueuedOperation,
    ) -> Result<reqwest::RequestBuilder, SyncError> {
        let url = request.url(&creds.endpoint)?;
        let builder = match request {
            GatewayRequest::Create { .. } => self.client.post(url),
            GatewayRequest::Update { .. } => self.client.patch(url),
        };
        Ok(builder
            .timeout(self.timeout)
            .bearer_auth(&creds.key)
            .header(API_KEY_HEADER, &creds.key)
            .header("Prefer", "return=representation")
            .header(IDEMPOTENCY_HEADER, op.id.to_string())
            .json(&op.payload.body()))
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn send(&self, op: &QueuedOperation) -> Result<Record, SyncError> {
        let creds = self.credentials.get().ok_or(SyncError::CredentialsMissing)?;
        let request = GatewayRequest::for_operation(op);
        debug!(op_id = %op.id, table = %op.table, ?request, "sending queued operation");

        let response = self
            .build(request, &creds, op)?
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::RemoteRejected {
                status: status.as_u16(),
                body,
            });
        }

        // The write was applied; a missing or unusable body must not send it again.
        let representation = match response.bytes().await {
            Ok(body) => decode_representation(&body),
            Err(e) => Err(map_transport_error(e)),
        };
        Ok(representation.unwrap_or_else(|e| {
            warn!(op_id = %op.id, status = status.as_u16(), error = %e, "no usable representation, using queued payload");
            request.echo(op)
        }))
    }
}

fn map_transport_error(err: reqwest::Error) -> SyncError {
    if err.is_timeout() {
        SyncError::TimeoutExceeded
    } else if err.is_decode() {
        SyncError::InvalidResponse(err.to_string())
    } else {
        SyncError::NetworkUnreachable(err.to_string())
    }
}

fn decode_representation(body: &[u8]) -> Result<Record, SyncError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(SyncError::InvalidResponse("empty response body".into()));
    }
    let value: Value =
        serde_json::from_slice(body).map_err(|e| SyncError::InvalidResponse(e.to_string()))?;
    parse_representation(value)
}

/// The backend answers with the affected rows as an array; some deployments
/// return a bare object instead.
fn parse_representation(value: Value) -> Result<Record, SyncError> {
    let row = match value {
        Value::Array(mut rows) => {
            if rows.is_empty() {
                return Err(SyncError::InvalidResponse("no rows returned".into()));
            }
            rows.swap_remove(0)
        }
        other @ Value::Object(_) => other,
        other => {
            return Err(SyncError::InvalidResponse(format!(
                "unexpected body: {other}"
            )));
        }
    };
    Record::from_json(row).map_err(|e| SyncError::InvalidResponse(e.to_string()))
}
