use reqwest::{Client, Method, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use tracing::debug;

use crate::error::{Error, Result};

/// Operation label, route, and serialized query parameters; doubles as
/// the cache key for read operations. The label keeps two operations
/// that happen to hit the same route from sharing an entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub operation: &'static str,
    pub path: String,
    pub params: Vec<(String, String)>,
}

impl RequestKey {
    pub fn bare(operation: &'static str, path: &str) -> Self {
        Self {
            operation,
            path: path.to_owned(),
            params: Vec::new(),
        }
    }

    pub fn with_params(
        operation: &'static str,
        path: &str,
        params: Vec<(String, String)>,
    ) -> Self {
        Self {
            operation,
            path: path.to_owned(),
            params,
        }
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.operation, self.path)?;
        for (position, (name, value)) in self.params.iter().enumerate() {
            let separator = if position == 0 { '?' } else { '&' };
            write!(f, "{separator}{name}={value}")?;
        }
        Ok(())
    }
}

/// The server wraps every body in `{success, message, data}`.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<JsonValue>,
}

impl Envelope {
    pub fn data(self, path: &str) -> Result<JsonValue> {
        self.data.ok_or_else(|| Error::Envelope(path.to_owned()))
    }

    pub fn message_or(self, fallback: &str) -> String {
        self.message.unwrap_or_else(|| fallback.to_owned())
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http_client: Client,
    base_url: String,
}

impl ApiClient {
    const API_RESOURCE_PREFIX: &str = "/api";

    pub fn new(base_url: &str) -> Self {
        let http_client = Client::new();
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    pub async fn fetch(&self, key: &RequestKey) -> Result<Envelope> {
        let resource_uri = self.resolve_resource_uri(&key.path);
        let mut builder = self.http_client.get(resource_uri);
        if !key.params.is_empty() {
            builder = builder.query(&key.params);
        }
        let request = builder.build()?;
        debug!(key = %key, "fetching resource");
        let response = self.http_client.execute(request).await?;
        read_envelope(&key.path, response).await
    }

    pub async fn submit<R>(&self, method: Method, path: &str, resource: &R) -> Result<Envelope>
    where
        R: Serialize,
    {
        let resource_uri = self.resolve_resource_uri(path);
        debug!(path, method = %method, "submitting resource");
        let request = self
            .http_client
            .request(method, resource_uri)
            .json(resource)
            .build()?;
        let response = self.http_client.execute(request).await?;
        read_envelope(path, response).await
    }

    pub async fn remove(&self, path: &str) -> Result<Envelope> {
        let resource_uri = self.resolve_resource_uri(path);
        debug!(path, "removing resource");
        let request = self.http_client.delete(resource_uri).build()?;
        let response = self.http_client.execute(request).await?;
        read_envelope(path, response).await
    }

    fn resolve_resource_uri(&self, resource_uri: &str) -> String {
        format!(
            "{}{}{resource_uri}",
            self.base_url,
            Self::API_RESOURCE_PREFIX
        )
    }
}

async fn read_envelope(path: &str, response: Response) -> Result<Envelope> {
    let status = response.status();
    let bytes = response.bytes().await?;
    if status.is_success() {
        Ok(serde_json::from_slice(&bytes)?)
    } else {
        Err(Error::Api {
            status,
            message: server_message(&bytes),
        })
    }
}

// Failure bodies usually carry the envelope too; fall back to the raw
// body when they do not.
fn server_message(bytes: &[u8]) -> String {
    serde_json::from_slice::<Envelope>(bytes)
        .ok()
        .and_then(|envelope| envelope.message)
        .unwrap_or_else(|| String::from_utf8_lossy(bytes).trim().to_owned())
}
