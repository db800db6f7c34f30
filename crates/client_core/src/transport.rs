use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE},
    Client, Response,
};
use serde_json::{Map, Value};
use shared::{protocol::ForestResult, snapshot::ApplicationSnapshot};
use tracing::{debug, warn};
use url::Url;

use crate::{
    config::{normalize_server_url, ClientSettings},
    error::TransportError,
    normalize::normalize,
};

const JSON_MIME: &str = "application/json";

/// Fetches view trees from a forest server.
///
/// `Ok(None)` means the server produced no update (non-success status or an
/// empty body). Errors are reserved for requests that could not complete.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn navigate(
        &self,
        template: &str,
    ) -> Result<Option<ApplicationSnapshot>, TransportError>;
    async fn invoke_command(
        &self,
        instance_id: &str,
        command: &str,
        arg: &Value,
    ) -> Result<Option<ApplicationSnapshot>, TransportError>;
}

#[async_trait]
impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    async fn navigate(
        &self,
        template: &str,
    ) -> Result<Option<ApplicationSnapshot>, TransportError> {
        (**self).navigate(template).await
    }

    async fn invoke_command(
        &self,
        instance_id: &str,
        command: &str,
        arg: &Value,
    ) -> Result<Option<ApplicationSnapshot>, TransportError> {
        (**self).invoke_command(instance_id, command, arg).await
    }
}

pub struct HttpTransport {
    http: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(server_url: impl Into<String>) -> Result<Self, TransportError> {
        Self::from_settings(&ClientSettings {
            server_url: server_url.into(),
            ..ClientSettings::default()
        })
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self, TransportError> {
        let base_url = normalize_server_url(&settings.server_url);
        Url::parse(&base_url).map_err(|e| TransportError::InvalidUrl {
            target: base_url.clone(),
            reason: e.to_string(),
        })?;

        // The cookie store keeps the server-side session alive across requests.
        let http = Client::builder()
            .cookie_store(true)
            .default_headers(json_headers())
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .user_agent(settings.user_agent.clone())
            .build()?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn navigate_url(&self, template: &str) -> Result<Url, TransportError> {
        let raw = format!("{}/{}", self.base_url, template.trim_start_matches('/'));
        Url::parse(&raw).map_err(|e| TransportError::InvalidUrl {
            target: raw,
            reason: e.to_string(),
        })
    }

    fn command_url(&self, instance_id: &str, command: &str) -> Result<Url, TransportError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| TransportError::InvalidUrl {
            target: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        url.path_segments_mut()
            .map_err(|()| TransportError::InvalidUrl {
                target: self.base_url.clone(),
                reason: "base url cannot carry path segments".to_string(),
            })?
            .pop_if_empty()
            .push(instance_id)
            .push(command);
        Ok(url)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn navigate(
        &self,
        template: &str,
    ) -> Result<Option<ApplicationSnapshot>, TransportError> {
        let url = self.navigate_url(template)?;
        debug!(%url, template, "transport: navigate");
        let response = self.http.get(url).send().await?;
        read_forest_result(response).await
    }

    async fn invoke_command(
        &self,
        instance_id: &str,
        command: &str,
        arg: &Value,
    ) -> Result<Option<ApplicationSnapshot>, TransportError> {
        let url = self.command_url(instance_id, command)?;
        debug!(%url, instance_id, command, "transport: invoke command");
        let mut request = self.http.post(url);
        if let Some(body) = strip_blanks(arg) {
            request = request.body(serde_json::to_vec(&body)?);
        }
        let response = request.send().await?;
        read_forest_result(response).await
    }
}

fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(JSON_MIME));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_MIME));
    headers
}

/// Drops `null` and `""` fields from a top-level object. A `null` argument
/// produces no body at all; other values pass through unchanged.
pub fn strip_blanks(arg: &Value) -> Option<Value> {
    match arg {
        Value::Null => None,
        Value::Object(fields) => {
            let kept: Map<String, Value> = fields
                .iter()
                .filter(|(_, value)| !is_blank(value))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            Some(Value::Object(kept))
        }
        other => Some(other.clone()),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

async fn read_forest_result(
    response: Response,
) -> Result<Option<ApplicationSnapshot>, TransportError> {
    let status = response.status();
    if !status.is_success() {
        warn!(%status, url = %response.url(), "transport: server returned no update");
        return Ok(None);
    }

    let body = response.bytes().await?;
    if body.iter().all(u8::is_ascii_whitespace) {
        warn!(%status, "transport: empty response body");
        return Ok(None);
    }

    let raw: Option<ForestResult> = serde_json::from_slice(&body)?;
    Ok(raw.map(normalize))
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
