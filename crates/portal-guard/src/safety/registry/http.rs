use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::transport::{
    CheckRequest, EntryQuery, RegistryEnvelope, RegistryTransport, TransportError,
};
use crate::config::RegistryConfig;
use crate::safety::domain::{
    BlacklistEntry, BlacklistType, CheckResult, ContentFilter, NewBlacklistEntry,
};

/// `reqwest`-backed registry transport. Every call is bounded by the configured timeout.
///
/// The configured API token authorizes classification reads only. Administrative
/// calls are sent with the caller's bearer credential, or none at all.
#[derive(Debug, Clone)]
pub struct HttpRegistryTransport {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

/// `data` of a check response. The echoed `type` is free-form and ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckPayload {
    #[serde(default)]
    is_blacklisted: bool,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    matched_pattern: Option<String>,
}

impl CheckPayload {
    fn into_result(self, kind: BlacklistType) -> CheckResult {
        CheckResult {
            is_blacklisted: self.is_blacklisted,
            kind,
            reason: self.reason,
            matched_pattern: self.matched_pattern,
        }
    }
}

impl HttpRegistryTransport {
    pub fn new(config: &RegistryConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()
            .map_err(|err| TransportError::Request(err.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        request: RequestBuilder,
        bearer: Option<&str>,
    ) -> Result<Response, TransportError> {
        let request = match bearer {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        bearer: Option<&str>,
    ) -> Result<RegistryEnvelope<T>, TransportError> {
        let response = self.send(request, bearer).await?;
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        serde_json::from_slice(&body).map_err(|err| TransportError::Decode(err.to_string()))
    }

    fn service_token(&self) -> Option<&str> {
        self.api_token.as_deref()
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_decode() {
        TransportError::Decode(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}

#[async_trait]
impl RegistryTransport for HttpRegistryTransport {
    async fn check(
        &self,
        request: &CheckRequest,
    ) -> Result<RegistryEnvelope<CheckResult>, TransportError> {
        let builder = self
            .client
            .post(self.url("/api/blacklist/check"))
            .json(request);
        let envelope: RegistryEnvelope<CheckPayload> =
            self.decode(builder, self.service_token()).await?;

        Ok(RegistryEnvelope {
            success: envelope.success,
            data: envelope
                .data
                .map(|payload| payload.into_result(request.kind)),
        })
    }

    async fn content_filters(
        &self,
        query: &EntryQuery,
    ) -> Result<RegistryEnvelope<Vec<ContentFilter>>, TransportError> {
        let builder = self
            .client
            .get(self.url("/api/blacklist"))
            .query(&query.to_pairs());
        self.decode(builder, self.service_token()).await
    }

    async fn list_entries(
        &self,
        query: &EntryQuery,
        bearer: Option<&str>,
    ) -> Result<RegistryEnvelope<Vec<BlacklistEntry>>, TransportError> {
        let builder = self
            .client
            .get(self.url("/api/blacklist"))
            .query(&query.to_pairs());
        self.decode(builder, bearer).await
    }

    async fn create_entry(
        &self,
        entry: &NewBlacklistEntry,
        bearer: Option<&str>,
    ) -> Result<RegistryEnvelope<BlacklistEntry>, TransportError> {
        let builder = self.client.post(self.url("/api/blacklist")).json(entry);
        self.decode(builder, bearer).await
    }

    async fn set_entry_active(
        &self,
        id: &str,
        kind: BlacklistType,
        is_active: bool,
        bearer: Option<&str>,
    ) -> Result<(), TransportError> {
        let builder = self
            .client
            .put(self.url(&format!("/api/blacklist/{id}")))
            .query(&[("type", kind.as_str())])
            .json(&serde_json::json!({ "isActive": is_active }));
        self.send(builder, bearer).await.map(|_| ())
    }

    async fn delete_entry(
        &self,
        id: &str,
        kind: BlacklistType,
        bearer: Option<&str>,
    ) -> Result<(), TransportError> {
        let builder = self
            .client
            .delete(self.url(&format!("/api/blacklist/{id}")))
            .query(&[("type", kind.as_str())]);
        self.send(builder, bearer).await.map(|_| ())
    }
}
