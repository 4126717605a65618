use crate::integrations::providers::openstack::{
    OpenStackCredentials, Session, authenticate,
};

use anyhow::{Result, bail};
use reqwest::{Client as HttpClient, Method, StatusCode};
use serde_json::Value as JsonValue;
use tracing::error;

/// One authenticated connection to an OpenStack cloud. All service calls
/// (compute, network, orchestration) go through the request helpers here.
pub struct OpenStackInterface {
    pub session: Session,
    http: HttpClient,
}

impl OpenStackInterface {
    pub async fn connect(credentials: &OpenStackCredentials) -> Result<Self> {
        let http = match HttpClient::builder().build() {
            Ok(client) => client,
            Err(e) => {
                error!("{:?}", e);
                bail!("Failed building the OpenStack HTTP client")
            }
        };

        let session = authenticate(&http, credentials).await?;
        Ok(OpenStackInterface { session, http })
    }

    // Request helper shared by every service call: sends the token header,
    // fails on non-2xx, and parses JSON when there is a body.
    pub(crate) async fn api_request(
        &self,
        method: Method,
        url: String,
        body: Option<JsonValue>,
    ) -> Result<JsonValue> {
        let mut request = self
            .http
            .request(method.clone(), &url)
            .header("X-Auth-Token", &self.session.token);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("{:?}", e);
                bail!("Failed reaching OpenStack API at '{}'", url)
            }
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("OpenStack API '{} {}' returned {}: {}", method, url, status, text);
            bail!("OpenStack API returned an error status ({})", status);
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(JsonValue::Null);
        }
        let raw = match response.text().await {
            Ok(raw) => raw,
            Err(e) => {
                error!("{:?}", e);
                bail!("Unable to read OpenStack API response body")
            }
        };
        if raw.is_empty() {
            return Ok(JsonValue::Null);
        }
        match serde_json::from_str(&raw) {
            Ok(json) => Ok(json),
            Err(e) => {
                error!("{:?}", e);
                bail!("Failed to parse OpenStack API response from '{}'", url)
            }
        }
    }

    pub(crate) async fn compute_get(&self, path: &str) -> Result<JsonValue> {
        let url = format!("{}{}", self.session.compute_url, path);
        self.api_request(Method::GET, url, None).await
    }

    pub(crate) async fn compute_post(&self, path: &str, body: JsonValue) -> Result<JsonValue> {
        let url = format!("{}{}", self.session.compute_url, path);
        self.api_request(Method::POST, url, Some(body)).await
    }

    pub(crate) async fn compute_put(&self, path: &str, body: JsonValue) -> Result<JsonValue> {
        let url = format!("{}{}", self.session.compute_url, path);
        self.api_request(Method::PUT, url, Some(body)).await
    }

    pub(crate) async fn compute_delete(&self, path: &str) -> Result<()> {
        let url = format!("{}{}", self.session.compute_url, path);
        self.api_request(Method::DELETE, url, None).await?;
        Ok(())
    }

    pub(crate) async fn network_get(&self, path: &str) -> Result<JsonValue> {
        let url = format!("{}/v2.0{}", self.session.network_url, path);
        self.api_request(Method::GET, url, None).await
    }

    pub(crate) fn orchestration_url(&self) -> Result<&str> {
        match &self.session.orchestration_url {
            Some(url) => Ok(url),
            None => bail!("The service catalog exposes no orchestration endpoint"),
        }
    }
}
