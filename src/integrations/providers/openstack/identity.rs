use anyhow::{Result, bail};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use tracing::{error, info};

/// OpenStack identity inputs, from OS_* environment variables or the
/// fallback file at `~/.config/crank/credentials.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenStackCredentials {
    pub username: String,
    pub password: String,
    pub tenant_name: String,
    pub auth_url: String,
    #[serde(default)]
    pub region_name: Option<String>,
}

impl OpenStackCredentials {
    /// Environment first, credentials file second. The alternate-identity
    /// flags override whatever the sources provided.
    pub fn load(
        username_override: Option<String>,
        tenant_override: Option<String>,
    ) -> Result<Self> {
        let mut credentials = match Self::from_env() {
            Some(credentials) => credentials,
            None => match Self::from_file()? {
                Some(credentials) => credentials,
                None => {
                    bail!("OpenStack environment not set. Did you source your credentials file?")
                }
            },
        };

        if let Some(username) = username_override {
            credentials.username = username;
        }
        if let Some(tenant_name) = tenant_override {
            credentials.tenant_name = tenant_name;
        }
        Ok(credentials)
    }

    fn from_env() -> Option<Self> {
        Some(OpenStackCredentials {
            username: std::env::var("OS_USERNAME").ok()?,
            password: std::env::var("OS_PASSWORD").ok()?,
            tenant_name: std::env::var("OS_TENANT_NAME").ok()?,
            auth_url: std::env::var("OS_AUTH_URL").ok()?,
            region_name: std::env::var("OS_REGION_NAME").ok(),
        })
    }

    fn from_file() -> Result<Option<Self>> {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(None);
        };
        let path = config_dir.join("crank").join("credentials.yaml");
        if !path.exists() {
            return Ok(None);
        }

        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                error!("{:?}", e);
                bail!("Failed reading credentials file '{}'", path.display())
            }
        };
        match serde_yaml::from_str(&raw) {
            Ok(credentials) => Ok(Some(credentials)),
            Err(e) => {
                error!("{:?}", e);
                bail!("Malformed credentials file '{}'", path.display())
            }
        }
    }
}

/// An authenticated Keystone session: scoped token, tenant, and the service
/// endpoints resolved from the catalog.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub tenant_id: String,
    pub tenant_name: String,
    pub compute_url: String,
    pub network_url: String,
    pub orchestration_url: Option<String>,
}

/// Keystone v2 password authentication: POST {auth_url}/tokens.
pub async fn authenticate(
    http: &HttpClient,
    credentials: &OpenStackCredentials,
) -> Result<Session> {
    let url = format!("{}/tokens", credentials.auth_url.trim_end_matches('/'));
    let body = json!({
        "auth": {
            "passwordCredentials": {
                "username": credentials.username,
                "password": credentials.password,
            },
            "tenantName": credentials.tenant_name,
        }
    });

    let response = match http.post(&url).json(&body).send().await {
        Ok(response) => response,
        Err(e) => {
            error!("{:?}", e);
            bail!("Failed reaching the identity service at '{}'", url)
        }
    };

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        error!("Identity service returned {}: {}", status, text);
        bail!("Authentication rejected by the identity service");
    }

    let payload: JsonValue = match response.json().await {
        Ok(payload) => payload,
        Err(e) => {
            error!("{:?}", e);
            bail!("Failed to parse the identity service response")
        }
    };

    let access = &payload["access"];
    let token = match access["token"]["id"].as_str() {
        Some(token) => token.to_string(),
        None => bail!("Token missing from the identity service response"),
    };
    let tenant_id = match access["token"]["tenant"]["id"].as_str() {
        Some(id) => id.to_string(),
        None => bail!("Tenant id missing from the identity service response"),
    };

    let catalog = access["serviceCatalog"].as_array().cloned().unwrap_or_default();
    let compute_url = match catalog_endpoint(&catalog, "compute", &credentials.region_name) {
        Some(url) => url,
        None => bail!("No compute endpoint in the service catalog"),
    };
    let network_url = match catalog_endpoint(&catalog, "network", &credentials.region_name) {
        Some(url) => url,
        None => bail!("No network endpoint in the service catalog"),
    };
    let orchestration_url =
        catalog_endpoint(&catalog, "orchestration", &credentials.region_name);

    if token.len() > 40 {
        info!(
            "AuthToken: {}...{}",
            &token[..20],
            &token[token.len() - 20..]
        );
    }

    Ok(Session {
        token,
        tenant_id,
        tenant_name: credentials.tenant_name.clone(),
        compute_url,
        network_url,
        orchestration_url,
    })
}

fn catalog_endpoint(
    catalog: &[JsonValue],
    service_type: &str,
    region: &Option<String>,
) -> Option<String> {
    let service = catalog
        .iter()
        .find(|entry| entry["type"].as_str() == Some(service_type))?;
    let endpoints = service["endpoints"].as_array()?;

    let endpoint = match region {
        Some(region) => endpoints
            .iter()
            .find(|e| e["region"].as_str() == Some(region.as_str()))
            .or_else(|| endpoints.first()),
        None => endpoints.first(),
    }?;

    endpoint["publicURL"]
        .as_str()
        .map(|url| url.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn picks_the_endpoint_for_the_requested_region() {
        let catalog = vec![json!({
            "type": "compute",
            "endpoints": [
                {"region": "east", "publicURL": "http://east:8774/v2/t1/"},
                {"region": "west", "publicURL": "http://west:8774/v2/t1"},
            ],
        })];

        let url = catalog_endpoint(&catalog, "compute", &Some("west".to_string()));
        assert_eq!(url.as_deref(), Some("http://west:8774/v2/t1"));

        // no region preference falls back to the first endpoint
        let url = catalog_endpoint(&catalog, "compute", &None);
        assert_eq!(url.as_deref(), Some("http://east:8774/v2/t1"));
    }

    #[test]
    fn missing_service_yields_none() {
        let catalog = vec![json!({"type": "compute", "endpoints": []})];
        assert!(catalog_endpoint(&catalog, "orchestration", &None).is_none());
    }
}
