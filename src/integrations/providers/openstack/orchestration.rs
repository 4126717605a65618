use crate::integrations::providers::openstack::OpenStackInterface;

use anyhow::{Result, bail};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use tracing::error;

#[derive(Debug, Clone, Deserialize)]
pub struct StackSummary {
    pub id: String,
    pub stack_name: String,
}

impl OpenStackInterface {
    pub async fn list_stacks(&self) -> Result<Vec<StackSummary>> {
        let url = format!("{}/stacks", self.orchestration_url()?);
        let payload = self.api_request(Method::GET, url, None).await?;
        match payload.get("stacks") {
            Some(stacks) => match serde_json::from_value(stacks.clone()) {
                Ok(parsed) => Ok(parsed),
                Err(e) => {
                    error!("{:?}", e);
                    bail!("Malformed 'stacks' list in orchestration API response")
                }
            },
            None => bail!("Key 'stacks' missing from orchestration API response"),
        }
    }

    pub async fn stack_template(&self, stack: &StackSummary) -> Result<JsonValue> {
        let url = format!(
            "{}/stacks/{}/{}/template",
            self.orchestration_url()?,
            stack.stack_name,
            stack.id
        );
        self.api_request(Method::GET, url, None).await
    }

    /// Ask the orchestration service whether it accepts the template.
    pub async fn validate_template(&self, template: &JsonValue) -> Result<()> {
        let url = format!("{}/validate", self.orchestration_url()?);
        self.api_request(Method::POST, url, Some(json!({"template": template})))
            .await?;
        Ok(())
    }
}
