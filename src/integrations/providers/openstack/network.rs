use crate::integrations::providers::openstack::OpenStackInterface;

use anyhow::{Result, bail};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::error;

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub shared: bool,
    #[serde(rename = "router:external", default)]
    pub external: bool,
    #[serde(default)]
    pub subnets: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AllocationPool {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubnetDetail {
    pub id: String,
    pub name: String,
    pub network_id: String,
    pub cidr: String,
    #[serde(default)]
    pub gateway_ip: Option<String>,
    #[serde(default)]
    pub allocation_pools: Vec<AllocationPool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExternalGatewayInfo {
    pub network_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouterSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub external_gateway_info: Option<ExternalGatewayInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortFixedIp {
    pub subnet_id: String,
    pub ip_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortSummary {
    pub id: String,
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub device_owner: String,
    #[serde(default)]
    pub fixed_ips: Vec<PortFixedIp>,
}

fn parse_list<T: serde::de::DeserializeOwned>(payload: &JsonValue, key: &str) -> Result<Vec<T>> {
    match payload.get(key) {
        Some(list) => match serde_json::from_value(list.clone()) {
            Ok(parsed) => Ok(parsed),
            Err(e) => {
                error!("{:?}", e);
                bail!("Malformed '{}' list in network API response", key)
            }
        },
        None => bail!("Key '{}' missing from network API response", key),
    }
}

impl OpenStackInterface {
    pub async fn list_networks(&self) -> Result<Vec<NetworkSummary>> {
        let payload = self.network_get("/networks").await?;
        parse_list(&payload, "networks")
    }

    /// The tenant's own selectable networks: excludes other tenants'
    /// networks and the provider-facing "public" network.
    pub async fn tenant_networks(&self) -> Result<Vec<NetworkSummary>> {
        let networks = self.list_networks().await?;
        Ok(networks
            .into_iter()
            .filter(|n| n.tenant_id == self.session.tenant_id && n.name != "public")
            .collect())
    }

    pub async fn show_subnet(&self, subnet_id: &str) -> Result<SubnetDetail> {
        let payload = self.network_get(&format!("/subnets/{}", subnet_id)).await?;
        match payload.get("subnet") {
            Some(subnet) => match serde_json::from_value(subnet.clone()) {
                Ok(parsed) => Ok(parsed),
                Err(e) => {
                    error!("{:?}", e);
                    bail!("Malformed subnet '{}' in network API response", subnet_id)
                }
            },
            None => bail!("Subnet '{}' missing from network API response", subnet_id),
        }
    }

    pub async fn list_routers(&self) -> Result<Vec<RouterSummary>> {
        let payload = self.network_get("/routers").await?;
        parse_list(&payload, "routers")
    }

    pub async fn list_ports(&self) -> Result<Vec<PortSummary>> {
        let payload = self.network_get("/ports").await?;
        parse_list(&payload, "ports")
    }
}
