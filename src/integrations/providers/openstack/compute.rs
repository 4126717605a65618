use crate::engine::{InstanceSpec, ServerStatus};
use crate::integrations::cloud_interface::{CloudProvisioner, ServerSummary};
use crate::integrations::providers::openstack::OpenStackInterface;

use anyhow::{Result, bail};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use std::collections::HashMap;
use tracing::error;

#[derive(Debug, Clone, Deserialize)]
pub struct ImageSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlavorSummary {
    pub id: String,
    pub name: String,
}

/// One availability zone with the compute hosts it contains.
#[derive(Debug, Clone)]
pub struct ZoneHosts {
    pub zone: String,
    pub hosts: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerAddress {
    pub addr: String,
}

/// A server from `GET /servers/detail`, with the fields template export and
/// the delete flows care about.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerDetail {
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub key_name: Option<String>,
    #[serde(default)]
    pub image: Option<ResourceRef>,
    #[serde(default)]
    pub flavor: Option<ResourceRef>,
    /// Network name -> addresses on that network.
    #[serde(default)]
    pub addresses: HashMap<String, Vec<ServerAddress>>,
}

/// One entry of `GET /servers/{id}/os-interface`.
#[derive(Debug, Clone, Deserialize)]
pub struct InterfaceAttachment {
    pub port_id: String,
    pub net_id: String,
    #[serde(default)]
    pub fixed_ips: Vec<InterfaceFixedIp>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InterfaceFixedIp {
    pub subnet_id: String,
    pub ip_address: String,
}

fn parse_list<T: serde::de::DeserializeOwned>(payload: &JsonValue, key: &str) -> Result<Vec<T>> {
    match payload.get(key) {
        Some(list) => match serde_json::from_value(list.clone()) {
            Ok(parsed) => Ok(parsed),
            Err(e) => {
                error!("{:?}", e);
                bail!("Malformed '{}' list in compute API response", key)
            }
        },
        None => bail!("Key '{}' missing from compute API response", key),
    }
}

impl OpenStackInterface {
    pub async fn list_images(&self) -> Result<Vec<ImageSummary>> {
        let payload = self.compute_get("/images").await?;
        parse_list(&payload, "images")
    }

    pub async fn list_flavors(&self) -> Result<Vec<FlavorSummary>> {
        let payload = self.compute_get("/flavors").await?;
        parse_list(&payload, "flavors")
    }

    pub async fn list_availability_zones(&self) -> Result<Vec<ZoneHosts>> {
        let payload = self.compute_get("/os-availability-zone/detail").await?;
        let zones = match payload["availabilityZoneInfo"].as_array() {
            Some(zones) => zones,
            None => bail!("Key 'availabilityZoneInfo' missing from compute API response"),
        };

        let mut result = Vec::new();
        for zone in zones {
            let Some(name) = zone["zoneName"].as_str() else {
                continue;
            };
            let hosts = zone["hosts"]
                .as_object()
                .map(|hosts| hosts.keys().cloned().collect())
                .unwrap_or_default();
            result.push(ZoneHosts {
                zone: name.to_string(),
                hosts,
            });
        }
        Ok(result)
    }

    pub async fn list_servers_detailed(&self) -> Result<Vec<ServerDetail>> {
        let payload = self.compute_get("/servers/detail").await?;
        parse_list(&payload, "servers")
    }

    pub async fn server_interfaces(&self, server_id: &str) -> Result<Vec<InterfaceAttachment>> {
        let payload = self
            .compute_get(&format!("/servers/{}/os-interface", server_id))
            .await?;
        parse_list(&payload, "interfaceAttachments")
    }

    /// Snapshot a server's disk into a new image and return the image id.
    /// The create-image action returns no body on this API era, so the id is
    /// recovered by looking the snapshot name back up.
    pub async fn snapshot_server(&self, server_id: &str, snapshot_name: &str) -> Result<String> {
        self.compute_post(
            &format!("/servers/{}/action", server_id),
            json!({"createImage": {"name": snapshot_name}}),
        )
        .await?;

        let images = self.list_images().await?;
        match images.into_iter().find(|i| i.name == snapshot_name) {
            Some(image) => Ok(image.id),
            None => bail!("Snapshot '{}' not visible after creation", snapshot_name),
        }
    }
}

impl CloudProvisioner for OpenStackInterface {
    async fn resolve_network_ids(&self, names: &[String]) -> Result<Vec<String>> {
        let networks = self.list_networks().await?;
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            match networks.iter().find(|n| &n.name == name) {
                Some(network) => ids.push(network.id.clone()),
                None => bail!("Network '{}' not found in tenant", name),
            }
        }
        Ok(ids)
    }

    async fn create_server(
        &self,
        name: &str,
        spec: &InstanceSpec,
        availability_zone: Option<&str>,
        network_ids: &[String],
    ) -> Result<String> {
        let nics: Vec<JsonValue> = network_ids.iter().map(|id| json!({"uuid": id})).collect();
        let mut server = json!({
            "name": name,
            "imageRef": spec.image_id,
            "flavorRef": spec.flavor_id,
            "key_name": spec.key_name,
            "networks": nics,
        });
        if let Some(zone) = availability_zone {
            server["availability_zone"] = json!(zone);
        }

        let payload = self.compute_post("/servers", json!({"server": server})).await?;
        match payload["server"]["id"].as_str() {
            Some(id) => Ok(id.to_string()),
            None => bail!("Server id missing from create response for '{}'", name),
        }
    }

    async fn get_server_status(&self, server_id: &str) -> Result<ServerStatus> {
        let payload = self.compute_get(&format!("/servers/{}", server_id)).await?;
        match payload["server"]["status"].as_str() {
            Some(status) => Ok(ServerStatus::parse(status)),
            None => bail!("Status missing for server '{}'", server_id),
        }
    }

    async fn rename_server(&self, server_id: &str, new_name: &str) -> Result<()> {
        self.compute_put(
            &format!("/servers/{}", server_id),
            json!({"server": {"name": new_name}}),
        )
        .await?;
        Ok(())
    }

    async fn delete_server(&self, server_id: &str) -> Result<()> {
        self.compute_delete(&format!("/servers/{}", server_id)).await
    }

    async fn list_servers(&self) -> Result<Vec<ServerSummary>> {
        let servers = self.list_servers_detailed().await?;
        Ok(servers
            .into_iter()
            .map(|s| ServerSummary {
                id: s.id,
                name: s.name,
                status: ServerStatus::parse(&s.status),
            })
            .collect())
    }
}
