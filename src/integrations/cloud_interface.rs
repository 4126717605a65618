use crate::engine::{InstanceSpec, ServerStatus};

use anyhow::Result;

/// A server as reported by the compute service's list call.
#[derive(Debug, Clone)]
pub struct ServerSummary {
    pub id: String,
    pub name: String,
    pub status: ServerStatus,
}

/// Everything the provisioning engine needs from a cloud. Implemented over
/// the OpenStack HTTP APIs in production and by a scripted mock in tests.
pub trait CloudProvisioner {
    /// Resolve network names to ids against the live network list.
    async fn resolve_network_ids(&self, names: &[String]) -> Result<Vec<String>>;

    /// Request a new server; returns the assigned server id.
    async fn create_server(
        &self,
        name: &str,
        spec: &InstanceSpec,
        availability_zone: Option<&str>,
        network_ids: &[String],
    ) -> Result<String>;

    async fn get_server_status(&self, server_id: &str) -> Result<ServerStatus>;

    async fn rename_server(&self, server_id: &str, new_name: &str) -> Result<()>;

    async fn delete_server(&self, server_id: &str) -> Result<()>;

    async fn list_servers(&self) -> Result<Vec<ServerSummary>>;
}
