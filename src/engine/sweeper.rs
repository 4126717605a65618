use crate::engine::{InstanceDescriptor, ServerStatus};
use crate::integrations::cloud_interface::CloudProvisioner;

use anyhow::Result;
use tracing::{info, warn};

/// Final cleanup pass: delete every server that did not end up ACTIVE.
///
/// By default only servers whose names derive from this batch's descriptors
/// are considered, so unrelated tenant resources are never collateral.
/// `wide` restores the historical tenant-wide janitorial behavior. Deletion
/// errors are logged and skipped; the leak stays visible to operators.
/// Returns the names of the servers it removed, so running it again after a
/// clean pass yields an empty list.
pub async fn sweep<P: CloudProvisioner>(
    provider: &P,
    descriptors: &[InstanceDescriptor],
    wide: bool,
) -> Result<Vec<String>> {
    let servers = provider.list_servers().await?;

    let mut removed = Vec::new();
    for server in servers {
        if server.status == ServerStatus::Active {
            continue;
        }
        let from_this_batch = descriptors.iter().any(|d| server.name.starts_with(&d.name));
        if !wide && !from_this_batch {
            continue;
        }

        match provider.delete_server(&server.id).await {
            Ok(()) => {
                info!(
                    "Swept leftover server '{}' (status {})",
                    server.name, server.status
                );
                removed.push(server.name);
            }
            Err(e) => {
                warn!("Failed to sweep server '{}': {:?}", server.name, e);
            }
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::{MockCloud, descriptors};

    #[tokio::test]
    async fn scoped_sweep_ignores_unrelated_servers() {
        let cloud = MockCloud::new();
        cloud.seed_server("unit-0-deadbeef", ServerStatus::Errored);
        cloud.seed_server("somebody-elses-vm", ServerStatus::Errored);

        let removed = sweep(&cloud, &descriptors(1), false).await.unwrap();

        assert_eq!(removed, vec!["unit-0-deadbeef".to_string()]);
        assert!(
            cloud
                .live_server_names()
                .contains(&"somebody-elses-vm".to_string())
        );
    }

    #[tokio::test]
    async fn wide_sweep_removes_every_non_active_server() {
        let cloud = MockCloud::new();
        cloud.seed_server("unit-0-deadbeef", ServerStatus::Errored);
        cloud.seed_server("somebody-elses-vm", ServerStatus::Building);
        cloud.seed_server("healthy-vm", ServerStatus::Active);

        let removed = sweep(&cloud, &descriptors(1), true).await.unwrap();

        assert_eq!(removed.len(), 2);
        assert_eq!(cloud.live_server_names(), vec!["healthy-vm".to_string()]);
    }

    #[tokio::test]
    async fn sweeping_twice_is_a_noop() {
        let cloud = MockCloud::new();
        cloud.seed_server("unit-0-deadbeef", ServerStatus::Errored);

        let first = sweep(&cloud, &descriptors(1), false).await.unwrap();
        let second = sweep(&cloud, &descriptors(1), false).await.unwrap();

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }
}
