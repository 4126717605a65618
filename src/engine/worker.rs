use crate::constants::ID_SUFFIX_LEN;
use crate::engine::{InstanceDescriptor, ProvisionOutcome, ProvisionerSettings, ServerStatus};
use crate::integrations::cloud_interface::CloudProvisioner;

use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Run one create-and-poll-until-terminal cycle for a single descriptor.
///
/// All collaborator errors are folded into the outcome; a worker never
/// aborts the batch. Retrying a failed unit is the retry controller's job,
/// not this function's.
pub async fn provision_one<P: CloudProvisioner>(
    provider: &P,
    descriptor: InstanceDescriptor,
    settings: &ProvisionerSettings,
) -> ProvisionOutcome {
    // Looked up fresh on every attempt, never cached across the batch.
    let network_ids = match provider.resolve_network_ids(&descriptor.spec.networks).await {
        Ok(ids) => ids,
        Err(e) => {
            warn!(
                "Failed to resolve networks {:?} for '{}': {:?}",
                descriptor.spec.networks, descriptor.name, e
            );
            return ProvisionOutcome::Failed;
        }
    };

    let server_id = match provider
        .create_server(
            &descriptor.name,
            &descriptor.spec,
            descriptor.availability_zone.as_deref(),
            &network_ids,
        )
        .await
    {
        Ok(id) => id,
        Err(e) => {
            warn!("Failed to create server '{}': {:?}", descriptor.name, e);
            return ProvisionOutcome::Failed;
        }
    };

    info!("Building '{}' (id '{}')...", descriptor.name, server_id);

    let mut status = ServerStatus::Building;
    while !status.is_terminal() {
        sleep(settings.poll_interval).await;

        status = match provider.get_server_status(&server_id).await {
            Ok(status) => status,
            Err(e) => {
                // A transient read failure is not a verdict on the server.
                debug!(
                    "Status read for '{}' failed, still treating as BUILD: {:?}",
                    descriptor.name, e
                );
                ServerStatus::Building
            }
        };
    }

    // Embed part of the assigned id so the name is globally unique even
    // when a later batch reuses the same descriptor names.
    let suffix = &server_id[..server_id.len().min(ID_SUFFIX_LEN)];
    let final_name = format!("{}-{}", descriptor.name, suffix);
    if let Err(e) = provider.rename_server(&server_id, &final_name).await {
        warn!("Failed to rename '{}' to '{}': {:?}", descriptor.name, final_name, e);
    }

    info!("Status: '{}' is {}", final_name, status);

    match status {
        ServerStatus::Active => ProvisionOutcome::Active {
            renamed_to: final_name,
        },
        ServerStatus::Deleted => {
            warn!(
                "'{}' was deleted externally during build, not re-queueing",
                descriptor.name
            );
            ProvisionOutcome::ExternallyDeleted
        }
        other => {
            warn!(
                "'{}' reached status {}, scheduling for re-processing",
                descriptor.name, other
            );
            if let Err(e) = provider.delete_server(&server_id).await {
                // The sweep gets another chance at it; keep the leak visible.
                warn!(
                    "Failed to delete malformed server '{}' ('{}'): {:?}",
                    final_name, server_id, e
                );
            }
            ProvisionOutcome::Failed
        }
    }
}
