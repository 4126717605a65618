use serde::{Deserialize, Serialize};

/// Creation parameters shared by every instance expanded from one
/// (image, flavor, networks) selection. Owned by the descriptor and never
/// mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSpec {
    pub image_id: String,
    pub flavor_id: String,
    pub key_name: String,
    /// Network names; resolved to ids fresh on every provisioning attempt
    /// so long-running batches never act on stale network ids.
    pub networks: Vec<String>,
}

/// One unit of work for the provisioning engine.
///
/// The name must be unique within a batch before creation; after creation the
/// underlying server is renamed to embed a short suffix of its assigned id.
/// A descriptor is consumed by exactly one worker invocation per attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDescriptor {
    pub name: String,
    pub spec: InstanceSpec,
    /// Availability zone, optionally pinned to a host as "zone:host".
    /// `None` leaves placement to the cloud scheduler.
    pub availability_zone: Option<String>,
}
