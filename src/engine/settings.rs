use crate::constants::{DEFAULT_JOIN_TIMEOUT, DEFAULT_MAX_WORKERS, DEFAULT_POLL_INTERVAL};

use std::time::Duration;

/// Tunables for one batch run. Every value has a CLI flag; the defaults
/// match the historical fixed constants (5s poll, 180s join, 30 workers).
#[derive(Debug, Clone)]
pub struct ProvisionerSettings {
    /// Maximum number of workers live at any instant.
    pub max_workers: usize,
    /// Sleep between status polls inside a worker.
    pub poll_interval: Duration,
    /// Per-worker deadline; a worker past it is cancelled and its unit is
    /// left to the final cleanup sweep.
    pub join_timeout: Duration,
    /// Maximum number of retry passes after the initial one. `None` retries
    /// until the failure set empties.
    pub retry_limit: Option<u32>,
    /// When set, the final sweep removes every non-ACTIVE server in the
    /// tenant instead of only those named after this batch's descriptors.
    pub wide_sweep: bool,
}

impl Default for ProvisionerSettings {
    fn default() -> Self {
        ProvisionerSettings {
            max_workers: DEFAULT_MAX_WORKERS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            retry_limit: None,
            wide_sweep: false,
        }
    }
}
