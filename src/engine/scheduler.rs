use crate::engine::{InstanceDescriptor, ProvisionOutcome, ProvisionerSettings, worker};
use crate::integrations::cloud_interface::CloudProvisioner;
use crate::utils::ProgressTracker;

use futures::future::join_all;
use tokio::time::timeout;
use tracing::{info, warn};

/// Everything one full pass of the scheduler learned about its queue.
/// Built fresh per pass, so a retry pass can never observe stale entries
/// from an earlier one.
#[derive(Debug, Default)]
pub struct PassReport {
    /// Descriptor name paired with the server's post-rename name.
    pub active: Vec<(String, String)>,
    /// Deleted out-of-band while building; informational only.
    pub externally_deleted: Vec<String>,
    /// Qualify for a retry pass.
    pub failed: Vec<String>,
    /// Exceeded the join timeout; left to the final cleanup sweep.
    pub abandoned: Vec<String>,
    pub waves: usize,
}

/// Drain the queue in strictly sequential waves of at most
/// `settings.max_workers` concurrent workers.
///
/// The queue is expected to be pre-shuffled by the caller; intra-batch
/// ordering carries no guarantee. A worker that outlives the join timeout is
/// cancelled by dropping its future and recorded as abandoned.
pub async fn run_pass<P: CloudProvisioner>(
    provider: &P,
    mut queue: Vec<InstanceDescriptor>,
    settings: &ProvisionerSettings,
    tracker: &ProgressTracker,
) -> PassReport {
    let mut report = PassReport::default();

    while !queue.is_empty() {
        let take = queue.len().min(settings.max_workers.max(1));
        let wave: Vec<InstanceDescriptor> = queue.drain(..take).collect();
        let names: Vec<String> = wave.iter().map(|d| d.name.clone()).collect();

        report.waves += 1;
        tracker.update_message(&format!(
            "wave {}: {} worker(s), {} queued",
            report.waves,
            wave.len(),
            queue.len()
        ));

        let workers = wave.into_iter().map(|descriptor| {
            timeout(
                settings.join_timeout,
                worker::provision_one(provider, descriptor, settings),
            )
        });
        let results = join_all(workers).await;

        for (name, result) in names.into_iter().zip(results) {
            tracker.inc(1);
            match result {
                Ok(ProvisionOutcome::Active { renamed_to }) => {
                    report.active.push((name, renamed_to));
                }
                Ok(ProvisionOutcome::ExternallyDeleted) => {
                    report.externally_deleted.push(name);
                }
                Ok(ProvisionOutcome::Failed) => {
                    report.failed.push(name);
                }
                Err(_) => {
                    warn!(
                        "Worker for '{}' exceeded the {}s join timeout, abandoning it \
                         until the final sweep",
                        name,
                        settings.join_timeout.as_secs()
                    );
                    report.abandoned.push(name);
                }
            }
        }
    }

    info!(
        "Pass finished: {} active, {} failed, {} abandoned, {} externally deleted ({} waves)",
        report.active.len(),
        report.failed.len(),
        report.abandoned.len(),
        report.externally_deleted.len(),
        report.waves
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::{MockCloud, descriptors};
    use std::time::Duration;

    fn fast_settings(max_workers: usize) -> ProvisionerSettings {
        ProvisionerSettings {
            max_workers,
            poll_interval: Duration::from_millis(1),
            join_timeout: Duration::from_millis(50),
            retry_limit: None,
            wide_sweep: false,
        }
    }

    #[tokio::test]
    async fn five_descriptors_cap_two_runs_three_waves() {
        let cloud = MockCloud::new();
        let settings = fast_settings(2);
        let tracker = ProgressTracker::hidden();

        let report = run_pass(&cloud, descriptors(5), &settings, &tracker).await;

        assert_eq!(report.waves, 3);
        assert_eq!(report.active.len(), 5);
        assert!(report.failed.is_empty());
        assert!(report.abandoned.is_empty());
        assert!(report.externally_deleted.is_empty());
    }

    #[tokio::test]
    async fn never_runs_more_workers_than_the_cap() {
        let cloud = MockCloud::new();
        let settings = fast_settings(3);
        let tracker = ProgressTracker::hidden();

        let report = run_pass(&cloud, descriptors(17), &settings, &tracker).await;

        assert_eq!(report.active.len(), 17);
        assert!(cloud.max_concurrent() <= 3);
    }

    #[tokio::test]
    async fn errored_units_land_in_the_failure_set() {
        let cloud = MockCloud::new();
        cloud.error_attempts("unit-1", 1);
        let settings = fast_settings(4);
        let tracker = ProgressTracker::hidden();

        let report = run_pass(&cloud, descriptors(3), &settings, &tracker).await;

        assert_eq!(report.failed, vec!["unit-1".to_string()]);
        assert_eq!(report.active.len(), 2);
    }

    #[tokio::test]
    async fn timed_out_workers_are_abandoned_not_failed() {
        let cloud = MockCloud::new();
        cloud.stick("unit-0");
        let settings = fast_settings(2);
        let tracker = ProgressTracker::hidden();

        let report = run_pass(&cloud, descriptors(2), &settings, &tracker).await;

        assert_eq!(report.abandoned, vec!["unit-0".to_string()]);
        assert!(report.failed.is_empty());
        assert_eq!(report.active.len(), 1);
    }

    #[tokio::test]
    async fn active_servers_are_renamed_with_an_id_suffix() {
        let cloud = MockCloud::new();
        let settings = fast_settings(1);
        let tracker = ProgressTracker::hidden();

        let report = run_pass(&cloud, descriptors(1), &settings, &tracker).await;

        let (base, renamed) = &report.active[0];
        assert_eq!(base, "unit-0");
        assert!(renamed.starts_with("unit-0-"));
        // base name, separator, then the 8-char id prefix
        assert_eq!(renamed.len(), base.len() + 1 + 8);
    }
}
