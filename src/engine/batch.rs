use crate::engine::{InstanceDescriptor, ProvisionerSettings, scheduler, sweeper};
use crate::integrations::cloud_interface::CloudProvisioner;
use crate::utils::ProgressTracker;

use anyhow::{Result, bail};
use std::collections::HashSet;
use tracing::{info, warn};

/// The full set of descriptors submitted by one caller invocation.
#[derive(Debug)]
pub struct Batch {
    descriptors: Vec<InstanceDescriptor>,
}

impl Batch {
    /// Descriptor names must be unique within the batch; a duplicate is a
    /// setup error, not a per-unit failure.
    pub fn new(descriptors: Vec<InstanceDescriptor>) -> Result<Self> {
        let mut seen = HashSet::new();
        for descriptor in &descriptors {
            if !seen.insert(descriptor.name.as_str()) {
                bail!("Duplicate descriptor name '{}' in batch", descriptor.name);
            }
        }
        Ok(Batch { descriptors })
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// What one full engine run did, pass by pass, plus the final sweep.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub active: Vec<(String, String)>,
    pub externally_deleted: Vec<String>,
    pub abandoned: Vec<String>,
    /// Still failing when the retry ceiling was hit. Empty when the run
    /// converged on its own.
    pub unresolved: Vec<String>,
    /// Names removed by the final cleanup sweep.
    pub swept: Vec<String>,
    pub passes: u32,
    pub waves: usize,
}

/// Drive the batch to convergence: scheduler passes, retry filtering, and
/// the final cleanup sweep.
///
/// Individual unit failures never abort the run; the only fallible step is
/// listing servers for the sweep.
pub async fn run_batch<P: CloudProvisioner>(
    provider: &P,
    batch: Batch,
    settings: &ProvisionerSettings,
    tracker: &ProgressTracker,
) -> Result<BatchReport> {
    let master = batch.descriptors;
    let mut queue: Vec<InstanceDescriptor> = master.clone();
    let mut report = BatchReport::default();

    while !queue.is_empty() {
        report.passes += 1;
        if report.passes > 1 {
            info!(
                "Re-processing {} instance(s) (pass {})",
                queue.len(),
                report.passes
            );
            tracker.set_position(0);
        }

        let pass = scheduler::run_pass(provider, queue, settings, tracker).await;
        report.waves += pass.waves;
        report.active.extend(pass.active);
        report.externally_deleted.extend(pass.externally_deleted);
        report.abandoned.extend(pass.abandoned);

        if pass.failed.is_empty() {
            break;
        }

        if let Some(limit) = settings.retry_limit {
            // The first pass is not a retry.
            if report.passes > limit {
                warn!(
                    "Retry ceiling of {} reached with {} unresolved unit(s): {:?}",
                    limit,
                    pass.failed.len(),
                    pass.failed
                );
                report.unresolved = pass.failed;
                break;
            }
        }

        queue = master
            .iter()
            .filter(|d| pass.failed.contains(&d.name))
            .cloned()
            .collect();
    }

    report.swept = sweeper::sweep(provider, &master, settings.wide_sweep).await?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ServerStatus;
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
    async fn empty_batch_completes_with_zero_waves() {
        let cloud = MockCloud::new();
        let tracker = ProgressTracker::hidden();

        let report = run_batch(&cloud, Batch::new(vec![]).unwrap(), &fast_settings(4), &tracker)
            .await
            .unwrap();

        assert_eq!(report.waves, 0);
        assert!(report.active.is_empty());
        assert!(report.unresolved.is_empty());
        assert!(report.swept.is_empty());
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected_up_front() {
        let mut units = descriptors(2);
        units[1].name = units[0].name.clone();
        assert!(Batch::new(units).is_err());
    }

    #[tokio::test]
    async fn errored_unit_is_retried_and_converges_in_two_passes() {
        let cloud = MockCloud::new();
        cloud.error_attempts("unit-1", 1);
        let tracker = ProgressTracker::hidden();

        let report = run_batch(
            &cloud,
            Batch::new(descriptors(3)).unwrap(),
            &fast_settings(4),
            &tracker,
        )
        .await
        .unwrap();

        assert_eq!(report.passes, 2);
        assert_eq!(report.active.len(), 3);
        assert!(report.unresolved.is_empty());
    }

    #[tokio::test]
    async fn retry_ceiling_surfaces_the_remaining_failures() {
        let cloud = MockCloud::new();
        cloud.error_attempts("unit-0", u32::MAX);
        let mut settings = fast_settings(2);
        settings.retry_limit = Some(2);
        let tracker = ProgressTracker::hidden();

        let report = run_batch(
            &cloud,
            Batch::new(descriptors(2)).unwrap(),
            &settings,
            &tracker,
        )
        .await
        .unwrap();

        // initial pass + 2 retries
        assert_eq!(report.passes, 3);
        assert_eq!(report.unresolved, vec!["unit-0".to_string()]);
        assert_eq!(report.active.len(), 1);
    }

    #[tokio::test]
    async fn creation_failures_are_retried_in_a_later_pass() {
        let cloud = MockCloud::new();
        cloud.fail_create("unit-0", 1);
        let tracker = ProgressTracker::hidden();

        let report = run_batch(
            &cloud,
            Batch::new(descriptors(2)).unwrap(),
            &fast_settings(2),
            &tracker,
        )
        .await
        .unwrap();

        assert_eq!(report.passes, 2);
        assert_eq!(report.active.len(), 2);
    }

    #[tokio::test]
    async fn network_ids_are_resolved_fresh_per_attempt() {
        let cloud = MockCloud::new();
        cloud.error_attempts("unit-1", 1);
        let tracker = ProgressTracker::hidden();

        run_batch(
            &cloud,
            Batch::new(descriptors(3)).unwrap(),
            &fast_settings(3),
            &tracker,
        )
        .await
        .unwrap();

        // 3 first attempts plus 1 retry, no caching
        assert_eq!(cloud.resolve_calls(), 4);
    }

    #[tokio::test]
    async fn externally_deleted_units_are_not_retried() {
        let cloud = MockCloud::new();
        cloud.delete_externally("unit-1");
        let tracker = ProgressTracker::hidden();

        let report = run_batch(
            &cloud,
            Batch::new(descriptors(2)).unwrap(),
            &fast_settings(2),
            &tracker,
        )
        .await
        .unwrap();

        assert_eq!(report.passes, 1);
        assert_eq!(report.externally_deleted, vec!["unit-1".to_string()]);
        assert_eq!(report.active.len(), 1);
    }

    #[tokio::test]
    async fn abandoned_units_are_reconciled_by_the_sweep_only() {
        let cloud = MockCloud::new();
        cloud.stick("unit-2");
        let tracker = ProgressTracker::hidden();

        let report = run_batch(
            &cloud,
            Batch::new(descriptors(3)).unwrap(),
            &fast_settings(3),
            &tracker,
        )
        .await
        .unwrap();

        assert_eq!(report.abandoned, vec!["unit-2".to_string()]);
        assert!(report.unresolved.is_empty());
        // still BUILD when listed, so the scoped sweep removes it
        assert_eq!(report.swept, vec!["unit-2".to_string()]);
    }

    #[tokio::test]
    async fn sequential_run_matches_concurrent_run() {
        let tracker = ProgressTracker::hidden();

        let mut names = Vec::new();
        for max_workers in [1, 4] {
            let cloud = MockCloud::new();
            cloud.error_attempts("unit-3", 1);
            let report = run_batch(
                &cloud,
                Batch::new(descriptors(6)).unwrap(),
                &fast_settings(max_workers),
                &tracker,
            )
            .await
            .unwrap();

            let mut active: Vec<String> =
                report.active.iter().map(|(base, _)| base.clone()).collect();
            active.sort();
            names.push(active);
        }

        assert_eq!(names[0], names[1]);
        assert_eq!(names[0].len(), 6);
    }

    #[tokio::test]
    async fn converged_batch_leaves_only_active_servers() {
        let cloud = MockCloud::new();
        cloud.error_attempts("unit-0", 2);
        cloud.error_attempts("unit-4", 1);
        let tracker = ProgressTracker::hidden();

        let report = run_batch(
            &cloud,
            Batch::new(descriptors(5)).unwrap(),
            &fast_settings(2),
            &tracker,
        )
        .await
        .unwrap();

        assert_eq!(report.active.len(), 5);
        for (_, status) in cloud.live_server_statuses() {
            assert_eq!(status, ServerStatus::Active);
        }
    }
}
