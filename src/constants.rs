use std::time::Duration;

/// Upper bound on concurrently running provisioning workers per wave.
pub const DEFAULT_MAX_WORKERS: usize = 30;

/// Interval between server status polls while an instance is building.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// How long the scheduler waits on a single worker before abandoning it.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(180);

/// Instances are renamed after creation to embed this many leading
/// characters of their assigned server id.
pub const ID_SUFFIX_LEN: usize = 8;

/// Keypair assigned to created instances when the user does not pick one.
pub const DEFAULT_KEY_NAME: &str = "crank-key";

/// Template export refuses to snapshot more than this many distinct images.
pub const SNAPSHOT_THRESHOLD: usize = 20;

/// Version string stamped into generated orchestration templates.
pub const HEAT_TEMPLATE_VERSION: &str = "2013-05-23";

pub const LOG_FILE: &str = "crank.log";
