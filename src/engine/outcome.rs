use std::fmt;

/// Server status as reported by the compute service.
///
/// `Building` is the only transient state; everything else is terminal and
/// the compute service will not transition out of it without external action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerStatus {
    Building,
    Active,
    Errored,
    Deleted,
    Other(String),
}

impl ServerStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "BUILD" | "BUILDING" => ServerStatus::Building,
            "ACTIVE" => ServerStatus::Active,
            "ERROR" => ServerStatus::Errored,
            "DELETED" => ServerStatus::Deleted,
            other => ServerStatus::Other(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ServerStatus::Building)
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerStatus::Building => write!(f, "BUILD"),
            ServerStatus::Active => write!(f, "ACTIVE"),
            ServerStatus::Errored => write!(f, "ERROR"),
            ServerStatus::Deleted => write!(f, "DELETED"),
            ServerStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Result of one worker attempt over one descriptor. Read by the retry
/// controller only after the worker has returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// The server reached ACTIVE and was renamed with its id suffix.
    Active { renamed_to: String },
    /// The server was deleted out from under us during the build window.
    /// Treated as an external cancellation, not a failure to retry.
    ExternallyDeleted,
    /// Creation failed or the server landed in a non-success terminal
    /// state; the descriptor qualifies for a retry wave.
    Failed,
}
