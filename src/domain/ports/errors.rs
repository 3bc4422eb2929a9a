//! The closed error taxonomy shared by every component.
//!
//! Ports and components return `Result<T, AegisError>`; `anyhow::Context` is
//! reserved for process-boundary call sites (config loading, server
//! bootstrap) that never flow back into a component.

use uuid::Uuid;

/// Errors surfaced by the orchestrator's components and control plane.
#[derive(Debug, thiserror::Error)]
pub enum AegisError {
    /// A submitted mission brief failed validation.
    #[error("invalid mission brief: {0}")]
    InvalidBrief(String),

    /// A filesystem path escaped its workspace root.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A caller-supplied parameter was malformed.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The requested mission, task or agent does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The requested mission has no workspace (never created, or evicted).
    #[error("workspace missing for mission {0}")]
    WorkspaceMissing(Uuid),

    /// A worker slot was asked to accept work while already Busy.
    #[error("slot {0} is busy")]
    SlotBusy(usize),

    /// `cancelMission` was called on a mission that cannot be cancelled
    /// (already terminal and not itself Cancelled).
    #[error("mission {0} is not cancellable")]
    NotCancellable(Uuid),

    /// `cancelMission` was called twice; the second call carries this so
    /// callers can treat it as an idempotent success note.
    #[error("mission {0} is already cancelled")]
    AlreadyCancelled(Uuid),

    /// A create-if-absent operation found the target already present and
    /// `overwrite` was false.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// No worker slot was available at the moment of the request. Internal:
    /// resolved by the scheduling loop's next tick, never surfaced to a
    /// caller of the control plane.
    #[error("no available worker slot")]
    NoSlot,

    /// The orchestrator is saturated and cannot admit more missions.
    #[error("capacity exceeded")]
    CapacityExceeded,

    /// A file exceeded the per-file byte ceiling.
    #[error("file too large: {0} bytes (limit {1})")]
    FileTooLarge(u64, u64),

    /// An underlying I/O operation failed for a reason other than "missing".
    #[error("I/O failure: {0}")]
    IoFailure(String),
}

impl AegisError {
    /// Stable machine-readable kind, used in the `{error: {kind, message}}`
    /// control-plane response body.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidBrief(_) => "InvalidBrief",
            Self::InvalidPath(_) => "InvalidPath",
            Self::InvalidParameter(_) => "InvalidParameter",
            Self::NotFound(_) => "NotFound",
            Self::WorkspaceMissing(_) => "WorkspaceMissing",
            Self::SlotBusy(_) => "SlotBusy",
            Self::NotCancellable(_) => "NotCancellable",
            Self::AlreadyCancelled(_) => "AlreadyCancelled",
            Self::AlreadyExists(_) => "AlreadyExists",
            Self::NoSlot => "NoSlot",
            Self::CapacityExceeded => "CapacityExceeded",
            Self::FileTooLarge(..) => "FileTooLarge",
            Self::IoFailure(_) => "IoFailure",
        }
    }
}

impl From<std::io::Error> for AegisError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::IoFailure(err.to_string()),
        }
    }
}
