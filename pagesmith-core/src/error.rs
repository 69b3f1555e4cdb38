//! Error taxonomy shared by every pipeline stage.
//!
//! Low-level clients raise [`StoreError`] carrying the failing operation and HTTP status.
//! [`PublishError`] adds the publish stage, [`LifecycleError`] covers repository
//! creation, and [`TaskError`] is what the orchestrator retries and finally re-raises.

use std::fmt;

use thiserror::Error;

/// Classification of a remote failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network error or 5xx. Eligible for the orchestrator's whole-unit retry.
    Transient,
    /// Object or repository not (yet) visible.
    NotFound,
    /// Name collision on create, or a rejected fast-forward.
    Conflict,
    /// Bad or insufficient credentials. Never retried.
    Unauthorized,
    /// Contract violation or unexpected response.
    Fatal,
}

impl ErrorKind {
    /// Maps an HTTP status code onto the taxonomy.
    pub fn from_status(status: u16) -> Self {
        match status {
            404 => ErrorKind::NotFound,
            401 | 403 => ErrorKind::Unauthorized,
            409 | 422 => ErrorKind::Conflict,
            500..=599 => ErrorKind::Transient,
            _ => ErrorKind::Fatal,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Transient => "transient",
            ErrorKind::NotFound => "not found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Fatal => "fatal",
        };
        f.write_str(label)
    }
}

/// Failure of a single repository-host or object-store call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} failed ({kind}{}): {message}", .status.map(|s| format!(", status {s}")).unwrap_or_default())]
pub struct StoreError {
    pub kind: ErrorKind,
    pub operation: String,
    pub status: Option<u16>,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: ErrorKind, operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            operation: operation.into(),
            status: None,
            message: message.into(),
        }
    }

    /// Builds an error from a non-success HTTP response.
    pub fn from_status(operation: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::from_status(status),
            operation: operation.into(),
            status: Some(status),
            message: body.into(),
        }
    }

    /// Transport-level failure (connection refused, timeout, ...).
    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, operation, message)
    }

    /// A success response whose body did not have the expected shape.
    pub fn malformed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Fatal, operation, message)
    }

    pub fn not_found(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, operation, message)
    }

    pub fn conflict(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, operation, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    pub fn is_conflict(&self) -> bool {
        self.kind == ErrorKind::Conflict
    }
}

/// The step of the publish pipeline that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStage {
    BranchTip,
    BaseTree,
    Blob,
    Tree,
    Commit,
    RefUpdate,
}

impl fmt::Display for PublishStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PublishStage::BranchTip => "branch-tip",
            PublishStage::BaseTree => "base-tree",
            PublishStage::Blob => "blob",
            PublishStage::Tree => "tree",
            PublishStage::Commit => "commit",
            PublishStage::RefUpdate => "ref-update",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("publish failed at stage {stage}: {source}")]
pub struct PublishError {
    pub stage: PublishStage,
    #[source]
    pub source: StoreError,
}

impl PublishError {
    pub fn new(stage: PublishStage, source: StoreError) -> Self {
        Self { stage, source }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// Creation kept colliding with a repository of the same name after the retry.
    #[error("repository {name} could not be created: name still taken after delete and retry")]
    CreateConflict { name: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Raised when no strategy recovers a `files` mapping from model output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not extract a files mapping from model output; preview: {preview}")]
pub struct ExtractionError {
    pub preview: String,
}

/// Failure of the content-generation collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("content generation request failed: {0}")]
    Request(String),
    #[error("content generation returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected content generation response: {0}")]
    UnexpectedResponse(String),
}

/// Transport failure while delivering the evaluation callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("callback delivery failed: {0}")]
pub struct TransportError(pub String);

/// Everything that can fail one attempt of a task round.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error("generated files do not contain the entry point {path}")]
    MissingEntryPoint { path: String },
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("round {round} failed after {attempts} attempt(s): {last}")]
    Exhausted {
        round: u32,
        attempts: u32,
        #[source]
        last: Box<TaskError>,
    },
}

impl TaskError {
    /// The underlying store failure kind, if this error came from a remote call.
    pub fn store_kind(&self) -> Option<ErrorKind> {
        match self {
            TaskError::Store(e) => Some(e.kind),
            TaskError::Publish(e) => Some(e.source.kind),
            TaskError::Lifecycle(LifecycleError::Store(e)) => Some(e.kind),
            TaskError::Lifecycle(LifecycleError::CreateConflict { .. }) => Some(ErrorKind::Fatal),
            TaskError::Exhausted { last, .. } => last.store_kind(),
            _ => None,
        }
    }

    /// Credential and contract failures are never retried; every other failure consumes
    /// one attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self.store_kind(),
            Some(ErrorKind::Unauthorized | ErrorKind::Fatal)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_onto_taxonomy() {
        let cases = [
            (404, ErrorKind::NotFound),
            (401, ErrorKind::Unauthorized),
            (403, ErrorKind::Unauthorized),
            (409, ErrorKind::Conflict),
            (422, ErrorKind::Conflict),
            (500, ErrorKind::Transient),
            (503, ErrorKind::Transient),
            (400, ErrorKind::Fatal),
        ];
        for (status, expected) in cases {
            assert_eq!(ErrorKind::from_status(status), expected, "status {status}");
        }
    }

    #[test]
    fn display_includes_operation_and_status() {
        let err = StoreError::from_status("create blob", 502, "bad gateway");
        let text = err.to_string();
        assert!(text.contains("create blob"), "{text}");
        assert!(text.contains("status 502"), "{text}");
        assert!(text.contains("transient"), "{text}");
    }

    #[test]
    fn unauthorized_is_not_retryable() {
        let err = TaskError::Publish(PublishError::new(
            PublishStage::Blob,
            StoreError::from_status("create blob", 401, "bad credentials"),
        ));
        assert!(!err.is_retryable());

        let err = TaskError::Extraction(ExtractionError {
            preview: "nope".into(),
        });
        assert!(err.is_retryable());
    }

    #[test]
    fn fatal_and_exhausted_create_are_not_retryable() {
        let err = TaskError::Lifecycle(LifecycleError::Store(StoreError::from_status(
            "create repository",
            400,
            "bad request",
        )));
        assert!(!err.is_retryable());

        let err = TaskError::Lifecycle(LifecycleError::CreateConflict {
            name: "site".into(),
        });
        assert_eq!(err.store_kind(), Some(ErrorKind::Fatal));
        assert!(!err.is_retryable());

        let err = TaskError::Publish(PublishError::new(
            PublishStage::BranchTip,
            StoreError::from_status("get branch tip", 404, "not found"),
        ));
        assert!(err.is_retryable());
    }
}
