use thiserror::Error;

#[derive(Error, Debug)]
pub enum MembershipError {
    #[error("Operation not supported in shared-data mode: {operation}")]
    Unsupported { operation: &'static str },

    #[error("Failed to resolve worker membership: {0}")]
    Resolution(String),

    #[error("Worker not found: {0}")]
    WorkerNotFound(String),
}

impl MembershipError {
    pub fn unsupported(operation: &'static str) -> Self {
        MembershipError::Unsupported { operation }
    }

    /// Returns true for failures that mean "this deployment mode cannot do
    /// this", as opposed to a transient registry problem.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, MembershipError::Unsupported { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, MembershipError::WorkerNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, MembershipError>;
