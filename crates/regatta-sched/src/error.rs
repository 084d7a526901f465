//! Error handling for the scheduler backend.

use std::time::Duration;

use thiserror::Error;

/// Result type for scheduler operations.
pub type SchedResult<T> = Result<T, SchedError>;

/// Errors that can occur during scheduler operations.
#[derive(Error, Debug)]
pub enum SchedError {
    /// The job id could not be extracted from the sbatch output.
    #[error("could not retrieve the job id of the submitted job")]
    SubmissionFailed,

    /// A strictly-run command returned a non-zero exit status.
    #[error("command '{command}' failed with exit status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    /// A command did not finish within its timeout.
    #[error("command '{command}' timed out after {timeout:?}")]
    CommandTimeout { command: String, timeout: Duration },

    /// scontrol output was missing an expected field.
    #[error("node query failed: {0}")]
    NodeQueryFailed(String),

    /// The job was blocked for a reason that requires administrator
    /// intervention; it has been cancelled.
    #[error("job {jobid} cancelled because it was blocked due to a perhaps non-recoverable reason: {reason}")]
    JobBlocked { jobid: u64, reason: String },

    /// The job exceeded its maximum pending time; it has been cancelled.
    #[error("job {jobid} exceeded the maximum pending time")]
    PendingTimeout { jobid: u64 },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SchedError::SubmissionFailed;
        assert_eq!(
            err.to_string(),
            "could not retrieve the job id of the submitted job"
        );

        let err = SchedError::JobBlocked {
            jobid: 42,
            reason: "PartitionDown".to_string(),
        };
        assert!(err.to_string().contains("job 42"));
        assert!(err.to_string().contains("PartitionDown"));

        let err = SchedError::PendingTimeout { jobid: 7 };
        assert_eq!(err.to_string(), "job 7 exceeded the maximum pending time");
    }
}
