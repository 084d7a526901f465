//! Classification of Slurm job state strings.
//!
//! Job arrays report one state per member, joined with commas; a job is
//! completed only when every member reached a terminal state, while a single
//! pending member keeps the whole job pending.

/// Whether every state in the comma-joined string is terminal.
///
/// The empty string classifies as not completed.
pub fn slurm_state_completed(state: &str) -> bool {
    !state.is_empty()
        && state.split(',').all(|s| {
            matches!(
                s,
                "BOOT_FAIL"
                    | "CANCELLED"
                    | "COMPLETED"
                    | "DEADLINE"
                    | "FAILED"
                    | "NODE_FAIL"
                    | "OUT_OF_MEMORY"
                    | "PREEMPTED"
                    | "TIMEOUT"
            )
        })
}

/// Whether any state in the comma-joined string counts as pending.
///
/// The empty string classifies as not pending.
pub fn slurm_state_pending(state: &str) -> bool {
    !state.is_empty()
        && state.split(',').any(|s| {
            matches!(
                s,
                "COMPLETING"
                    | "CONFIGURING"
                    | "PENDING"
                    | "RESV_DEL_HOLD"
                    | "REQUEUE_FED"
                    | "REQUEUE_HOLD"
                    | "REQUEUED"
                    | "RESIZING"
                    | "REVOKED"
                    | "SIGNALING"
                    | "SPECIAL_EXIT"
                    | "STAGE_OUT"
                    | "STOPPED"
                    | "SUSPENDED"
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn test_empty_state() {
        assert!(!slurm_state_completed(""));
        assert!(!slurm_state_pending(""));
    }

    #[test]
    fn test_single_states() {
        assert!(slurm_state_completed("COMPLETED"));
        assert!(slurm_state_completed("TIMEOUT"));
        assert!(!slurm_state_completed("RUNNING"));
        assert!(!slurm_state_completed("PENDING"));

        assert!(slurm_state_pending("PENDING"));
        assert!(slurm_state_pending("COMPLETING"));
        assert!(!slurm_state_pending("RUNNING"));
        assert!(!slurm_state_pending("COMPLETED"));
    }

    #[test]
    fn test_array_states() {
        // All members terminal.
        assert!(slurm_state_completed("COMPLETED,FAILED"));
        assert!(!slurm_state_pending("COMPLETED,FAILED"));

        // One member still pending keeps the array pending and not completed.
        assert!(!slurm_state_completed("COMPLETED,PENDING"));
        assert!(slurm_state_pending("COMPLETED,PENDING"));

        // A running member is neither terminal nor pending.
        assert!(!slurm_state_completed("COMPLETED,RUNNING"));
        assert!(!slurm_state_pending("COMPLETED,RUNNING"));
    }

    const ALL_STATES: &[&str] = &[
        "BOOT_FAIL",
        "CANCELLED",
        "COMPLETED",
        "DEADLINE",
        "FAILED",
        "NODE_FAIL",
        "OUT_OF_MEMORY",
        "PREEMPTED",
        "TIMEOUT",
        "COMPLETING",
        "CONFIGURING",
        "PENDING",
        "REQUEUED",
        "RESIZING",
        "RUNNING",
        "SUSPENDED",
    ];

    proptest! {
        // Completion and pendingness are mutually exclusive for any
        // combination of states Slurm can report.
        #[test]
        fn completed_is_never_pending(members in proptest::collection::vec(0..ALL_STATES.len(), 1..6)) {
            let state = members
                .iter()
                .map(|&i| ALL_STATES[i])
                .collect::<Vec<_>>()
                .join(",");
            prop_assert!(!(slurm_state_completed(&state) && slurm_state_pending(&state)));
        }
    }
}
