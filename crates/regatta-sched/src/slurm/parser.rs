//! Parsers for the output of the Slurm command-line tools.
//!
//! Everything the backend learns about its jobs is scraped from textual
//! command output, so the parsers are kept free of side effects: they return
//! values (or nothing) and never panic on malformed input.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{SchedError, SchedResult};

/// Matches plain job ids as well as both array notations:
/// `<id>_<task>` and `<id>_[<first>-<last>]`.
const JOBID_PATTERN: &str = r"\d+(?:_\d+|_\[\d+-\d+\])?";

static SUBMIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Submitted batch job (?P<jobid>\d+)").expect("submit regex must compile")
});

static SACCT_STATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?m)^(?P<jobid>{JOBID_PATTERN})\|(?P<state>\S+)[^|]*\|(?P<exitcode>\d+):(?P<signal>\d+)\|(?P<nodespec>.*)"
    ))
    .expect("sacct regex must compile")
});

static SQUEUE_STATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?m)^(?P<jobid>{JOBID_PATTERN})\|(?P<state>\S+)\|(?P<nodespec>\S*)\|(?P<reason>.+)"
    ))
    .expect("squeue regex must compile")
});

static COMPLETION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?m)^(?P<jobid>{JOBID_PATTERN})\|(?P<end>\S+)"))
        .expect("completion regex must compile")
});

/// Extract the job id from sbatch's `Submitted batch job <id>` line.
pub fn parse_submit_output(output: &str) -> SchedResult<u64> {
    SUBMIT_RE
        .captures(output)
        .and_then(|caps| caps["jobid"].parse().ok())
        .ok_or(SchedError::SubmissionFailed)
}

/// One matched line of `sacct -P -o jobid,state,exitcode,nodelist` output.
///
/// Job steps such as `<id>.batch` do not match the job id grammar and are
/// dropped by the line pattern.
#[derive(Debug, Clone)]
pub struct SacctEntry {
    /// Base job id: the portion before any array suffix.
    pub base_id: u64,
    pub state: String,
    pub exitcode: i32,
    pub nodespec: String,
}

/// Parse the batched sacct state query output, in line order.
pub fn parse_sacct_states(output: &str) -> Vec<SacctEntry> {
    SACCT_STATE_RE
        .captures_iter(output)
        .filter_map(|caps| {
            Some(SacctEntry {
                base_id: parse_base_id(&caps["jobid"])?,
                state: caps["state"].to_string(),
                exitcode: caps["exitcode"].parse().ok()?,
                nodespec: caps["nodespec"].to_string(),
            })
        })
        .collect()
}

/// One matched line of `squeue -h -o "%i|%T|%N|%r"` output.
#[derive(Debug, Clone)]
pub struct SqueueEntry {
    /// Base job id: the portion before any array suffix.
    pub base_id: u64,
    pub state: String,
    pub nodespec: String,
    pub reason: String,
}

/// Parse the batched squeue state query output, in line order.
pub fn parse_squeue_states(output: &str) -> Vec<SqueueEntry> {
    SQUEUE_STATE_RE
        .captures_iter(output)
        .filter_map(|caps| {
            Some(SqueueEntry {
                base_id: parse_base_id(&caps["jobid"])?,
                state: caps["state"].to_string(),
                nodespec: caps["nodespec"].to_string(),
                reason: caps["reason"].to_string(),
            })
        })
        .collect()
}

/// Parse `sacct -P -o jobid,end` output produced under
/// `SLURM_TIME_FORMAT=%s`; entries whose end time is not an epoch number
/// (e.g. `Unknown`) are skipped.
pub fn parse_completion_times(output: &str) -> Vec<f64> {
    COMPLETION_RE
        .captures_iter(output)
        .filter_map(|caps| caps["end"].parse().ok())
        .collect()
}

/// Extract the default partition name from `scontrol show -o partitions`
/// output: the first record carrying `Default=YES`.
pub fn parse_default_partition(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        if !line.contains("Default=YES") {
            return None;
        }
        line.split_whitespace()
            .find_map(|token| token.strip_prefix("PartitionName="))
            .map(str::to_string)
    })
}

/// Extract the node specification from `scontrol show res` output.
pub fn parse_reservation_nodespec(output: &str) -> Option<&str> {
    output
        .split_whitespace()
        .find_map(|token| token.strip_prefix("Nodes="))
}

/// Extract the node names from the detail part of a `ReqNodeNotAvail`
/// pending reason, e.g. `UnavailableNodes:nid00[408,411-415]`.
///
/// Returns `None` when the detail is not an unavailable-node report and an
/// empty string when the report carries no names.
pub fn parse_unavailable_nodes(details: &str) -> Option<&str> {
    let rest = details.trim().strip_prefix("UnavailableNodes:")?;
    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    Some(&rest[..end])
}

fn parse_base_id(jobid: &str) -> Option<u64> {
    jobid.split('_').next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_submit_output() {
        assert_eq!(
            parse_submit_output("Submitted batch job 12345\n").unwrap(),
            12345
        );
        assert!(matches!(
            parse_submit_output("sbatch: error: invalid partition"),
            Err(SchedError::SubmissionFailed)
        ));
    }

    #[test]
    fn test_parse_sacct_states() {
        let output = "42|COMPLETED|0:0|nid001\n42.batch|COMPLETED|0:0|nid001\n";
        let entries = parse_sacct_states(output);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].base_id, 42);
        assert_eq!(entries[0].state, "COMPLETED");
        assert_eq!(entries[0].exitcode, 0);
        assert_eq!(entries[0].nodespec, "nid001");
    }

    #[test]
    fn test_parse_sacct_array_states() {
        let output = "7_0|COMPLETED|0:0|n1\n7_1|FAILED|2:0|n2\n7_[2-3]|PENDING|0:0|None assigned\n";
        let entries = parse_sacct_states(output);
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.base_id == 7));
        assert_eq!(entries[1].state, "FAILED");
        assert_eq!(entries[1].exitcode, 2);
        assert_eq!(entries[2].state, "PENDING");
    }

    #[test]
    fn test_parse_sacct_state_with_annotation() {
        // sacct may annotate states, e.g. "CANCELLED by 1000".
        let output = "42|CANCELLED by 1000|0:0|nid001\n";
        let entries = parse_sacct_states(output);
        assert_eq!(entries[0].state, "CANCELLED");
    }

    #[test]
    fn test_parse_squeue_states() {
        let output = "42|PENDING||Resources\n43|RUNNING|nid[001-002]|None\n";
        let entries = parse_squeue_states(output);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].base_id, 42);
        assert_eq!(entries[0].state, "PENDING");
        assert_eq!(entries[0].nodespec, "");
        assert_eq!(entries[0].reason, "Resources");
        assert_eq!(entries[1].nodespec, "nid[001-002]");
    }

    #[test]
    fn test_parse_completion_times() {
        let output = "42|1587488583\n42.batch|1587488584\n42.extern|Unknown\n";
        let times = parse_completion_times(output);
        assert_eq!(times, vec![1587488583.0]);
    }

    #[test]
    fn test_parse_default_partition() {
        let output = "PartitionName=debug State=UP Default=NO\n\
                      PartitionName=normal State=UP Default=YES MaxTime=12:00:00\n";
        assert_eq!(parse_default_partition(output).as_deref(), Some("normal"));
        assert_eq!(parse_default_partition("PartitionName=p Default=NO"), None);
    }

    #[test]
    fn test_parse_reservation_nodespec() {
        let output = "ReservationName=maint StartTime=2020-04-21T08:00:00 Nodes=nid00[408-415] NodeCnt=8";
        assert_eq!(parse_reservation_nodespec(output), Some("nid00[408-415]"));
        assert_eq!(parse_reservation_nodespec("ReservationName=empty"), None);
    }

    #[test]
    fn test_parse_unavailable_nodes() {
        assert_eq!(
            parse_unavailable_nodes(" UnavailableNodes:nid00[408,411-415]"),
            Some("nid00[408,411-415]")
        );
        assert_eq!(parse_unavailable_nodes(" UnavailableNodes:"), Some(""));
        assert_eq!(parse_unavailable_nodes(" Resources"), None);
    }

    #[test]
    fn test_base_id_of_array_notation() {
        assert_eq!(parse_base_id("1234"), Some(1234));
        assert_eq!(parse_base_id("1234_7"), Some(1234));
        assert_eq!(parse_base_id("1234_[0-3]"), Some(1234));
    }
}
