//! Batch script preamble generation.
//!
//! The preamble is the block of `#SBATCH` directive lines prepended to a
//! job's batch script. Values are substituted into `{0}` placeholders, and
//! options whose value is unset emit nothing.

use crate::job::Job;
use crate::slurm::options::last_flag_value;

/// Directive prefix understood by sbatch.
const PREFIX: &str = "#SBATCH";

/// Split a number of seconds into hours, minutes and seconds.
pub fn seconds_to_hms(secs: u64) -> (u64, u64, u64) {
    (secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Substitute `value` into the `{0}` placeholder of `option` and prefix the
/// result with the directive marker; unset values emit nothing.
fn format_option<S: AsRef<str>>(value: Option<S>, option: &str) -> Option<String> {
    let value = value?;
    let value = value.as_ref();
    if value.is_empty() {
        return None;
    }
    Some(format!("{PREFIX} {}", option.replace("{0}", value)))
}

fn format_count(value: Option<u32>, option: &str) -> Option<String> {
    format_option(value.map(|v| v.to_string()), option)
}

/// Whether a raw fragment carries a constraint flag; constraints are merged
/// separately so that both `sched_access` and `options` contribute.
fn is_constraint(fragment: &str) -> bool {
    let trimmed = fragment.trim();
    trimmed.starts_with("-C") || trimmed.starts_with("--constraint")
}

/// Whether a raw fragment is already a full directive line (`#<word> ...`).
fn is_directive(fragment: &str) -> bool {
    fragment
        .strip_prefix('#')
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_alphanumeric() || c == '_')
}

/// Produce the ordered `#SBATCH` lines for the job's batch script.
///
/// For array jobs the output and error filenames get a literal `_%a` suffix;
/// Slurm substitutes the array task id when the members run.
pub fn emit_preamble(job: &Job, is_array: bool, use_nodes_option: bool) -> Vec<String> {
    let mut preamble = vec![
        format_option(Some(&job.name), r#"--job-name="{0}""#),
        format_count(job.num_tasks, "--ntasks={0}"),
        format_count(job.num_tasks_per_node, "--ntasks-per-node={0}"),
        format_count(job.num_tasks_per_core, "--ntasks-per-core={0}"),
        format_count(job.num_tasks_per_socket, "--ntasks-per-socket={0}"),
        format_count(job.num_cpus_per_task, "--cpus-per-task={0}"),
        format_option(job.sched_partition.as_deref(), "--partition={0}"),
        format_option(job.sched_account.as_deref(), "--account={0}"),
        format_option(job.sched_nodelist.as_deref(), "--nodelist={0}"),
        format_option(job.sched_exclude_nodelist.as_deref(), "--exclude={0}"),
        format_option(job.sched_reservation.as_deref(), "--reservation={0}"),
    ];

    let suffix = if is_array { "_%a" } else { "" };
    let outfile = format!("--output={{0}}{suffix}");
    let errfile = format!("--error={{0}}{suffix}");
    preamble.push(format_option(Some(&job.stdout), &outfile));
    preamble.push(format_option(Some(&job.stderr), &errfile));

    if let Some(limit) = job.time_limit {
        let (h, m, s) = seconds_to_hms(limit.as_secs());
        preamble.push(format_option(Some(&format!("{h}:{m}:{s}")), "--time={0}"));
    }

    if job.sched_exclusive_access.unwrap_or(false) {
        preamble.push(Some(format!("{PREFIX} --exclusive")));
    }

    if use_nodes_option {
        if let (Some(tasks), Some(per_node)) = (job.num_tasks, job.num_tasks_per_node) {
            if per_node > 0 {
                preamble.push(format_count(Some(tasks / per_node), "--nodes={0}"));
            }
        }
    }

    for opt in &job.sched_access {
        if !is_constraint(opt) {
            preamble.push(Some(format!("{PREFIX} {opt}")));
        }
    }

    // Both directive sources may carry a constraint; Slurm honours the last
    // one, so collect the final value of each and emit their conjunction.
    let mut constraints = Vec::new();
    if let Some(c) = last_flag_value(&job.sched_access, &["-C", "--constraint"]) {
        constraints.push(c.trim().to_string());
    }
    if let Some(c) = last_flag_value(&job.options, &["-C", "--constraint"]) {
        constraints.push(c.trim().to_string());
    }
    if !constraints.is_empty() {
        preamble.push(format_option(Some(&constraints.join("&")), "--constraint={0}"));
    }

    if let Some(use_smt) = job.use_smt {
        let hint = if use_smt { "multithread" } else { "nomultithread" };
        preamble.push(format_option(Some(hint), "--hint={0}"));
    }

    for opt in &job.options {
        if is_constraint(opt) {
            continue;
        }
        if is_directive(opt) {
            preamble.push(Some(opt.clone()));
        } else {
            preamble.push(Some(format!("{PREFIX} {opt}")));
        }
    }

    preamble.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    fn test_job() -> Job {
        Job::new("fluid_check", "rfm_fluid_check.sh")
            .with_output("/scratch/fluid/out", "/scratch/fluid/err")
            .with_num_tasks(32)
            .with_num_tasks_per_node(16)
            .with_partition("normal")
            .with_account("csstaff")
    }

    #[test]
    fn test_basic_preamble() {
        let preamble = emit_preamble(&test_job(), false, false);
        assert_eq!(
            preamble,
            vec![
                "#SBATCH --job-name=\"fluid_check\"",
                "#SBATCH --ntasks=32",
                "#SBATCH --ntasks-per-node=16",
                "#SBATCH --partition=normal",
                "#SBATCH --account=csstaff",
                "#SBATCH --output=/scratch/fluid/out",
                "#SBATCH --error=/scratch/fluid/err",
            ]
        );
    }

    #[test]
    fn test_preamble_is_deterministic() {
        let job = test_job()
            .with_access(["-C gpu", "--mem=120G"])
            .with_option("--requeue");
        assert_eq!(emit_preamble(&job, false, false), emit_preamble(&job, false, false));
    }

    #[test]
    fn test_time_limit_unpadded() {
        let job = test_job().with_time_limit(Duration::from_secs(3661));
        let preamble = emit_preamble(&job, false, false);
        assert!(preamble.contains(&"#SBATCH --time=1:1:1".to_string()));
    }

    #[test]
    fn test_array_output_suffix() {
        let job = test_job().with_option("--array=0-2");
        let preamble = emit_preamble(&job, true, false);
        assert!(preamble.contains(&"#SBATCH --output=/scratch/fluid/out_%a".to_string()));
        assert!(preamble.contains(&"#SBATCH --error=/scratch/fluid/err_%a".to_string()));
        assert!(preamble.contains(&"#SBATCH --array=0-2".to_string()));
    }

    #[test]
    fn test_constraint_merge_keeps_access_first() {
        let job = test_job()
            .with_access(["-C mc", "--switches=2"])
            .with_option("--constraint=gpu");
        let preamble = emit_preamble(&job, false, false);

        assert!(preamble.contains(&"#SBATCH --constraint=mc&gpu".to_string()));
        assert!(preamble.contains(&"#SBATCH --switches=2".to_string()));
        // The raw constraint fragments themselves must not leak through.
        assert!(!preamble.iter().any(|l| l.contains("-C mc")));
        assert!(!preamble.iter().any(|l| l == "#SBATCH --constraint=gpu"));
    }

    #[test]
    fn test_nodes_option() {
        let preamble = emit_preamble(&test_job(), false, true);
        assert!(preamble.contains(&"#SBATCH --nodes=2".to_string()));

        let preamble = emit_preamble(&test_job(), false, false);
        assert!(!preamble.iter().any(|l| l.starts_with("#SBATCH --nodes")));
    }

    #[test]
    fn test_exclusive_and_smt() {
        let mut job = test_job();
        job.sched_exclusive_access = Some(true);
        job.use_smt = Some(false);
        let preamble = emit_preamble(&job, false, false);
        assert!(preamble.contains(&"#SBATCH --exclusive".to_string()));
        assert!(preamble.contains(&"#SBATCH --hint=nomultithread".to_string()));
    }

    #[test]
    fn test_directive_fragments_pass_verbatim() {
        let job = test_job()
            .with_option("#DW jobdw capacity=100GB")
            .with_option("--mem=4G");
        let preamble = emit_preamble(&job, false, false);
        assert!(preamble.contains(&"#DW jobdw capacity=100GB".to_string()));
        assert!(preamble.contains(&"#SBATCH --mem=4G".to_string()));
    }

    #[test]
    fn test_seconds_to_hms() {
        assert_eq!(seconds_to_hms(0), (0, 0, 0));
        assert_eq!(seconds_to_hms(59), (0, 0, 59));
        assert_eq!(seconds_to_hms(3600), (1, 0, 0));
        assert_eq!(seconds_to_hms(86400 + 61), (24, 1, 1));
    }
}
