//! The Slurm scheduler backend.
//!
//! Two variants share this implementation: the default one trusts the
//! accounting database (`sacct`) for job state, while the squeue-based one
//! watches the live queue and infers completion from a job's absence. Both
//! submit through `sbatch`, cancel through `scancel` and discover nodes
//! through `scontrol`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::fs;
use tracing::debug;

use crate::command::{CommandOutput, CommandRunner, CommandSpec, SystemRunner};
use crate::error::{SchedError, SchedResult};
use crate::job::Job;
use crate::slurm::nodes::{SlurmNode, parse_node_descriptions};
use crate::slurm::options::{is_array_request, last_flag_value};
use crate::slurm::parser;
use crate::slurm::preamble;
use crate::slurm::state::{slurm_state_completed, slurm_state_pending};

/// How many sacct polls occur per squeue probe for the blocking reason.
///
/// Some systems are sensitive to squeue pressure, so the reason probe runs
/// at a fraction of the state polling rate.
const SACCT_SQUEUE_RATIO: u64 = 10;

/// Minimum delay between a submission and the next squeue state query.
const SQUEUE_DELAY: Duration = Duration::from_secs(2);

/// Cyclic back-off used by `wait`, in seconds.
const WAIT_INTERVALS: [u64; 3] = [1, 2, 3];

/// Pending reasons that keep a job blocked until an administrator steps in.
const CANCEL_REASONS: [&str; 9] = [
    "FrontEndDown",
    "Licenses",
    "NodeDown",
    "PartitionDown",
    "PartitionInactive",
    "PartitionNodeLimit",
    "QOSJobLimit",
    "QOSResourceLimit",
    "QOSUsageThreshold",
];

/// Which Slurm tool is the source of truth for job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryPolicy {
    /// Accounting records (`sacct`); they survive job completion.
    #[default]
    Sacct,
    /// Live queue (`squeue`); completion is inferred from queue absence.
    Squeue,
}

/// Configuration for the Slurm scheduler backend.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Keep jobs pending on `ReqNodeNotAvail` instead of probing the
    /// unavailable nodes and cancelling.
    pub ignore_reqnodenotavail: bool,

    /// Timeout applied to `sbatch` and `scancel`.
    pub job_submit_timeout: Duration,

    /// Emit `--nodes` derived from the task counts.
    pub use_nodes_option: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            ignore_reqnodenotavail: false,
            job_submit_timeout: Duration::from_secs(60),
            use_nodes_option: false,
        }
    }
}

impl SchedulerConfig {
    /// Keep `ReqNodeNotAvail` jobs pending unconditionally.
    pub fn with_ignore_reqnodenotavail(mut self, ignore: bool) -> Self {
        self.ignore_reqnodenotavail = ignore;
        self
    }

    /// Set the submission/cancellation timeout.
    pub fn with_job_submit_timeout(mut self, timeout: Duration) -> Self {
        self.job_submit_timeout = timeout;
        self
    }

    /// Emit `--nodes` in the preamble.
    pub fn with_use_nodes_option(mut self, use_nodes: bool) -> Self {
        self.use_nodes_option = use_nodes;
        self
    }
}

/// Per-job bookkeeping, kept from submission until process exit.
#[derive(Debug)]
struct JobRecord {
    submit_time: DateTime<Local>,
    update_state_count: u64,
    is_array: bool,
    cancelling: bool,
    /// Only meaningful under [`QueryPolicy::Squeue`]: a job that vanished
    /// from the queue is reported `CANCELLED` instead of `COMPLETED`.
    cancelled: bool,
}

/// Slurm batch scheduler backend.
///
/// One instance serves one engine; callers drive a batch of jobs through a
/// single instance and serialise access externally. Per-job state lives in a
/// side table keyed by job id rather than in process-wide storage.
pub struct SlurmScheduler {
    config: SchedulerConfig,
    policy: QueryPolicy,
    runner: Arc<dyn CommandRunner>,
    records: FxHashMap<u64, JobRecord>,
    cancel_reasons: Vec<&'static str>,
}

impl SlurmScheduler {
    /// Create a sacct-backed scheduler (registered name `slurm`).
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_runner(config, QueryPolicy::Sacct, Arc::new(SystemRunner))
    }

    /// Create a squeue-backed scheduler (registered name `squeue`).
    pub fn squeue(config: SchedulerConfig) -> Self {
        Self::with_runner(config, QueryPolicy::Squeue, Arc::new(SystemRunner))
    }

    /// Create a scheduler with an explicit command runner.
    pub fn with_runner(
        config: SchedulerConfig,
        policy: QueryPolicy,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let mut cancel_reasons = CANCEL_REASONS.to_vec();
        if !config.ignore_reqnodenotavail {
            cancel_reasons.push("ReqNodeNotAvail");
        }

        Self {
            config,
            policy,
            runner,
            records: FxHashMap::default(),
            cancel_reasons,
        }
    }

    /// The name this scheduler variant is registered under.
    pub fn registered_name(&self) -> &'static str {
        match self.policy {
            QueryPolicy::Sacct => "slurm",
            QueryPolicy::Squeue => "squeue",
        }
    }

    /// Produce the `#SBATCH` directive lines for the job's batch script.
    pub fn emit_preamble(&self, job: &Job) -> Vec<String> {
        preamble::emit_preamble(
            job,
            is_array_request(&job.options),
            self.config.use_nodes_option,
        )
    }

    /// Submit the job's batch script, assigning `job.jobid` exactly once.
    pub async fn submit(&mut self, job: &mut Job) -> SchedResult<()> {
        let spec = CommandSpec::new("sbatch")
            .arg(&job.script_filename)
            .timeout(self.config.job_submit_timeout);
        let completed = self.run_strict(spec).await?;
        let jobid = parser::parse_submit_output(&completed.stdout)?;

        job.jobid = Some(jobid);
        let is_array = is_array_request(&job.options);
        if is_array {
            debug!(jobid, "detected job array request");
        }
        self.records.insert(
            jobid,
            JobRecord {
                submit_time: Local::now(),
                update_state_count: 0,
                is_array,
                cancelling: false,
                cancelled: false,
            },
        );
        debug!(jobid, name = %job.name, "submitted batch job");
        Ok(())
    }

    /// Update the state of a batch of jobs with a single query.
    ///
    /// Batching is the caller's lever for amortising one sacct/squeue
    /// invocation over many jobs.
    pub async fn poll(&mut self, jobs: &mut [&mut Job]) -> SchedResult<()> {
        match self.policy {
            QueryPolicy::Sacct => self.poll_sacct(jobs).await,
            QueryPolicy::Squeue => self.poll_squeue(jobs).await,
        }
    }

    /// Block until the job reaches a terminal state, merging array output
    /// files on the way out.
    pub async fn wait(&mut self, job: &mut Job) -> SchedResult<()> {
        // Quickly return in case we have finished already.
        if slurm_state_completed(job.state.as_deref().unwrap_or_default()) {
            if self.is_array(job) {
                self.merge_files(job).await?;
            }
            return Ok(());
        }

        let mut tick = 0usize;
        self.poll_one(job).await?;
        while !slurm_state_completed(job.state.as_deref().unwrap_or_default()) {
            self.enforce_max_pending(job).await?;
            let secs = WAIT_INTERVALS[tick % WAIT_INTERVALS.len()];
            tick += 1;
            tokio::time::sleep(Duration::from_secs(secs)).await;
            self.poll_one(job).await?;
        }

        if self.is_array(job) {
            self.merge_files(job).await?;
        }

        Ok(())
    }

    /// Cancel the job.
    ///
    /// Advisory: the authoritative transition to a terminal state is
    /// observed by a later poll. Cancelling twice is safe.
    pub async fn cancel(&mut self, job: &mut Job) -> SchedResult<()> {
        let Some(jobid) = job.jobid else {
            return Ok(());
        };

        debug!(jobid, "cancelling job");
        let spec = CommandSpec::new("scancel")
            .arg(jobid.to_string())
            .timeout(self.config.job_submit_timeout);
        self.run_strict(spec).await?;

        if let Some(record) = self.records.get_mut(&jobid) {
            record.cancelling = true;
            if self.policy == QueryPolicy::Squeue {
                // The queue forgets finished jobs, so remember the
                // cancellation for the poll that finds the job gone.
                record.cancelled = true;
            }
        }

        Ok(())
    }

    /// Non-blocking completion probe for external scheduling loops.
    ///
    /// A stashed [`SchedError::JobBlocked`] is re-raised; any other stashed
    /// error counts as a transient polling failure and downgrades to "not
    /// finished yet". The stash is cleared either way.
    pub async fn finished(&mut self, job: &mut Job) -> SchedResult<bool> {
        if let Some(err) = job.exception.take() {
            match err {
                SchedError::JobBlocked { .. } => return Err(err),
                err => {
                    debug!(error = %err, "ignoring error during polling");
                    return Ok(false);
                }
            }
        }

        self.enforce_max_pending(job).await?;
        Ok(slurm_state_completed(job.state.as_deref().unwrap_or_default()))
    }

    /// Epoch seconds at which the job ended; for arrays, the end of the last
    /// member. `None` until the job completes, sticky afterwards. The squeue
    /// variant cannot recover end times and always returns `None`.
    pub async fn completion_time(&mut self, job: &mut Job) -> SchedResult<Option<f64>> {
        if self.policy == QueryPolicy::Squeue {
            return Ok(None);
        }
        if job.completion_time.is_some() {
            return Ok(job.completion_time);
        }
        if !slurm_state_completed(job.state.as_deref().unwrap_or_default()) {
            return Ok(None);
        }
        let Some(jobid) = job.jobid else {
            return Ok(None);
        };
        let Some(record) = self.records.get(&jobid) else {
            return Ok(None);
        };

        let submit_date = record.submit_time.format("%F").to_string();
        let spec = CommandSpec::new("sacct")
            .args([
                "-S",
                &submit_date,
                "-P",
                "-j",
                &jobid.to_string(),
                "-o",
                "jobid,end",
            ])
            .env("SLURM_TIME_FORMAT", "%s");
        let completed = self.run(spec).await?;

        job.completion_time = parser::parse_completion_times(&completed.stdout)
            .into_iter()
            .fold(None, |acc: Option<f64>, t| {
                Some(acc.map_or(t, |a| a.max(t)))
            });
        Ok(job.completion_time)
    }

    /// Discover every node of the cluster.
    pub async fn allnodes(&self) -> SchedResult<FxHashSet<SlurmNode>> {
        let spec = CommandSpec::new("scontrol").args(["-a", "show", "-o", "nodes"]);
        let completed = self.run_strict(spec).await?;
        Ok(parse_node_descriptions(&completed.stdout))
    }

    /// Restrict `nodes` to those satisfying the job's allocation directives:
    /// reservation, partitions, constraints, nodelist and exclusions, in
    /// that order.
    pub async fn filternodes(
        &self,
        job: &Job,
        mut nodes: FxHashSet<SlurmNode>,
    ) -> SchedResult<FxHashSet<SlurmNode>> {
        // Collect every directive that restricts node selection; the
        // dedicated scheduling fields are folded in as synthetic options.
        let mut options: Vec<String> = job
            .sched_access
            .iter()
            .chain(job.options.iter())
            .cloned()
            .collect();
        if let Some(partition) = &job.sched_partition {
            options.push(format!("--partition={partition}"));
        }
        if let Some(account) = &job.sched_account {
            options.push(format!("--account={account}"));
        }
        if let Some(nodelist) = &job.sched_nodelist {
            options.push(format!("--nodelist={nodelist}"));
        }
        if let Some(exclude) = &job.sched_exclude_nodelist {
            options.push(format!("--exclude={exclude}"));
        }
        if let Some(reservation) = &job.sched_reservation {
            options.push(format!("--reservation={reservation}"));
        }

        if let Some(reservation) = last_flag_value(&options, &["--reservation"]) {
            let reservation = reservation.trim();
            let reserved = self.reservation_nodes(reservation).await?;
            nodes.retain(|n| reserved.contains(n));
            debug!(
                reservation,
                remaining = nodes.len(),
                "filtered nodes by reservation"
            );
        }

        let partitions: FxHashSet<String> =
            match last_flag_value(&options, &["-p", "--partition"]) {
                Some(partitions) => partitions.trim().split(',').map(str::to_string).collect(),
                None => {
                    let default = self.default_partition().await?;
                    debug!(partition = ?default, "using default partition");
                    default.into_iter().collect()
                }
            };
        nodes.retain(|n| partitions.iter().all(|p| n.partitions().contains(p)));
        debug!(
            ?partitions,
            remaining = nodes.len(),
            "filtered nodes by partition"
        );

        if let Some(constraints) = last_flag_value(&options, &["-C", "--constraint"]) {
            let required: FxHashSet<&str> = constraints.trim().split('&').collect();
            nodes.retain(|n| required.iter().all(|c| n.active_features().contains(*c)));
            debug!(
                constraints = %constraints,
                remaining = nodes.len(),
                "filtered nodes by constraint"
            );
        }

        if let Some(nodelist) = last_flag_value(&options, &["-w", "--nodelist"]) {
            let wanted = self.nodes_by_name(nodelist.trim()).await?;
            nodes.retain(|n| wanted.contains(n));
            debug!(
                nodelist = %nodelist,
                remaining = nodes.len(),
                "filtered nodes by nodelist"
            );
        }

        if let Some(exclude) = last_flag_value(&options, &["-x", "--exclude"]) {
            let excluded = self.nodes_by_name(exclude.trim()).await?;
            nodes.retain(|n| !excluded.contains(n));
            debug!(
                exclude = %exclude,
                remaining = nodes.len(),
                "excluded nodes"
            );
        }

        Ok(nodes)
    }

    async fn poll_sacct(&mut self, jobs: &mut [&mut Job]) -> SchedResult<()> {
        let jobids: Vec<u64> = jobs.iter().filter_map(|job| job.jobid).collect();
        if jobids.is_empty() {
            return Ok(());
        }

        // The accounting query needs a lower date bound; use the earliest
        // submission among the batch.
        let start = jobids
            .iter()
            .filter_map(|id| self.records.get(id))
            .map(|record| record.submit_time)
            .min()
            .unwrap_or_else(Local::now);
        let start_date = start.format("%F").to_string();
        let ids = jobids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let spec = CommandSpec::new("sacct").args([
            "-S",
            &start_date,
            "-P",
            "-j",
            &ids,
            "-o",
            "jobid,state,exitcode,nodelist",
        ]);
        let completed = self.run_strict(spec).await?;

        for id in &jobids {
            if let Some(record) = self.records.get_mut(id) {
                record.update_state_count += 1;
            }
        }

        let entries = parser::parse_sacct_states(&completed.stdout);
        if entries.is_empty() {
            debug!(stdout = %completed.stdout, "job state not matched");
            return Ok(());
        }

        let mut by_job: FxHashMap<u64, Vec<&parser::SacctEntry>> = FxHashMap::default();
        for entry in &entries {
            by_job.entry(entry.base_id).or_default().push(entry);
        }

        for job in jobs.iter_mut() {
            let Some(jobid) = job.jobid else { continue };
            let Some(members) = by_job.get(&jobid) else {
                continue;
            };

            // Job arrays report one state per member; join them in match
            // order.
            job.state = Some(
                members
                    .iter()
                    .map(|m| m.state.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
            );

            let update_count = self
                .records
                .get(&jobid)
                .map_or(0, |record| record.update_state_count);
            if update_count % SACCT_SQUEUE_RATIO == 0 {
                self.cancel_if_blocked(job).await?;
            }

            if slurm_state_completed(job.state.as_deref().unwrap_or_default()) {
                // Slurm exit codes are non-negative, so the maximum is the
                // worst one across the array.
                job.exitcode = members.iter().map(|m| m.exitcode).max();
            }

            let nodespec = members
                .iter()
                .map(|m| m.nodespec.as_str())
                .collect::<Vec<_>>()
                .join(",");
            self.set_nodelist(job, &nodespec).await?;
        }

        Ok(())
    }

    async fn poll_squeue(&mut self, jobs: &mut [&mut Job]) -> SchedResult<()> {
        let jobids: Vec<u64> = jobs.iter().filter_map(|job| job.jobid).collect();
        if jobids.is_empty() {
            return Ok(());
        }

        // Give the queue a moment to register fresh submissions before
        // treating an absent job as finished.
        let latest = jobids
            .iter()
            .filter_map(|id| self.records.get(id))
            .map(|record| record.submit_time)
            .max();
        if let Some(latest) = latest {
            let since = Local::now()
                .signed_duration_since(latest)
                .to_std()
                .unwrap_or_default();
            if let Some(remaining) = SQUEUE_DELAY.checked_sub(since) {
                if !remaining.is_zero() {
                    tokio::time::sleep(remaining).await;
                }
            }
        }

        let ids = jobids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        // Not run strictly: squeue exits non-zero when some of the ids are
        // already unknown to it.
        let spec = CommandSpec::new("squeue").args(["-h", "-j", &ids, "-o", "%i|%T|%N|%r"]);
        let completed = self.run(spec).await?;

        let entries = parser::parse_squeue_states(&completed.stdout);
        let mut by_job: FxHashMap<u64, Vec<&parser::SqueueEntry>> = FxHashMap::default();
        for entry in &entries {
            by_job.entry(entry.base_id).or_default().push(entry);
        }

        for job in jobs.iter_mut() {
            let Some(jobid) = job.jobid else { continue };
            let Some(members) = by_job.get(&jobid) else {
                // The job is gone from the queue: it either completed or we
                // cancelled it. Exit codes are not recoverable here, so be
                // optimistic about any member we did not observe failing.
                let cancelled = self
                    .records
                    .get(&jobid)
                    .is_some_and(|record| record.cancelled);
                job.state = Some(if cancelled { "CANCELLED" } else { "COMPLETED" }.to_string());
                if job.exitcode.is_none() {
                    job.exitcode = Some(0);
                }
                continue;
            };

            job.state = Some(
                members
                    .iter()
                    .map(|m| m.state.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
            );

            let cancelling = self
                .records
                .get(&jobid)
                .is_some_and(|record| record.cancelling);
            if !cancelling && !slurm_state_pending(job.state.as_deref().unwrap_or_default()) {
                for member in members {
                    self.check_and_cancel(job, &member.reason).await?;
                }
            }
        }

        Ok(())
    }

    /// Probe the pending reason of a still-pending job and cancel it when
    /// the reason is unrecoverable.
    async fn cancel_if_blocked(&mut self, job: &mut Job) -> SchedResult<()> {
        let Some(jobid) = job.jobid else {
            return Ok(());
        };
        if self
            .records
            .get(&jobid)
            .is_some_and(|record| record.cancelling)
        {
            return Ok(());
        }
        if !slurm_state_pending(job.state.as_deref().unwrap_or_default()) {
            return Ok(());
        }

        let spec = CommandSpec::new("squeue").args(["-h", "-j", &jobid.to_string(), "-o", "%r"]);
        let completed = self.run_strict(spec).await?;
        if completed.stdout.is_empty() {
            // Perhaps the job finished in the meantime and no longer shows
            // up in the queue.
            return Ok(());
        }

        // Job arrays produce one reason line per member.
        for reason_descr in completed.stdout.lines() {
            self.check_and_cancel(job, reason_descr).await?;
        }

        Ok(())
    }

    /// Decide whether a pending reason warrants cancelling the job.
    ///
    /// `ReqNodeNotAvail` is special-cased: when the report names the
    /// unavailable nodes, they are probed and the block is treated as
    /// transient unless one of them is actually down.
    async fn check_and_cancel(&mut self, job: &mut Job, reason_descr: &str) -> SchedResult<()> {
        // The description may have two parts, as in
        // "ReqNodeNotAvail, UnavailableNodes:nid00[408,411-415]".
        let (reason, details) = match reason_descr.split_once(',') {
            Some((reason, details)) => (reason, Some(details)),
            None => (reason_descr, None),
        };

        if !self.cancel_reasons.contains(&reason) {
            return Ok(());
        }

        if reason == "ReqNodeNotAvail" {
            if let Some(details) = details {
                if let Some(names) = parser::parse_unavailable_nodes(details) {
                    if names.is_empty() {
                        // No node names reported; assume the job stays
                        // pending.
                        return Ok(());
                    }
                    let nodes = self.nodes_by_name(names).await?;
                    if !nodes.iter().any(SlurmNode::is_down) {
                        return Ok(());
                    }
                }
            }
        }

        self.cancel(job).await?;
        let reason_msg = match details {
            Some(details) => format!("{reason},{details}"),
            None => reason.to_string(),
        };
        Err(SchedError::JobBlocked {
            jobid: job.jobid.unwrap_or_default(),
            reason: reason_msg,
        })
    }

    /// Cancel and fail when the job stayed pending longer than its limit.
    async fn enforce_max_pending(&mut self, job: &mut Job) -> SchedResult<()> {
        let Some(limit) = job.max_pending_time else {
            return Ok(());
        };
        if !slurm_state_pending(job.state.as_deref().unwrap_or_default()) {
            return Ok(());
        }
        let Some(jobid) = job.jobid else {
            return Ok(());
        };
        let Some(record) = self.records.get(&jobid) else {
            return Ok(());
        };

        let elapsed = Local::now()
            .signed_duration_since(record.submit_time)
            .to_std()
            .unwrap_or_default();
        if elapsed >= limit {
            self.cancel(job).await?;
            return Err(SchedError::PendingTimeout { jobid });
        }

        Ok(())
    }

    /// Resolve the job's node names, once, from the first meaningful
    /// comma-joined nodespec.
    async fn set_nodelist(&self, job: &mut Job, nodespec: &str) -> SchedResult<()> {
        if job.nodelist.is_some() {
            return Ok(());
        }
        if nodespec.is_empty() || nodespec == "None assigned" {
            return Ok(());
        }

        let nodes = self.nodes_by_name(nodespec).await?;
        let mut names: Vec<String> = nodes.iter().map(|n| n.name().to_string()).collect();
        names.sort();
        job.nodelist = Some(names);
        Ok(())
    }

    fn is_array(&self, job: &Job) -> bool {
        match job.jobid.and_then(|id| self.records.get(&id)) {
            Some(record) => record.is_array,
            None => is_array_request(&job.options),
        }
    }

    /// Concatenate the per-member output files of a job array into the base
    /// stdout/stderr files, overwriting them.
    ///
    /// Members are ordered by the numeric value of their `_N` suffix, with a
    /// lexicographic fallback, so the merge is deterministic across
    /// filesystems.
    async fn merge_files(&self, job: &Job) -> SchedResult<()> {
        concat_array_output(&job.workdir, &job.stdout).await?;
        concat_array_output(&job.workdir, &job.stderr).await
    }

    /// Expand a reservation into its node set.
    async fn reservation_nodes(&self, reservation: &str) -> SchedResult<FxHashSet<SlurmNode>> {
        let spec = CommandSpec::new("scontrol").args(["-a", "show", "res", reservation]);
        let completed = self.run_strict(spec).await?;
        let Some(nodespec) = parser::parse_reservation_nodespec(&completed.stdout) else {
            return Err(SchedError::NodeQueryFailed(format!(
                "could not extract the node names for reservation '{reservation}'"
            )));
        };
        self.nodes_by_name(nodespec).await
    }

    /// The cluster's default partition, if any.
    async fn default_partition(&self) -> SchedResult<Option<String>> {
        let spec = CommandSpec::new("scontrol").args(["-a", "show", "-o", "partitions"]);
        let completed = self.run_strict(spec).await?;
        Ok(parser::parse_default_partition(&completed.stdout))
    }

    /// Expand a node specification into node descriptors.
    ///
    /// Run non-strictly: scontrol legitimately fails for names it no longer
    /// knows, which simply yields an empty set.
    async fn nodes_by_name(&self, nodespec: &str) -> SchedResult<FxHashSet<SlurmNode>> {
        let spec = CommandSpec::new("scontrol").args(["-a", "show", "-o", "node", nodespec]);
        let completed = self.run(spec).await?;
        Ok(parse_node_descriptions(&completed.stdout))
    }

    async fn poll_one(&mut self, job: &mut Job) -> SchedResult<()> {
        self.poll(&mut [&mut *job]).await
    }

    async fn run(&self, spec: CommandSpec) -> SchedResult<CommandOutput> {
        self.runner.run(&spec).await
    }

    /// Run a command and fail on a non-zero exit status.
    async fn run_strict(&self, spec: CommandSpec) -> SchedResult<CommandOutput> {
        let output = self.runner.run(&spec).await?;
        if !output.success() {
            return Err(SchedError::CommandFailed {
                command: spec.command_line(),
                status: output.status,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }
}

async fn concat_array_output(workdir: &Path, base: &str) -> SchedResult<()> {
    if base.is_empty() {
        return Ok(());
    }

    let base_path = if Path::new(base).is_absolute() {
        PathBuf::from(base)
    } else {
        workdir.join(base)
    };
    let dir = base_path.parent().unwrap_or(workdir).to_path_buf();
    let prefix = match base_path.file_name().and_then(|name| name.to_str()) {
        Some(name) => format!("{name}_"),
        None => return Ok(()),
    };

    let mut parts: Vec<(String, PathBuf)> = Vec::new();
    let mut entries = fs::read_dir(&dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if let Some(suffix) = name.strip_prefix(&prefix) {
            parts.push((suffix.to_string(), entry.path()));
        }
    }
    parts.sort_by_key(|(suffix, _)| (suffix.parse::<u64>().ok(), suffix.clone()));

    debug!(
        base = %base_path.display(),
        parts = parts.len(),
        "merging job array output files"
    );
    let mut merged = Vec::new();
    for (_, path) in &parts {
        merged.extend_from_slice(&fs::read(path).await?);
    }
    fs::write(&base_path, merged).await?;

    Ok(())
}
