//! The client-facing job description.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SchedError;

/// A batch job handed to the scheduler backend.
///
/// The client fills in the specification fields, writes the batch script with
/// the preamble obtained from
/// [`emit_preamble`](crate::scheduler::JobScheduler::emit_preamble) and calls
/// [`submit`](crate::scheduler::JobScheduler::submit); the backend writes the
/// result fields as the job progresses through the queue.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Job {
    /// Job name, forwarded to `--job-name`.
    pub name: String,

    /// Path of the batch script passed to `sbatch`.
    pub script_filename: String,

    /// Directory the job runs in; array output files are merged here.
    pub workdir: PathBuf,

    /// Absolute path of the standard output file.
    pub stdout: String,

    /// Absolute path of the standard error file.
    pub stderr: String,

    /// Total number of tasks (`--ntasks`).
    pub num_tasks: Option<u32>,

    /// Tasks per node (`--ntasks-per-node`).
    pub num_tasks_per_node: Option<u32>,

    /// Tasks per core (`--ntasks-per-core`).
    pub num_tasks_per_core: Option<u32>,

    /// Tasks per socket (`--ntasks-per-socket`).
    pub num_tasks_per_socket: Option<u32>,

    /// CPUs per task (`--cpus-per-task`).
    pub num_cpus_per_task: Option<u32>,

    /// Partition to submit to (`--partition`).
    pub sched_partition: Option<String>,

    /// Account charged for the job (`--account`).
    pub sched_account: Option<String>,

    /// Nodes the job must run on (`--nodelist`).
    pub sched_nodelist: Option<String>,

    /// Nodes the job must avoid (`--exclude`).
    pub sched_exclude_nodelist: Option<String>,

    /// Reservation to run under (`--reservation`).
    pub sched_reservation: Option<String>,

    /// Request exclusive node access (`--exclusive`).
    pub sched_exclusive_access: Option<bool>,

    /// Raw directive fragments granting access to the target system
    /// partition, e.g. `-C gpu` or `--account=proj`.
    pub sched_access: Vec<String>,

    /// Enable or disable simultaneous multithreading (`--hint`).
    pub use_smt: Option<bool>,

    /// Wall-clock limit (`--time`).
    pub time_limit: Option<Duration>,

    /// Give up on the job if it stays pending longer than this.
    pub max_pending_time: Option<Duration>,

    /// Additional raw directives; a `--constraint` here is merged with the
    /// one from `sched_access`.
    pub options: Vec<String>,

    /// Slurm job id, assigned exactly once on successful submission.
    #[serde(skip)]
    pub jobid: Option<u64>,

    /// Comma-joined Slurm states, one entry per array member.
    #[serde(skip)]
    pub state: Option<String>,

    /// Exit code; for arrays the maximum over all members.
    #[serde(skip)]
    pub exitcode: Option<i32>,

    /// Names of the nodes the job ran on.
    #[serde(skip)]
    pub nodelist: Option<Vec<String>>,

    /// Error captured while polling in the background, re-examined by
    /// [`finished`](crate::scheduler::JobScheduler::finished).
    #[serde(skip)]
    pub exception: Option<SchedError>,

    /// Completion time in epoch seconds; sticky once set.
    #[serde(skip)]
    pub(crate) completion_time: Option<f64>,
}

impl Job {
    /// Create a job with the given name and batch script path.
    pub fn new(name: impl Into<String>, script_filename: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script_filename: script_filename.into(),
            ..Default::default()
        }
    }

    /// Set the working directory.
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
        self
    }

    /// Set the standard output and error files.
    pub fn with_output(mut self, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self.stderr = stderr.into();
        self
    }

    /// Set the total number of tasks.
    pub fn with_num_tasks(mut self, num_tasks: u32) -> Self {
        self.num_tasks = Some(num_tasks);
        self
    }

    /// Set the number of tasks per node.
    pub fn with_num_tasks_per_node(mut self, num_tasks: u32) -> Self {
        self.num_tasks_per_node = Some(num_tasks);
        self
    }

    /// Set the number of CPUs per task.
    pub fn with_num_cpus_per_task(mut self, num_cpus: u32) -> Self {
        self.num_cpus_per_task = Some(num_cpus);
        self
    }

    /// Set the partition.
    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.sched_partition = Some(partition.into());
        self
    }

    /// Set the account.
    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.sched_account = Some(account.into());
        self
    }

    /// Set the reservation.
    pub fn with_reservation(mut self, reservation: impl Into<String>) -> Self {
        self.sched_reservation = Some(reservation.into());
        self
    }

    /// Set the system access directives.
    pub fn with_access(mut self, access: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.sched_access = access.into_iter().map(Into::into).collect();
        self
    }

    /// Set the wall-clock limit.
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    /// Set the maximum pending time.
    pub fn with_max_pending_time(mut self, limit: Duration) -> Self {
        self.max_pending_time = Some(limit);
        self
    }

    /// Append a raw directive.
    pub fn with_option(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }

    /// Completion time in epoch seconds, if already known.
    pub fn completion_time(&self) -> Option<f64> {
        self.completion_time
    }
}
