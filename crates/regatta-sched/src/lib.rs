//! Slurm batch scheduler backend for the regatta regression-testing
//! framework.
//!
//! # Overview
//!
//! The engine hands this crate a [`Job`] describing a batch workload and
//! drives it through the scheduler lifecycle:
//!
//! 1. **Preamble**: [`JobScheduler::emit_preamble`] renders the `#SBATCH`
//!    directives the engine prepends to the batch script.
//! 2. **Submission**: [`JobScheduler::submit`] runs `sbatch` and records the
//!    job id.
//! 3. **Polling**: [`JobScheduler::poll`] updates batches of jobs from a
//!    single accounting (or queue) query; [`JobScheduler::wait`] blocks
//!    until completion; [`JobScheduler::finished`] is the non-blocking
//!    probe for external scheduling loops.
//! 4. **Results**: terminal state, exit code and node list land on the
//!    [`Job`]; job arrays additionally get their per-member output files
//!    merged.
//!
//! Two variants share the implementation: the `slurm` backend trusts
//! `sacct` as the source of truth, while the `squeue` backend watches the
//! live queue and infers completion from a job's absence. Node discovery
//! and allocation-time filtering (`scontrol`) are available on both.
//!
//! All interaction with Slurm goes through its command-line tools via the
//! [`CommandRunner`] seam, so tests (and clients without a cluster at hand)
//! can drive the whole lifecycle with canned outputs.
//!
//! # Example
//!
//! ```ignore
//! use regatta_sched::{Job, JobScheduler, SchedulerConfig, SlurmScheduler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut scheduler = SlurmScheduler::new(SchedulerConfig::default());
//!
//!     let mut job = Job::new("netcdf_check", "rfm_netcdf_check.sh")
//!         .with_workdir("/scratch/regatta/netcdf_check")
//!         .with_output(
//!             "/scratch/regatta/netcdf_check/rfm_job.out",
//!             "/scratch/regatta/netcdf_check/rfm_job.err",
//!         )
//!         .with_num_tasks(16)
//!         .with_time_limit(std::time::Duration::from_secs(600));
//!
//!     let preamble = scheduler.emit_preamble(&job);
//!     // ... write the batch script: preamble lines + payload ...
//!
//!     scheduler.submit(&mut job).await?;
//!     scheduler.wait(&mut job).await?;
//!     println!("state: {:?}, exit code: {:?}", job.state, job.exitcode);
//!     Ok(())
//! }
//! ```

pub mod command;
pub mod error;
pub mod job;
pub mod scheduler;
pub mod slurm;

pub use command::{CommandOutput, CommandRunner, CommandSpec, ScriptedRunner, SystemRunner};
pub use error::{SchedError, SchedResult};
pub use job::Job;
pub use scheduler::{JobScheduler, by_name};
pub use slurm::state::{slurm_state_completed, slurm_state_pending};
pub use slurm::{QueryPolicy, SchedulerConfig, SlurmNode, SlurmScheduler};
