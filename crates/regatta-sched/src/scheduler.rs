//! The scheduler seam held by the regression-test engine.

use async_trait::async_trait;
use rustc_hash::FxHashSet;

use crate::error::SchedResult;
use crate::job::Job;
use crate::slurm::{SchedulerConfig, SlurmNode, SlurmScheduler};

/// Interface through which the engine drives a batch scheduler.
///
/// Every operation is synchronous from the caller's standpoint: it runs to
/// completion when awaited and never spawns background work. Parallelism
/// across jobs is the caller's responsibility, with [`poll`](Self::poll)
/// batching as the lever to keep the query load constant.
#[async_trait]
pub trait JobScheduler: Send + Sync {
    /// The name the scheduler variant is registered under.
    fn registered_name(&self) -> &'static str;

    /// Produce the `#SBATCH` directive lines for the job's batch script.
    fn emit_preamble(&self, job: &Job) -> Vec<String>;

    /// Submit the job's batch script, assigning `job.jobid` exactly once.
    async fn submit(&mut self, job: &mut Job) -> SchedResult<()>;

    /// Update the state of a batch of jobs with a single query.
    async fn poll(&mut self, jobs: &mut [&mut Job]) -> SchedResult<()>;

    /// Block until the job reaches a terminal state, merging array output
    /// files on the way out.
    async fn wait(&mut self, job: &mut Job) -> SchedResult<()>;

    /// Cancel the job. Advisory: the terminal state is observed by a later
    /// poll.
    async fn cancel(&mut self, job: &mut Job) -> SchedResult<()>;

    /// Non-blocking completion probe for external scheduling loops.
    async fn finished(&mut self, job: &mut Job) -> SchedResult<bool>;

    /// Epoch seconds at which the job ended, if known.
    async fn completion_time(&mut self, job: &mut Job) -> SchedResult<Option<f64>>;

    /// Discover every node of the cluster.
    async fn allnodes(&self) -> SchedResult<FxHashSet<SlurmNode>>;

    /// Restrict `nodes` to those satisfying the job's allocation directives.
    async fn filternodes(
        &self,
        job: &Job,
        nodes: FxHashSet<SlurmNode>,
    ) -> SchedResult<FxHashSet<SlurmNode>>;
}

#[async_trait]
impl JobScheduler for SlurmScheduler {
    fn registered_name(&self) -> &'static str {
        SlurmScheduler::registered_name(self)
    }

    fn emit_preamble(&self, job: &Job) -> Vec<String> {
        SlurmScheduler::emit_preamble(self, job)
    }

    async fn submit(&mut self, job: &mut Job) -> SchedResult<()> {
        SlurmScheduler::submit(self, job).await
    }

    async fn poll(&mut self, jobs: &mut [&mut Job]) -> SchedResult<()> {
        SlurmScheduler::poll(self, jobs).await
    }

    async fn wait(&mut self, job: &mut Job) -> SchedResult<()> {
        SlurmScheduler::wait(self, job).await
    }

    async fn cancel(&mut self, job: &mut Job) -> SchedResult<()> {
        SlurmScheduler::cancel(self, job).await
    }

    async fn finished(&mut self, job: &mut Job) -> SchedResult<bool> {
        SlurmScheduler::finished(self, job).await
    }

    async fn completion_time(&mut self, job: &mut Job) -> SchedResult<Option<f64>> {
        SlurmScheduler::completion_time(self, job).await
    }

    async fn allnodes(&self) -> SchedResult<FxHashSet<SlurmNode>> {
        SlurmScheduler::allnodes(self).await
    }

    async fn filternodes(
        &self,
        job: &Job,
        nodes: FxHashSet<SlurmNode>,
    ) -> SchedResult<FxHashSet<SlurmNode>> {
        SlurmScheduler::filternodes(self, job, nodes).await
    }
}

/// Look up a scheduler backend by its registered name.
pub fn by_name(name: &str, config: SchedulerConfig) -> Option<Box<dyn JobScheduler>> {
    match name {
        "slurm" => Some(Box::new(SlurmScheduler::new(config))),
        "squeue" => Some(Box::new(SlurmScheduler::squeue(config))),
        _ => None,
    }
}
