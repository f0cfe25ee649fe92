use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Barrier;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::config::{Credential, RunConfig};
use crate::error::{LoginError, SetupError};
use crate::scenario::Scenario;
use crate::statistics::{GlobalResult, WorkerResult};

/// What a worker needs from its session with the contest site.
pub trait ContestSession: Send + 'static {
    fn login(
        &mut self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<(), LoginError>> + Send;

    fn enter_contest(&mut self, contest_id: u64) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// An `Err` is a measured failure, keyed by its message.
    fn run_scenario(&mut self, scenario: Scenario) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Opens one session per worker. Sessions are never shared.
pub trait SessionFactory: Send + Sync + 'static {
    type Session: ContestSession;

    fn open(&self, worker: usize) -> anyhow::Result<Self::Session>;
}

#[derive(Debug, Copy, Clone)]
pub struct Runner {
    jobs: usize,
    iterations: usize,
    contest_id: u64,
    scenario: Scenario,
}

impl Runner {
    #[must_use]
    pub fn new(jobs: usize, iterations: usize, contest_id: u64, scenario: Scenario) -> Self {
        Self {
            jobs,
            iterations,
            contest_id,
            scenario,
        }
    }

    #[must_use]
    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(
            config.jobs,
            config.iterations,
            config.contest_id,
            config.scenario,
        )
    }

    /// Runs `jobs` workers with the first `jobs` credentials.
    pub async fn run<F: SessionFactory>(
        &self,
        factory: Arc<F>,
        credentials: &[Credential],
    ) -> Result<GlobalResult, SetupError> {
        if self.jobs == 0 || self.iterations == 0 {
            return Err(SetupError::Config(
                "jobs and iterations must be at least 1".to_string(),
            ));
        }
        if credentials.len() < self.jobs {
            return Err(SetupError::InsufficientCredentials {
                available: credentials.len(),
                jobs: self.jobs,
            });
        }
        info!(
            "Running {} with {} jobs, {} iterations each",
            self.scenario, self.jobs, self.iterations
        );
        let barrier = Arc::new(Barrier::new(self.jobs));
        let mut tasks = JoinSet::new();
        for (id, credential) in credentials.iter().take(self.jobs).cloned().enumerate() {
            tasks.spawn(run_worker(
                id,
                credential,
                *self,
                Arc::clone(&factory),
                Arc::clone(&barrier),
            ));
        }
        let mut global = GlobalResult::new(self.jobs, self.iterations);
        while let Some(joined) = tasks.join_next().await {
            // Returning early drops the set, which aborts the remaining workers.
            let result = joined??;
            global.merge(result);
        }
        Ok(global)
    }
}

async fn run_worker<F: SessionFactory>(
    id: usize,
    credential: Credential,
    runner: Runner,
    factory: Arc<F>,
    barrier: Arc<Barrier>,
) -> Result<WorkerResult, SetupError> {
    let start = Instant::now();
    let mut session = factory
        .open(id)
        .map_err(|error| SetupError::Session { worker: id, error })?;
    session
        .login(&credential.username, &credential.password)
        .await
        .map_err(|source| SetupError::Login {
            worker: id,
            username: credential.username.clone(),
            source,
        })?;
    info!("Logged in {id}: {:?}", start.elapsed());

    let start = Instant::now();
    session
        .enter_contest(runner.contest_id)
        .await
        .map_err(|error| SetupError::EnterContest {
            worker: id,
            contest_id: runner.contest_id,
            error,
        })?;
    info!("Entered contest {id}: {:?}", start.elapsed());

    barrier.wait().await;
    debug!("Worker {id} passed the barrier");

    let start = Instant::now();
    let mut result = WorkerResult::default();
    for _ in 0..runner.iterations {
        if let Err(e) = session.run_scenario(runner.scenario).await {
            result.record_failure(format!("{e:#}"));
        }
    }
    let elapsed = start.elapsed();
    info!("Scenario {id}: {elapsed:?}");
    result.finish(elapsed, runner.iterations);
    Ok(result)
}
