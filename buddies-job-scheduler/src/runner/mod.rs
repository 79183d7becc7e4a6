use buddies_common::db::job_registry::Dao as JobRegistryDao;
use buddies_common::db::DbAsyncPool;

use futures::future;
use std::time::{Duration, Instant, SystemTime};
use tokio::time;

use crate::jobs::Job;

struct JobContainer {
    job: Box<dyn Job>,
    run_frequency: Duration,
    last_run_time: SystemTime,
}

pub struct JobRunner {
    jobs: Vec<JobContainer>,
    update_frequency: Duration,
    db_async_pool: DbAsyncPool,
}

impl JobRunner {
    pub fn new(update_frequency: Duration, db_async_pool: DbAsyncPool) -> Self {
        Self {
            jobs: Vec::new(),
            update_frequency,
            db_async_pool,
        }
    }

    pub async fn register(&mut self, job: Box<dyn Job>, run_frequency: Duration) {
        let job_name = job.name();

        log::info!(
            "Registered job \"{}\" to run every {} seconds",
            job_name,
            run_frequency.as_secs()
        );

        let last_run_time = JobRegistryDao::new(&self.db_async_pool)
            .get_job_last_run_timestamp(job_name)
            .await
            .unwrap_or_else(|e| {
                log::error!(
                    "Failed to get last run timestamp for job \"{}\": {}",
                    job_name,
                    e
                );
                None
            });

        let job_container = JobContainer {
            job,
            run_frequency,
            last_run_time: last_run_time.unwrap_or(SystemTime::now()),
        };

        self.jobs.push(job_container);
    }

    pub async fn start(&mut self) -> ! {
        loop {
            let before = Instant::now();

            self.run_due_jobs().await;

            let delta = Instant::now() - before;

            if delta < self.update_frequency {
                time::sleep(self.update_frequency - delta).await;
            }
        }
    }

    /// Executes every job whose run frequency has elapsed, concurrently, and records the
    /// run in the job registry. Returns the names of the jobs that were started.
    async fn run_due_jobs(&mut self) -> Vec<&'static str> {
        let now = SystemTime::now();

        let mut job_names = Vec::with_capacity(self.jobs.len());
        let mut job_futures = Vec::with_capacity(self.jobs.len());
        let mut record_job_run_futures = Vec::with_capacity(self.jobs.len());

        for job_container in &mut self.jobs {
            let job = &mut job_container.job;

            let time_elapsed_since_last_run = now
                .duration_since(job_container.last_run_time)
                .unwrap_or(Duration::from_nanos(0));
            let is_time_to_run = time_elapsed_since_last_run >= job_container.run_frequency;

            if is_time_to_run && job.is_ready() {
                let name = job.name();
                log::info!("Executing job \"{}\"", name);

                job_container.last_run_time = now;
                job_names.push(name);
                job_futures.push(job.execute());

                let dao = JobRegistryDao::new(&self.db_async_pool);
                record_job_run_futures
                    .push(async move { dao.set_job_last_run_timestamp(name, now).await });
            }
        }

        let (job_results, recording_results) = future::join(
            future::join_all(job_futures),
            future::join_all(record_job_run_futures),
        )
        .await;

        for (name, result) in job_names.iter().zip(job_results) {
            match result {
                Ok(()) => log::info!("Job \"{}\" finished successfully", name),
                Err(e) => log::error!("Job \"{}\" failed: {}", name, e),
            }
        }

        for result in recording_results {
            if let Err(e) = result {
                log::error!("Error recording job run: {}", e);
            }
        }

        job_names
    }
}
