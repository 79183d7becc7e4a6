use buddies_common::db::create_db_async_pool;

use flexi_logger::{
    Age, Cleanup, Criterion, Duplicate, FileSpec, LogSpecification, Logger, Naming, WriteMode,
};

mod env;
mod jobs;
mod runner;

use jobs::{ClearOldNotificationsJob, ExpireStaleLocationsJob};
use runner::JobRunner;

fn main() {
    let log_spec = match LogSpecification::parse(&env::CONF.log_level) {
        Ok(s) => s,
        Err(_) => {
            eprintln!(
                "ERROR: Invalid log level '{}', falling back to info",
                env::CONF.log_level
            );
            LogSpecification::info()
        }
    };

    let _logger = Logger::with(log_spec)
        .log_to_file(FileSpec::default().directory("./logs").basename("jobs"))
        .rotate(
            Criterion::Age(Age::Day),
            Naming::Timestamps,
            Cleanup::KeepLogAndCompressedFiles(60, 365),
        )
        .cleanup_in_background_thread(true)
        .duplicate_to_stdout(Duplicate::All)
        .write_mode(WriteMode::BufferAndFlush)
        .format(|writer, now, record| {
            write!(
                writer,
                "{:5} | {} | {}:{} | {}",
                record.level(),
                now.format("%Y-%m-%dT%H:%M:%S%.6fZ"),
                record.module_path().unwrap_or("<unknown>"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .use_utc()
        .start()
        .expect("Failed to start logger");

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(env::CONF.worker_threads)
        .enable_all()
        .build()
        .expect("Failed to launch asynchronous runtime")
        .block_on(async move {
            log::info!("Connecting to database...");

            let db_async_pool = create_db_async_pool(
                &env::CONF.database_uri(),
                env::CONF.db_max_connections,
                env::CONF.db_idle_timeout,
            )
            .await;

            log::info!("Successfully connected to database");

            let mut job_runner = JobRunner::new(env::CONF.update_frequency, db_async_pool.clone());

            job_runner
                .register(
                    Box::new(ClearOldNotificationsJob::new(
                        db_async_pool.clone(),
                        env::CONF.notification_max_age,
                    )),
                    env::CONF.clear_old_notifications_job_frequency,
                )
                .await;

            job_runner
                .register(
                    Box::new(ExpireStaleLocationsJob::new(
                        db_async_pool.clone(),
                        env::CONF.location_max_age,
                    )),
                    env::CONF.expire_stale_locations_job_frequency,
                )
                .await;

            job_runner.start().await;
        });

    unsafe {
        env::CONF.zeroize();
    }
}
