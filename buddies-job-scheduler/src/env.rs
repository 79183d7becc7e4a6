use once_cell::sync::Lazy;
use std::cell::UnsafeCell;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use std::time::Duration;
use zeroize::{Zeroize, Zeroizing};

pub static CONF: Lazy<Config> = Lazy::new(|| Config::from_env().expect("Failed to load config"));

const DB_USERNAME_VAR: &str = "BUDDIES_DB_USERNAME";
const DB_PASSWORD_VAR: &str = "BUDDIES_DB_PASSWORD";
const DB_HOSTNAME_VAR: &str = "BUDDIES_DB_HOSTNAME";
const DB_PORT_VAR: &str = "BUDDIES_DB_PORT";
const DB_NAME_VAR: &str = "BUDDIES_DB_NAME";
const DB_MAX_CONNECTIONS_VAR: &str = "BUDDIES_JOBS_DB_MAX_CONNECTIONS";
const DB_IDLE_TIMEOUT_SECS_VAR: &str = "BUDDIES_DB_IDLE_TIMEOUT_SECS";

const LOG_LEVEL_VAR: &str = "BUDDIES_JOBS_LOG_LEVEL";
const UPDATE_FREQUENCY_SECS_VAR: &str = "BUDDIES_JOBS_UPDATE_FREQUENCY_SECS";
const WORKER_THREADS_VAR: &str = "BUDDIES_JOBS_WORKER_THREADS";

const CLEAR_OLD_NOTIFICATIONS_JOB_FREQUENCY_SECS_VAR: &str =
    "BUDDIES_CLEAR_OLD_NOTIFICATIONS_JOB_FREQUENCY_SECS";
const NOTIFICATION_MAX_AGE_DAYS_VAR: &str = "BUDDIES_NOTIFICATION_MAX_AGE_DAYS";

const EXPIRE_STALE_LOCATIONS_JOB_FREQUENCY_SECS_VAR: &str =
    "BUDDIES_EXPIRE_STALE_LOCATIONS_JOB_FREQUENCY_SECS";
const LOCATION_MAX_AGE_DAYS_VAR: &str = "BUDDIES_LOCATION_MAX_AGE_DAYS";

const SECS_PER_DAY: u64 = 86400;

#[derive(Zeroize)]
pub struct ConfigInner {
    pub db_username: String,
    pub db_password: String,
    pub db_hostname: String,
    pub db_port: u16,
    pub db_name: String,
    #[zeroize(skip)]
    pub db_max_connections: u32,
    #[zeroize(skip)]
    pub db_idle_timeout: Duration,

    #[zeroize(skip)]
    pub log_level: String,
    #[zeroize(skip)]
    pub update_frequency: Duration,
    #[zeroize(skip)]
    pub worker_threads: usize,

    #[zeroize(skip)]
    pub clear_old_notifications_job_frequency: Duration,
    #[zeroize(skip)]
    pub notification_max_age: Duration,

    #[zeroize(skip)]
    pub expire_stale_locations_job_frequency: Duration,
    #[zeroize(skip)]
    pub location_max_age: Duration,
}

pub struct Config {
    inner: UnsafeCell<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        // Safe as long as `unsafe Config::zeroize()` hasn't been called
        unsafe { &*self.inner.get() }
    }
}

// Safe to be shared across threads as long as `unsafe Config::zeroize()` hasn't been called
unsafe impl Sync for Config {}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        let inner = ConfigInner {
            db_username: env_var(DB_USERNAME_VAR)?,
            db_password: env_var(DB_PASSWORD_VAR)?,
            db_hostname: env_var(DB_HOSTNAME_VAR)?,
            db_port: env_var(DB_PORT_VAR)?,
            db_name: env_var(DB_NAME_VAR)?,
            db_max_connections: env_var_or(DB_MAX_CONNECTIONS_VAR, 4),
            db_idle_timeout: Duration::from_secs(env_var_or(DB_IDLE_TIMEOUT_SECS_VAR, 30)),

            log_level: env_var_or(LOG_LEVEL_VAR, String::from("info")),
            update_frequency: Duration::from_secs(env_var_or(UPDATE_FREQUENCY_SECS_VAR, 30)),
            worker_threads: env_var_or(WORKER_THREADS_VAR, num_cpus::get()),

            clear_old_notifications_job_frequency: Duration::from_secs(env_var_or(
                CLEAR_OLD_NOTIFICATIONS_JOB_FREQUENCY_SECS_VAR,
                SECS_PER_DAY,
            )),
            notification_max_age: Duration::from_secs(
                env_var_or(NOTIFICATION_MAX_AGE_DAYS_VAR, 30) * SECS_PER_DAY,
            ),

            expire_stale_locations_job_frequency: Duration::from_secs(env_var_or(
                EXPIRE_STALE_LOCATIONS_JOB_FREQUENCY_SECS_VAR,
                3600,
            )),
            location_max_age: Duration::from_secs(
                env_var_or(LOCATION_MAX_AGE_DAYS_VAR, 7) * SECS_PER_DAY,
            ),
        };

        Ok(Config {
            inner: UnsafeCell::new(inner),
        })
    }

    pub fn database_uri(&self) -> Zeroizing<String> {
        Zeroizing::new(format!(
            "postgres://{}:{}@{}:{}/{}",
            self.db_username, self.db_password, self.db_hostname, self.db_port, self.db_name,
        ))
    }

    /// # Safety
    ///
    /// Safe only if the Config isn't being used by other threads or across an async
    /// boundary. Generally, this should only be used at the end of the main function once
    /// all threads have been joined.
    pub unsafe fn zeroize(&self) {
        unsafe {
            (*self.inner.get()).zeroize();
        }
    }
}

fn env_var<T: FromStr>(key: &'static str) -> Result<T, ConfigError> {
    let var = std::env::var(key).map_err(|_| ConfigError::MissingVar(key))?;
    var.parse().map_err(|_| ConfigError::InvalidVar(key))
}

fn env_var_or<T: FromStr>(key: &'static str, default: T) -> T {
    let Ok(var) = std::env::var(key) else {
        return default;
    };

    var.parse().unwrap_or(default)
}

#[derive(Clone, Copy, Debug)]
pub enum ConfigError {
    MissingVar(&'static str),
    InvalidVar(&'static str),
}

impl std::error::Error for ConfigError {}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingVar(key) => write!(f, "Missing environment variable '{}'", key),
            Self::InvalidVar(key) => write!(f, "Environment variable '{}' is invalid", key),
        }
    }
}
