use std::{collections::BTreeMap, env, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{Category, Error, Result};

/// Per-category processing settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySettings {
    /// How long a worker holds an event of this category before deciding its outcome.
    #[serde(rename = "processing_delay_ms", with = "millis")]
    pub processing_delay: Duration,
}

impl CategorySettings {
    pub fn new(processing_delay: Duration) -> Self {
        Self { processing_delay }
    }
}

/// Runtime configuration for the pipeline.
///
/// Use the builder methods to customize, [`Default`] for the stock values,
/// or [`Config::from_env`] to let `HERALD_*` environment variables override them.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use herald::{Category, Config};
///
/// let config = Config::default()
///     .with_processing_delay(Category::Email, Duration::from_millis(100))
///     .with_failure_probability(0.0)
///     .with_max_retries(5);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Categories served by the pipeline. One queue and one worker per entry.
    /// Default: EMAIL 5000 ms, SMS 3000 ms, PUSH 2000 ms
    pub categories: BTreeMap<Category, CategorySettings>,

    /// Probability in `[0.0, 1.0]` that processing an event fails.
    /// Default: 0.1
    pub failure_probability: f64,

    /// Per-request timeout of a single callback attempt.
    /// Default: 5000 ms
    #[serde(rename = "callback_timeout_ms", with = "millis")]
    pub callback_timeout: Duration,

    /// Total number of callback attempts per event, including the first one.
    /// Default: 3
    pub max_retries: u32,

    /// Linear backoff unit; attempt `n` is followed by a `n * base_backoff` pause.
    /// Default: 1000 ms
    #[serde(rename = "base_backoff_ms", with = "millis")]
    pub base_backoff: Duration,

    /// Number of concurrent callback delivery tasks.
    /// Default: 4
    pub callback_workers: usize,

    /// Upper bound on how long a shutdown waits for the queues to drain.
    /// Default: 30000 ms
    #[serde(rename = "shutdown_timeout_ms", with = "millis")]
    pub shutdown_timeout: Duration,

    /// How often the shutdown coordinator logs the remaining backlog.
    /// Default: 1000 ms
    #[serde(rename = "progress_interval_ms", with = "millis")]
    pub progress_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        let categories = BTreeMap::from([
            (Category::Email, CategorySettings::new(Duration::from_millis(5000))),
            (Category::Sms, CategorySettings::new(Duration::from_millis(3000))),
            (Category::Push, CategorySettings::new(Duration::from_millis(2000))),
        ]);
        Config {
            categories,
            failure_probability: 0.1,
            callback_timeout: Duration::from_millis(5000),
            max_retries: 3,
            base_backoff: Duration::from_millis(1000),
            callback_workers: 4,
            shutdown_timeout: Duration::from_millis(30_000),
            progress_interval: Duration::from_millis(1000),
        }
    }
}

impl Config {
    /// Default configuration overridden by `HERALD_*` environment variables.
    ///
    /// Unset variables keep their default; set but unparseable ones are an error.
    pub fn from_env() -> Result<Self> {
        Self::default().apply_env(|key| env::var(key).ok())
    }

    pub(crate) fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        for category in Category::ALL {
            let key = format!("HERALD_{category}_DELAY_MS");
            if let Some(ms) = parse_var::<u64, _>(&lookup, &key)? {
                self = self.with_processing_delay(category, Duration::from_millis(ms));
            }
        }
        if let Some(p) = parse_var(&lookup, "HERALD_FAILURE_PROBABILITY")? {
            self.failure_probability = p;
        }
        if let Some(ms) = parse_var(&lookup, "HERALD_CALLBACK_TIMEOUT_MS")? {
            self.callback_timeout = Duration::from_millis(ms);
        }
        if let Some(n) = parse_var(&lookup, "HERALD_CALLBACK_MAX_RETRIES")? {
            self.max_retries = n;
        }
        if let Some(ms) = parse_var(&lookup, "HERALD_CALLBACK_BACKOFF_MS")? {
            self.base_backoff = Duration::from_millis(ms);
        }
        if let Some(n) = parse_var(&lookup, "HERALD_CALLBACK_WORKERS")? {
            self.callback_workers = n;
        }
        if let Some(ms) = parse_var(&lookup, "HERALD_SHUTDOWN_TIMEOUT_MS")? {
            self.shutdown_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&lookup, "HERALD_SHUTDOWN_PROGRESS_MS")? {
            self.progress_interval = Duration::from_millis(ms);
        }
        self.validate()?;
        Ok(self)
    }

    /// Set (or add) the processing delay of a category.
    pub fn with_processing_delay(mut self, category: Category, delay: Duration) -> Self {
        self.categories
            .insert(category, CategorySettings::new(delay));
        self
    }

    /// Stop serving a category. Submissions for it fail with
    /// [`Error::UnsupportedCategory`].
    pub fn without_category(mut self, category: Category) -> Self {
        self.categories.remove(&category);
        self
    }

    pub fn with_failure_probability(mut self, probability: f64) -> Self {
        self.failure_probability = probability;
        self
    }

    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    /// Set the size of the callback delivery pool.
    ///
    /// Slow or failing callback targets occupy one pool task each, so the pool
    /// bounds how many of them are attempted at once. Event processing is never
    /// blocked by the pool.
    pub fn with_callback_workers(mut self, workers: usize) -> Self {
        self.callback_workers = workers;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Settings of a category, if it is served.
    pub fn category(&self, category: Category) -> Option<&CategorySettings> {
        self.categories.get(&category)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.failure_probability) {
            return Err(Error::Config(format!(
                "failure probability must be within [0.0, 1.0], got {}",
                self.failure_probability
            )));
        }
        if self.max_retries == 0 {
            return Err(Error::Config("max_retries must be at least 1".into()));
        }
        if self.callback_workers == 0 {
            return Err(Error::Config("callback_workers must be at least 1".into()));
        }
        if self.progress_interval.is_zero() {
            return Err(Error::Config("progress_interval must be positive".into()));
        }
        if self.categories.is_empty() {
            return Err(Error::Config("at least one category must be configured".into()));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("{key}={raw}: {e}"))),
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
