// Configuration module for cgidx
// Reads from environment variables with sensible defaults

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Ingestion batch threshold, declarations plus relationships (CGIDX_BATCH_SIZE)
    pub batch_size: usize,

    /// Maximum age of a non-empty ingestion buffer (CGIDX_FLUSH_INTERVAL_MS)
    pub flush_interval_ms: u64,

    /// Attempts per write transaction on SQLITE_BUSY/LOCKED (CGIDX_RETRY_ATTEMPTS)
    pub retry_attempts: u32,

    /// Initial backoff between attempts, doubled each time (CGIDX_RETRY_BACKOFF_MS)
    pub retry_backoff_ms: u64,

    /// Read connection pool size (CGIDX_POOL_SIZE)
    pub pool_size: u32,

    /// Watcher debounce window (CGIDX_DEBOUNCE_MS)
    pub debounce_ms: u64,

    /// Files above this size are skipped (CGIDX_MAX_FILE_BYTES)
    pub max_file_bytes: u64,

    /// Extraction threads, 0 lets rayon decide (CGIDX_THREADS)
    pub threads: usize,

    /// Replacement language configuration (CGIDX_LANGUAGES)
    pub languages_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            flush_interval_ms: 2000,
            retry_attempts: 5,
            retry_backoff_ms: 50,
            pool_size: 4,
            debounce_ms: 300,
            max_file_bytes: 2 * 1024 * 1024,
            threads: 0,
            languages_path: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        let mut config = Config::default();
        override_from_env("CGIDX_BATCH_SIZE", &mut config.batch_size);
        override_from_env("CGIDX_FLUSH_INTERVAL_MS", &mut config.flush_interval_ms);
        override_from_env("CGIDX_RETRY_ATTEMPTS", &mut config.retry_attempts);
        override_from_env("CGIDX_RETRY_BACKOFF_MS", &mut config.retry_backoff_ms);
        override_from_env("CGIDX_POOL_SIZE", &mut config.pool_size);
        override_from_env("CGIDX_DEBOUNCE_MS", &mut config.debounce_ms);
        override_from_env("CGIDX_MAX_FILE_BYTES", &mut config.max_file_bytes);
        override_from_env("CGIDX_THREADS", &mut config.threads);

        if config.batch_size == 0 {
            tracing::warn!("CGIDX_BATCH_SIZE must be positive, using 1");
            config.batch_size = 1;
        }
        if config.retry_attempts == 0 {
            config.retry_attempts = 1;
        }
        if config.pool_size == 0 {
            config.pool_size = 1;
        }

        if let Ok(val) = env::var("CGIDX_LANGUAGES") {
            let trimmed = val.trim();
            if !trimmed.is_empty() {
                config.languages_path = Some(PathBuf::from(trimmed));
            }
        }

        config
    }

    /// Get the global configuration instance
    pub fn get() -> &'static Config {
        CONFIG.get_or_init(Config::from_env)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

fn override_from_env<T>(name: &str, slot: &mut T)
where
    T: FromStr + Display,
{
    let Ok(val) = env::var(name) else {
        return;
    };
    match val.trim().parse() {
        Ok(parsed) => *slot = parsed,
        Err(_) => tracing::warn!(
            "invalid {} value: {}, using default: {}",
            name,
            val,
            slot
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.retry_attempts, 5);
        assert_eq!(config.pool_size, 4);
        assert_eq!(config.debounce(), Duration::from_millis(300));
        assert!(config.languages_path.is_none());
    }

    #[test]
    fn test_override_ignores_garbage() {
        let mut value = 7usize;
        // SAFETY: test-local variable name, no other thread reads it.
        unsafe { env::set_var("CGIDX_TEST_OVERRIDE_GARBAGE", "seven") };
        override_from_env("CGIDX_TEST_OVERRIDE_GARBAGE", &mut value);
        assert_eq!(value, 7);

        unsafe { env::set_var("CGIDX_TEST_OVERRIDE_GARBAGE", " 42 ") };
        override_from_env("CGIDX_TEST_OVERRIDE_GARBAGE", &mut value);
        assert_eq!(value, 42);
        unsafe { env::remove_var("CGIDX_TEST_OVERRIDE_GARBAGE") };
    }
}
