//! Client configuration
//!
//! [`ArchivistConfig`] can be built in code, parsed from TOML, or read from the
//! environment:
//!
//! | variable | field |
//! |---|---|
//! | `ARCHIVIST_URL` | `url` |
//! | `ARCHIVIST_AUTH_TOKEN_FILE` | `auth_token_file` |
//! | `ARCHIVIST_MAX_TIME` | `max_time_secs` |
//! | `ARCHIVIST_LOG` | `log_filter` |

use crate::error::ArchivistError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default confirmation budget in seconds
pub const DEFAULT_MAX_TIME_SECS: f64 = 1200.0;

/// Capped exponential backoff between confirmation polls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    /// Delay before the second poll
    pub initial_interval_ms: u64,
    /// Upper bound on any single delay
    pub max_interval_ms: u64,
    /// Growth factor per attempt
    pub multiplier: f64,
    /// Fraction of the delay randomised either way (0.0 - 1.0)
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_interval_ms: 1_000,
            max_interval_ms: 60_000,
            multiplier: 2.0,
            jitter: 0.0,
        }
    }
}

impl BackoffPolicy {
    /// Fixed delay, mostly useful in tests
    #[inline]
    #[must_use]
    pub fn constant(interval: Duration) -> Self {
        let ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        Self {
            initial_interval_ms: ms,
            max_interval_ms: ms,
            multiplier: 1.0,
            jitter: 0.0,
        }
    }

    /// With initial interval
    #[inline]
    #[must_use]
    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With max interval
    #[inline]
    #[must_use]
    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With multiplier
    #[inline]
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    /// With jitter
    #[inline]
    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay after the given attempt (0-indexed)
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = self.initial_interval_ms as f64 * self.multiplier.max(1.0).powi(exponent);
        let capped = base.min(self.max_interval_ms as f64);

        let delay_ms = if self.jitter > 0.0 {
            let spread = capped * self.jitter;
            let offset = rand::rng().random_range(-spread..=spread);
            (capped + offset).clamp(0.0, self.max_interval_ms as f64)
        } else {
            capped
        };

        Duration::from_micros((delay_ms * 1000.0).round() as u64)
    }
}

/// Connection parameters for one tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchivistConfig {
    /// Service URL, without trailing `/`
    pub url: String,
    /// File holding the bearer token
    pub auth_token_file: Option<PathBuf>,
    /// Confirmation budget in seconds
    pub max_time_secs: f64,
    /// Verify TLS certificates
    pub verify_tls: bool,
    /// Page size for listings; service default when unset
    pub page_size: Option<u32>,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Attempts the HTTP transport makes after a 429; zero disables
    pub rate_limit_retries: u32,
    /// Poll backoff
    pub backoff: BackoffPolicy,
    /// `tracing` filter directive, e.g. `archivist_client=debug`
    pub log_filter: Option<String>,
}

impl Default for ArchivistConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            auth_token_file: None,
            max_time_secs: DEFAULT_MAX_TIME_SECS,
            verify_tls: true,
            page_size: None,
            request_timeout_secs: 30,
            rate_limit_retries: 3,
            backoff: BackoffPolicy::default(),
            log_filter: None,
        }
    }
}

impl ArchivistConfig {
    /// Configuration for `url` with defaults elsewhere
    #[inline]
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// With confirmation budget
    #[inline]
    #[must_use]
    pub fn with_max_time(mut self, max_time: Duration) -> Self {
        self.max_time_secs = max_time.as_secs_f64();
        self
    }

    /// With backoff
    #[inline]
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// With token file
    #[inline]
    #[must_use]
    pub fn with_auth_token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.auth_token_file = Some(path.into());
        self
    }

    /// With TLS verification toggle
    #[inline]
    #[must_use]
    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    /// With page size
    #[inline]
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Confirmation budget
    #[inline]
    #[must_use]
    pub fn max_time(&self) -> Duration {
        Duration::try_from_secs_f64(self.max_time_secs.max(0.0)).unwrap_or(Duration::MAX)
    }

    /// Parse from TOML
    pub fn from_toml_str(source: &str) -> Result<Self, ArchivistError> {
        let config: Self =
            toml::from_str(source).map_err(|e| ArchivistError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ArchivistError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| ArchivistError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Build from `ARCHIVIST_*` environment variables
    pub fn from_env() -> Result<Self, ArchivistError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ArchivistError> {
        let url = lookup("ARCHIVIST_URL")
            .ok_or_else(|| ArchivistError::Config("ARCHIVIST_URL is not set".into()))?;
        let mut config = Self::new(url);

        if let Some(path) = lookup("ARCHIVIST_AUTH_TOKEN_FILE") {
            config.auth_token_file = Some(PathBuf::from(path));
        }
        if let Some(max_time) = lookup("ARCHIVIST_MAX_TIME") {
            config.max_time_secs = max_time.parse().map_err(|_| {
                ArchivistError::Config(format!("ARCHIVIST_MAX_TIME is not a number: {max_time}"))
            })?;
        }
        config.log_filter = lookup("ARCHIVIST_LOG");

        config.validate()?;
        Ok(config)
    }

    /// Check invariants
    pub fn validate(&self) -> Result<(), ArchivistError> {
        if self.url.is_empty() {
            return Err(ArchivistError::Config("url is empty".into()));
        }
        if self.url.ends_with('/') {
            return Err(ArchivistError::Config(format!(
                "url {} has trailing /",
                self.url
            )));
        }
        if !(self.max_time_secs.is_finite() && self.max_time_secs > 0.0) {
            return Err(ArchivistError::Config(format!(
                "max_time_secs must be positive, got {}",
                self.max_time_secs
            )));
        }
        if Duration::try_from_secs_f64(self.max_time_secs).is_err() {
            return Err(ArchivistError::Config(format!(
                "max_time_secs {} is out of range",
                self.max_time_secs
            )));
        }
        if !(self.backoff.jitter.is_finite() && (0.0..=1.0).contains(&self.backoff.jitter)) {
            return Err(ArchivistError::Config(format!(
                "backoff.jitter must be within 0.0 - 1.0, got {}",
                self.backoff.jitter
            )));
        }
        if !(self.backoff.multiplier.is_finite() && self.backoff.multiplier >= 1.0) {
            return Err(ArchivistError::Config(format!(
                "backoff.multiplier must be at least 1.0, got {}",
                self.backoff.multiplier
            )));
        }
        Ok(())
    }

    /// Read the bearer token from `auth_token_file`, if configured
    pub fn load_auth_token(&self) -> Result<Option<String>, ArchivistError> {
        let Some(path) = &self.auth_token_file else {
            return Ok(None);
        };
        let token = std::fs::read_to_string(path)
            .map_err(|e| ArchivistError::Config(format!("{}: {e}", path.display())))?;
        let token = token.trim();
        if token.is_empty() {
            return Err(ArchivistError::Config(format!(
                "{} is empty",
                path.display()
            )));
        }
        Ok(Some(token.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn backoff_grows_and_caps() {
        let backoff = BackoffPolicy::default()
            .with_initial_interval(Duration::from_millis(100))
            .with_max_interval(Duration::from_millis(500));

        assert_eq!(backoff.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(backoff.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(backoff.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(backoff.delay_for_attempt(3), Duration::from_millis(500));
        assert_eq!(backoff.delay_for_attempt(40), Duration::from_millis(500));
    }

    #[test]
    fn backoff_jitter_stays_within_bounds() {
        let backoff = BackoffPolicy::default()
            .with_initial_interval(Duration::from_millis(100))
            .with_max_interval(Duration::from_millis(1000))
            .with_jitter(0.5);

        for _ in 0..100 {
            let delay = backoff.delay_for_attempt(1);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(300));
        }
    }

    #[test]
    fn config_from_toml() {
        let config = ArchivistConfig::from_toml_str(
            r#"
            url = "https://app.example.io"
            max_time_secs = 30.0
            page_size = 50

            [backoff]
            initial_interval_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.url, "https://app.example.io");
        assert_eq!(config.max_time(), Duration::from_secs(30));
        assert_eq!(config.page_size, Some(50));
        assert_eq!(config.backoff.initial_interval_ms, 250);
        assert_eq!(config.backoff.max_interval_ms, 60_000);
        assert!(config.verify_tls);
    }

    #[test]
    fn config_rejects_trailing_slash() {
        let err = ArchivistConfig::new("https://app.example.io/").validate().unwrap_err();
        assert!(err.to_string().contains("trailing /"));
    }

    #[test]
    fn config_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("ARCHIVIST_URL", "https://app.example.io"),
            ("ARCHIVIST_MAX_TIME", "12.5"),
            ("ARCHIVIST_LOG", "debug"),
        ]
        .into_iter()
        .collect();

        let config =
            ArchivistConfig::from_lookup(|k| vars.get(k).map(|v| (*v).to_string())).unwrap();
        assert_eq!(config.max_time_secs, 12.5);
        assert_eq!(config.log_filter.as_deref(), Some("debug"));

        assert!(ArchivistConfig::from_lookup(|_| None).is_err());
    }

    #[test]
    fn config_rejects_unrepresentable_max_time() {
        for huge in ["1e30", "1e20"] {
            let vars: HashMap<&str, &str> = [
                ("ARCHIVIST_URL", "https://app.example.io"),
                ("ARCHIVIST_MAX_TIME", huge),
            ]
            .into_iter()
            .collect();
            let err = ArchivistConfig::from_lookup(|k| vars.get(k).map(|v| (*v).to_string()))
                .unwrap_err();
            assert!(err.to_string().contains("out of range"), "{huge}: {err}");
        }
    }

    #[test]
    fn max_time_saturates_instead_of_panicking() {
        let mut config = ArchivistConfig::new("https://x");
        config.max_time_secs = 1e30;
        assert_eq!(config.max_time(), Duration::MAX);

        config.max_time_secs = 1e19;
        assert!(config.validate().is_ok());
        assert_eq!(config.max_time(), Duration::from_secs(10_000_000_000_000_000_000));
    }

    #[test]
    fn config_rejects_bad_backoff_from_toml() {
        let err = ArchivistConfig::from_toml_str(
            r#"
            url = "https://app.example.io"

            [backoff]
            jitter = inf
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("backoff.jitter"));

        let err = ArchivistConfig::from_toml_str(
            r#"
            url = "https://app.example.io"

            [backoff]
            multiplier = 0.5
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("backoff.multiplier"));

        let nan = ArchivistConfig::new("https://x")
            .with_backoff(BackoffPolicy { jitter: f64::NAN, ..BackoffPolicy::default() });
        assert!(nan.validate().is_err());
    }

    #[test]
    fn load_auth_token_trims() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  secret-token  ").unwrap();

        let config = ArchivistConfig::new("https://x").with_auth_token_file(file.path());
        assert_eq!(config.load_auth_token().unwrap().as_deref(), Some("secret-token"));
        assert_eq!(ArchivistConfig::new("https://x").load_auth_token().unwrap(), None);
    }
}
