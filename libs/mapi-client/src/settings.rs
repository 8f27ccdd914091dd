//! Client settings: defaults, then an optional YAML file, then `MAPI_*`
//! environment variables (`__` separates nested keys, e.g.
//! `MAPI_THROTTLE__CALLS_PER_INTERVAL=6`).

use crate::credentials::Credentials;
use crate::error::ApiError;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use mapi_http::{RetryPolicy, ThrottleConfig};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default management API endpoint
pub const DEFAULT_BASE_URL: &str = "https://mapi.storyblok.com/v1/spaces";

/// Largest page size accepted by list endpoints
pub const MAX_PER_PAGE: u32 = 1000;

/// Prefix of environment variables read by [`ClientSettings::load`]
pub const ENV_PREFIX: &str = "MAPI_";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub base_url: String,
    pub space_id: Option<u64>,
    /// Personal access token. Never serialized; normally set via `MAPI_API_TOKEN`.
    #[serde(skip_serializing, deserialize_with = "deserialize_secret")]
    pub api_token: Option<SecretString>,
    /// Per-attempt timeout
    pub request_timeout_ms: u64,
    pub throttle: ThrottleSettings,
    /// Throttle for the asset storage host; unthrottled when absent
    pub upload_throttle: Option<ThrottleSettings>,
    pub retry: RetrySettings,
    pub max_per_page: u32,
    pub cache: CacheSettings,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            space_id: None,
            api_token: None,
            request_timeout_ms: 30_000,
            throttle: ThrottleSettings::default(),
            upload_throttle: None,
            retry: RetrySettings::default(),
            max_per_page: MAX_PER_PAGE,
            cache: CacheSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleSettings {
    pub calls_per_interval: usize,
    pub interval_ms: u64,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            calls_per_interval: mapi_http::DEFAULT_CALLS_PER_INTERVAL,
            interval_ms: 1000,
        }
    }
}

impl ThrottleSettings {
    #[must_use]
    pub fn to_config(self) -> ThrottleConfig {
        ThrottleConfig::new(self.calls_per_interval, Duration::from_millis(self.interval_ms))
    }

    fn validate(self, section: &str) -> Result<(), ApiError> {
        if self.calls_per_interval == 0 {
            return Err(ApiError::InvalidConfig(format!(
                "{section}.calls_per_interval must be greater than 0"
            )));
        }
        if self.interval_ms == 0 {
            return Err(ApiError::InvalidConfig(format!(
                "{section}.interval_ms must be greater than 0"
            )));
        }
        Ok(())
    }
}

/// One named retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPreset {
    pub retries: u32,
    pub retry_delay_ms: u64,
    pub max_jitter_ms: u64,
}

impl Default for RetryPreset {
    fn default() -> Self {
        Self::from_policy(RetryPolicy::burst())
    }
}

impl RetryPreset {
    fn from_policy(policy: RetryPolicy) -> Self {
        Self {
            retries: policy.retries,
            retry_delay_ms: u64::try_from(policy.retry_delay.as_millis()).unwrap_or(u64::MAX),
            max_jitter_ms: u64::try_from(policy.max_jitter.as_millis()).unwrap_or(u64::MAX),
        }
    }

    #[must_use]
    pub fn to_policy(self) -> RetryPolicy {
        RetryPolicy::new(self.retries, Duration::from_millis(self.retry_delay_ms))
            .with_max_jitter(Duration::from_millis(self.max_jitter_ms))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Ordinary reads and writes
    pub burst: RetryPreset,
    /// Asset registration
    pub extended: RetryPreset,
    /// Uploads to asset storage
    pub upload: RetryPreset,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            burst: RetryPreset::from_policy(RetryPolicy::burst()),
            extended: RetryPreset::from_policy(RetryPolicy::extended()),
            upload: RetryPreset::from_policy(RetryPolicy::upload()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    /// Clear the cache after every successful write
    pub auto_invalidate: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            auto_invalidate: true,
        }
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

impl ClientSettings {
    /// Layered provider: defaults, then `path` if given, then `MAPI_*` env.
    #[must_use]
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(ClientSettings::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate settings.
    ///
    /// # Errors
    /// Returns `ApiError::Io` if `path` does not exist, `ApiError::Config`
    /// if a provider fails to parse and `ApiError::InvalidConfig` if a value
    /// is out of range.
    pub fn load(path: Option<&Path>) -> Result<Self, ApiError> {
        if let Some(path) = path {
            if !path.is_file() {
                return Err(ApiError::Io {
                    path: path.to_path_buf(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "config file does not exist",
                    ),
                });
            }
        }
        Self::from_figment(&Self::figment(path))
    }

    /// Extract and validate settings from an arbitrary provider stack.
    ///
    /// # Errors
    /// Returns `ApiError::Config` or `ApiError::InvalidConfig`.
    pub fn from_figment(figment: &Figment) -> Result<Self, ApiError> {
        let settings: ClientSettings = figment.extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// # Errors
    /// Returns `ApiError::InvalidConfig` naming the first offending key.
    pub fn validate(&self) -> Result<(), ApiError> {
        self.throttle.validate("throttle")?;
        if let Some(upload) = self.upload_throttle {
            upload.validate("upload_throttle")?;
        }
        if self.max_per_page == 0 || self.max_per_page > MAX_PER_PAGE {
            return Err(ApiError::InvalidConfig(format!(
                "max_per_page must be within 1..={MAX_PER_PAGE}, got {}",
                self.max_per_page
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(ApiError::InvalidConfig(
                "request_timeout_ms must be greater than 0".to_owned(),
            ));
        }
        url::Url::parse(&self.base_url).map_err(|e| {
            ApiError::InvalidConfig(format!("base_url '{}' is invalid: {e}", self.base_url))
        })?;
        Ok(())
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Credentials built from `api_token` and `space_id`.
    ///
    /// # Errors
    /// Returns `ApiError::InvalidConfig` if no token is configured.
    pub fn credentials(&self) -> Result<Credentials, ApiError> {
        let token = self.api_token.clone().ok_or_else(|| {
            ApiError::InvalidConfig(format!("api_token is not set (use {ENV_PREFIX}API_TOKEN)"))
        })?;
        Ok(Credentials::new(token, self.space_id))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let settings = ClientSettings::default();
        settings.validate().unwrap();
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.throttle.calls_per_interval, 3);
        assert_eq!(settings.throttle.interval_ms, 1000);
        assert_eq!(settings.max_per_page, 1000);
        assert_eq!(settings.retry.burst.retries, 5);
        assert_eq!(settings.retry.extended.retries, 20);
        assert_eq!(settings.retry.extended.retry_delay_ms, 1250);
        assert_eq!(settings.retry.upload.retries, 10);
        assert!(!settings.cache.enabled);
        assert!(settings.cache.auto_invalidate);
    }

    #[test]
    fn yaml_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "space_id: 12345\n\
             max_per_page: 100\n\
             throttle:\n  calls_per_interval: 6\n\
             retry:\n  extended:\n    retries: 3\n\
             cache:\n  enabled: true"
        )
        .unwrap();

        let figment = Figment::from(Serialized::defaults(ClientSettings::default()))
            .merge(Yaml::file(file.path()));
        let settings = ClientSettings::from_figment(&figment).unwrap();

        assert_eq!(settings.space_id, Some(12345));
        assert_eq!(settings.max_per_page, 100);
        assert_eq!(settings.throttle.calls_per_interval, 6);
        assert_eq!(settings.throttle.interval_ms, 1000);
        assert_eq!(settings.retry.extended.retries, 3);
        assert_eq!(settings.retry.extended.retry_delay_ms, 1250);
        assert_eq!(settings.retry.burst.retries, 5);
        assert!(settings.cache.enabled);
    }

    #[test]
    fn env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("mapi.yaml", "space_id: 1\nthrottle:\n  calls_per_interval: 6\n")?;
            jail.set_env("MAPI_SPACE_ID", "42");
            jail.set_env("MAPI_API_TOKEN", "pat-from-env");
            jail.set_env("MAPI_THROTTLE__INTERVAL_MS", "2000");

            let settings = ClientSettings::load(Some(Path::new("mapi.yaml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(settings.space_id, Some(42));
            assert_eq!(settings.throttle.calls_per_interval, 6);
            assert_eq!(settings.throttle.interval_ms, 2000);

            let creds = settings.credentials().map_err(|e| e.to_string())?;
            assert_eq!(creds.api_token().expose_secret(), "pat-from-env");
            assert_eq!(creds.space_id(), Some(42));
            Ok(())
        });
    }

    #[test]
    fn token_is_never_serialized() {
        let settings = ClientSettings {
            api_token: Some(SecretString::from("pat-secret")),
            ..ClientSettings::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        assert!(!json.contains("pat-secret"));
        assert!(!json.contains("api_token"));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let zero_budget = ClientSettings {
            throttle: ThrottleSettings {
                calls_per_interval: 0,
                interval_ms: 1000,
            },
            ..ClientSettings::default()
        };
        assert!(matches!(
            zero_budget.validate(),
            Err(ApiError::InvalidConfig(msg)) if msg.contains("calls_per_interval")
        ));

        let zero_interval = ClientSettings {
            upload_throttle: Some(ThrottleSettings {
                calls_per_interval: 3,
                interval_ms: 0,
            }),
            ..ClientSettings::default()
        };
        assert!(matches!(
            zero_interval.validate(),
            Err(ApiError::InvalidConfig(msg)) if msg.contains("upload_throttle.interval_ms")
        ));

        for max_per_page in [0, 1001] {
            let settings = ClientSettings {
                max_per_page,
                ..ClientSettings::default()
            };
            assert!(settings.validate().is_err());
        }

        let bad_url = ClientSettings {
            base_url: "not a url".to_owned(),
            ..ClientSettings::default()
        };
        assert!(bad_url.validate().is_err());
    }

    #[test]
    fn missing_config_file_is_reported() {
        let err = ClientSettings::load(Some(Path::new("/nonexistent/mapi.yaml"))).unwrap_err();
        assert!(matches!(err, ApiError::Io { .. }));
    }

    #[test]
    fn missing_token_is_a_config_error() {
        let err = ClientSettings::default().credentials().unwrap_err();
        assert!(matches!(err, ApiError::InvalidConfig(msg) if msg.contains("MAPI_API_TOKEN")));
    }

    #[test]
    fn presets_convert_to_policies() {
        let policy = RetryPreset {
            retries: 2,
            retry_delay_ms: 50,
            max_jitter_ms: 5,
        }
        .to_policy();
        assert_eq!(policy.retries, 2);
        assert_eq!(policy.retry_delay, Duration::from_millis(50));
        assert_eq!(policy.max_jitter, Duration::from_millis(5));
    }
}
