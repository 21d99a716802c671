//! Profile management
//!
//! A profile names an S3-compatible endpoint, the bucket projects are synced
//! into, and the credentials used to reach it.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::ConfigManager;
use crate::error::{Error, Result};

/// Retry configuration handed to the S3 client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff duration in milliseconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration in milliseconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    100
}

fn default_max_backoff() -> u64 {
    10000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

/// Timeout configuration handed to the S3 client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,

    /// Read timeout in milliseconds
    #[serde(default = "default_read_timeout")]
    pub read_ms: u64,
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_read_timeout() -> u64 {
    30000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: default_connect_timeout(),
            read_ms: default_read_timeout(),
        }
    }
}

/// A named storage target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Unique name for this profile
    pub name: String,

    /// S3 endpoint URL
    pub endpoint: String,

    /// Bucket holding the project namespaces
    pub bucket: String,

    /// Access key ID
    pub access_key: String,

    /// Secret access key
    pub secret_key: String,

    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,

    /// Bucket lookup style: "auto", "path", or "dns"
    #[serde(default = "default_bucket_lookup")]
    pub bucket_lookup: String,

    /// Retry configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,

    /// Timeout configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<TimeoutConfig>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_bucket_lookup() -> String {
    "auto".to_string()
}

impl Profile {
    /// Create a new profile with required fields
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            region: default_region(),
            bucket_lookup: default_bucket_lookup(),
            retry: None,
            timeout: None,
        }
    }

    /// Check that the profile can be used to reach the store
    ///
    /// Runs before any sync starts; a failure here is a configuration error.
    pub fn validate(&self) -> Result<()> {
        let missing = [
            ("name", &self.name),
            ("endpoint", &self.endpoint),
            ("bucket", &self.bucket),
            ("access key", &self.access_key),
            ("secret key", &self.secret_key),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect::<Vec<_>>();

        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "Profile '{}' is missing: {}",
                self.name,
                missing.join(", ")
            )));
        }

        let url = Url::parse(&self.endpoint)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "Endpoint must use http or https, got '{}'",
                url.scheme()
            )));
        }

        if !matches!(self.bucket_lookup.as_str(), "auto" | "path" | "dns") {
            return Err(Error::Config(format!(
                "Unknown bucket lookup style '{}'",
                self.bucket_lookup
            )));
        }

        Ok(())
    }

    /// Get the effective retry configuration
    pub fn retry_config(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }

    /// Get the effective timeout configuration
    pub fn timeout_config(&self) -> TimeoutConfig {
        self.timeout.clone().unwrap_or_default()
    }
}

/// Manager for profile operations
pub struct ProfileManager {
    config_manager: ConfigManager,
}

impl ProfileManager {
    /// Create a new ProfileManager with a specific ConfigManager
    pub fn with_config_manager(config_manager: ConfigManager) -> Self {
        Self { config_manager }
    }

    /// Create a new ProfileManager using the default config location
    pub fn new() -> Result<Self> {
        let config_manager = ConfigManager::new()?;
        Ok(Self { config_manager })
    }

    /// List all configured profiles
    pub fn list(&self) -> Result<Vec<Profile>> {
        let config = self.config_manager.load()?;
        Ok(config.profiles)
    }

    /// Name of the default profile, if one is set
    pub fn default_name(&self) -> Result<Option<String>> {
        Ok(self.config_manager.load()?.defaults.profile)
    }

    /// Get a profile by name
    pub fn get(&self, name: &str) -> Result<Profile> {
        let config = self.config_manager.load()?;
        config
            .profiles
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| Error::ProfileNotFound(name.to_string()))
    }

    /// Profile to use for an operation
    ///
    /// An explicit name wins, then the configured default, then the only
    /// profile if exactly one exists.
    pub fn resolve(&self, name: Option<&str>) -> Result<Profile> {
        let config = self.config_manager.load()?;
        let wanted = name.map(str::to_string).or(config.defaults.profile);

        let profile = match wanted {
            Some(wanted) => config
                .profiles
                .into_iter()
                .find(|p| p.name == wanted)
                .ok_or(Error::ProfileNotFound(wanted))?,
            None => {
                let mut profiles = config.profiles;
                match profiles.len() {
                    1 => profiles.remove(0),
                    0 => {
                        return Err(Error::Config(
                            "No profile configured. Run 'bsync profile set' first.".into(),
                        ));
                    }
                    _ => {
                        return Err(Error::Config(
                            "Several profiles configured; pick one with --profile".into(),
                        ));
                    }
                }
            }
        };

        profile.validate()?;
        Ok(profile)
    }

    /// Add or update a profile, optionally making it the default
    pub fn set(&self, profile: Profile, make_default: bool) -> Result<()> {
        profile.validate()?;
        let mut config = self.config_manager.load()?;

        if make_default {
            config.defaults.profile = Some(profile.name.clone());
        }
        config.profiles.retain(|p| p.name != profile.name);
        config.profiles.push(profile);

        self.config_manager.save(&config)
    }

    /// Remove a profile, clearing the default if it pointed at it
    pub fn remove(&self, name: &str) -> Result<()> {
        let mut config = self.config_manager.load()?;
        let original_len = config.profiles.len();

        config.profiles.retain(|p| p.name != name);

        if config.profiles.len() == original_len {
            return Err(Error::ProfileNotFound(name.to_string()));
        }
        if config.defaults.profile.as_deref() == Some(name) {
            config.defaults.profile = None;
        }

        self.config_manager.save(&config)
    }

    /// Check if a profile exists
    pub fn exists(&self, name: &str) -> Result<bool> {
        let config = self.config_manager.load()?;
        Ok(config.profiles.iter().any(|p| p.name == name))
    }
}
