//! Authorization configuration
//!
//! Configuration is read once at process start and never changes afterwards.
//! Sources, later ones overriding earlier ones:
//!
//! 1. An optional file (`.toml`, `.yaml`/`.yml` or `.json`)
//! 2. Environment variables prefixed `DATASTORE_AUTH_`, with `__` separating
//!    nested keys (`DATASTORE_AUTH_AUDIENCES__JOBS=datastore-jobs`). The
//!    provisioner allowlist is comma-separated
//!    (`DATASTORE_AUTH_PROVISIONER_ALLOWLIST=alice,bob`)
//!
//! The provisioner allowlist may additionally come from an access-control file
//! (`{"allowed_users": ["..."]}`) and the API service key from a secret file.
//! Every problem found here is fatal: the process must not serve traffic with a
//! configuration it could not fully validate.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{error, info};

use crate::error::AuthError;
use crate::jwt::DATA_ADMINISTRATOR_ROLE;
use crate::jwt::jwks::{DEFAULT_CACHE_TTL, DEFAULT_FETCH_TIMEOUT};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "DATASTORE_AUTH";

/// Deployment mode of the authorization engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMode {
    /// Signatures verified against the JWKS endpoint; the only mode for real data
    Full,
    /// Every check except the signature; development and test environments only
    SkipSignature,
    /// No verification at all; local development only
    Off,
}

impl AuthMode {
    /// Configuration value naming this mode
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Full => "FULL",
            AuthMode::SkipSignature => "SKIP_SIGNATURE",
            AuthMode::Off => "OFF",
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "FULL" => Ok(AuthMode::Full),
            "SKIP_SIGNATURE" => Ok(AuthMode::SkipSignature),
            "OFF" => Ok(AuthMode::Off),
            other => Err(ConfigError::InvalidMode(other.to_string())),
        }
    }
}

/// Expected audience per token purpose
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Audiences {
    /// Plain user tokens reading data
    pub data: String,
    /// Accreditation tokens for data administration (jobs)
    pub jobs: String,
    /// Accreditation tokens for datastore provisioning
    pub provisioning: String,
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The mode discriminator is not one of the three accepted values
    #[error("Invalid value for mode: {0} (expected FULL, SKIP_SIGNATURE or OFF)")]
    InvalidMode(String),

    /// A setting required by the selected mode is absent
    #[error("Missing required setting: {0}")]
    MissingValue(&'static str),

    /// A setting has an unusable value
    #[error("Invalid value for {setting}: {reason}")]
    InvalidValue {
        /// Setting name
        setting: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unsupported file format
    #[error("Unsupported configuration file format. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Configuration parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    /// Access-control or secret file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Access-control file is not valid JSON of the expected shape
    #[error("Invalid access control file {path}: {source}")]
    AccessControl {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },
}

impl From<ConfigError> for AuthError {
    fn from(error: ConfigError) -> Self {
        AuthError::Configuration(error.to_string())
    }
}

/// Validated, immutable authorization configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Deployment mode
    pub mode: AuthMode,
    /// JWKS endpoint (required in FULL mode)
    pub jwks_url: Option<String>,
    /// Expected audiences
    pub audiences: Audiences,
    /// Role required to provision datastores
    pub provisioner_role: String,
    /// User ids allowed to provision datastores
    pub provisioner_allowlist: HashSet<String>,
    /// Shared key for service-to-service calls
    pub api_service_key: SecretString,
    /// Lifespan of cached signing keys
    pub jwks_cache_ttl: Duration,
    /// Timeout for the JWKS request
    pub jwks_timeout: Duration,
    /// Clock skew tolerance for expiry checks
    pub leeway: Duration,
}

impl AuthConfig {
    /// Configuration with defaults for everything but the essentials
    pub fn new(
        mode: AuthMode,
        jwks_url: Option<String>,
        audiences: Audiences,
        api_service_key: impl Into<String>,
    ) -> Self {
        Self {
            mode,
            jwks_url,
            audiences,
            provisioner_role: DATA_ADMINISTRATOR_ROLE.to_string(),
            provisioner_allowlist: HashSet::new(),
            api_service_key: SecretString::new(api_service_key.into()),
            jwks_cache_ttl: DEFAULT_CACHE_TTL,
            jwks_timeout: DEFAULT_FETCH_TIMEOUT,
            leeway: Duration::ZERO,
        }
    }

    /// Replace the provisioner allowlist
    pub fn with_provisioners<I, S>(mut self, user_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.provisioner_allowlist = user_ids.into_iter().map(Into::into).collect();
        self
    }

    /// Set the role required to provision datastores
    pub fn with_provisioner_role(mut self, role: impl Into<String>) -> Self {
        self.provisioner_role = role.into();
        self
    }

    /// Set the signing-key cache lifespan
    pub fn with_jwks_cache_ttl(mut self, ttl: Duration) -> Self {
        self.jwks_cache_ttl = ttl;
        self
    }

    /// Load configuration from `DATASTORE_AUTH_*` environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a setting is missing, malformed, or a referenced
    /// file cannot be read.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_builder(config::Config::builder())
    }

    /// Load configuration from a file, with environment variables overriding it
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file doesn't exist
    /// - The file format is unsupported
    /// - The merged configuration is invalid
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        use config::{File, FileFormat};

        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => return Err(ConfigError::UnsupportedFormat),
        };

        let builder = config::Config::builder().add_source(File::new(
            path.to_str().ok_or(ConfigError::UnsupportedFormat)?,
            format,
        ));
        Self::from_builder(builder)
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let raw: RawAuthConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        let config = raw.validate().inspect_err(|e| {
            error!(error = %e, "Invalid authorization configuration");
        })?;

        info!(
            mode = %config.mode,
            jwks_url = ?config.jwks_url,
            provisioners = config.provisioner_allowlist.len(),
            "Authorization configuration loaded"
        );
        Ok(config)
    }
}

/// Configuration as read from the sources, before validation
#[derive(Debug, Deserialize)]
struct RawAuthConfig {
    #[serde(default = "default_mode")]
    mode: String,
    jwks_url: Option<String>,
    audiences: Option<Audiences>,
    provisioner_role: Option<String>,
    access_control_file: Option<PathBuf>,
    #[serde(default, deserialize_with = "user_list")]
    provisioner_allowlist: Vec<String>,
    api_service_key: Option<SecretString>,
    api_service_key_file: Option<PathBuf>,
    jwks_cache_ttl_secs: Option<u64>,
    jwks_timeout_secs: Option<u64>,
    #[serde(default)]
    leeway_secs: u64,
}

fn default_mode() -> String {
    AuthMode::Full.as_str().to_string()
}

/// A list from a file, or a comma-separated string from the environment
fn user_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum UserList {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match UserList::deserialize(deserializer)? {
        UserList::List(users) => users,
        UserList::Joined(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|user| !user.is_empty())
            .map(str::to_string)
            .collect(),
    })
}

/// Access-control file contents
#[derive(Debug, Deserialize)]
struct AccessControl {
    allowed_users: Vec<String>,
}

impl RawAuthConfig {
    fn validate(self) -> Result<AuthConfig, ConfigError> {
        let mode: AuthMode = self.mode.trim().parse()?;
        let enforcing = mode != AuthMode::Off;

        let jwks_url = match self.jwks_url {
            Some(jwks_url) => {
                url::Url::parse(&jwks_url).map_err(|e| ConfigError::InvalidValue {
                    setting: "jwks_url",
                    reason: e.to_string(),
                })?;
                Some(jwks_url)
            }
            None if mode == AuthMode::Full => return Err(ConfigError::MissingValue("jwks_url")),
            None => None,
        };

        let audiences = match self.audiences {
            Some(audiences) => audiences,
            None if enforcing => return Err(ConfigError::MissingValue("audiences")),
            None => Audiences {
                data: String::new(),
                jobs: String::new(),
                provisioning: String::new(),
            },
        };

        let api_service_key = match (self.api_service_key, self.api_service_key_file) {
            (Some(key), _) => key,
            (None, Some(path)) => read_secret_file(&path)?,
            (None, None) if enforcing => return Err(ConfigError::MissingValue("api_service_key")),
            (None, None) => SecretString::new(String::new()),
        };
        if enforcing && api_service_key.expose_secret().is_empty() {
            return Err(ConfigError::InvalidValue {
                setting: "api_service_key",
                reason: "must not be empty".to_string(),
            });
        }

        let mut provisioner_allowlist: HashSet<String> =
            self.provisioner_allowlist.into_iter().collect();
        if let Some(path) = &self.access_control_file {
            provisioner_allowlist.extend(read_access_control_file(path)?);
        }

        Ok(AuthConfig {
            mode,
            jwks_url,
            audiences,
            provisioner_role: self
                .provisioner_role
                .unwrap_or_else(|| DATA_ADMINISTRATOR_ROLE.to_string()),
            provisioner_allowlist,
            api_service_key,
            jwks_cache_ttl: self
                .jwks_cache_ttl_secs
                .map_or(DEFAULT_CACHE_TTL, Duration::from_secs),
            jwks_timeout: self
                .jwks_timeout_secs
                .map_or(DEFAULT_FETCH_TIMEOUT, Duration::from_secs),
            leeway: Duration::from_secs(self.leeway_secs),
        })
    }
}

/// Read the `allowed_users` list of an access-control file
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not of the form
/// `{"allowed_users": [...]}`.
pub fn read_access_control_file(path: &Path) -> Result<Vec<String>, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let access_control: AccessControl =
        serde_json::from_str(&contents).map_err(|source| ConfigError::AccessControl {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(access_control.allowed_users)
}

fn read_secret_file(path: &Path) -> Result<SecretString, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(SecretString::new(contents.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use std::io::Write;

    fn write_file(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("FULL".parse::<AuthMode>().unwrap(), AuthMode::Full);
        assert_eq!(
            "SKIP_SIGNATURE".parse::<AuthMode>().unwrap(),
            AuthMode::SkipSignature
        );
        assert_eq!("OFF".parse::<AuthMode>().unwrap(), AuthMode::Off);
        assert!(matches!(
            "full".parse::<AuthMode>(),
            Err(ConfigError::InvalidMode(value)) if value == "full"
        ));
    }

    #[test]
    #[serial]
    fn test_load_full_config_from_file() {
        let access_control = write_file(".json", r#"{"allowed_users": ["alice", "bob"]}"#);
        let config_file = write_file(
            ".toml",
            &format!(
                r#"
mode = "FULL"
jwks_url = "https://idp.example.com/jwks"
api_service_key = "service-key"
access_control_file = "{}"
jwks_cache_ttl_secs = 60

[audiences]
data = "datastore"
jobs = "datastore-jobs"
provisioning = "datastore-provisioning"
"#,
                access_control.path().display()
            ),
        );

        let config = AuthConfig::from_file(config_file.path()).unwrap();

        assert_eq!(config.mode, AuthMode::Full);
        assert_eq!(config.jwks_url.as_deref(), Some("https://idp.example.com/jwks"));
        assert_eq!(config.audiences.jobs, "datastore-jobs");
        assert_eq!(config.audiences.provisioning, "datastore-provisioning");
        assert_eq!(config.api_service_key.expose_secret(), "service-key");
        assert_eq!(config.jwks_cache_ttl, Duration::from_secs(60));
        assert_eq!(config.provisioner_role, DATA_ADMINISTRATOR_ROLE);
        assert!(config.provisioner_allowlist.contains("alice"));
        assert!(config.provisioner_allowlist.contains("bob"));
    }

    #[test]
    #[serial]
    fn test_unknown_mode_is_fatal() {
        let config_file = write_file(
            ".toml",
            r#"
mode = "MAYBE"
jwks_url = "https://idp.example.com/jwks"
api_service_key = "service-key"

[audiences]
data = "datastore"
jobs = "datastore"
provisioning = "datastore"
"#,
        );

        let result = AuthConfig::from_file(config_file.path());
        assert!(matches!(result, Err(ConfigError::InvalidMode(_))));
    }

    #[test]
    #[serial]
    fn test_full_mode_requires_jwks_url() {
        let config_file = write_file(
            ".toml",
            r#"
api_service_key = "service-key"

[audiences]
data = "datastore"
jobs = "datastore"
provisioning = "datastore"
"#,
        );

        let result = AuthConfig::from_file(config_file.path());
        assert!(matches!(result, Err(ConfigError::MissingValue("jwks_url"))));
    }

    #[test]
    #[serial]
    fn test_unreadable_access_control_file_is_fatal() {
        let config_file = write_file(
            ".toml",
            r#"
mode = "SKIP_SIGNATURE"
api_service_key = "service-key"
access_control_file = "/nonexistent/access-control.json"

[audiences]
data = "datastore"
jobs = "datastore"
provisioning = "datastore"
"#,
        );

        let result = AuthConfig::from_file(config_file.path());
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    #[serial]
    fn test_off_mode_needs_nothing_else() {
        let config_file = write_file(".toml", "mode = \"OFF\"\n");
        let config = AuthConfig::from_file(config_file.path()).unwrap();
        assert_eq!(config.mode, AuthMode::Off);
        assert!(config.jwks_url.is_none());
    }

    #[test]
    #[serial]
    fn test_api_key_from_secret_file() {
        let secret = write_file(".txt", "  from-secret-file\n");
        let config_file = write_file(
            ".toml",
            &format!(
                r#"
mode = "SKIP_SIGNATURE"
api_service_key_file = "{}"

[audiences]
data = "datastore"
jobs = "datastore"
provisioning = "datastore"
"#,
                secret.path().display()
            ),
        );

        let config = AuthConfig::from_file(config_file.path()).unwrap();
        assert_eq!(config.api_service_key.expose_secret(), "from-secret-file");
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let config_file = write_file(
            ".toml",
            r#"
mode = "FULL"
jwks_url = "https://idp.example.com/jwks"
api_service_key = "service-key"

[audiences]
data = "datastore"
jobs = "datastore"
provisioning = "datastore"
"#,
        );

        // SAFETY: tests touching the environment are serialized
        unsafe {
            std::env::set_var("DATASTORE_AUTH_MODE", "SKIP_SIGNATURE");
            std::env::set_var("DATASTORE_AUTH_AUDIENCES__JOBS", "datastore-jobs-qa");
        }

        let result = AuthConfig::from_file(config_file.path());

        unsafe {
            std::env::remove_var("DATASTORE_AUTH_MODE");
            std::env::remove_var("DATASTORE_AUTH_AUDIENCES__JOBS");
        }

        let config = result.unwrap();
        assert_eq!(config.mode, AuthMode::SkipSignature);
        assert_eq!(config.audiences.jobs, "datastore-jobs-qa");
        assert_eq!(config.audiences.data, "datastore");
    }

    #[test]
    #[serial]
    fn test_env_provisioner_allowlist_is_comma_separated() {
        // SAFETY: tests touching the environment are serialized
        unsafe {
            std::env::set_var("DATASTORE_AUTH_MODE", "SKIP_SIGNATURE");
            std::env::set_var("DATASTORE_AUTH_API_SERVICE_KEY", "0123");
            std::env::set_var("DATASTORE_AUTH_AUDIENCES__DATA", "datastore");
            std::env::set_var("DATASTORE_AUTH_AUDIENCES__JOBS", "datastore-jobs");
            std::env::set_var("DATASTORE_AUTH_AUDIENCES__PROVISIONING", "datastore-provisioning");
            std::env::set_var("DATASTORE_AUTH_PROVISIONER_ALLOWLIST", "alice, bob,");
        }

        let result = AuthConfig::from_env();

        unsafe {
            for name in [
                "DATASTORE_AUTH_MODE",
                "DATASTORE_AUTH_API_SERVICE_KEY",
                "DATASTORE_AUTH_AUDIENCES__DATA",
                "DATASTORE_AUTH_AUDIENCES__JOBS",
                "DATASTORE_AUTH_AUDIENCES__PROVISIONING",
                "DATASTORE_AUTH_PROVISIONER_ALLOWLIST",
            ] {
                std::env::remove_var(name);
            }
        }

        let config = result.unwrap();
        assert_eq!(config.provisioner_allowlist.len(), 2);
        assert!(config.provisioner_allowlist.contains("alice"));
        assert!(config.provisioner_allowlist.contains("bob"));
        // Numeric-looking secrets stay strings
        assert_eq!(config.api_service_key.expose_secret(), "0123");
    }

    #[test]
    fn test_config_error_becomes_configuration_auth_error() {
        let error: AuthError = ConfigError::InvalidMode("MAYBE".into()).into();
        assert!(matches!(error, AuthError::Configuration(message) if message.contains("MAYBE")));
    }
}
