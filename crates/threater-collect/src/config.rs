//! Configuration management for the ThreatER collector
//!
//! Settings are resolved once per invocation, in increasing precedence:
//! built-in defaults, the `threater.toml` file, then `THREATER_*` environment
//! variables. Secrets (API key, proxy password) are never read from the file
//! itself, only from the environment or from a referenced secret file.

use crate::error::{CollectError, Result};
use crate::streams::StreamGroup;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "threater.toml";

/// Per-request timeout when the setting is absent.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Value-level view of the `[settings]` stanza. Booleans and numbers are
/// accepted natively or as strings such as `"true"` and `"1"`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    api_base_url: Option<String>,
    request_timeout: Option<Scalar>,
    verify_ssl: Option<Scalar>,
    proxy_enabled: Option<Scalar>,
    proxy_url: Option<String>,
    proxy_username: Option<String>,
    api_key_file: Option<PathBuf>,
    proxy_password_file: Option<PathBuf>,
    max_pages: Option<Scalar>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileToggles {
    events: Option<Scalar>,
    lists: Option<Scalar>,
    enforcers: Option<Scalar>,
    networks: Option<Scalar>,
    users: Option<Scalar>,
    reports: Option<Scalar>,
}

/// Parsed `threater.toml`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SettingsFile {
    settings: FileSettings,
    collect: FileToggles,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl Scalar {
    fn to_flag(&self, field: &str) -> Result<bool> {
        match self {
            Scalar::Bool(b) => Ok(*b),
            Scalar::Int(i) => Ok(*i != 0),
            Scalar::Str(s) => parse_flag(field, s),
        }
    }

    fn to_u64(&self, field: &str) -> Result<u64> {
        match self {
            Scalar::Int(i) if *i >= 0 => Ok(*i as u64),
            Scalar::Str(s) => parse_u64(field, s),
            _ => Err(CollectError::config(format!(
                "'{}' must be a non-negative integer",
                field
            ))),
        }
    }
}

/// Parse the checkbox-style boolean forms the setup handler persists.
pub fn parse_flag(field: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        other => Err(CollectError::config(format!(
            "'{}' must be a boolean, got '{}'",
            field, other
        ))),
    }
}

fn parse_u64(field: &str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|_| {
        CollectError::config(format!(
            "'{}' must be a non-negative integer, got '{}'",
            field, value
        ))
    })
}

impl SettingsFile {
    /// Read a settings file.
    ///
    /// `Ok(None)` means the file does not exist (not configured); any other
    /// I/O or syntax problem is an error.
    pub fn read(path: &Path) -> Result<Option<Self>> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CollectError::config(format!(
                    "cannot read '{}': {}",
                    path.display(),
                    e
                )))
            },
        };
        Self::parse(&contents)
            .map(Some)
            .map_err(|e| CollectError::config(format!("invalid '{}': {}", path.display(), e)))
    }

    pub fn parse(contents: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}

/// Optional HTTP(S) proxy
#[derive(Clone, PartialEq, Eq)]
pub struct ProxySettings {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for ProxySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxySettings")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Immutable connection settings for one run
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub base_url: Url,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub verify_ssl: bool,
    pub proxy: Option<ProxySettings>,
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("timeout_secs", &self.timeout_secs)
            .field("verify_ssl", &self.verify_ssl)
            .field("proxy", &self.proxy)
            .finish()
    }
}

impl ConnectionConfig {
    /// Connection to `base_url` with every other setting at its default.
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            verify_ssl: true,
            proxy: None,
        })
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Collection runs need credentials; diagnostics do not.
    pub fn require_credentials(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                CollectError::config("API key is not configured (set THREATER_API_KEY or api_key_file)")
            })
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| CollectError::config(format!("invalid API base URL '{}': {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(CollectError::config(format!(
            "API base URL must be http or https, got '{}'",
            other
        ))),
    }
}

/// Which stream groups are switched on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamToggles {
    pub events: bool,
    pub lists: bool,
    pub enforcers: bool,
    pub networks: bool,
    pub users: bool,
    pub reports: bool,
}

impl Default for StreamToggles {
    fn default() -> Self {
        Self {
            events: true,
            lists: true,
            enforcers: true,
            networks: true,
            users: true,
            reports: true,
        }
    }
}

impl StreamToggles {
    pub fn is_enabled(&self, group: StreamGroup) -> bool {
        match group {
            StreamGroup::Events => self.events,
            StreamGroup::Lists => self.lists,
            StreamGroup::Enforcers => self.enforcers,
            StreamGroup::Networks => self.networks,
            StreamGroup::Users => self.users,
            StreamGroup::Reports => self.reports,
        }
    }

    fn apply(&mut self, file: &FileToggles) -> Result<()> {
        let slots: [(&mut bool, &Option<Scalar>, &str); 6] = [
            (&mut self.events, &file.events, "collect.events"),
            (&mut self.lists, &file.lists, "collect.lists"),
            (&mut self.enforcers, &file.enforcers, "collect.enforcers"),
            (&mut self.networks, &file.networks, "collect.networks"),
            (&mut self.users, &file.users, "collect.users"),
            (&mut self.reports, &file.reports, "collect.reports"),
        ];
        for (slot, value, field) in slots {
            if let Some(v) = value {
                *slot = v.to_flag(field)?;
            }
        }
        Ok(())
    }
}

/// Fully resolved settings for one invocation
#[derive(Debug, Clone)]
pub struct Settings {
    base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub verify_ssl: bool,
    pub proxy: Option<ProxySettings>,
    pub max_pages: Option<u32>,
    pub toggles: StreamToggles,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            verify_ssl: true,
            proxy: None,
            max_pages: None,
            toggles: StreamToggles::default(),
        }
    }
}

impl Settings {
    /// Load from the process environment and the given (or default) file.
    ///
    /// An explicitly named file must exist; the default one is optional.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let file = match config_path {
            Some(path) => Some(SettingsFile::read(path)?.ok_or_else(|| {
                CollectError::config(format!("config file '{}' not found", path.display()))
            })?),
            None => SettingsFile::read(Path::new(DEFAULT_CONFIG_FILE))?,
        };
        Self::resolve(file, |name| std::env::var(name).ok())
    }

    /// Merge a parsed file and an environment lookup over the defaults.
    pub fn resolve<F>(file: Option<SettingsFile>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();
        let file = file.unwrap_or_default();
        let s = &file.settings;

        settings.base_url = s.api_base_url.clone();
        if let Some(ref v) = s.request_timeout {
            settings.timeout_secs = v.to_u64("request_timeout")?;
        }
        if let Some(ref v) = s.verify_ssl {
            settings.verify_ssl = v.to_flag("verify_ssl")?;
        }
        let mut proxy_enabled = match s.proxy_enabled {
            Some(ref v) => v.to_flag("proxy_enabled")?,
            None => false,
        };
        let mut proxy_url = s.proxy_url.clone();
        let mut proxy_username = s.proxy_username.clone();
        if let Some(ref v) = s.max_pages {
            settings.max_pages = Some(to_page_limit(v.to_u64("max_pages")?)?);
        }
        settings.toggles.apply(&file.collect)?;

        // Environment overrides
        if let Some(v) = env("THREATER_BASE_URL") {
            settings.base_url = Some(v);
        }
        if let Some(v) = env("THREATER_TIMEOUT_SECS") {
            settings.timeout_secs = parse_u64("THREATER_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = env("THREATER_VERIFY_SSL") {
            settings.verify_ssl = parse_flag("THREATER_VERIFY_SSL", &v)?;
        }
        if let Some(v) = env("THREATER_PROXY_ENABLED") {
            proxy_enabled = parse_flag("THREATER_PROXY_ENABLED", &v)?;
        }
        if let Some(v) = env("THREATER_PROXY_URL") {
            proxy_url = Some(v);
        }
        if let Some(v) = env("THREATER_PROXY_USERNAME") {
            proxy_username = Some(v);
        }
        if let Some(v) = env("THREATER_MAX_PAGES") {
            settings.max_pages = Some(to_page_limit(parse_u64("THREATER_MAX_PAGES", &v)?)?);
        }

        if settings.timeout_secs == 0 {
            return Err(CollectError::config("request timeout must be a positive number of seconds"));
        }

        settings.api_key = secret(&env, "THREATER_API_KEY", s.api_key_file.as_deref())?;

        if proxy_enabled {
            let url = proxy_url
                .filter(|u| !u.trim().is_empty())
                .ok_or_else(|| CollectError::config("proxy is enabled but proxy_url is empty"))?;
            settings.proxy = Some(ProxySettings {
                url,
                username: proxy_username.filter(|u| !u.is_empty()),
                password: secret(
                    &env,
                    "THREATER_PROXY_PASSWORD",
                    s.proxy_password_file.as_deref(),
                )?,
            });
        }

        Ok(settings)
    }

    /// Connection settings; fails when no base URL is configured.
    pub fn connection(&self) -> Result<ConnectionConfig> {
        let raw = self
            .base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                CollectError::config("API base URL is not configured (api_base_url / THREATER_BASE_URL)")
            })?;

        Ok(ConnectionConfig {
            base_url: parse_base_url(raw)?,
            api_key: self.api_key.clone(),
            timeout_secs: self.timeout_secs,
            verify_ssl: self.verify_ssl,
            proxy: self.proxy.clone(),
        })
    }
}

fn to_page_limit(value: u64) -> Result<u32> {
    match u32::try_from(value) {
        Ok(0) | Err(_) => Err(CollectError::config(
            "max_pages must be between 1 and 4294967295",
        )),
        Ok(v) => Ok(v),
    }
}

/// Environment variable first, then the secret file. A file that is named
/// but unreadable is an error rather than "not configured".
fn secret<F>(env: &F, var: &str, file: Option<&Path>) -> Result<Option<String>>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = env(var).filter(|v| !v.is_empty()) {
        return Ok(Some(v));
    }
    match file {
        Some(path) => {
            let raw = std::fs::read_to_string(path).map_err(|e| {
                CollectError::config(format!("cannot read secret file '{}': {}", path.display(), e))
            })?;
            let value = raw.trim().to_string();
            Ok((!value.is_empty()).then_some(value))
        },
        None => Ok(None),
    }
}

/// Default location of the checkpoint database.
pub fn default_state_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("threater"))
        .unwrap_or_else(|| PathBuf::from(".threater"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn file(contents: &str) -> Option<SettingsFile> {
        Some(SettingsFile::parse(contents).unwrap())
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve(None, env_of(&[])).unwrap();
        assert_eq!(settings.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(settings.verify_ssl);
        assert!(settings.proxy.is_none());
        assert!(settings.max_pages.is_none());
        assert_eq!(settings.toggles, StreamToggles::default());
        assert!(matches!(settings.connection(), Err(CollectError::Config(_))));
    }

    #[test]
    fn test_file_values_with_checkbox_strings() {
        let f = file(
            r#"
            [settings]
            api_base_url = "https://portal.threater.com/api/v3"
            request_timeout = "45"
            verify_ssl = "0"
            proxy_enabled = "1"
            proxy_url = "http://proxy.internal:3128"
            proxy_username = "svc"

            [collect]
            reports = "false"
            users = false
            "#,
        );
        let settings = Settings::resolve(f, env_of(&[("THREATER_PROXY_PASSWORD", "pw")])).unwrap();
        assert_eq!(settings.timeout_secs, 45);
        assert!(!settings.verify_ssl);
        let proxy = settings.proxy.clone().unwrap();
        assert_eq!(proxy.url, "http://proxy.internal:3128");
        assert_eq!(proxy.username.as_deref(), Some("svc"));
        assert_eq!(proxy.password.as_deref(), Some("pw"));
        assert!(!settings.toggles.reports);
        assert!(!settings.toggles.users);
        assert!(settings.toggles.events);

        let conn = settings.connection().unwrap();
        assert_eq!(conn.base_url.as_str(), "https://portal.threater.com/api/v3");
    }

    #[test]
    fn test_env_overrides_file() {
        let f = file(
            r#"
            [settings]
            api_base_url = "https://file.example.com"
            request_timeout = 10
            "#,
        );
        let settings = Settings::resolve(
            f,
            env_of(&[
                ("THREATER_BASE_URL", "https://env.example.com/api/v3"),
                ("THREATER_TIMEOUT_SECS", "90"),
                ("THREATER_API_KEY", "k-123"),
                ("THREATER_MAX_PAGES", "50"),
            ]),
        )
        .unwrap();
        let conn = settings.connection().unwrap();
        assert_eq!(conn.base_url.host_str(), Some("env.example.com"));
        assert_eq!(conn.timeout_secs, 90);
        assert_eq!(conn.require_credentials().unwrap(), "k-123");
        assert_eq!(settings.max_pages, Some(50));
    }

    #[test]
    fn test_api_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("api_key");
        std::fs::write(&key_path, "  secret-from-file\n").unwrap();
        let f = file(&format!(
            "[settings]\napi_base_url = \"https://x.example.com\"\napi_key_file = {:?}\n",
            key_path.to_string_lossy()
        ));
        let settings = Settings::resolve(f, env_of(&[])).unwrap();
        assert_eq!(settings.api_key.as_deref(), Some("secret-from-file"));
    }

    #[test]
    fn test_missing_secret_file_is_error() {
        let f = file("[settings]\napi_key_file = \"/nonexistent/threater/key\"\n");
        assert!(matches!(
            Settings::resolve(f, env_of(&[])),
            Err(CollectError::Config(_))
        ));
    }

    #[test]
    fn test_proxy_enabled_without_url() {
        let f = file("[settings]\nproxy_enabled = true\n");
        assert!(Settings::resolve(f, env_of(&[])).is_err());
    }

    #[test]
    fn test_proxy_disabled_ignores_url() {
        let f = file("[settings]\nproxy_enabled = false\nproxy_url = \"http://p:1\"\n");
        let settings = Settings::resolve(f, env_of(&[])).unwrap();
        assert!(settings.proxy.is_none());
    }

    #[test]
    fn test_invalid_values() {
        assert!(Settings::resolve(None, env_of(&[("THREATER_TIMEOUT_SECS", "0")])).is_err());
        assert!(Settings::resolve(None, env_of(&[("THREATER_VERIFY_SSL", "maybe")])).is_err());
        assert!(Settings::resolve(None, env_of(&[("THREATER_MAX_PAGES", "0")])).is_err());

        let settings =
            Settings::resolve(None, env_of(&[("THREATER_BASE_URL", "ftp://x.example.com")])).unwrap();
        assert!(settings.connection().is_err());
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let conn = ConnectionConfig::new("https://x.example.com").unwrap();
        assert!(matches!(conn.require_credentials(), Err(CollectError::Config(_))));
    }

    #[test]
    fn test_debug_masks_secrets() {
        let conn = ConnectionConfig::new("https://x.example.com")
            .unwrap()
            .with_api_key("super-secret");
        let rendered = format!("{:?}", conn);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn test_read_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SettingsFile::read(&dir.path().join("absent.toml")).unwrap().is_none());

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[settings\n").unwrap();
        assert!(SettingsFile::read(&bad).is_err());
    }
}
