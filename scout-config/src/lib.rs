//! Loader for Scout configuration with file + environment overlays.
//!
//! A configuration file (`scout.yaml`, or JSON/TOML inferred by suffix) names
//! the sources and keywords each pipeline scans and the mail channel the
//! digest goes to. `SCOUT_`-prefixed environment variables override scalar
//! keys (`SCOUT_SMTP_PORT=2525`), and `${VAR}` placeholders anywhere in the
//! tree are expanded from the process environment.
//!
//! ```yaml
//! sources:
//!   - https://jobs.example.com/design
//!   - url: https://careers.example.org
//!     strategies:
//!       - type: listing
//!         item: li.job
//!         title: h3
//! keywords: ["graphic design", "branding"]
//! sender: "${GMAIL_USER}"
//! secret: "${GMAIL_APP_PASSWORD}"
//! recipient: "${RECIPIENT_EMAIL}"
//! leads:
//!   sources: ["https://studio.example.net/contact"]
//! ```
use config::{Config, Environment, File};
use scout_common::{RecordKind, ScoutError};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

/// Environment variables read when the mail channel is not configured
/// explicitly.
const LEGACY_SENDER_ENV: &str = "GMAIL_USER";
const LEGACY_SECRET_ENV: &str = "GMAIL_APP_PASSWORD";
const LEGACY_RECIPIENT_ENV: &str = "RECIPIENT_EMAIL";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("missing required setting `{0}`")]
    MissingCredential(&'static str),
}

impl From<ConfigError> for ScoutError {
    fn from(err: ConfigError) -> Self {
        ScoutError::Config(err.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoutConfig {
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port", deserialize_with = "lenient")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_tls: Option<SmtpTls>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_timeout_secs", deserialize_with = "lenient")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries", deserialize_with = "lenient")]
    pub max_retries: usize,
    #[serde(default = "default_concurrency", deserialize_with = "lenient")]
    pub concurrency: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_true", deserialize_with = "lenient")]
    pub follow_job_links: bool,
    #[serde(default)]
    pub jobs: PipelineOverrides,
    #[serde(default)]
    pub leads: PipelineOverrides,
}

/// Per-pipeline overrides; unset fields fall back to the top-level values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineOverrides {
    #[serde(default)]
    pub sources: Option<Vec<SourceSpec>>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub subject_prefix: Option<String>,
}

/// A page to scan: a bare URL, or a URL with its own extraction strategies.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SourceSpec {
    Url(String),
    Detailed {
        url: String,
        #[serde(default)]
        strategies: Vec<StrategySpec>,
    },
}

impl SourceSpec {
    pub fn url(&self) -> &str {
        match self {
            SourceSpec::Url(url) | SourceSpec::Detailed { url, .. } => url,
        }
    }

    /// Strategies configured for this source; empty means "use the defaults".
    pub fn strategies(&self) -> &[StrategySpec] {
        match self {
            SourceSpec::Url(_) => &[],
            SourceSpec::Detailed { strategies, .. } => strategies,
        }
    }
}

/// One way of finding candidates in a page. Strategies are tried in order
/// until one yields something.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StrategySpec {
    /// Every link whose text or target mentions a keyword.
    Anchors,
    /// Repeated listing containers picked out by CSS selectors.
    Listing {
        item: String,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        link: Option<String>,
        #[serde(default)]
        company: Option<String>,
    },
    /// Email addresses in page text and `mailto:` links.
    Emails,
}

impl StrategySpec {
    pub fn applies_to(&self, kind: RecordKind) -> bool {
        match self {
            StrategySpec::Anchors | StrategySpec::Listing { .. } => kind == RecordKind::Job,
            StrategySpec::Emails => kind == RecordKind::Lead,
        }
    }

    pub fn defaults_for(kind: RecordKind) -> Vec<StrategySpec> {
        match kind {
            RecordKind::Job => vec![StrategySpec::Anchors],
            RecordKind::Lead => vec![StrategySpec::Emails],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StrategySpec::Anchors => "anchors",
            StrategySpec::Listing { .. } => "listing",
            StrategySpec::Emails => "emails",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpTls {
    /// Plain connection upgraded with STARTTLS (port 587).
    Starttls,
    /// TLS from the first byte (port 465).
    Implicit,
    /// No encryption; local relays and tests only.
    None,
}

/// Validated mail channel settings.
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub tls: SmtpTls,
    pub sender: String,
    pub secret: String,
    pub recipient: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("sender", &self.sender)
            .field("secret", &"<redacted>")
            .field("recipient", &self.recipient)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Sources and keywords resolved for one pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub kind: RecordKind,
    pub sources: Vec<SourceSpec>,
    /// Lowercased, trimmed, non-empty.
    pub keywords: Vec<String>,
    pub subject_prefix: String,
}

/// HTTP knobs shared by every pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    pub timeout: Duration,
    pub max_retries: usize,
    pub concurrency: usize,
    pub user_agent: String,
    pub follow_job_links: bool,
}

impl ScoutConfig {
    pub fn pipeline(&self, kind: RecordKind) -> PipelineSettings {
        let overrides = match kind {
            RecordKind::Job => &self.jobs,
            RecordKind::Lead => &self.leads,
        };
        let sources = overrides
            .sources
            .clone()
            .unwrap_or_else(|| self.sources.clone());
        let keywords = overrides
            .keywords
            .as_ref()
            .unwrap_or(&self.keywords)
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        let subject_prefix = overrides
            .subject_prefix
            .clone()
            .unwrap_or_else(|| default_subject_prefix(kind).to_string());
        PipelineSettings {
            kind,
            sources,
            keywords,
            subject_prefix,
        }
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
            max_retries: self.max_retries,
            concurrency: self.concurrency.max(1),
            user_agent: self.user_agent.clone(),
            follow_job_links: self.follow_job_links,
        }
    }

    /// Validate the mail channel. Fails before any connection is attempted.
    pub fn smtp_settings(&self) -> Result<SmtpSettings, ConfigError> {
        let host = usable(Some(&self.smtp_host)).ok_or(ConfigError::MissingCredential("smtp_host"))?;
        let sender = usable(self.sender.as_ref()).ok_or(ConfigError::MissingCredential("sender"))?;
        let secret = usable(self.secret.as_ref()).ok_or(ConfigError::MissingCredential("secret"))?;
        let recipient =
            usable(self.recipient.as_ref()).ok_or(ConfigError::MissingCredential("recipient"))?;
        if self.smtp_port == 0 {
            return Err(ConfigError::Invalid("smtp_port must be non-zero".into()));
        }
        let tls = self.smtp_tls.unwrap_or(if self.smtp_port == 465 {
            SmtpTls::Implicit
        } else {
            SmtpTls::Starttls
        });
        Ok(SmtpSettings {
            host,
            port: self.smtp_port,
            tls,
            sender,
            secret,
            recipient,
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
        })
    }

    fn apply_legacy_env(&mut self) {
        for (slot, var) in [
            (&mut self.sender, LEGACY_SENDER_ENV),
            (&mut self.secret, LEGACY_SECRET_ENV),
            (&mut self.recipient, LEGACY_RECIPIENT_ENV),
        ] {
            if usable(slot.as_ref()).is_none() {
                if let Ok(value) = std::env::var(var) {
                    if usable(Some(&value)).is_some() {
                        *slot = Some(value);
                    }
                }
            }
        }
    }
}

/// Blank values and unexpanded `${VAR}` placeholders count as unset.
fn usable(value: Option<&String>) -> Option<String> {
    let v = value?.trim();
    if v.is_empty() || v.contains("${") {
        None
    } else {
        Some(v.to_string())
    }
}

pub fn default_subject_prefix(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Job => "Daily Job Alerts",
        RecordKind::Lead => "Hiring Companies",
    }
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".into()
}
fn default_smtp_port() -> u16 {
    587
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_timeout_secs() -> u64 {
    15
}
fn default_max_retries() -> usize {
    2
}
fn default_concurrency() -> usize {
    4
}
fn default_user_agent() -> String {
    "Mozilla/5.0".into()
}
fn default_true() -> bool {
    true
}

/// Accept a scalar as either its native JSON type or a string; environment
/// overrides always arrive as strings.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw = match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => return Err(de::Error::custom(format!("expected a scalar, got {other}"))),
    };
    raw.trim().parse().map_err(de::Error::custom)
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (files + env overrides).
pub struct ScoutConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for ScoutConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoutConfigLoader {
    /// Start with `SCOUT_` env overrides and no files. Nested keys use `__`,
    /// e.g. `SCOUT_JOBS__SUBJECT_PREFIX`.
    ///
    /// ```
    /// use scout_config::ScoutConfigLoader;
    ///
    /// let cfg = ScoutConfigLoader::new()
    ///     .with_yaml_str("sources: []\nkeywords: [branding]")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(cfg.keywords, vec!["branding".to_string()]);
    /// assert_eq!(cfg.smtp_host, "smtp.gmail.com");
    /// ```
    pub fn new() -> Self {
        let builder = Config::builder().add_source(
            Environment::with_prefix("SCOUT")
                .prefix_separator("_")
                .separator("__"),
        );
        Self { builder }
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Like [`with_file`](Self::with_file) but a missing file is skipped, so
    /// deployments can rely purely on environment variables.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources.
    ///
    /// `${VAR}` placeholders are expanded before the typed structs are built,
    /// then unset mail settings fall back to `GMAIL_USER`,
    /// `GMAIL_APP_PASSWORD` and `RECIPIENT_EMAIL`.
    ///
    /// ```
    /// use scout_config::{ScoutConfigLoader, SourceSpec, StrategySpec};
    ///
    /// let cfg = ScoutConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// sources:
    ///   - https://board.example.com/jobs
    ///   - url: https://careers.example.org
    ///     strategies:
    ///       - type: listing
    ///         item: li.job
    /// "#)
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.sources[0], SourceSpec::Url("https://board.example.com/jobs".into()));
    /// assert!(matches!(cfg.sources[1].strategies()[0], StrategySpec::Listing { .. }));
    /// ```
    pub fn load(self) -> Result<ScoutConfig, ConfigError> {
        let cfg = self.builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let mut typed: ScoutConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        typed.apply_legacy_env();

        Ok(typed)
    }
}
