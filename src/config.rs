//! Layered settings: CLI flags over environment over config file over defaults.
//!
//! The binary resolves everything here once and hands the core an explicit
//! [`GenerationRequest`]; nothing below this layer reads the environment.

use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::NamedTempFile;
use toml_edit::{DocumentMut, Item, value};
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::generate::request::{CommitStyle, GenerationRequest, LargeDiffMode};
use crate::llm::openai::DEFAULT_BASE_URL;
use crate::llm::provider::{API_KEY_SECRET, Provider};

const CONFIG_DIR_NAME: &str = "gitscribe";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Keys accepted by the config file and `gitscribe config set`.
pub const CONFIG_KEYS: &[&str] = &[
    API_KEY_SECRET,
    "locale",
    "generate",
    "max_length",
    "type",
    "timeout",
    "proxy",
    "chunk_size",
    "model",
    "provider",
    "base_url",
    "large_diff",
];

/// Keys stored as TOML integers.
const INTEGER_KEYS: &[&str] = &["generate", "max_length", "timeout", "chunk_size"];

/// Environment overrides, applied after the config file.
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("GITSCRIBE_LOCALE", "locale"),
    ("GITSCRIBE_MAX_LENGTH", "max_length"),
    ("GITSCRIBE_GENERATE", "generate"),
    ("GITSCRIBE_TYPE", "type"),
    ("GITSCRIBE_TIMEOUT", "timeout"),
    ("GITSCRIBE_PROXY", "proxy"),
    ("GITSCRIBE_CHUNK_SIZE", "chunk_size"),
    ("GITSCRIBE_MODEL", "model"),
    ("GITSCRIBE_PROVIDER", "provider"),
    ("GITSCRIBE_BASE_URL", "base_url"),
    ("GITSCRIBE_LARGE_DIFF", "large_diff"),
];

const MAX_GENERATE: u32 = 5;
const MIN_MAX_LENGTH: usize = 20;
const MIN_CHUNK_SIZE: usize = 100;

/// Fully resolved generation and provider settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub locale: String,
    pub generate: u32,
    pub max_length: usize,
    pub style: CommitStyle,
    pub timeout_secs: u64,
    pub proxy: Option<String>,
    pub chunk_size: Option<usize>,
    /// Provider-specific model; `None` uses the provider default.
    pub model: Option<String>,
    pub provider: Provider,
    pub base_url: String,
    pub large_diff: LargeDiffMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            locale: "en".to_string(),
            generate: 1,
            max_length: 50,
            style: CommitStyle::Plain,
            timeout_secs: 10,
            proxy: None,
            chunk_size: None,
            model: None,
            provider: Provider::OpenAi,
            base_url: DEFAULT_BASE_URL.to_string(),
            large_diff: LargeDiffMode::Auto,
        }
    }
}

impl Settings {
    /// Defaults, then the config file (when given), then the environment.
    pub fn load(file: Option<&ConfigFile>) -> Result<Self, ConfigError> {
        let mut settings = Settings::default();
        if let Some(file) = file {
            settings.apply_file(file)?;
        }
        settings.apply_env();
        Ok(settings)
    }

    /// Apply every recognized key from the config file.
    ///
    /// Invalid values are errors here; the user wrote them on purpose.
    pub fn apply_file(&mut self, file: &ConfigFile) -> Result<(), ConfigError> {
        for (key, raw) in file.entries()? {
            if key == API_KEY_SECRET {
                continue;
            }
            match self.set(&key, &raw) {
                Err(ConfigError::UnknownKey(key)) => {
                    warn!("Ignoring unknown key '{}' in {}", key, file.path().display());
                }
                other => other?,
            }
        }
        Ok(())
    }

    /// Apply `GITSCRIBE_*` environment overrides. Bad values are logged and skipped.
    pub fn apply_env(&mut self) {
        for (var, key) in ENV_OVERRIDES {
            match env::var(var) {
                Ok(raw) if !raw.is_empty() => {
                    if let Err(e) = self.set(key, &raw) {
                        warn!("Invalid {} value '{}', ignoring: {}", var, raw, e);
                    }
                }
                _ => {}
            }
        }
    }

    /// Validate and assign one setting by key.
    pub fn set(&mut self, key: &str, raw: &str) -> Result<(), ConfigError> {
        let raw = raw.trim();
        let invalid = |reason: String| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
            reason,
        };

        match key {
            "locale" => {
                if raw.is_empty()
                    || !raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
                {
                    return Err(invalid("expected a locale code such as en or pt-BR".into()));
                }
                self.locale = raw.to_string();
            }
            "generate" => {
                let n: u32 = raw.parse().map_err(|_| invalid("expected an integer".into()))?;
                if !(1..=MAX_GENERATE).contains(&n) {
                    return Err(invalid(format!("must be between 1 and {MAX_GENERATE}")));
                }
                self.generate = n;
            }
            "max_length" => {
                let n: usize = raw.parse().map_err(|_| invalid("expected an integer".into()))?;
                if n < MIN_MAX_LENGTH {
                    return Err(invalid(format!("must be at least {MIN_MAX_LENGTH}")));
                }
                self.max_length = n;
            }
            "type" => self.style = raw.parse().map_err(invalid)?,
            "timeout" => {
                let secs: u64 = raw.parse().map_err(|_| invalid("expected seconds".into()))?;
                if secs == 0 {
                    return Err(invalid("must be greater than zero".into()));
                }
                self.timeout_secs = secs;
            }
            "proxy" => self.proxy = non_empty(raw),
            "chunk_size" => {
                let n: usize = raw.parse().map_err(|_| invalid("expected an integer".into()))?;
                if n < MIN_CHUNK_SIZE {
                    return Err(invalid(format!("must be at least {MIN_CHUNK_SIZE} tokens")));
                }
                self.chunk_size = Some(n);
            }
            "model" => self.model = non_empty(raw),
            "provider" => self.provider = raw.parse().map_err(invalid)?,
            "base_url" => {
                if !(raw.starts_with("http://") || raw.starts_with("https://")) {
                    return Err(invalid("expected an http:// or https:// URL".into()));
                }
                self.base_url = raw.trim_end_matches('/').to_string();
            }
            "large_diff" => self.large_diff = raw.parse().map_err(invalid)?,
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The read-only request handed to the generator.
    pub fn request(&self) -> GenerationRequest {
        GenerationRequest {
            locale: self.locale.clone(),
            completions: self.generate,
            max_length: self.max_length,
            style: self.style,
            timeout: self.timeout(),
            proxy: self.proxy.clone(),
            chunk_tokens: self.chunk_size,
            large_diff: self.large_diff,
        }
    }
}

fn non_empty(raw: &str) -> Option<String> {
    (!raw.is_empty()).then(|| raw.to_string())
}

/// The user's `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/gitscribe/config.toml`
    pub fn default_location() -> Result<Self, ConfigError> {
        let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(Self::new(base.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// A missing file reads as an empty document.
    fn load_document(&self) -> Result<DocumentMut, ConfigError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(DocumentMut::new()),
            Err(source) => {
                return Err(ConfigError::ReadFailed {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        content
            .parse::<DocumentMut>()
            .map_err(|e| ConfigError::ParseFailed {
                path: self.path.clone(),
                reason: e.to_string(),
            })
    }

    /// Top-level scalar values as strings, in file order.
    pub fn entries(&self) -> Result<Vec<(String, String)>, ConfigError> {
        let doc = self.load_document()?;
        Ok(doc
            .iter()
            .filter_map(|(key, item)| item_to_string(item).map(|v| (key.to_string(), v)))
            .collect())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let doc = self.load_document()?;
        Ok(doc.get(key).and_then(item_to_string))
    }

    /// Validate and persist one key, preserving the rest of the file.
    pub fn set(&self, key: &str, raw: &str) -> Result<(), ConfigError> {
        let raw = raw.trim();
        if !CONFIG_KEYS.contains(&key) {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }
        if key == API_KEY_SECRET {
            if raw.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: String::new(),
                    reason: "must not be empty".into(),
                });
            }
        } else {
            Settings::default().set(key, raw)?;
        }

        let mut doc = self.load_document()?;
        doc[key] = match raw.parse::<i64>() {
            Ok(n) if INTEGER_KEYS.contains(&key) => value(n),
            _ => value(raw),
        };
        self.write_atomic(&doc.to_string())?;
        debug!("Wrote '{}' to {}", key, self.path.display());
        Ok(())
    }

    /// Write through a temp file in the same directory, then rename over the target.
    fn write_atomic(&self, content: &str) -> Result<(), ConfigError> {
        let write_failed = |source| ConfigError::WriteFailed {
            path: self.path.clone(),
            source,
        };

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(write_failed)?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(write_failed)?;
        tmp.write_all(content.as_bytes()).map_err(write_failed)?;
        tmp.flush().map_err(write_failed)?;
        tmp.persist(&self.path).map_err(|e| write_failed(e.error))?;
        Ok(())
    }
}

fn item_to_string(item: &Item) -> Option<String> {
    let v = item.as_value()?;
    if let Some(s) = v.as_str() {
        Some(s.to_string())
    } else if let Some(n) = v.as_integer() {
        Some(n.to_string())
    } else if let Some(b) = v.as_bool() {
        Some(b.to_string())
    } else {
        v.as_float().map(|f| f.to_string())
    }
}
