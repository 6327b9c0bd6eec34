//! Credential lookup across an ordered list of backends.

use std::env;

use tracing::{debug, warn};

use crate::config::ConfigFile;
use crate::error::SecretError;
use crate::llm::provider::API_KEY_SECRET;

/// One place a secret may live.
pub trait SecretBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Unavailable backends are skipped without being queried.
    fn is_available(&self) -> bool;

    fn get(&self, name: &str) -> Result<Option<String>, SecretError>;
}

/// Reads secrets from environment variables.
pub struct EnvBackend {
    vars: Vec<(String, String)>,
}

impl EnvBackend {
    /// `api_key` from `GITSCRIBE_API_KEY`, then `OPENAI_API_KEY`.
    pub fn new() -> Self {
        Self {
            vars: vec![
                (API_KEY_SECRET.to_string(), "GITSCRIBE_API_KEY".to_string()),
                (API_KEY_SECRET.to_string(), "OPENAI_API_KEY".to_string()),
            ],
        }
    }

    /// Map an additional variable to a secret name.
    pub fn with_var(mut self, secret: impl Into<String>, var: impl Into<String>) -> Self {
        self.vars.push((secret.into(), var.into()));
        self
    }
}

impl Default for EnvBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretBackend for EnvBackend {
    fn name(&self) -> &'static str {
        "environment"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn get(&self, name: &str) -> Result<Option<String>, SecretError> {
        Ok(self
            .vars
            .iter()
            .filter(|(secret, _)| secret == name)
            .find_map(|(_, var)| env::var(var).ok().filter(|v| !v.trim().is_empty())))
    }
}

/// Reads secrets stored in the config file.
pub struct ConfigFileBackend {
    file: ConfigFile,
}

impl ConfigFileBackend {
    pub fn new(file: ConfigFile) -> Self {
        Self { file }
    }
}

impl SecretBackend for ConfigFileBackend {
    fn name(&self) -> &'static str {
        "config file"
    }

    fn is_available(&self) -> bool {
        self.file.exists()
    }

    fn get(&self, name: &str) -> Result<Option<String>, SecretError> {
        self.file
            .get(name)
            .map(|v| v.filter(|v| !v.trim().is_empty()))
            .map_err(|e| SecretError::BackendFailed {
                backend: self.name(),
                reason: e.to_string(),
            })
    }
}

/// Ordered strategy list of [`SecretBackend`]s.
pub struct SecretStore {
    backends: Vec<Box<dyn SecretBackend>>,
}

impl SecretStore {
    pub fn new(backends: Vec<Box<dyn SecretBackend>>) -> Self {
        Self { backends }
    }

    /// Environment first, then the config file when one is known.
    pub fn default_chain(config_file: Option<ConfigFile>) -> Self {
        let mut backends: Vec<Box<dyn SecretBackend>> = vec![Box::new(EnvBackend::new())];
        if let Some(file) = config_file {
            backends.push(Box::new(ConfigFileBackend::new(file)));
        }
        Self::new(backends)
    }

    /// First value found, walking available backends in order.
    ///
    /// A failing backend is logged and skipped so a broken config file
    /// does not hide a key set in the environment.
    pub fn resolve(&self, name: &str) -> Result<String, SecretError> {
        for backend in &self.backends {
            if !backend.is_available() {
                debug!("Secret backend '{}' unavailable, skipping", backend.name());
                continue;
            }
            match backend.get(name) {
                Ok(Some(value)) => {
                    debug!("Resolved '{}' from {}", name, backend.name());
                    return Ok(value.trim().to_string());
                }
                Ok(None) => {}
                Err(e) => warn!("{}", e),
            }
        }
        Err(SecretError::NotFound {
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    struct Unavailable;

    impl SecretBackend for Unavailable {
        fn name(&self) -> &'static str {
            "unavailable"
        }

        fn is_available(&self) -> bool {
            false
        }

        fn get(&self, _name: &str) -> Result<Option<String>, SecretError> {
            panic!("unavailable backend must not be queried");
        }
    }

    struct Broken;

    impl SecretBackend for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn get(&self, _name: &str) -> Result<Option<String>, SecretError> {
            Err(SecretError::BackendFailed {
                backend: "broken",
                reason: "locked".into(),
            })
        }
    }

    fn config_with_key(key: &str) -> (tempfile::TempDir, ConfigFile) {
        let dir = tempfile::tempdir().unwrap();
        let file = ConfigFile::new(dir.path().join("config.toml"));
        file.set(API_KEY_SECRET, key).unwrap();
        (dir, file)
    }

    #[test]
    #[serial]
    fn test_env_wins_over_config_file() {
        let (_dir, file) = config_with_key("sk-file");
        temp_env::with_vars(
            [("GITSCRIBE_API_KEY", None), ("OPENAI_API_KEY", Some("sk-env"))],
            || {
                let store = SecretStore::default_chain(Some(file.clone()));
                assert_eq!(store.resolve(API_KEY_SECRET).unwrap(), "sk-env");
            },
        );
    }

    #[test]
    #[serial]
    fn test_falls_back_to_config_file() {
        let (_dir, file) = config_with_key("sk-file");
        temp_env::with_vars(
            [("GITSCRIBE_API_KEY", None::<&str>), ("OPENAI_API_KEY", None)],
            || {
                let store = SecretStore::default_chain(Some(file.clone()));
                assert_eq!(store.resolve(API_KEY_SECRET).unwrap(), "sk-file");
            },
        );
    }

    #[test]
    #[serial]
    fn test_gitscribe_var_takes_precedence() {
        temp_env::with_vars(
            [
                ("GITSCRIBE_API_KEY", Some("sk-own")),
                ("OPENAI_API_KEY", Some("sk-shared")),
            ],
            || {
                let store = SecretStore::default_chain(None);
                assert_eq!(store.resolve(API_KEY_SECRET).unwrap(), "sk-own");
            },
        );
    }

    #[test]
    #[serial]
    fn test_missing_everywhere() {
        temp_env::with_vars(
            [("GITSCRIBE_API_KEY", None::<&str>), ("OPENAI_API_KEY", None)],
            || {
                let store = SecretStore::default_chain(None);
                let err = store.resolve(API_KEY_SECRET).unwrap_err();
                assert!(matches!(err, SecretError::NotFound { name } if name == "api_key"));
            },
        );
    }

    #[test]
    fn test_skips_unavailable_and_broken_backends() {
        let (_dir, file) = config_with_key("sk-file");
        let store = SecretStore::new(vec![
            Box::new(Unavailable),
            Box::new(Broken),
            Box::new(ConfigFileBackend::new(file)),
        ]);
        assert_eq!(store.resolve(API_KEY_SECRET).unwrap(), "sk-file");
    }

    #[test]
    #[serial]
    fn test_custom_env_mapping() {
        temp_env::with_var("MY_TOKEN", Some("tok"), || {
            let backend = EnvBackend::new().with_var("token", "MY_TOKEN");
            assert_eq!(backend.get("token").unwrap().as_deref(), Some("tok"));
            assert_eq!(backend.get("other").unwrap(), None);
        });
    }
}
