//! Sources for the expected API key.
//!
//! The gate never caches the key itself; each protected request asks its
//! provider. Providers that read slow backends are bounded by the gate's
//! fetch timeout.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use futures_util::future::{self, BoxFuture, FutureExt};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::{SecretSource, SecretsConfig};

/// Failure to produce the expected key. Always surfaces as a 500.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("none of the variables {0} is set")]
    NotSet(String),

    #[error("failed to read key file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("key source is empty")]
    Empty,

    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("cannot watch key file: {0}")]
    Watch(#[from] notify::Error),

    #[error("secret source misconfigured: {0}")]
    Misconfigured(&'static str),
}

/// Capability that yields the currently valid API key.
pub trait SecretProvider: Send + Sync {
    fn expected_key(&self) -> BoxFuture<'_, Result<String, SecretError>>;
}

/// A fixed key, for tests and local demos.
pub struct StaticSecretProvider {
    key: String,
}

impl StaticSecretProvider {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl SecretProvider for StaticSecretProvider {
    fn expected_key(&self) -> BoxFuture<'_, Result<String, SecretError>> {
        let result = if self.key.is_empty() {
            Err(SecretError::Empty)
        } else {
            Ok(self.key.clone())
        };
        future::ready(result).boxed()
    }
}

/// Reads the first non-empty variable from an ordered list on every lookup.
pub struct EnvSecretProvider {
    vars: Vec<String>,
}

impl EnvSecretProvider {
    pub fn new(vars: Vec<String>) -> Self {
        Self { vars }
    }

    fn lookup(&self) -> Result<String, SecretError> {
        self.vars
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|value| !value.is_empty())
            .ok_or_else(|| SecretError::NotSet(self.vars.join(", ")))
    }
}

impl SecretProvider for EnvSecretProvider {
    fn expected_key(&self) -> BoxFuture<'_, Result<String, SecretError>> {
        future::ready(self.lookup()).boxed()
    }
}

/// Key stored in a file and reloaded whenever the file changes.
///
/// The parent directory is watched rather than the file, so a key replaced
/// by renaming a new file over the old one keeps being tracked. A reload
/// that fails keeps the previous key in place.
pub struct FileSecretProvider {
    path: PathBuf,
    current: Arc<ArcSwapOption<String>>,
    _watcher: RecommendedWatcher,
}

impl FileSecretProvider {
    /// Read the key once and start watching the file for rotation.
    pub fn open(path: &Path) -> Result<Self, SecretError> {
        let initial = read_key_file(path)?;
        let current = Arc::new(ArcSwapOption::from_pointee(initial));

        let file_name = path
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or(SecretError::Misconfigured("secrets.file_path has no file name"))?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let slot = current.clone();
        let watched = path.to_path_buf();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant = (event.kind.is_modify() || event.kind.is_create())
                        && event
                            .paths
                            .iter()
                            .any(|p| p.file_name() == Some(file_name.as_os_str()));
                    if !relevant {
                        return;
                    }
                    match read_key_file(&watched) {
                        Ok(key) => {
                            slot.store(Some(Arc::new(key)));
                            tracing::info!(path = ?watched, "API key file reloaded");
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to reload API key. Keeping current key.");
                        }
                    }
                }
                Err(e) => tracing::error!("Key file watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Key file watcher started");
        Ok(Self {
            path: path.to_path_buf(),
            current,
            _watcher: watcher,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SecretProvider for FileSecretProvider {
    fn expected_key(&self) -> BoxFuture<'_, Result<String, SecretError>> {
        let result = match self.current.load_full() {
            Some(key) => Ok(key.as_ref().clone()),
            None => Err(SecretError::Empty),
        };
        future::ready(result).boxed()
    }
}

/// Read a key file, dropping one trailing line ending.
pub fn read_key_file(path: &Path) -> Result<String, SecretError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SecretError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let key = raw
        .strip_suffix("\r\n")
        .or_else(|| raw.strip_suffix('\n'))
        .unwrap_or(&raw);
    if key.is_empty() {
        return Err(SecretError::Empty);
    }
    Ok(key.to_string())
}

/// Build the provider selected by configuration.
pub fn from_config(config: &SecretsConfig) -> Result<Arc<dyn SecretProvider>, SecretError> {
    let provider: Arc<dyn SecretProvider> = match config.source {
        SecretSource::Env => Arc::new(EnvSecretProvider::new(config.env_vars.clone())),
        SecretSource::File => {
            let path = config
                .file_path
                .as_deref()
                .ok_or(SecretError::Misconfigured("secrets.file_path is not set"))?;
            Arc::new(FileSecretProvider::open(Path::new(path))?)
        }
        SecretSource::Static => {
            let value = config
                .value
                .clone()
                .ok_or(SecretError::Misconfigured("secrets.value is not set"))?;
            Arc::new(StaticSecretProvider::new(value))
        }
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticSecretProvider::new("s3cr3t");
        assert_eq!(provider.expected_key().await.unwrap(), "s3cr3t");

        let empty = StaticSecretProvider::new("");
        assert!(matches!(empty.expected_key().await, Err(SecretError::Empty)));
    }

    #[tokio::test]
    async fn test_env_provider_takes_first_set_var() {
        std::env::set_var("CLOUDSEC_TEST_PRIMARY", "");
        std::env::set_var("CLOUDSEC_TEST_FALLBACK", "from-fallback");
        let provider = EnvSecretProvider::new(vec![
            "CLOUDSEC_TEST_MISSING".into(),
            "CLOUDSEC_TEST_PRIMARY".into(),
            "CLOUDSEC_TEST_FALLBACK".into(),
        ]);
        assert_eq!(provider.expected_key().await.unwrap(), "from-fallback");
    }

    #[tokio::test]
    async fn test_env_provider_never_defaults() {
        let provider = EnvSecretProvider::new(vec!["CLOUDSEC_TEST_NEVER_SET".into()]);
        match provider.expected_key().await {
            Err(SecretError::NotSet(vars)) => assert_eq!(vars, "CLOUDSEC_TEST_NEVER_SET"),
            other => panic!("expected NotSet, got {other:?}"),
        }
    }

    #[test]
    fn test_read_key_file_strips_one_newline() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "rotated-key\n").unwrap();
        assert_eq!(read_key_file(file.path()).unwrap(), "rotated-key");

        let mut crlf = tempfile::NamedTempFile::new().unwrap();
        write!(crlf, " spaced \r\n").unwrap();
        assert_eq!(read_key_file(crlf.path()).unwrap(), " spaced ");
    }

    #[test]
    fn test_read_key_file_rejects_empty_and_missing() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(read_key_file(file.path()), Err(SecretError::Empty)));
        assert!(matches!(
            read_key_file(Path::new("/nonexistent/cloudsec/key")),
            Err(SecretError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_file_provider_serves_initial_key() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "file-key").unwrap();

        let provider = FileSecretProvider::open(file.path()).unwrap();
        assert_eq!(provider.expected_key().await.unwrap(), "file-key");
        assert_eq!(provider.path(), file.path());
    }

    async fn wait_for_key(provider: &FileSecretProvider, expected: &str) -> String {
        let mut key = String::new();
        for _ in 0..100 {
            key = provider.expected_key().await.unwrap();
            if key == expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        key
    }

    #[tokio::test]
    async fn test_file_provider_follows_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_key");
        std::fs::write(&path, "old-key\n").unwrap();

        let provider = FileSecretProvider::open(&path).unwrap();
        assert_eq!(provider.expected_key().await.unwrap(), "old-key");

        std::fs::write(&path, "new-key\n").unwrap();
        assert_eq!(wait_for_key(&provider, "new-key").await, "new-key");

        // Atomic replace: write a sibling, rename it over the key file.
        let staged = dir.path().join("api_key.tmp");
        std::fs::write(&staged, "renamed-key\n").unwrap();
        std::fs::rename(&staged, &path).unwrap();
        assert_eq!(wait_for_key(&provider, "renamed-key").await, "renamed-key");

        // The watch must survive the rename.
        std::fs::write(&path, "third-key\n").unwrap();
        assert_eq!(wait_for_key(&provider, "third-key").await, "third-key");
    }

    #[tokio::test]
    async fn test_file_provider_ignores_siblings_and_failed_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_key");
        std::fs::write(&path, "kept-key").unwrap();

        let provider = FileSecretProvider::open(&path).unwrap();
        std::fs::write(dir.path().join("other"), "not-a-key").unwrap();
        std::fs::write(&path, "").unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(provider.expected_key().await.unwrap(), "kept-key");
    }

    #[test]
    fn test_from_config_requires_paths() {
        let config = SecretsConfig {
            source: SecretSource::File,
            ..SecretsConfig::default()
        };
        assert!(matches!(from_config(&config), Err(SecretError::Misconfigured(_))));
    }
}
