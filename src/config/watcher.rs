//! Hot reload of the configuration file.
//!
//! # Design Decisions
//! - Watches the parent directory, so editors that save by renaming a
//!   temporary file over the original are still seen
//! - A save usually fires several events; reloads whose file contents match
//!   the last accepted config are skipped
//! - An invalid file is reported and dropped; the running rules stay

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::{parse_config, ConfigError};
use crate::config::schema::GatewayConfig;
use crate::observability::metrics;

/// What happened when the watched file was read again.
#[derive(Debug)]
pub enum ReloadOutcome {
    /// New valid config.
    Updated(GatewayConfig),
    /// Contents identical to the last accepted config.
    Unchanged,
    /// The file could not be read or failed validation.
    Rejected(ConfigError),
}

/// Watches one config file and publishes validated updates.
pub struct ConfigWatcher {
    path: PathBuf,
    last_contents: Mutex<Option<String>>,
    update_tx: mpsc::UnboundedSender<GatewayConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiver validated configs are sent to.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GatewayConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            last_contents: Mutex::new(std::fs::read_to_string(path).ok()),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Re-read the file and compare it with the last accepted contents.
    pub fn reload(&self) -> ReloadOutcome {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => return ReloadOutcome::Rejected(e.into()),
        };

        let mut last = self
            .last_contents
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if last.as_deref() == Some(contents.as_str()) {
            return ReloadOutcome::Unchanged;
        }

        match parse_config(&contents) {
            Ok(config) => {
                *last = Some(contents);
                ReloadOutcome::Updated(config)
            }
            Err(e) => ReloadOutcome::Rejected(e),
        }
    }

    fn on_event(&self, event: Event) {
        if !(event.kind.is_modify() || event.kind.is_create()) {
            return;
        }
        let file_name = self.path.file_name();
        if !event.paths.iter().any(|p| p.file_name() == file_name) {
            return;
        }

        match self.reload() {
            ReloadOutcome::Updated(config) => {
                metrics::record_config_reload(true);
                tracing::info!(path = ?self.path, rules = config.rules.len(), "Config reloaded");
                if self.update_tx.send(config).is_err() {
                    tracing::warn!("Config receiver gone, dropping update");
                }
            }
            ReloadOutcome::Unchanged => {
                tracing::trace!(path = ?self.path, "Config contents unchanged");
            }
            ReloadOutcome::Rejected(e) => {
                metrics::record_config_reload(false);
                tracing::error!(path = ?self.path, error = %e, "Config reload rejected, keeping current rules");
            }
        }
    }

    /// Start watching. Updates stop when the returned watcher is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => self.on_event(event),
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_config(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("gateway-watch-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("gateway.toml");
        fs::write(&path, contents).unwrap();
        path
    }

    const ONE_RULE: &str = r#"
        [[rules]]
        id = "web"
        backends = ["127.0.0.1:3000"]
    "#;

    #[test]
    fn unchanged_file_is_skipped() {
        let path = temp_config("unchanged", ONE_RULE);
        let (watcher, _rx) = ConfigWatcher::new(&path);
        assert!(matches!(watcher.reload(), ReloadOutcome::Unchanged));
    }

    #[test]
    fn changed_file_yields_new_config() {
        let path = temp_config("changed", ONE_RULE);
        let (watcher, _rx) = ConfigWatcher::new(&path);

        fs::write(&path, ONE_RULE.replace("\"web\"", "\"api\"")).unwrap();
        match watcher.reload() {
            ReloadOutcome::Updated(config) => assert_eq!(config.rules[0].id, "api"),
            other => panic!("expected update, got {:?}", other),
        }
        assert!(matches!(watcher.reload(), ReloadOutcome::Unchanged));
    }

    #[test]
    fn invalid_file_is_rejected_and_not_remembered() {
        let path = temp_config("invalid", ONE_RULE);
        let (watcher, _rx) = ConfigWatcher::new(&path);

        fs::write(&path, "[[rules]]\nid = \"\"\n").unwrap();
        assert!(matches!(watcher.reload(), ReloadOutcome::Rejected(ConfigError::Validation(_))));

        // Restoring the original contents is not an update.
        fs::write(&path, ONE_RULE).unwrap();
        assert!(matches!(watcher.reload(), ReloadOutcome::Unchanged));
    }
}
