use std::path::PathBuf;
use std::sync::Arc;

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::command::server;
use crate::configuration::Configuration;

/// Reloads the gate whenever the configuration file changes.
pub struct ConfigWatcher {
    _handle: tokio::task::JoinHandle<()>,
}

impl ConfigWatcher {
    pub fn new(
        config_path: &str,
        server: Arc<server::Command>,
    ) -> Result<Self, crate::command::Error> {
        info!("Setting up config watcher for: {config_path}");

        let config_path = std::fs::canonicalize(PathBuf::from(config_path))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = watch_config_loop(config_path, server).await {
                error!("Config watcher failed: {e}");
            }
        });

        Ok(Self { _handle: handle })
    }
}

async fn watch_config_loop(
    config_path: PathBuf,
    server: Arc<server::Command>,
) -> Result<(), crate::command::Error> {
    let (tx, mut rx) = mpsc::channel::<Event>(100);

    let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
        if let Ok(event) = res {
            let _ = tx.blocking_send(event);
        }
    })?;
    watcher.watch(&config_path, RecursiveMode::NonRecursive)?;

    loop {
        match rx.recv().await {
            Some(event)
                if matches!(
                    event.kind,
                    EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any)
                ) && event.paths.iter().any(|p| p == &config_path) =>
            {
                info!("Configuration file changed, reloading");
                reload_config(&server, &config_path);
            }
            None => {
                error!("Config watcher channel closed");
                return Ok(());
            }
            _ => {}
        }
    }
}

fn reload_config(server: &server::Command, config_path: &PathBuf) {
    let config = match Configuration::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to reload configuration: {e}");
            return;
        }
    };

    if let Err(e) = server.notify_config_change(&config) {
        error!("Failed to apply configuration change, keeping previous gate: {e}");
    } else {
        info!("Configuration reloaded");
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    const CONFIG: &str = r#"
        [server]
        bind_address = "127.0.0.1"

        [resource.api]
        path = "/api"
    "#;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_watcher_requires_existing_file() {
        let server = Arc::new(
            server::Command::new(&Configuration::load_from_str(CONFIG).unwrap()).unwrap(),
        );

        assert!(ConfigWatcher::new("/nonexistent/gatehouse.toml", server).is_err());
    }

    #[tokio::test]
    async fn test_watcher_starts_on_existing_file() {
        let file = write_config(CONFIG);
        let config = Configuration::load(file.path()).unwrap();
        let server = Arc::new(server::Command::new(&config).unwrap());

        assert!(ConfigWatcher::new(&file.path().to_string_lossy(), server).is_ok());
    }

    #[test]
    fn test_reload_ignores_invalid_file() {
        let server = server::Command::new(&Configuration::load_from_str(CONFIG).unwrap()).unwrap();
        let file = write_config("not = [valid");

        reload_config(&server, &file.path().to_path_buf());
    }
}
