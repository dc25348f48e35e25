//! Settings, store and image directory shared by every command.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use lotledger_config::Settings;
use lotledger_store::{GatewayOptions, RetryPolicy, Store};

use crate::fetch::FetchClient;
use crate::{CliError, GlobalArgs};

pub struct App {
    pub settings: Settings,
    pub store: Store,
    data_location: Option<PathBuf>,
    base_url: Option<String>,
}

impl App {
    /// Open the store named by `--db`, else by the settings.
    pub fn open(settings: Settings, args: &GlobalArgs) -> Result<Self, CliError> {
        let path = args.db.clone().unwrap_or_else(|| settings.database_path());
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| CliError::io(format!("cannot create {}: {}", parent.display(), e)))?;
        }

        let db = &settings.database;
        let options = GatewayOptions {
            busy_timeout: Duration::from_millis(db.busy_timeout_ms),
            retry: RetryPolicy {
                attempts: db.retry_attempts,
                backoff: Duration::from_millis(db.retry_backoff_ms),
            },
        };
        let store = Store::open(&path, options).map_err(CliError::store)?;
        tracing::debug!(db = %path.display(), "store opened");

        Ok(Self {
            settings,
            store,
            data_location: args.data_location.clone(),
            base_url: args.base_url.clone(),
        })
    }

    pub fn fetch_client(&self) -> Result<FetchClient, CliError> {
        FetchClient::new(&self.settings.fetch, self.base_url.as_deref())
    }

    /// Directory downloaded images go to, or `None` when downloads are off.
    ///
    /// `--data-location` wins and is remembered in the database; then the
    /// settings file; then the remembered location; then a default that is
    /// remembered from then on.
    pub fn image_dir(&self) -> Result<Option<PathBuf>, CliError> {
        if !self.settings.images.download {
            return Ok(None);
        }
        let dir = match (&self.data_location, &self.settings.images.location) {
            (Some(flag), _) => {
                self.remember(flag)?;
                flag.clone()
            }
            (None, Some(configured)) => configured.clone(),
            (None, None) => match self.store.image_location().map_err(CliError::store)? {
                Some(stored) => stored,
                None => {
                    let default = Settings::default_image_location();
                    self.remember(&default)?;
                    default
                }
            },
        };
        fs::create_dir_all(&dir)
            .map_err(|e| CliError::io(format!("cannot create image directory {}: {}", dir.display(), e)))?;
        Ok(Some(dir))
    }

    fn remember(&self, dir: &std::path::Path) -> Result<(), CliError> {
        let text = dir
            .to_str()
            .ok_or_else(|| CliError::args(format!("image directory is not valid UTF-8: {}", dir.display())))?;
        self.store.set_image_location(text).map_err(CliError::store)?;
        tracing::info!(dir = text, "image location saved");
        Ok(())
    }
}
