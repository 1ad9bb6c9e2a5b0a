//! Everything a command needs: configuration, the queue store and a remote.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tally_client::{
    ActionQueueStore, Config, CursorPager, HttpRemote, MockRemote, ProcessorConfig, RemoteApi,
    SyncProcessor,
};

/// Config file looked up in the data directory when `--config` is absent.
pub const CONFIG_FILE: &str = "tally.toml";

/// State shared by the commands of one invocation.
pub struct Session {
    pub config: Config,
    pub store: Arc<ActionQueueStore>,
    pub remote: Arc<dyn RemoteApi>,
}

impl Session {
    /// Load configuration, open the queue and pick the remote.
    pub async fn open(data_dir: &Path, config_path: Option<&Path>, use_mock: bool) -> Result<Self> {
        let config = load_config(data_dir, config_path)?;

        let storage = config
            .storage
            .open(data_dir)
            .await
            .context("Failed to open queue storage")?;
        let store = Arc::new(
            ActionQueueStore::open(storage)
                .await
                .context("Failed to load queued actions")?,
        );

        let remote: Arc<dyn RemoteApi> = if use_mock {
            Arc::new(MockRemote::demo())
        } else {
            Arc::new(HttpRemote::new(&config.remote).context("Failed to create HTTP client")?)
        };

        Ok(Self {
            config,
            store,
            remote,
        })
    }

    /// Sync processor over this session's store and remote.
    pub fn processor(&self) -> SyncProcessor {
        SyncProcessor::new(
            Arc::clone(&self.store),
            Arc::clone(&self.remote),
            ProcessorConfig::from(&self.config),
        )
    }

    /// History pager over this session's remote.
    pub fn pager(&self) -> CursorPager {
        CursorPager::new(Arc::clone(&self.remote))
    }
}

fn load_config(data_dir: &Path, explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        return Ok(Config::from_file(path)?);
    }

    let default_path = data_dir.join(CONFIG_FILE);
    if default_path.exists() {
        Ok(Config::from_file(&default_path)?)
    } else {
        Ok(Config::default())
    }
}
