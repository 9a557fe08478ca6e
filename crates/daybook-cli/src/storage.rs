use std::path::PathBuf;

use crate::config::Config;
use color_eyre::Result;
use daybook_storage::JsonFileStore;
use daybook_task::{open_tracker, DocumentTracker};
use dirs::data_dir;
use tracing::debug;

/// Resolve the default data directory for Daybook.
pub fn default_data_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("daybook"))
}

/// Build the JSON store, honouring the config's `data_dir` override.
pub fn store_from_config(config: &Config) -> Result<JsonFileStore> {
    let root = match &config.data_dir {
        Some(root) => root.clone(),
        None => default_data_dir()?,
    };
    debug!(?root, "initializing json store");
    Ok(JsonFileStore::new(root))
}

/// Tracker over the configured store with the configured rollover.
pub fn tracker_from_config(config: &Config) -> Result<DocumentTracker<JsonFileStore>> {
    let store = store_from_config(config)?;
    Ok(open_tracker(store).with_rollover(config.session.rollover))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dir_override_wins() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config {
            data_dir: Some(dir.path().to_path_buf()),
            ..Config::default()
        };
        let store = store_from_config(&config).expect("store");
        assert_eq!(store.root(), dir.path());
    }
}
