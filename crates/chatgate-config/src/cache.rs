//! Live configuration shared by the dispatcher, swapped without locks.

use crate::loader::ConfigLoader;
use crate::schema::Config;
use arc_swap::ArcSwap;
use chatgate_common::Result;
use std::sync::Arc;
use tracing::info;

/// Holds the live [`Config`]. Readers get a snapshot that stays consistent for the
/// whole dispatch even if an update lands meanwhile.
pub struct ConfigCache {
    config: ArcSwap<Config>,
}

impl std::fmt::Debug for ConfigCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ConfigCache").field(&self.config.load_full()).finish()
    }
}

impl ConfigCache {
    /// Wraps an already validated configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config: ArcSwap::from_pointee(config),
        }
    }

    /// Current snapshot.
    pub fn get(&self) -> Arc<Config> {
        self.config.load_full()
    }

    /// Validates `config` and swaps it in. An invalid config leaves the live one untouched.
    pub fn update(&self, config: Config) -> Result<()> {
        config.validate()?;
        self.config.store(Arc::new(config));
        info!("Configuration updated");
        Ok(())
    }

    /// Re-reads the file behind `loader` and swaps it in.
    pub async fn reload(&self, loader: &ConfigLoader) -> Result<()> {
        let config = loader.load().await?;
        self.config.store(Arc::new(config));
        info!(path = %loader.path().display(), "Configuration reloaded");
        Ok(())
    }
}

impl Default for ConfigCache {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl From<Config> for ConfigCache {
    fn from(config: Config) -> Self {
        Self::new(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_update_keeps_live_config() {
        let cache = ConfigCache::default();
        let mut bad = Config::default();
        bad.bot.prefixes.clear();

        assert!(cache.update(bad).is_err());
        assert_eq!(cache.get().bot.prefixes, vec!["!".to_string(), ".".to_string()]);
    }

    #[test]
    fn test_snapshot_survives_update() {
        let cache = ConfigCache::default();
        let before = cache.get();

        let mut next = Config::default();
        next.bot.notify_unknown_command = true;
        cache.update(next).unwrap();

        assert!(!before.bot.notify_unknown_command);
        assert!(cache.get().bot.notify_unknown_command);
    }
}
