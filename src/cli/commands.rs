//! CLI command implementations.

use std::path::{Path, PathBuf};

use crate::store::{DurableTier, PersistentStore};
use crate::types::config::{Config, StoreConfig};
use crate::CacheResult;

const CONFIG_FILE: &str = "evalcache.toml";
const DATA_DIR: &str = ".evalcache";

type JsonStore = PersistentStore<serde_json::Value>;

/// Initializes configuration in the specified directory.
pub async fn init(path: Option<PathBuf>) -> CacheResult<()> {
    let target_dir = path.unwrap_or_else(|| PathBuf::from("."));

    if !target_dir.exists() {
        std::fs::create_dir_all(&target_dir)?;
        tracing::info!("Directory created: {}", target_dir.display());
    }

    let config_path = target_dir.join(CONFIG_FILE);

    if config_path.exists() {
        println!("Configuration already exists at: {}", config_path.display());
        return Ok(());
    }

    let data_dir = target_dir.join(DATA_DIR);
    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)?;
        tracing::info!("{}/ directory created", DATA_DIR);
    }

    update_gitignore(&target_dir)?;

    let config = Config::default_config();
    config.save(&config_path)?;

    println!("evalcache initialized successfully!");
    println!("Configuration created at: {}", config_path.display());
    println!("Data directory: {}/", DATA_DIR);
    println!();
    println!("Next steps:");
    println!("  1. Adjust capacities and TTLs in {}", CONFIG_FILE);
    println!("  2. Check the durable store: evalcache status");

    Ok(())
}

/// Updates or creates .gitignore so the data directory is ignored.
fn update_gitignore(target_dir: &Path) -> CacheResult<()> {
    let gitignore_path = target_dir.join(".gitignore");
    let entry = format!("{}/", DATA_DIR);
    let comment = "# evalcache - local evaluation store";

    if gitignore_path.exists() {
        let content = std::fs::read_to_string(&gitignore_path)?;

        if content
            .lines()
            .any(|line| line.trim() == entry || line.trim() == DATA_DIR)
        {
            tracing::debug!(".gitignore already contains {}", entry);
            return Ok(());
        }

        let mut new_content = content.trim_end().to_string();
        if !new_content.is_empty() {
            new_content.push_str("\n\n");
        }
        new_content.push_str(comment);
        new_content.push('\n');
        new_content.push_str(&entry);
        new_content.push('\n');

        std::fs::write(&gitignore_path, new_content)?;
        println!(".gitignore updated with {}", entry);
    } else {
        std::fs::write(&gitignore_path, format!("{}\n{}\n", comment, entry))?;
        println!(".gitignore created with {}", entry);
    }

    Ok(())
}

/// Opens the configured store, or explains why there is none.
fn open_store(config: &StoreConfig) -> Option<JsonStore> {
    if !config.enabled {
        println!("Durable store is disabled in the configuration.");
        return None;
    }

    if !config.db_path.exists() {
        println!("Durable store has not been created yet: {}", config.db_path.display());
        return None;
    }

    Some(PersistentStore::open(config))
}

/// Shows durable store statistics.
pub async fn status(config: &Config) -> CacheResult<()> {
    let store_config = &config.store;
    println!("Durable store: {}", store_config.db_path.display());
    println!("Namespace: {}", store_config.namespace);

    let Some(store) = open_store(store_config) else {
        return Ok(());
    };

    if !store.is_available().await {
        println!("  ✗ unavailable (see log for details)");
        return Ok(());
    }

    let stats = store.try_stats().await?;
    println!("  ✓ available");
    println!("  entries: {} / {}", stats.size, store.capacity());
    match stats.oldest_entry {
        Some(oldest) => println!("  oldest entry: {}", oldest.to_rfc3339()),
        None => println!("  oldest entry: -"),
    }
    println!("  default TTL: {}s", store_config.default_ttl_secs);

    println!();
    println!("In-memory caches:");
    for (name, section) in [
        ("evaluate", &config.cache.evaluate),
        ("best_move", &config.cache.best_move),
    ] {
        println!(
            "  {}: capacity {}, TTL {}s, dedup window {}ms",
            name, section.capacity, section.ttl_secs, section.dedup_window_ms
        );
    }

    Ok(())
}

/// Prints a cached value.
pub async fn get(key: &str, config: &Config) -> CacheResult<()> {
    let Some(store) = open_store(&config.store) else {
        return Ok(());
    };

    match store.try_get(key).await? {
        Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        None => println!("Key not found: {}", key),
    }

    Ok(())
}

/// Removes expired and over-capacity entries.
pub async fn purge(config: &Config) -> CacheResult<()> {
    let Some(store) = open_store(&config.store) else {
        return Ok(());
    };

    let removed = store.enforce_capacity().await?;
    println!("Purged {} entries.", removed);

    Ok(())
}

/// Removes every entry in the configured namespace.
pub async fn clear(config: &Config) -> CacheResult<()> {
    let Some(store) = open_store(&config.store) else {
        return Ok(());
    };

    store.try_clear().await?;
    println!("Cleared namespace '{}'.", config.store.namespace);

    Ok(())
}

/// Shows version.
pub fn version() {
    println!("evalcache {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Deduplicating, tiered cache for chess position evaluations");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_gitignore_is_created_then_left_alone() {
        let dir = tempdir().unwrap();

        update_gitignore(dir.path()).unwrap();
        update_gitignore(dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(content.matches(".evalcache/").count(), 1);
    }

    #[test]
    fn test_gitignore_is_appended() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "target/\n").unwrap();

        update_gitignore(dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert!(content.starts_with("target/\n\n"));
        assert!(content.ends_with(".evalcache/\n"));
    }

    #[tokio::test]
    async fn test_init_writes_loadable_config() {
        let dir = tempdir().unwrap();

        init(Some(dir.path().to_path_buf())).await.unwrap();

        assert!(dir.path().join(DATA_DIR).is_dir());
        let config = Config::load(dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.store.namespace, "evaluations");
    }
}
