use std::collections::HashMap;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use memsock_channel::{Channel, ChannelConfig, Role};
use tracing::{debug, info, warn};

use crate::config::{EvictionPolicy, RegistryConfig, FILE_EXTENSION};
use crate::error::{RegistryError, Result};

const MAX_NAME_LEN: usize = 64;

struct Entry {
    channel: Channel,
    /// Set when this registry created (and therefore owns) the backing file.
    created: bool,
    last_used: AtomicU64,
}

/// Named channels under one base directory.
///
/// The registry is the creator for channels added with [`create`] and a
/// joiner for channels added with [`open`]. Only files it created are ever
/// deleted, and only while they still are the file it created.
///
/// [`create`]: ChannelRegistry::create
/// [`open`]: ChannelRegistry::open
pub struct ChannelRegistry {
    config: RegistryConfig,
    entries: HashMap<String, Entry>,
    clock: AtomicU64,
}

impl ChannelRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            clock: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Backing file path for `name`.
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self
            .config
            .base_dir
            .join(format!("{name}.{FILE_EXTENSION}")))
    }

    /// Create and initialize a channel with the default capacities.
    pub fn create(&mut self, name: &str, role: Role) -> Result<&mut Channel> {
        self.create_with(name, role, self.config.default_capacities)
    }

    pub fn create_with(
        &mut self,
        name: &str,
        role: Role,
        config: ChannelConfig,
    ) -> Result<&mut Channel> {
        let (path, victims) = self.admit(name)?;
        std::fs::create_dir_all(&self.config.base_dir).map_err(|source| {
            RegistryError::BaseDir {
                path: self.config.base_dir.clone(),
                source,
            }
        })?;
        let channel = Channel::create(&path, config, role)?;
        self.evict(victims);
        Ok(self.insert(name, channel, true))
    }

    /// Join a channel another process created, with the default capacities.
    pub fn open(&mut self, name: &str, role: Role) -> Result<&mut Channel> {
        self.open_with(name, role, self.config.default_capacities)
    }

    pub fn open_with(
        &mut self,
        name: &str,
        role: Role,
        config: ChannelConfig,
    ) -> Result<&mut Channel> {
        let (path, victims) = self.admit(name)?;
        let channel = Channel::open(&path, config, role)?;
        self.evict(victims);
        Ok(self.insert(name, channel, false))
    }

    /// Validate the name and pick the channels that must go to make room.
    ///
    /// Nothing is evicted here; callers retire the victims only once the new
    /// channel exists.
    fn admit(&self, name: &str) -> Result<(PathBuf, Vec<String>)> {
        let path = self.path_for(name)?;
        if self.entries.contains_key(name) {
            return Err(RegistryError::AlreadyRegistered(name.to_string()));
        }

        let max = self.config.max_channels;
        if self.entries.len() < max {
            return Ok((path, Vec::new()));
        }
        if max == 0 || self.config.eviction == EvictionPolicy::Reject {
            return Err(RegistryError::Full { max });
        }
        let excess = self.entries.len() + 1 - max;
        Ok((path, self.least_recently_used(excess)))
    }

    fn evict(&mut self, victims: Vec<String>) {
        for victim in victims {
            info!(name = %victim, "evicting least recently used channel");
            if let Err(err) = self.remove(&victim) {
                warn!(name = %victim, error = %err, "eviction close failed");
            }
        }
    }

    fn insert(&mut self, name: &str, channel: Channel, created: bool) -> &mut Channel {
        info!(name, role = %channel.role(), created, "channel registered");
        let entry = Entry {
            channel,
            created,
            last_used: AtomicU64::new(self.tick()),
        };
        &mut self
            .entries
            .entry(name.to_string())
            .insert_entry(entry)
            .into_mut()
            .channel
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// The `count` entries touched longest ago, oldest first.
    fn least_recently_used(&self, count: usize) -> Vec<String> {
        let mut by_age: Vec<(u64, &String)> = self
            .entries
            .iter()
            .map(|(name, entry)| (entry.last_used.load(Ordering::Relaxed), name))
            .collect();
        by_age.sort_unstable();
        by_age
            .into_iter()
            .take(count)
            .map(|(_, name)| name.clone())
            .collect()
    }

    /// Look up a channel and mark it as recently used.
    pub fn get(&self, name: &str) -> Option<&Channel> {
        let entry = self.entries.get(name)?;
        entry.last_used.store(self.tick(), Ordering::Relaxed);
        Some(&entry.channel)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Channel> {
        let now = self.tick();
        let entry = self.entries.get_mut(name)?;
        *entry.last_used.get_mut() = now;
        Some(&mut entry.channel)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names in ascending order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Close a channel and, if policy allows, delete its backing file.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        let entry = self
            .entries
            .remove(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        self.retire(name, entry)
    }

    /// Remove every channel. Returns the first close error, if any.
    pub fn clear(&mut self) -> Result<()> {
        let mut first_err = None;
        for name in self.names() {
            if let Some(entry) = self.entries.remove(&name) {
                if let Err(err) = self.retire(&name, entry) {
                    warn!(name, error = %err, "failed to close channel");
                    first_err.get_or_insert(err);
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn retire(&self, name: &str, entry: Entry) -> Result<()> {
        let Entry {
            channel, created, ..
        } = entry;
        let path = channel.path().to_path_buf();
        let identity = channel.file_identity();
        let closed = channel.close();

        if created && self.config.remove_on_evict {
            remove_if_same_file(&path, identity);
        }
        info!(name, "channel removed");
        closed.map_err(RegistryError::from)
    }
}

impl Drop for ChannelRegistry {
    fn drop(&mut self) {
        if let Err(err) = self.clear() {
            debug!(error = %err, "registry drop closed channels with errors");
        }
    }
}

impl std::fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("base_dir", &self.config.base_dir)
            .field("channels", &self.names())
            .finish()
    }
}

fn remove_if_same_file(path: &Path, (dev, ino): (u64, u64)) {
    match std::fs::symlink_metadata(path) {
        Ok(metadata)
            if metadata.file_type().is_file() && metadata.dev() == dev && metadata.ino() == ino =>
        {
            debug!(?path, "removing channel file");
            if let Err(err) = std::fs::remove_file(path) {
                warn!(?path, error = %err, "failed to remove channel file");
            }
        }
        Ok(_) => {
            debug!(?path, "channel file replaced since creation, leaving in place");
        }
        Err(err) => {
            debug!(?path, error = %err, "channel file already gone");
        }
    }
}

/// Names become file stems, so they are restricted to a portable subset.
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = |reason| RegistryError::InvalidName {
        name: name.to_string(),
        reason,
    };
    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid("name is longer than 64 bytes"));
    }
    if name.starts_with('.') {
        return Err(invalid("name starts with '.'"));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
    {
        return Err(invalid("only ASCII letters, digits, '.', '_' and '-' are allowed"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(label: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        PathBuf::from(format!(
            "/tmp/memsock-reg-{label}-{}-{nanos}",
            std::process::id()
        ))
    }

    fn config(label: &str) -> RegistryConfig {
        RegistryConfig {
            default_capacities: ChannelConfig::with_capacities(16, 16),
            ..RegistryConfig::with_base_dir(temp_dir(label))
        }
    }

    #[test]
    fn names_are_validated() {
        for bad in ["", ".hidden", "a/b", "sp ace", "ü", "x".repeat(65).as_str()] {
            assert!(
                matches!(validate_name(bad), Err(RegistryError::InvalidName { .. })),
                "{bad:?} should be rejected"
            );
        }
        for good in ["a", "orders.v2", "feed_1-east", "x".repeat(64).as_str()] {
            assert!(validate_name(good).is_ok(), "{good:?} should be accepted");
        }
    }

    #[test]
    fn creator_and_joiner_share_a_channel() {
        let cfg = config("pair");
        let base = cfg.base_dir.clone();
        let mut creator = ChannelRegistry::new(cfg.clone());
        let mut joiner = ChannelRegistry::new(cfg);

        creator.create("quotes", Role::Server).unwrap();
        joiner.open("quotes", Role::Client).unwrap();

        assert_eq!(creator.get_mut("quotes").unwrap().write(b"tick"), 4);
        let mut buf = [0u8; 8];
        assert_eq!(joiner.get_mut("quotes").unwrap().read(&mut buf), 4);
        assert_eq!(&buf[..4], b"tick");
        assert!(base.join("quotes.memsock").exists());

        drop(joiner);
        drop(creator);
        assert!(!base.join("quotes.memsock").exists());
        let _ = std::fs::remove_dir_all(&base);
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut registry = ChannelRegistry::new(config("dup"));
        registry.create("a", Role::Server).unwrap();
        let err = registry.create("a", Role::Server).unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyRegistered(name) if name == "a"));
        let base = registry.config().base_dir.clone();
        drop(registry);
        let _ = std::fs::remove_dir_all(&base);
    }

    #[test]
    fn reject_policy_reports_full() {
        let mut cfg = config("full");
        cfg.max_channels = 2;
        let mut registry = ChannelRegistry::new(cfg);
        registry.create("a", Role::Server).unwrap();
        registry.create("b", Role::Server).unwrap();
        let err = registry.create("c", Role::Server).unwrap_err();
        assert!(matches!(err, RegistryError::Full { max: 2 }));
        assert_eq!(registry.names(), vec!["a", "b"]);
        let base = registry.config().base_dir.clone();
        drop(registry);
        let _ = std::fs::remove_dir_all(&base);
    }

    #[test]
    fn lru_policy_evicts_least_recently_touched() {
        let mut cfg = config("lru");
        cfg.max_channels = 2;
        cfg.eviction = EvictionPolicy::LeastRecentlyUsed;
        let base = cfg.base_dir.clone();
        let mut registry = ChannelRegistry::new(cfg);

        registry.create("a", Role::Server).unwrap();
        registry.create("b", Role::Server).unwrap();
        assert!(registry.get("a").is_some());
        registry.create("c", Role::Server).unwrap();

        assert_eq!(registry.names(), vec!["a", "c"]);
        assert!(!base.join("b.memsock").exists());
        drop(registry);
        let _ = std::fs::remove_dir_all(&base);
    }

    #[test]
    fn failed_open_under_lru_keeps_existing_channel() {
        let mut cfg = config("lrufail");
        cfg.max_channels = 1;
        cfg.eviction = EvictionPolicy::LeastRecentlyUsed;
        let base = cfg.base_dir.clone();
        let mut registry = ChannelRegistry::new(cfg);

        registry.create("live", Role::Server).unwrap();
        let err = registry.open("missing", Role::Client).unwrap_err();
        assert!(matches!(err, RegistryError::Channel(_)));

        assert_eq!(registry.names(), vec!["live"]);
        assert!(base.join("live.memsock").exists());
        assert_eq!(registry.get_mut("live").unwrap().write(b"ok"), 2);
        drop(registry);
        let _ = std::fs::remove_dir_all(&base);
    }

    #[test]
    fn failed_create_under_lru_keeps_existing_channel() {
        let mut cfg = config("lrubad");
        cfg.max_channels = 1;
        cfg.eviction = EvictionPolicy::LeastRecentlyUsed;
        let base = cfg.base_dir.clone();
        let mut registry = ChannelRegistry::new(cfg);

        registry.create("live", Role::Server).unwrap();
        let err = registry
            .create_with("bad", Role::Server, ChannelConfig::with_capacities(0, 8))
            .unwrap_err();
        assert!(matches!(err, RegistryError::Channel(inner) if inner.is_capacity_error()));
        assert_eq!(registry.names(), vec!["live"]);
        assert!(base.join("live.memsock").exists());
        drop(registry);
        let _ = std::fs::remove_dir_all(&base);
    }

    #[test]
    fn zero_capacity_registry_rejects_even_with_lru() {
        let mut cfg = config("zero");
        cfg.max_channels = 0;
        cfg.eviction = EvictionPolicy::LeastRecentlyUsed;
        let mut registry = ChannelRegistry::new(cfg);
        assert!(matches!(
            registry.create("a", Role::Server),
            Err(RegistryError::Full { max: 0 })
        ));
    }

    #[test]
    fn remove_keeps_files_the_registry_did_not_create() {
        let cfg = config("joined");
        let base = cfg.base_dir.clone();
        let mut creator = ChannelRegistry::new(RegistryConfig {
            remove_on_evict: false,
            ..cfg.clone()
        });
        creator.create("kept", Role::Server).unwrap();

        let mut joiner = ChannelRegistry::new(cfg);
        joiner.open("kept", Role::Client).unwrap();
        joiner.remove("kept").unwrap();
        assert!(!joiner.contains("kept"));
        assert!(base.join("kept.memsock").exists());

        creator.remove("kept").unwrap();
        assert!(base.join("kept.memsock").exists());
        let _ = std::fs::remove_dir_all(&base);
    }

    #[test]
    fn replaced_file_is_not_deleted() {
        let cfg = config("replaced");
        let base = cfg.base_dir.clone();
        let mut registry = ChannelRegistry::new(cfg);
        registry.create("swap", Role::Server).unwrap();
        let path = registry.path_for("swap").unwrap();

        std::fs::remove_file(&path).unwrap();
        std::fs::write(&path, b"someone else's file").unwrap();

        registry.remove("swap").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"someone else's file");
        let _ = std::fs::remove_dir_all(&base);
    }

    #[test]
    fn open_missing_channel_surfaces_channel_error() {
        let mut registry = ChannelRegistry::new(config("missing"));
        let err = registry.open("nope", Role::Client).unwrap_err();
        match err {
            RegistryError::Channel(inner) => assert!(inner.is_creation_error()),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_unknown_is_not_found() {
        let mut registry = ChannelRegistry::new(config("unknown"));
        assert!(matches!(
            registry.remove("ghost"),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn clear_closes_everything() {
        let cfg = config("clear");
        let base = cfg.base_dir.clone();
        let mut registry = ChannelRegistry::new(cfg);
        registry.create("x", Role::Server).unwrap();
        registry
            .create_with("y", Role::Client, ChannelConfig::with_capacities(8, 32))
            .unwrap();
        assert_eq!(
            registry
                .get("y")
                .unwrap()
                .capacity(memsock_channel::Direction::ClientToServer),
            32
        );
        assert_eq!(registry.len(), 2);

        registry.clear().unwrap();
        assert!(registry.is_empty());
        assert!(!base.join("x.memsock").exists());
        assert!(!base.join("y.memsock").exists());
        let _ = std::fs::remove_dir_all(&base);
    }
}
