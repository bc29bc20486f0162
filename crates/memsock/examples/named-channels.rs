//! Create a few named channels, touch one, and let LRU eviction pick a victim.
//!
//! Run with:
//!   cargo run --example named-channels --features registry

use memsock::channel::{ChannelConfig, Role};
use memsock::registry::{ChannelRegistry, EvictionPolicy, RegistryConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let base_dir = std::env::temp_dir().join(format!("memsock-named-{}", std::process::id()));
    let mut registry = ChannelRegistry::new(RegistryConfig {
        max_channels: 2,
        eviction: EvictionPolicy::LeastRecentlyUsed,
        default_capacities: ChannelConfig::with_capacities(1024, 1024),
        ..RegistryConfig::with_base_dir(&base_dir)
    });

    registry.create("orders", Role::Server)?;
    registry.create("quotes", Role::Server)?;
    if let Some(orders) = registry.get_mut("orders") {
        orders.write(b"touch");
    }

    registry.create("fills", Role::Server)?;
    println!("open channels: {:?}", registry.names());

    registry.clear()?;
    std::fs::remove_dir_all(&base_dir)?;
    Ok(())
}
