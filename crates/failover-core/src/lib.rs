// # failover-core
//
// Core library for the DNS failover controller.
//
// ## Architecture Overview
//
// This library keeps a domain's A/AAAA records pointed at a healthy node:
// - **Prober**: Trait for TLS health checks that dial a node IP but verify the public host
// - **Resolver**: Trait for reading the addresses currently published for the domain
// - **decide**: Pure decision engine picking whether and where to switch
// - **RecordSynchronizer**: Applies a switch to the record store (guards, writes, echo verification)
// - **RecordStore**: Trait for reading and mutating DNS records via provider APIs
// - **Watcher**: Drives one resolve → probe → decide → reconcile cycle per interval
// - **StoreRegistry**: Plugin-based registry for record stores
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from network implementations
// 2. **Pure Decisions**: The decision engine never performs I/O
// 3. **Plugin-Based**: Record stores are registered dynamically, no hard-coded if-else
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Guarded Writes**: Source check and cooldown before every switch, echo check after

pub mod addr;
pub mod config;
pub mod decision;
pub mod error;
pub mod model;
pub mod registry;
pub mod store;
pub mod sync;
pub mod traits;
pub mod watch;

// Re-export core types for convenience
pub use addr::address_equal;
pub use config::{FailoverConfig, NodeConfig, RecordStoreConfig};
pub use decision::decide;
pub use error::{Error, Result};
pub use model::{
    AdvertisedState, Decision, Family, Node, ProbeResult, RecordName, RecordSet, Switch,
    ZoneRecord,
};
pub use registry::StoreRegistry;
pub use store::MemoryRecordStore;
pub use sync::{RecordLookup, RecordSynchronizer, SyncOutcome};
pub use traits::{Prober, RecordStore, RecordStoreFactory, Resolver};
pub use watch::{CycleReport, WatchEvent, Watcher};
