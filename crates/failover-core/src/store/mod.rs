// # Record Store Implementations
//
// Record stores that live inside the core crate. Provider-backed stores
// (Cloudflare, ...) live in their own crates.

pub mod memory;

pub use memory::MemoryRecordStore;
