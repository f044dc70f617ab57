// # Network Probing and Resolution
//
// This crate provides the network-facing halves of the failover controller:
//
// - [`HttpsProber`]: fetches the health URL from one node by dialing its
//   address directly while validating the certificate of the public host
// - [`SystemResolver`]: reads the domain's published addresses through the
//   operating system resolver
//
// ## Architecture
//
// Both types are stateless between calls. Every call carries an explicit
// timeout and no call is retried; the watch loop's next tick is the retry.

mod prober;
mod resolver;

pub use prober::HttpsProber;
pub use resolver::{DEFAULT_RESOLVE_TIMEOUT, SystemResolver};
