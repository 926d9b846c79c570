//! Upstream selection
//!
//! Requests normally go to the configured upstream. A request may instead
//! name its own upstream through the routing prefix, in which case a client
//! for that origin is built on the shared transport.

mod selector;

pub use selector::UpstreamSelector;
