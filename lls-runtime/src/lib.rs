extern crate crossbeam;
extern crate futures;
extern crate tokio;

/// Network-layer address types that can key a resolution cache.
pub mod addr;

/// Periodic aging of cache entries: expiry, proactive refresh of held mappings, and
/// retransmission of unanswered requests.
pub mod aging;

/// The per-family resolution cache. The owning core mutates it; every other core reads
/// published records without locking.
pub mod cache;

/// The bounded modification channel carrying learn, hold and release requests from any core to
/// the owning core.
pub mod channel;

pub mod config;

/// The owning core's state and its loop iteration, plus the handles worker cores use to look up,
/// hold and release addresses.
pub mod context;

pub mod error;

/// Interfaces served by the subsystem, as handed over at startup.
pub mod interface;

/// Packet buffer allocation and transmission.
pub mod io;

pub mod lifecycle;

/// Processors take one packet and give back at most one, which is exactly the shape of a
/// protocol handler answering requests.
pub mod processor;

/// ARP and IPv6 neighbor discovery handling.
pub mod protocol;

/// Runs the owning core on a Tokio runtime.
pub mod runner;

/// Construction and transmission of resolution requests, and the retry budget they draw from.
pub mod transmitter;

/// Utility module
mod utils;
