//! Market-by-order book reconstruction
//!
//! Rebuilds an order-level ("level-3") book from a venue feed of order,
//! trade and aggregated depth events, and serves read-only copies of it to
//! a render path running on another thread.
//!
//! # Architecture
//!
//! ```text
//!  Producers (any thread)
//!        │  UpdateSender: stamp key, prime snapshot once
//!    ┌───▼────┐
//!    │Channel │  unbounded FIFO
//!    └───┬────┘
//!        │
//!    ┌───▼────┐  write lock   ┌─────────┐
//!    │Applier ├──────────────►│BookState│◄── Reaper (timer, write lock)
//!    └───┬────┘               └────┬────┘
//!        │ flagged orders          │ read lock
//!        └──────► Reaper     ┌─────▼─────┐
//!                            │BookReader │ range copies, aggregates
//!                            └───────────┘
//! ```
//!
//! Until the first order event arrives, queries are answered from the
//! level-2 depth store.

pub mod book;
pub mod channel;
pub mod config;
pub mod depth;
pub mod engine;
pub mod events;
pub mod location;
pub mod metrics;
pub mod order;
pub mod price_level;
pub mod reaper;
pub mod replay;
pub mod view;

pub use book::{BatchOutcome, BookState};
pub use config::BookConfig;
pub use engine::{BookEngine, BookReader};

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
