//! Types library for market-by-order book reconstruction
//!
//! This library provides the feed vocabulary shared by every consumer of the
//! host market-data subscriptions: identifiers, exact decimal prices and
//! volumes, and the order / trade / depth event structs as delivered.
//!
//! # Modules
//! - `ids`: Exchange order identifiers
//! - `numeric`: Fixed-point decimal types (Price, Volume)
//! - `order`: Book side and per-order (MBO) events
//! - `trade`: Trade executions
//! - `depth`: Aggregated (level-2) depth entries
//! - `errors`: Error taxonomy

// Public modules
pub mod ids;
pub mod numeric;
pub mod order;
pub mod trade;
pub mod depth;
pub mod errors;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::order::*;
    pub use crate::trade::*;
    pub use crate::depth::*;
    pub use crate::errors::*;
}
