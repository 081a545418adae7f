//! Storage abstraction for cached sessions.
//!
//! The trait keeps the cache independent of the map implementation; the
//! default [`DashMapConnectionStorage`] gives lock-free slot lookup while each
//! slot carries its own async mutex.

mod connection;
mod traits;

pub use connection::DashMapConnectionStorage;
pub use traits::{ConnectionStorage, SessionHandle, SessionSlot};
