//! Session capability consumed by handlers.

mod handle;
mod store;

pub use handle::Session;
pub use store::{MemorySessionStore, SessionStore};
