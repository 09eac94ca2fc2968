//! Background Tasks Module
//!
//! - Expiry sweep: removes expired store entries at the configured interval

mod cleanup;

pub use cleanup::spawn_cleanup_task;
