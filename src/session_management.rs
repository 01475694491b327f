//! Session management core module.
//!
//! A session is the stay of one vehicle, from the moment its plate is
//! registered until it is paid out and removed. This module provides plate
//! normalization, the session record and the store that owns every open
//! session.

/// Submodule for plate normalization and validation.
pub mod plate;
/// Submodule for the parking session record.
pub mod session;
/// Submodule for the session store.
pub mod session_manager;

pub use plate::Plate;
pub use session::ParkingSession;
pub use session_manager::{LiveEntry, SessionStore, DEFAULT_STORAGE_KEY};
