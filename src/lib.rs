pub mod billing;
pub use billing::*;

pub mod configuration;

pub mod controller;
pub use controller::*;

pub mod error_handling;

pub mod session_management;
pub use session_management::*;

pub mod storage;

pub mod web_interface;
