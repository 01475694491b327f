// Web Interface module root
pub mod routes;
pub mod types;
pub mod web_server;

// Re-export commonly used items
pub use routes::*;
pub use web_server::*;

/// API error payload
#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct ApiError {
    pub message: String,
}
