use std::net::SocketAddr;

use log::info;

use super::routes::{routes, SharedStore};
use crate::error_handling::types::WebError;

/// Web server for the HTTP API and dashboard
pub struct WebServer {
    store: SharedStore,
}

impl WebServer {
    /// Create a new WebServer instance
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Start the web server on the given address
    pub async fn start(&self, addr: SocketAddr) -> Result<(), WebError> {
        if addr.port() != 0 {
            // warp panics on a taken address, so check it first.
            std::net::TcpListener::bind(addr)
                .map_err(|e| WebError::BindFailed(format!("{}: {}", addr, e)))?;
        }
        info!("Web interface listening on http://{}", addr);
        warp::serve(routes(self.store.clone())).run(addr).await;
        Ok(())
    }
}
