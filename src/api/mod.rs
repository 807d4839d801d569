// API module
//
// This module contains the HTTP API the view layer talks to

pub mod handlers;
pub mod routes;

// Re-export main components for easier access
pub use routes::configure_routes;
