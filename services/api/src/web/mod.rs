pub mod auth;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod stats;
pub mod timer;

#[cfg(test)]
mod test_support;

// Re-export the pieces the binary needs to build the router.
pub use middleware::require_auth;
pub use rest::ApiDoc;
pub use state::AppState;
