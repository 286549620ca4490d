pub mod directory;
pub mod reports;
pub mod rest;
pub mod results_access;
pub mod state;

// Re-export the router and the OpenAPI document for the binaries.
pub use rest::{router, ApiDoc};
