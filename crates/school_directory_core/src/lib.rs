pub mod dashboard;
pub mod domain;
pub mod error;
pub mod filters;
pub mod ports;
pub mod records;
pub mod rules;
pub mod seed;
pub mod store;

pub use dashboard::{build_admin_dashboard, AdminDashboard, DashboardInput};
pub use error::{StoreError, StoreResult};
pub use ports::{DirectoryService, PortError, PortResult};
pub use store::{DirectoryStore, StoreSettings};
