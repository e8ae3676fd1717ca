//! CLI command implementations

pub mod put;
pub mod reconcile;
pub mod rm;
pub mod serve;

pub use put::PutCommand;
pub use reconcile::ReconcileCommand;
pub use rm::RmCommand;
pub use serve::ServeCommand;
