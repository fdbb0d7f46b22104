pub mod catalog;
pub mod orchestrator;
pub mod runs;

pub use catalog::StaticCatalog;
pub use orchestrator::{Orchestrator, RunTarget};
pub use runs::{RunGuard, RunRegistry};
