pub mod config;
pub mod error;
pub mod event;
pub mod model;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::{FlowError, Result};
pub use event::{EventBus, RunEvent};
pub use model::*;
pub use types::*;
