pub mod client;
pub mod remote_store;
pub mod retry;

pub use client::HttpAgentBackend;
pub use remote_store::HttpWorkflowStore;
pub use retry::with_retry;
