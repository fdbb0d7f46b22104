pub mod canvas;
pub mod document;
pub mod edit;
pub mod plan;
pub mod storable;

pub use canvas::{Canvas, CanvasHandle};
pub use edit::{EditCommand, EditOutcome};
pub use plan::{ExecutionPlan, PlanStep, StepTarget};
pub use storable::{StorableEdge, StorableGraph, StorableNode};
