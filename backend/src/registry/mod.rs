pub mod evaluation_loader;
pub mod metric_registry;
pub mod module_registry;
pub mod node_registry;

pub use evaluation_loader::load_evaluation_model;
pub use metric_registry::MetricRegistry;
pub use module_registry::ModuleRegistry;
pub use node_registry::{load_nodes, single_node, DefaultCredentials};
