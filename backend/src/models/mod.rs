pub mod evaluation;
pub mod metric;
pub mod module;
pub mod node;
pub mod report;
pub mod result;

pub use evaluation::{EvaluationModel, HealthBand, ScoreInterval};
pub use metric::{AlertRuleDef, MetricDefinition, MetricType};
pub use module::ModuleNode;
pub use node::{NodeDescriptor, NodeRole};
pub use report::{
    AlertAttributes, ChartAttributes, ChartSeries, ChartType, CodeAttributes, DescriptionAttributes,
    DescriptionEntry, Element, Menu, Report, TableAttributes, TableColumn,
};
pub use result::{AlertInstance, Payload, ResultItem, Severity, WorkloadSeries};
