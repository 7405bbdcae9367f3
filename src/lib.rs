//! Extracts OQuaRE ontology-quality metrics from the XML reports produced by
//! the OQuaRE evaluation tool.

pub mod config;
pub mod metric_map;
pub mod parser;
pub mod report;
pub mod xml;

pub use metric_map::MetricMap;
pub use parser::{truncate, Characteristic, MetricsError, MetricsParser};
pub use xml::XmlError;
