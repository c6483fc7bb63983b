pub mod builder;
pub mod features;
pub mod metrics;

pub use builder::{build_graph, CoGraph, NodeTable};
pub use features::{FeatureComputer, FeatureSettings, RunSummary};
pub use metrics::{pagerank, sampled_betweenness, weighted_degree};
