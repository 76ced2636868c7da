use thiserror::Error;

pub type TopologyResult<T> = Result<T, TopologyError>;

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("unknown topology kind: {0}")]
    UnknownKind(String),

    #[error("node {node} depends on unknown resource {dependency}")]
    UnknownDependency { node: String, dependency: String },

    /// The dependency graph is not a DAG; names the nodes left over
    /// after every orderable node was placed.
    #[error("dependency cycle involving: {0}")]
    DependencyCycle(String),
}
