//! The interface between a [`Topology`] and a MILP solver.
//!
//! A solver reports its results per edge (or per node, for variables which belong to a single
//! node such as storage content) using the string labels of the nodes. Nothing about the meaning
//! of a result is implied by the solver: that is recovered later by the decoder.
use crate::topology::Topology;
use anyhow::Result;
use indexmap::IndexMap;
use indexmap::map::Entry;
use std::fmt;

pub mod highs;
pub use self::highs::HighsSolver;

/// Options passed through to the solver without interpretation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverOptions {
    /// Relative MIP gap at which the solver may stop
    pub mip_gap: f64,
    /// Wall-clock limit in seconds
    pub time_limit: Option<f64>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            mip_gap: 0.01,
            time_limit: None,
        }
    }
}

/// Something which can solve a topology
pub trait Solver {
    /// Solve the topology and return the value of every variable.
    ///
    /// An infeasible or unbounded model, or one for which no solution was found in time, is a
    /// [`SolveError`](crate::error::SolveError).
    fn solve(&self, topology: &Topology, options: &SolverOptions) -> Result<RawEdgeResults>;
}

/// The kind of a solver variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VariableKind {
    /// Energy flowing along an edge in one hour
    Flow,
    /// Invested capacity
    Invest,
    /// On/off status of a flow in one hour
    Status,
    /// Status multiplied by the nominal value
    StatusNominal,
    /// Total capacity, including any existing capacity
    Total,
    /// Content of a storage at the end of one hour
    StorageContent,
}

impl VariableKind {
    /// Whether the variable has one value per hour
    pub fn is_time_series(self) -> bool {
        matches!(
            self,
            Self::Flow | Self::Status | Self::StatusNominal | Self::StorageContent
        )
    }
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Flow => "flow",
            Self::Invest => "invest",
            Self::Status => "status",
            Self::StatusNominal => "status_nominal",
            Self::Total => "total",
            Self::StorageContent => "storage_content",
        };
        write!(f, "{s}")
    }
}

/// Identifies a solver result by node labels and variable kind
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawKey {
    /// Label of the node the edge starts at, or of the node the variable belongs to
    pub source: String,
    /// Label of the node the edge ends at, if the variable belongs to an edge
    pub target: Option<String>,
    /// The kind of variable
    pub kind: VariableKind,
}

impl RawKey {
    /// A key for a variable on the edge from `source` to `target`
    pub fn edge(source: impl Into<String>, target: impl Into<String>, kind: VariableKind) -> Self {
        Self {
            source: source.into(),
            target: Some(target.into()),
            kind,
        }
    }

    /// A key for a variable belonging to a single node
    pub fn node(node: impl Into<String>, kind: VariableKind) -> Self {
        Self {
            source: node.into(),
            target: None,
            kind,
        }
    }
}

impl fmt::Display for RawKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Some(target) => write!(f, "({}, {}) {}", self.source, target, self.kind),
            None => write!(f, "({}) {}", self.source, self.kind),
        }
    }
}

/// The value of a solver result
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// A single value
    Scalar(f64),
    /// One value per hour
    Series(Vec<f64>),
}

/// Solver results in the order the solver reported them
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawEdgeResults {
    n_steps: usize,
    values: IndexMap<RawKey, RawValue>,
}

impl RawEdgeResults {
    /// Create empty results for the given number of hours
    pub fn new(n_steps: usize) -> Self {
        Self {
            n_steps,
            values: IndexMap::new(),
        }
    }

    /// The number of hours covered
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Record a result. A value already recorded for the same key is kept.
    pub fn insert(&mut self, key: RawKey, value: RawValue) {
        if let Entry::Vacant(entry) = self.values.entry(key) {
            entry.insert(value);
        }
    }

    /// Iterate over the results in the order they were recorded
    pub fn iter(&self) -> impl Iterator<Item = (&RawKey, &RawValue)> {
        self.values.iter()
    }

    /// The number of results
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no results
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(RawKey, RawValue)> for RawEdgeResults {
    fn from_iter<T: IntoIterator<Item = (RawKey, RawValue)>>(iter: T) -> Self {
        let mut results = Self::default();
        for (key, value) in iter {
            if let RawValue::Series(series) = &value {
                results.n_steps = results.n_steps.max(series.len());
            }
            results.insert(key, value);
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_first() {
        let mut results = RawEdgeResults::new(1);
        let key = RawKey::edge("hp1", "heat network", VariableKind::Invest);
        results.insert(key.clone(), RawValue::Scalar(1.0));
        results.insert(key.clone(), RawValue::Scalar(2.0));
        assert_eq!(results.len(), 1);
        assert_eq!(results.iter().next(), Some((&key, &RawValue::Scalar(1.0))));
    }

    #[test]
    fn test_from_iter_n_steps() {
        let results: RawEdgeResults = [
            (
                RawKey::edge("hp1", "heat network", VariableKind::Flow),
                RawValue::Series(vec![1.0, 2.0]),
            ),
            (
                RawKey::node("tes1", VariableKind::Invest),
                RawValue::Scalar(5.0),
            ),
        ]
        .into_iter()
        .collect();
        assert_eq!(results.n_steps(), 2);
    }

    #[test]
    fn test_raw_key_display() {
        assert_eq!(
            RawKey::edge("gas network", "plb1", VariableKind::Flow).to_string(),
            "(gas network, plb1) flow"
        );
        assert_eq!(
            RawKey::node("tes1", VariableKind::StorageContent).to_string(),
            "(tes1) storage_content"
        );
    }
}
