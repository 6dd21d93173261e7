//! The network of buses and components which makes up the optimisation model.
//!
//! Nodes live in a [`petgraph`] graph and are referred to by typed handles. Every edge joins a
//! component to a bus and carries a [`Flow`], which is the only kind of variable the solver sees on
//! an edge. Edges point in the direction of the energy flow, so an edge from a bus to a component
//! is an input of that component.
use crate::catalog::UnitKey;
use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use petgraph::Direction;
use petgraph::graph::{EdgeIndex, Graph, NodeIndex};
use std::fmt;
use std::str::FromStr;

pub mod builder;
pub use builder::build;

/// Handle for a bus in a [`Topology`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BusId(NodeIndex);

/// Handle for a component in a [`Topology`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(NodeIndex);

/// The name of a node, unique within a topology.
///
/// Solver results refer to nodes by the string form of their label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeLabel {
    /// The gas bus
    GasBus,
    /// The electricity bus
    ElectricityBus,
    /// The heat network
    HeatBus,
    /// Collects electricity generated by CHP plants
    ChpNode,
    /// Gas procurement
    GasSource,
    /// Electricity procurement from the grid
    ElectricitySource,
    /// Heat demand of the network
    HeatDemand,
    /// Electricity sold on the spot market
    Spotmarket,
    /// Passes CHP electricity on to the electricity bus for own consumption
    InternalRouter,
    /// A unit from the catalog
    Unit(UnitKey),
}

impl NodeLabel {
    /// The unit this node belongs to, if any
    pub fn unit(self) -> Option<UnitKey> {
        match self {
            Self::Unit(key) => Some(key),
            _ => None,
        }
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::GasBus => "gas network",
            Self::ElectricityBus => "electricity network",
            Self::HeatBus => "heat network",
            Self::ChpNode => "chp node",
            Self::GasSource => "gas source",
            Self::ElectricitySource => "electricity source",
            Self::HeatDemand => "heat demand",
            Self::Spotmarket => "spotmarket",
            Self::InternalRouter => "internal electricity",
            Self::Unit(key) => return write!(f, "{key}"),
        };
        write!(f, "{s}")
    }
}

impl FromStr for NodeLabel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let label = match s {
            "gas network" => Self::GasBus,
            "electricity network" => Self::ElectricityBus,
            "heat network" => Self::HeatBus,
            "chp node" => Self::ChpNode,
            "gas source" => Self::GasSource,
            "electricity source" => Self::ElectricitySource,
            "heat demand" => Self::HeatDemand,
            "spotmarket" => Self::Spotmarket,
            "internal electricity" => Self::InternalRouter,
            _ => Self::Unit(s.parse().with_context(|| format!("Unknown node label: {s}"))?),
        };

        Ok(label)
    }
}

/// An investment decision attached to a flow or storage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Investment {
    /// Lower bound of the invested capacity
    pub minimum: f64,
    /// Upper bound of the invested capacity
    pub maximum: f64,
    /// Annualised cost per unit of invested capacity
    pub ep_costs: f64,
}

/// The nominal value (capacity) of a flow or storage
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Nominal {
    /// Nominal value is given
    Fixed(f64),
    /// Nominal value is a decision variable
    Invest(Investment),
}

impl Nominal {
    /// The largest value the nominal value can take
    pub fn upper_bound(&self) -> f64 {
        match self {
            Self::Fixed(value) => *value,
            Self::Invest(investment) => investment.maximum,
        }
    }
}

/// Parameters of the flow variables on an edge, one variable per hour
#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
    /// Cost per MWh for every hour (negative for revenues)
    pub variable_costs: Vec<f64>,
    /// The nominal value the relative bounds refer to. Without one, the flow is unbounded above.
    pub nominal: Option<Nominal>,
    /// Lower bound relative to the nominal value while the flow is active
    pub min: f64,
    /// Upper bound relative to the nominal value
    pub max: f64,
    /// Fixes the flow for every hour, relative to the nominal value
    pub fix: Option<Vec<f64>>,
    /// Whether the flow has an on/off status
    pub nonconvex: bool,
}

impl Flow {
    /// A free flow with the given costs
    pub fn new(variable_costs: Vec<f64>) -> Self {
        Self {
            variable_costs,
            nominal: None,
            min: 0.0,
            max: 1.0,
            fix: None,
            nonconvex: false,
        }
    }

    /// A free flow without costs
    pub fn free(n_steps: usize) -> Self {
        Self::new(vec![0.0; n_steps])
    }

    /// Set the nominal value
    pub fn with_nominal(mut self, nominal: Nominal) -> Self {
        self.nominal = Some(nominal);
        self
    }

    /// Set the dispatch range and make the flow nonconvex
    pub fn with_commitment(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self.nonconvex = true;
        self
    }

    /// Fix the flow to a profile relative to the nominal value
    pub fn with_fix(mut self, fix: Vec<f64>) -> Self {
        self.fix = Some(fix);
        self
    }
}

/// Parameters of a storage component
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StorageSpec {
    /// The storage capacity (MWh)
    pub capacity: Nominal,
    /// Content at the start of the horizon as a fraction of the capacity
    pub initial_level: f64,
    /// Fraction of the content lost every hour
    pub loss_rate: f64,
    /// Whether the content at the end must equal the content at the start
    pub balanced: bool,
    /// Invested charging capacity per unit of invested storage capacity
    pub invest_relation_input: f64,
    /// Invested discharging capacity per unit of invested storage capacity
    pub invest_relation_output: f64,
}

/// What a component does with its flows
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentKind {
    /// Feeds its output flow into a bus
    Source,
    /// Takes its input flow from a bus
    Sink,
    /// Converts a single input into one or more outputs.
    ///
    /// Each output bus is mapped to its flow per unit of input.
    Converter(IndexMap<BusId, f64>),
    /// Stores energy between hours
    Storage(StorageSpec),
}

/// A node of the graph
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A balance point for one commodity
    Bus(NodeLabel),
    /// A source, sink, converter or storage
    Component(NodeLabel, ComponentKind),
}

impl Node {
    /// The label of the node
    pub fn label(&self) -> NodeLabel {
        match self {
            Self::Bus(label) | Self::Component(label, _) => *label,
        }
    }
}

/// An edge of the topology as seen from outside
#[derive(Debug, Clone, Copy)]
pub struct EdgeRef<'a> {
    /// The edge's index in the graph
    pub index: EdgeIndex,
    /// Where the flow comes from
    pub source: NodeIndex,
    /// Where the flow goes to
    pub target: NodeIndex,
    /// The flow on the edge
    pub flow: &'a Flow,
}

/// The complete model for one run.
///
/// Built once by [`build`] and read-only thereafter.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    graph: Graph<Node, Flow>,
    labels: IndexMap<NodeLabel, NodeIndex>,
    units: IndexMap<UnitKey, ComponentId>,
    n_steps: usize,
}

impl Topology {
    /// Create an empty topology covering the given number of hours
    pub fn new(n_steps: usize) -> Self {
        Self {
            n_steps,
            ..Default::default()
        }
    }

    /// The number of hours covered
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Add a bus
    pub fn add_bus(&mut self, label: NodeLabel) -> Result<BusId> {
        self.add_node(Node::Bus(label)).map(BusId)
    }

    /// Add a component
    pub fn add_component(&mut self, label: NodeLabel, kind: ComponentKind) -> Result<ComponentId> {
        let id = ComponentId(self.add_node(Node::Component(label, kind))?);
        if let NodeLabel::Unit(key) = label {
            self.units.insert(key, id);
        }

        Ok(id)
    }

    fn add_node(&mut self, node: Node) -> Result<NodeIndex> {
        let label = node.label();
        if self.labels.contains_key(&label) {
            bail!("Duplicate node label: {label}");
        }
        let index = self.graph.add_node(node);
        self.labels.insert(label, index);

        Ok(index)
    }

    /// Add a flow from a bus into a component
    pub fn add_input(&mut self, bus: BusId, component: ComponentId, flow: Flow) -> EdgeIndex {
        self.graph.add_edge(bus.0, component.0, flow)
    }

    /// Add a flow from a component into a bus
    pub fn add_output(&mut self, component: ComponentId, bus: BusId, flow: Flow) -> EdgeIndex {
        self.graph.add_edge(component.0, bus.0, flow)
    }

    /// The node with the given index
    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.graph[index]
    }

    /// The label of the node with the given index
    pub fn label(&self, index: NodeIndex) -> NodeLabel {
        self.graph[index].label()
    }

    /// Look up a bus by label
    pub fn bus(&self, label: NodeLabel) -> Option<BusId> {
        let index = *self.labels.get(&label)?;
        matches!(self.graph[index], Node::Bus(_)).then_some(BusId(index))
    }

    /// Look up the component of a unit
    pub fn unit_component(&self, key: &UnitKey) -> Option<ComponentId> {
        self.units.get(key).copied()
    }

    /// The graph index of a bus
    pub fn bus_index(&self, bus: BusId) -> NodeIndex {
        bus.0
    }

    /// The graph index of a component
    pub fn component_index(&self, component: ComponentId) -> NodeIndex {
        component.0
    }

    /// Iterate over the buses
    pub fn iter_buses(&self) -> impl Iterator<Item = (BusId, NodeLabel)> + '_ {
        self.graph
            .node_indices()
            .filter_map(|index| match &self.graph[index] {
                Node::Bus(label) => Some((BusId(index), *label)),
                Node::Component(..) => None,
            })
    }

    /// Iterate over the components
    pub fn iter_components(
        &self,
    ) -> impl Iterator<Item = (ComponentId, NodeLabel, &ComponentKind)> + '_ {
        self.graph
            .node_indices()
            .filter_map(|index| match &self.graph[index] {
                Node::Component(label, kind) => Some((ComponentId(index), *label, kind)),
                Node::Bus(_) => None,
            })
    }

    /// Iterate over the edges in the order they were added
    pub fn iter_edges(&self) -> impl Iterator<Item = EdgeRef<'_>> + '_ {
        self.graph.edge_indices().map(|index| {
            let (source, target) = self
                .graph
                .edge_endpoints(index)
                .expect("Edge indices are always valid");
            EdgeRef {
                index,
                source,
                target,
                flow: &self.graph[index],
            }
        })
    }

    /// The edges entering a node
    pub fn incoming(&self, index: NodeIndex) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.edges_directed(index, Direction::Incoming)
    }

    /// The edges leaving a node
    pub fn outgoing(&self, index: NodeIndex) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.edges_directed(index, Direction::Outgoing)
    }

    fn edges_directed(
        &self,
        index: NodeIndex,
        direction: Direction,
    ) -> impl Iterator<Item = EdgeIndex> + '_ {
        use petgraph::visit::EdgeRef as _;

        let mut edges: Vec<_> = self
            .graph
            .edges_directed(index, direction)
            .map(|edge| edge.id())
            .collect();
        // petgraph yields edges newest first
        edges.sort();
        edges.into_iter()
    }

    /// The other end of an edge
    pub fn edge_endpoints(&self, edge: EdgeIndex) -> (NodeIndex, NodeIndex) {
        self.graph
            .edge_endpoints(edge)
            .expect("Edge indices are always valid")
    }

    /// The flow on an edge
    pub fn flow(&self, edge: EdgeIndex) -> &Flow {
        &self.graph[edge]
    }

    /// Whether a CHP node is present
    pub fn has_chp_node(&self) -> bool {
        self.bus(NodeLabel::ChpNode).is_some()
    }

    /// The number of buses
    pub fn bus_count(&self) -> usize {
        self.iter_buses().count()
    }

    /// The number of components
    pub fn component_count(&self) -> usize {
        self.iter_components().count()
    }

    /// The number of edges
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}
