//! A [`Solver`] backed by the HiGHS MILP solver.
//!
//! Every flow gets one column per hour. Invested nominal values get one column each, which carries
//! the annualised investment cost. Nonconvex flows get a binary status column per hour and, when
//! their nominal value is invested, a linearised status-nominal column (status × capacity).
use super::{RawEdgeResults, RawKey, RawValue, Solver, SolverOptions, VariableKind};
use crate::error::SolveError;
use crate::topology::{BusId, ComponentKind, Flow, Nominal, StorageSpec, Topology};
use ::highs::{Col, HighsModelStatus, RowProblem, Sense};
use anyhow::{Result, bail};
use indexmap::IndexMap;
use log::{debug, info, warn};
use petgraph::graph::{EdgeIndex, NodeIndex};
use std::ops::RangeBounds;

/// A column of the problem together with its position in the solution
#[derive(Debug, Clone, Copy)]
struct Variable {
    col: Col,
    index: usize,
}

/// A [`RowProblem`] which keeps track of column positions
#[derive(Default)]
struct Problem {
    inner: RowProblem,
    n_cols: usize,
}

impl Problem {
    fn add_column<B: RangeBounds<f64>>(&mut self, cost: f64, bounds: B) -> Variable {
        let col = self.inner.add_column(cost, bounds);
        self.track(col)
    }

    fn add_binary_column(&mut self) -> Variable {
        let col = self.inner.add_integer_column(0.0, 0.0..=1.0);
        self.track(col)
    }

    fn track(&mut self, col: Col) -> Variable {
        let variable = Variable {
            col,
            index: self.n_cols,
        };
        self.n_cols += 1;
        variable
    }

    fn add_row<B, I>(&mut self, bounds: B, terms: I)
    where
        B: RangeBounds<f64>,
        I: IntoIterator<Item = (Variable, f64)>,
    {
        self.inner.add_row(
            bounds,
            terms
                .into_iter()
                .map(|(variable, coeff)| (variable.col, coeff)),
        );
    }
}

/// The variables belonging to one edge
struct EdgeVariables {
    flow: Vec<Variable>,
    invest: Option<Variable>,
    status: Option<Vec<Variable>>,
    status_nominal: Option<Vec<Variable>>,
    /// Fixed nominal value of a nonconvex flow, used to report status × nominal value
    fixed_nominal: Option<f64>,
}

/// The variables belonging to one storage
struct StorageVariables {
    content: Vec<Variable>,
    invest: Option<Variable>,
}

/// Solves topologies with HiGHS
#[derive(Debug, Clone, Copy, Default)]
pub struct HighsSolver {
    /// Whether to print the solver's own log to the console
    pub verbose: bool,
}

impl HighsSolver {
    /// Create a new [`HighsSolver`]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl Solver for HighsSolver {
    fn solve(&self, topology: &Topology, options: &SolverOptions) -> Result<RawEdgeResults> {
        let mut problem = Problem::default();

        let mut edges = IndexMap::new();
        for edge in topology.iter_edges() {
            edges.insert(
                edge.index,
                add_flow_variables(&mut problem, edge.flow, topology.n_steps()),
            );
        }

        let mut storages = IndexMap::new();
        for (component, _, kind) in topology.iter_components() {
            let index = topology.component_index(component);
            match kind {
                ComponentKind::Storage(spec) => {
                    let variables = add_storage(&mut problem, topology, &edges, index, spec)?;
                    storages.insert(index, variables);
                }
                ComponentKind::Converter(factors) => {
                    add_conversion_constraints(&mut problem, topology, &edges, index, factors)?;
                }
                ComponentKind::Source | ComponentKind::Sink => {}
            }
        }
        add_bus_balances(&mut problem, topology, &edges);

        debug!("Solving problem with {} columns", problem.n_cols);
        let mut model = problem.inner.optimise(Sense::Minimise);
        model.set_option("output_flag", self.verbose);
        model.set_option("mip_rel_gap", options.mip_gap);
        if let Some(time_limit) = options.time_limit {
            model.set_option("time_limit", time_limit);
        }

        let solved = model
            .try_solve()
            .map_err(|status| SolveError::new(format!("{status:?}")))?;
        check_status(solved.status(), || solved.mip_gap())?;
        let solution = solved.get_solution();
        let values = solution.columns();
        info!("Solved model with HiGHS");

        Ok(collect_results(topology, &edges, &storages, values))
    }
}

/// Check that the solver stopped with a usable solution.
///
/// A solve interrupted by a time or iteration limit is accepted when HiGHS holds a feasible
/// solution, which it reports through a finite MIP gap.
fn check_status<F>(status: HighsModelStatus, mip_gap: F) -> Result<()>
where
    F: FnOnce() -> f64,
{
    match status {
        HighsModelStatus::Optimal => Ok(()),
        HighsModelStatus::ReachedTimeLimit | HighsModelStatus::ReachedIterationLimit => {
            let gap = mip_gap();
            if !gap.is_finite() {
                return Err(SolveError::new(format!("{status:?}")).into());
            }
            warn!(
                "Solver stopped early ({status:?}), using the best solution found (MIP gap {gap})"
            );
            Ok(())
        }
        status => Err(SolveError::new(format!("{status:?}")).into()),
    }
}

/// Add the columns of a flow and the rows linking them to the nominal value
fn add_flow_variables(problem: &mut Problem, flow: &Flow, n_steps: usize) -> EdgeVariables {
    let mut variables = EdgeVariables {
        flow: Vec::with_capacity(n_steps),
        invest: None,
        status: None,
        status_nominal: None,
        fixed_nominal: None,
    };

    match flow.nominal {
        None => {
            for t in 0..n_steps {
                let cost = flow.variable_costs[t];
                let variable = match &flow.fix {
                    Some(fix) => problem.add_column(cost, fix[t]..=fix[t]),
                    None => problem.add_column(cost, 0.0..),
                };
                variables.flow.push(variable);
            }
        }
        Some(Nominal::Fixed(nominal)) => {
            for t in 0..n_steps {
                let cost = flow.variable_costs[t];
                let variable = if let Some(fix) = &flow.fix {
                    let value = fix[t] * nominal;
                    problem.add_column(cost, value..=value)
                } else if flow.nonconvex {
                    problem.add_column(cost, 0.0..=flow.max * nominal)
                } else {
                    problem.add_column(cost, flow.min * nominal..=flow.max * nominal)
                };
                variables.flow.push(variable);
            }

            if flow.nonconvex && flow.fix.is_none() {
                let status: Vec<_> = (0..n_steps).map(|_| problem.add_binary_column()).collect();
                for (&f, &s) in variables.flow.iter().zip(&status) {
                    problem.add_row(..=0.0, [(f, 1.0), (s, -flow.max * nominal)]);
                    problem.add_row(0.0.., [(f, 1.0), (s, -flow.min * nominal)]);
                }
                variables.status = Some(status);
                variables.fixed_nominal = Some(nominal);
            }
        }
        Some(Nominal::Invest(investment)) => {
            let invest =
                problem.add_column(investment.ep_costs, investment.minimum..=investment.maximum);
            variables.invest = Some(invest);
            for t in 0..n_steps {
                variables
                    .flow
                    .push(problem.add_column(flow.variable_costs[t], 0.0..));
            }

            if let Some(fix) = &flow.fix {
                for (&f, &fix) in variables.flow.iter().zip(fix) {
                    problem.add_row(0.0..=0.0, [(f, 1.0), (invest, -fix)]);
                }
            } else if flow.nonconvex {
                let big_m = investment.maximum;
                let status: Vec<_> = (0..n_steps).map(|_| problem.add_binary_column()).collect();
                let status_nominal: Vec<_> =
                    (0..n_steps).map(|_| problem.add_column(0.0, 0.0..)).collect();
                for ((&f, &s), &sn) in variables.flow.iter().zip(&status).zip(&status_nominal) {
                    // sn = s * invest
                    problem.add_row(..=0.0, [(sn, 1.0), (invest, -1.0)]);
                    problem.add_row(..=0.0, [(sn, 1.0), (s, -big_m)]);
                    problem.add_row(-big_m.., [(sn, 1.0), (invest, -1.0), (s, -big_m)]);

                    problem.add_row(..=0.0, [(f, 1.0), (sn, -flow.max)]);
                    problem.add_row(0.0.., [(f, 1.0), (sn, -flow.min)]);
                }
                variables.status = Some(status);
                variables.status_nominal = Some(status_nominal);
            } else {
                for &f in &variables.flow {
                    problem.add_row(..=0.0, [(f, 1.0), (invest, -flow.max)]);
                    if flow.min > 0.0 {
                        problem.add_row(0.0.., [(f, 1.0), (invest, -flow.min)]);
                    }
                }
            }
        }
    }

    variables
}

/// The single edge entering or leaving a component
fn single_edge<I>(mut edges: I, topology: &Topology, index: NodeIndex) -> Result<EdgeIndex>
where
    I: Iterator<Item = EdgeIndex>,
{
    let Some(edge) = edges.next() else {
        bail!("Component {} is not connected", topology.label(index));
    };
    if edges.next().is_some() {
        bail!(
            "Component {} has more than one flow in the same direction",
            topology.label(index)
        );
    }

    Ok(edge)
}

/// Add the content columns of a storage and the rows for its energy balance
fn add_storage(
    problem: &mut Problem,
    topology: &Topology,
    edges: &IndexMap<EdgeIndex, EdgeVariables>,
    index: NodeIndex,
    spec: &StorageSpec,
) -> Result<StorageVariables> {
    let input = &edges[&single_edge(topology.incoming(index), topology, index)?];
    let output = &edges[&single_edge(topology.outgoing(index), topology, index)?];
    let n_steps = topology.n_steps();
    let retained = 1.0 - spec.loss_rate;

    let (content, invest) = match spec.capacity {
        Nominal::Fixed(capacity) => {
            let content: Vec<_> = (0..n_steps)
                .map(|_| problem.add_column(0.0, 0.0..=capacity))
                .collect();
            let initial = spec.initial_level * capacity;

            for t in 0..n_steps {
                let mut terms = vec![
                    (content[t], 1.0),
                    (input.flow[t], -1.0),
                    (output.flow[t], 1.0),
                ];
                if t == 0 {
                    let value = retained * initial;
                    problem.add_row(value..=value, terms);
                } else {
                    terms.push((content[t - 1], -retained));
                    problem.add_row(0.0..=0.0, terms);
                }
            }
            if let (true, Some(&last)) = (spec.balanced, content.last()) {
                problem.add_row(initial..=initial, [(last, 1.0)]);
            }

            (content, None)
        }
        Nominal::Invest(investment) => {
            let invest =
                problem.add_column(investment.ep_costs, investment.minimum..=investment.maximum);
            let content: Vec<_> = (0..n_steps)
                .map(|_| problem.add_column(0.0, 0.0..))
                .collect();

            for t in 0..n_steps {
                let mut terms = vec![
                    (content[t], 1.0),
                    (input.flow[t], -1.0),
                    (output.flow[t], 1.0),
                ];
                if t == 0 {
                    terms.push((invest, -retained * spec.initial_level));
                } else {
                    terms.push((content[t - 1], -retained));
                }
                problem.add_row(0.0..=0.0, terms);
                problem.add_row(..=0.0, [(content[t], 1.0), (invest, -1.0)]);
            }
            if let (true, Some(&last)) = (spec.balanced, content.last()) {
                problem.add_row(0.0..=0.0, [(last, 1.0), (invest, -spec.initial_level)]);
            }

            // Charging and discharging capacities follow the storage capacity
            for (edge, ratio) in [
                (input, spec.invest_relation_input),
                (output, spec.invest_relation_output),
            ] {
                if let Some(edge_invest) = edge.invest {
                    problem.add_row(0.0..=0.0, [(edge_invest, 1.0), (invest, -ratio)]);
                }
            }

            (content, Some(invest))
        }
    };

    Ok(StorageVariables { content, invest })
}

/// Fix the ratio between the input of a converter and each of its outputs
fn add_conversion_constraints(
    problem: &mut Problem,
    topology: &Topology,
    edges: &IndexMap<EdgeIndex, EdgeVariables>,
    index: NodeIndex,
    factors: &IndexMap<BusId, f64>,
) -> Result<()> {
    let input = &edges[&single_edge(topology.incoming(index), topology, index)?];
    for (&bus, &factor) in factors {
        let bus_index = topology.bus_index(bus);
        let Some(edge) = topology
            .outgoing(index)
            .find(|&edge| topology.edge_endpoints(edge).1 == bus_index)
        else {
            bail!(
                "Converter {} has no output to {}",
                topology.label(index),
                topology.label(bus_index)
            );
        };
        let output = &edges[&edge];
        for (&out, &inp) in output.flow.iter().zip(&input.flow) {
            problem.add_row(0.0..=0.0, [(out, 1.0), (inp, -factor)]);
        }
    }

    Ok(())
}

/// Everything flowing into a bus must flow out of it in the same hour
fn add_bus_balances(
    problem: &mut Problem,
    topology: &Topology,
    edges: &IndexMap<EdgeIndex, EdgeVariables>,
) {
    for (bus, _) in topology.iter_buses() {
        let index = topology.bus_index(bus);
        let incoming: Vec<_> = topology.incoming(index).collect();
        let outgoing: Vec<_> = topology.outgoing(index).collect();
        for t in 0..topology.n_steps() {
            let terms = incoming
                .iter()
                .map(|edge| (edges[edge].flow[t], 1.0))
                .chain(outgoing.iter().map(|edge| (edges[edge].flow[t], -1.0)));
            problem.add_row(0.0..=0.0, terms);
        }
    }
}

/// Read the values of all columns back into results keyed by node labels
fn collect_results(
    topology: &Topology,
    edges: &IndexMap<EdgeIndex, EdgeVariables>,
    storages: &IndexMap<NodeIndex, StorageVariables>,
    values: &[f64],
) -> RawEdgeResults {
    let series = |variables: &[Variable]| -> Vec<f64> {
        variables.iter().map(|v| values[v.index]).collect()
    };
    let mut results = RawEdgeResults::new(topology.n_steps());

    for (&edge, variables) in edges {
        let (source, target) = topology.edge_endpoints(edge);
        let source = topology.label(source).to_string();
        let target = topology.label(target).to_string();
        let key = |kind| RawKey::edge(source.as_str(), target.as_str(), kind);

        results.insert(
            key(VariableKind::Flow),
            RawValue::Series(series(&variables.flow)),
        );
        if let Some(invest) = variables.invest {
            let value = values[invest.index];
            results.insert(key(VariableKind::Invest), RawValue::Scalar(value));
            results.insert(key(VariableKind::Total), RawValue::Scalar(value));
        }
        if let Some(status) = &variables.status {
            let status = series(status);
            if let Some(nominal) = variables.fixed_nominal {
                let status_nominal = status.iter().map(|s| s * nominal).collect();
                results.insert(
                    key(VariableKind::StatusNominal),
                    RawValue::Series(status_nominal),
                );
            }
            results.insert(key(VariableKind::Status), RawValue::Series(status));
        }
        if let Some(status_nominal) = &variables.status_nominal {
            results.insert(
                key(VariableKind::StatusNominal),
                RawValue::Series(series(status_nominal)),
            );
        }
    }

    for (&index, variables) in storages {
        let label = topology.label(index).to_string();
        results.insert(
            RawKey::node(label.as_str(), VariableKind::StorageContent),
            RawValue::Series(series(&variables.content)),
        );
        if let Some(invest) = variables.invest {
            results.insert(
                RawKey::node(label.as_str(), VariableKind::Invest),
                RawValue::Scalar(values[invest.index]),
            );
        }
    }

    debug!("Collected {} results", results.len());
    results
}
