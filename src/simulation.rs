//! Functionality for running one optimisation of a heat supply model.
use crate::decode::decode;
use crate::kpi::{CostTable, KeyParams, calc_ecol, calc_econ};
use crate::model::Model;
use crate::results::DecodedResults;
use crate::solver::Solver;
use anyhow::{Context, Result};
use log::info;

/// Everything produced by a run
#[derive(Debug, Clone, PartialEq)]
pub struct RunResults {
    /// Hourly flows and capacities, including those of fixed-size units
    pub decoded: DecodedResults,
    /// Costs per unit
    pub costs: CostTable,
    /// Economic and ecological key parameters
    pub key_params: KeyParams,
}

/// Run the optimisation and evaluate its results.
///
/// # Arguments:
///
/// * `model` - The model to run
/// * `solver` - The MILP solver to use
pub fn run<S: Solver + ?Sized>(model: &Model, solver: &S) -> Result<RunResults> {
    let topology = model.build_topology()?;

    info!("Solving...");
    let raw = solver.solve(&topology, &model.parameters.solver_options())?;
    info!("Solver returned {} results", raw.len());

    let mut decoded = decode(&raw);
    decoded.capacities.fill_fixed(&model.catalog);

    let (costs, mut key_params) = calc_econ(
        &model.catalog,
        &decoded,
        &model.parameters,
        &model.series,
    )
    .context("Could not calculate economic key parameters")?;
    let ecological = calc_ecol(&decoded, &model.parameters, &model.series)
        .context("Could not calculate ecological key parameters")?;
    key_params.merge(ecological);

    Ok(RunResults {
        decoded,
        costs,
        key_params,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigurationError, SolveError};
    use crate::fixture::{global_parameters, time_series, unit_catalog};
    use crate::kpi::KeyParam;
    use crate::solver::{RawEdgeResults, RawKey, RawValue, SolverOptions, VariableKind};
    use crate::topology::Topology;
    use rstest::{fixture, rstest};
    use std::cell::Cell;

    /// Returns canned results and counts how often it was asked to solve
    struct CannedSolver {
        results: RawEdgeResults,
        calls: Cell<usize>,
    }

    impl Solver for CannedSolver {
        fn solve(&self, topology: &Topology, _options: &SolverOptions) -> Result<RawEdgeResults> {
            assert_eq!(topology.n_steps(), self.results.n_steps());
            self.calls.set(self.calls.get() + 1);
            Ok(self.results.clone())
        }
    }

    struct FailingSolver;

    impl Solver for FailingSolver {
        fn solve(&self, _topology: &Topology, _options: &SolverOptions) -> Result<RawEdgeResults> {
            Err(SolveError::new("Infeasible").into())
        }
    }

    #[fixture]
    fn model() -> Model {
        Model {
            catalog: unit_catalog(),
            parameters: global_parameters(),
            series: time_series(),
        }
    }

    fn flow(source: &str, target: &str, values: [f64; 3]) -> (RawKey, RawValue) {
        (
            RawKey::edge(source, target, VariableKind::Flow),
            RawValue::Series(values.to_vec()),
        )
    }

    fn invest(source: &str, target: Option<&str>, value: f64) -> (RawKey, RawValue) {
        let key = match target {
            Some(target) => RawKey::edge(source, target, VariableKind::Invest),
            None => RawKey::node(source, VariableKind::Invest),
        };
        (key, RawValue::Scalar(value))
    }

    #[fixture]
    fn solver() -> CannedSolver {
        let results = [
            flow("gas source", "gas network", [4.0, 4.0, 4.0]),
            flow("electricity source", "electricity network", [1.0, 1.0, 1.0]),
            flow("heat network", "heat demand", [5.0, 6.0, 4.0]),
            flow("hp1", "heat network", [3.5, 3.5, 3.5]),
            flow("ccet1", "heat network", [1.5, 2.5, 0.5]),
            flow("chp node", "spotmarket", [1.2, 2.0, 0.4]),
            invest("hp1", Some("heat network"), 3.5),
            invest("ccet1", Some("heat network"), 2.5),
            invest("plb1", Some("heat network"), f64::NAN),
            invest("tes1", None, 0.0),
            invest("heat network", Some("tes1"), 0.0),
            invest("tes1", Some("heat network"), 0.0),
        ]
        .into_iter()
        .collect();

        CannedSolver {
            results,
            calls: Cell::new(0),
        }
    }

    #[rstest]
    fn test_run(model: Model, solver: CannedSolver) {
        let results = run(&model, &solver).unwrap();
        assert_eq!(solver.calls.get(), 1);

        // The boiler's placeholder is replaced by its fixed capacity
        assert_eq!(
            results.decoded.capacities.get("cap_plb1").map(|cap| cap.value()),
            Some(8.0)
        );
        assert_eq!(results.costs.len(), 4);
        assert_eq!(results.key_params.len(), 17);
        assert_eq!(results.key_params.get(KeyParam::TotalHeatDemand), Some(15.0));
        assert!(results.key_params.get(KeyParam::EmissionsSpotmarket).unwrap() < 0.0);
    }

    #[rstest]
    fn test_run_invalid_model(mut model: Model, solver: CannedSolver) {
        model.series.heat_demand.pop();
        let err = run(&model, &solver).unwrap_err();
        assert!(err.downcast_ref::<ConfigurationError>().is_some());
        assert_eq!(solver.calls.get(), 0);
    }

    #[rstest]
    fn test_run_solve_error(model: Model) {
        let err = run(&model, &FailingSolver).unwrap_err();
        assert_eq!(
            err.downcast_ref::<SolveError>().map(SolveError::status),
            Some("Infeasible")
        );
    }
}
