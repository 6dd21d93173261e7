//! Translates the unit catalog into a [`Topology`].
use super::{BusId, ComponentKind, Flow, Investment, NodeLabel, Nominal, StorageSpec, Topology};
use crate::catalog::{Economics, Fuel, Sizing, Technology, UnitCatalog, UnitCategory, UnitInstance};
use crate::error::config_ensure;
use crate::finance::annualised_investment_cost;
use crate::parameters::GlobalParameters;
use crate::time_series::AlignedTimeSeries;
use crate::units::MoneyPerEnergy;
use anyhow::{Context, Result};
use indexmap::indexmap;
use log::{debug, info};

/// Nominal value of the flow from the internal router to the electricity bus
const INTERNAL_ROUTER_CAPACITY: f64 = 1e6;

/// Build the topology for a set of units.
///
/// All inputs are validated first, so that a [`ConfigurationError`] is returned before anything
/// is handed to a solver.
///
/// [`ConfigurationError`]: crate::error::ConfigurationError
///
/// # Arguments
///
/// * `units` - The selected units
/// * `params` - Global economic parameters
/// * `series` - Hourly input data
pub fn build(
    units: &UnitCatalog,
    params: &GlobalParameters,
    series: &AlignedTimeSeries,
) -> Result<Topology> {
    config_ensure!(!units.is_empty(), "At least one unit must be selected");
    params.validate()?;
    series.validate(units)?;

    let mut builder = Builder::new(params, series)?;
    for unit in units.iter() {
        builder
            .add_unit(unit)
            .with_context(|| format!("Could not add unit {} to the topology", unit.key))?;
    }
    let topology = builder.topology;

    info!(
        "Built topology with {} buses, {} components and {} flows over {} hours",
        topology.bus_count(),
        topology.component_count(),
        topology.edge_count(),
        topology.n_steps()
    );

    Ok(topology)
}

/// Map a series of prices to plain per-hour costs
fn costs<F>(n_steps: usize, cost_at: F) -> Vec<f64>
where
    F: Fn(usize) -> MoneyPerEnergy,
{
    (0..n_steps).map(|t| cost_at(t).value()).collect()
}

struct Builder<'a> {
    params: &'a GlobalParameters,
    series: &'a AlignedTimeSeries,
    topology: Topology,
}

impl<'a> Builder<'a> {
    /// Set up the buses and the components which are always present
    fn new(params: &'a GlobalParameters, series: &'a AlignedTimeSeries) -> Result<Self> {
        let n_steps = series.len();
        let mut topology = Topology::new(n_steps);

        let gas = topology.add_bus(NodeLabel::GasBus)?;
        let electricity = topology.add_bus(NodeLabel::ElectricityBus)?;
        let heat = topology.add_bus(NodeLabel::HeatBus)?;

        let gas_source = topology.add_component(NodeLabel::GasSource, ComponentKind::Source)?;
        let gas_costs = costs(n_steps, |t| {
            series.gas_price[t] + series.co2_price[t] * params.ef_gas
        });
        topology.add_output(gas_source, gas, Flow::new(gas_costs));

        let electricity_source =
            topology.add_component(NodeLabel::ElectricitySource, ComponentKind::Source)?;
        let electricity_costs = costs(n_steps, |t| {
            series.el_spot_price[t] + params.elec_consumer_charges_grid
                - params.elec_consumer_charges_self
        });
        topology.add_output(electricity_source, electricity, Flow::new(electricity_costs));

        let demand = topology.add_component(NodeLabel::HeatDemand, ComponentKind::Sink)?;
        let demand_flow = Flow::new(vec![-params.heat_price.value(); n_steps])
            .with_nominal(Nominal::Fixed(1.0))
            .with_fix(series.heat_demand.iter().map(|q| q.value()).collect());
        topology.add_input(heat, demand, demand_flow);

        Ok(Self {
            params,
            series,
            topology,
        })
    }

    fn n_steps(&self) -> usize {
        self.topology.n_steps()
    }

    /// Add the CHP node with the export sink and the internal router, unless already present
    fn ensure_chp_node(&mut self) -> Result<()> {
        if self.topology.has_chp_node() {
            return Ok(());
        }

        let n_steps = self.n_steps();
        let chp_node = self.topology.add_bus(NodeLabel::ChpNode)?;
        let electricity = self.bus(NodeLabel::ElectricityBus)?;

        let spotmarket = self
            .topology
            .add_component(NodeLabel::Spotmarket, ComponentKind::Sink)?;
        let revenues = costs(n_steps, |t| {
            -(self.series.el_spot_price[t] + self.params.avoided_network_charges)
        });
        self.topology
            .add_input(chp_node, spotmarket, Flow::new(revenues));

        let router = self.topology.add_component(
            NodeLabel::InternalRouter,
            ComponentKind::Converter(indexmap! { electricity => 1.0 }),
        )?;
        self.topology
            .add_input(chp_node, router, Flow::free(n_steps));
        self.topology.add_output(
            router,
            electricity,
            Flow::free(n_steps).with_nominal(Nominal::Fixed(INTERNAL_ROUTER_CAPACITY)),
        );
        debug!("Added CHP node with export sink and internal router");

        Ok(())
    }

    fn bus(&self, label: NodeLabel) -> Result<BusId> {
        self.topology
            .bus(label)
            .with_context(|| format!("Missing bus: {label}"))
    }

    /// The nominal value for a unit's capacity, with annualised investment costs if invested
    fn nominal(&self, sizing: Sizing, economics: &Economics) -> Nominal {
        match sizing {
            Sizing::Fixed(capacity) => Nominal::Fixed(capacity.value()),
            Sizing::Invest { minimum, maximum } => {
                let ep_costs = annualised_investment_cost(
                    economics.inv_spez,
                    self.params.capital_interest,
                    self.params.lifetime,
                ) + economics.op_cost_fix;

                Nominal::Invest(Investment {
                    minimum: minimum.value(),
                    maximum: maximum.value(),
                    ep_costs: ep_costs.value(),
                })
            }
        }
    }

    /// Variable cost of a unit's heat output, including any surcharge for its category
    fn heat_output_cost(&self, unit: &UnitInstance) -> MoneyPerEnergy {
        let economics = &unit.economics;
        let params = self.params;
        match unit.category() {
            UnitCategory::PeakLoadBoiler => economics.op_cost_var + params.energy_tax,
            UnitCategory::ElectricBoiler => {
                economics.op_cost_var + params.energy_tax + params.elec_consumer_charges_self
            }
            UnitCategory::HeatPump => economics.op_cost_var + params.elec_consumer_charges_self,
            _ => economics.op_cost_var,
        }
    }

    fn add_unit(&mut self, unit: &UnitInstance) -> Result<()> {
        let n_steps = self.n_steps();
        let label = NodeLabel::Unit(unit.key);
        let heat = self.bus(NodeLabel::HeatBus)?;
        let output_costs = vec![self.heat_output_cost(unit).value(); n_steps];

        match unit.technology {
            Technology::Converter {
                sizing,
                fuel,
                efficiency,
                min_load,
                max_load,
            } => {
                let input = self.bus(match fuel {
                    Fuel::Gas => NodeLabel::GasBus,
                    Fuel::Electricity => NodeLabel::ElectricityBus,
                })?;
                let component = self.topology.add_component(
                    label,
                    ComponentKind::Converter(indexmap! { heat => efficiency.0 }),
                )?;
                self.topology
                    .add_input(input, component, Flow::free(n_steps));
                let output = Flow::new(output_costs)
                    .with_nominal(self.nominal(sizing, &unit.economics))
                    .with_commitment(min_load.0, max_load.0);
                self.topology.add_output(component, heat, output);
            }
            Technology::CombinedHeatPower {
                sizing,
                eta_el,
                eta_th,
                min_load,
                max_load,
            } => {
                self.ensure_chp_node()?;
                let gas = self.bus(NodeLabel::GasBus)?;
                let chp_node = self.bus(NodeLabel::ChpNode)?;
                let component = self.topology.add_component(
                    label,
                    ComponentKind::Converter(indexmap! {
                        chp_node => eta_el.0,
                        heat => eta_th.0,
                    }),
                )?;
                self.topology.add_input(gas, component, Flow::free(n_steps));
                self.topology
                    .add_output(component, chp_node, Flow::free(n_steps));
                let output = Flow::new(output_costs)
                    .with_nominal(self.nominal(sizing, &unit.economics))
                    .with_commitment(min_load.0, max_load.0);
                self.topology.add_output(component, heat, output);
            }
            Technology::SolarThermal { sizing } => {
                let component = self.topology.add_component(label, ComponentKind::Source)?;
                let profile = self
                    .series
                    .solar_heat_flow
                    .clone()
                    .context("Missing solar_heat_flow time series")?;
                let output = Flow::new(output_costs)
                    .with_nominal(self.nominal(sizing, &unit.economics))
                    .with_fix(profile);
                self.topology.add_output(component, heat, output);
            }
            Technology::ExternalSource {
                nominal,
                fixed_profile,
            } => {
                let component = self.topology.add_component(label, ComponentKind::Source)?;
                let mut output =
                    Flow::new(output_costs).with_nominal(Nominal::Fixed(nominal.value()));
                if fixed_profile {
                    output = output.with_fix(
                        (0..n_steps)
                            .map(|t| self.series.ext_heat_availability(t))
                            .collect(),
                    );
                }
                self.topology.add_output(component, heat, output);
            }
            Technology::Storage {
                sizing,
                c_in,
                c_out,
                initial_level,
                loss_rate,
                balanced,
            } => {
                let capacity = self.nominal(sizing, &unit.economics);
                let (input_nominal, output_nominal) = match capacity {
                    Nominal::Fixed(capacity) => (
                        Nominal::Fixed(c_in.0 * capacity),
                        Nominal::Fixed(c_out.0 * capacity),
                    ),
                    Nominal::Invest(investment) => {
                        let coupled = |ratio: f64| {
                            Nominal::Invest(Investment {
                                minimum: 0.0,
                                maximum: ratio * investment.maximum,
                                ep_costs: 0.0,
                            })
                        };
                        (coupled(c_in.0), coupled(c_out.0))
                    }
                };

                let component = self.topology.add_component(
                    label,
                    ComponentKind::Storage(StorageSpec {
                        capacity,
                        initial_level: initial_level.0,
                        loss_rate: loss_rate.0,
                        balanced,
                        invest_relation_input: c_in.0,
                        invest_relation_output: c_out.0,
                    }),
                )?;
                self.topology.add_input(
                    heat,
                    component,
                    Flow::free(n_steps).with_nominal(input_nominal),
                );
                self.topology.add_output(
                    component,
                    heat,
                    Flow::new(output_costs).with_nominal(output_nominal),
                );
            }
        }
        debug!("Added unit {} to the topology", unit.key);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{UnitKey, UnitParameters};
    use crate::error::ConfigurationError;
    use crate::fixture::{
        chp_parameters, external_source_parameters, global_parameters, heat_pump_parameters,
        storage_parameters, time_series, unit, unit_catalog,
    };
    use crate::topology::Node;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn catalog(units: &[(&str, UnitParameters)]) -> UnitCatalog {
        units
            .iter()
            .map(|(key, params)| unit(key, params))
            .collect()
    }

    fn key(s: &str) -> UnitKey {
        s.parse().unwrap()
    }

    /// The flow from `source` to `target`
    fn flow<'a>(topology: &'a Topology, source: NodeLabel, target: NodeLabel) -> &'a Flow {
        topology
            .iter_edges()
            .find(|edge| {
                topology.label(edge.source) == source && topology.label(edge.target) == target
            })
            .unwrap()
            .flow
    }

    #[rstest]
    #[case(&["hp1"], false)]
    #[case(&["hp1", "hp2", "tes1"], false)]
    #[case(&["ccet1"], true)]
    #[case(&["ice1", "ccet1", "ice2"], true)]
    fn test_buses(
        #[case] keys: &[&str],
        #[case] chp_node: bool,
        global_parameters: GlobalParameters,
        time_series: AlignedTimeSeries,
    ) {
        let units = catalog(
            &keys
                .iter()
                .map(|key| {
                    let params = match &key[..2] {
                        "hp" => heat_pump_parameters(),
                        "te" => storage_parameters(),
                        _ => chp_parameters(),
                    };
                    (*key, params)
                })
                .collect::<Vec<_>>(),
        );
        let topology = build(&units, &global_parameters, &time_series).unwrap();

        for label in [NodeLabel::GasBus, NodeLabel::ElectricityBus, NodeLabel::HeatBus] {
            assert!(topology.bus(label).is_some());
        }
        assert_eq!(topology.has_chp_node(), chp_node);
        assert_eq!(topology.bus_count(), if chp_node { 4 } else { 3 });
        assert_eq!(
            topology.iter_components().count(),
            keys.len() + 3 + if chp_node { 2 } else { 0 }
        );
        for key_str in keys {
            assert!(topology.unit_component(&key(key_str)).is_some());
        }
    }

    #[rstest]
    fn test_source_costs(global_parameters: GlobalParameters, time_series: AlignedTimeSeries) {
        let units = catalog(&[("hp1", heat_pump_parameters())]);
        let topology = build(&units, &global_parameters, &time_series).unwrap();

        // 30 + 80 * 0.201
        let gas = flow(&topology, NodeLabel::GasSource, NodeLabel::GasBus);
        assert_approx_eq!(f64, gas.variable_costs[0], 46.08, epsilon = 1e-9);

        // 50 + 120 - 40
        let electricity = flow(
            &topology,
            NodeLabel::ElectricitySource,
            NodeLabel::ElectricityBus,
        );
        assert_approx_eq!(f64, electricity.variable_costs[0], 130.0, epsilon = 1e-9);

        let demand = flow(&topology, NodeLabel::HeatBus, NodeLabel::HeatDemand);
        assert_eq!(demand.variable_costs, vec![-80.0; 3]);
        assert_eq!(demand.fix, Some(vec![5.0, 6.0, 4.0]));
    }

    #[rstest]
    fn test_heat_pump(global_parameters: GlobalParameters, time_series: AlignedTimeSeries) {
        let units = catalog(&[("hp1", heat_pump_parameters())]);
        let topology = build(&units, &global_parameters, &time_series).unwrap();
        let hp = NodeLabel::Unit(key("hp1"));

        let output = flow(&topology, hp, NodeLabel::HeatBus);
        assert!(output.nonconvex);
        assert_eq!(output.min, 0.2);
        assert_eq!(output.max, 1.0);
        // op_cost_var + elec_consumer_charges_self
        assert_eq!(output.variable_costs, vec![41.5; 3]);
        let Some(Nominal::Invest(investment)) = output.nominal else {
            panic!("Expected investment");
        };
        assert_eq!(investment.maximum, 10.0);
        assert_approx_eq!(
            f64,
            investment.ep_costs,
            500_000.0 / 12.462_210_342_539_992 + 2_000.0,
            epsilon = 1e-6
        );

        let input = flow(&topology, NodeLabel::ElectricityBus, hp);
        assert_eq!(input.nominal, None);

        let component = topology.unit_component(&key("hp1")).unwrap();
        let Node::Component(_, ComponentKind::Converter(factors)) =
            topology.node(topology.component_index(component))
        else {
            panic!("Expected converter");
        };
        let heat = topology.bus(NodeLabel::HeatBus).unwrap();
        assert_eq!(factors[&heat], 3.5);
    }

    #[rstest]
    fn test_chp(global_parameters: GlobalParameters, time_series: AlignedTimeSeries) {
        let units = catalog(&[("ccet1", chp_parameters()), ("ice1", chp_parameters())]);
        let topology = build(&units, &global_parameters, &time_series).unwrap();

        // Only one router and one export sink for several CHP units
        assert_eq!(
            topology
                .iter_components()
                .filter(|(_, label, _)| *label == NodeLabel::InternalRouter)
                .count(),
            1
        );
        let export = flow(&topology, NodeLabel::ChpNode, NodeLabel::Spotmarket);
        assert_eq!(export.variable_costs, vec![-60.0, -70.0, -50.0]);

        let router = flow(
            &topology,
            NodeLabel::InternalRouter,
            NodeLabel::ElectricityBus,
        );
        assert_eq!(router.nominal, Some(Nominal::Fixed(1e6)));

        let ccet = NodeLabel::Unit(key("ccet1"));
        let electricity = flow(&topology, ccet, NodeLabel::ChpNode);
        assert_eq!(electricity.variable_costs, vec![0.0; 3]);
        let heat = flow(&topology, ccet, NodeLabel::HeatBus);
        assert_eq!(heat.variable_costs, vec![4.0; 3]);
        assert!(heat.nonconvex);
    }

    #[rstest]
    fn test_no_export_without_chp(
        global_parameters: GlobalParameters,
        time_series: AlignedTimeSeries,
    ) {
        let units = catalog(&[("hp1", heat_pump_parameters())]);
        let topology = build(&units, &global_parameters, &time_series).unwrap();
        assert!(
            !topology
                .iter_components()
                .any(|(_, label, _)| label == NodeLabel::Spotmarket)
        );
    }

    #[rstest]
    fn test_storage(global_parameters: GlobalParameters, time_series: AlignedTimeSeries) {
        let units = catalog(&[("tes1", storage_parameters()), ("tes2", storage_parameters())]);
        let topology = build(&units, &global_parameters, &time_series).unwrap();
        let tes = NodeLabel::Unit(key("tes2"));

        let charge = flow(&topology, NodeLabel::HeatBus, tes);
        assert_eq!(charge.variable_costs, vec![0.0; 3]);
        let discharge = flow(&topology, tes, NodeLabel::HeatBus);
        assert_eq!(discharge.variable_costs, vec![0.2; 3]);
        let Some(Nominal::Invest(investment)) = discharge.nominal else {
            panic!("Expected investment");
        };
        assert_eq!(investment.ep_costs, 0.0);
        assert_eq!(investment.maximum, 25.0);

        let component = topology.unit_component(&key("tes2")).unwrap();
        let Node::Component(_, ComponentKind::Storage(spec)) =
            topology.node(topology.component_index(component))
        else {
            panic!("Expected storage");
        };
        assert_eq!(spec.invest_relation_input, 0.2);
        assert_eq!(spec.invest_relation_output, 0.25);
        assert_eq!(spec.initial_level, 0.5);
        assert!(spec.balanced);
    }

    #[rstest]
    fn test_fixed_storage(
        mut storage_parameters: UnitParameters,
        global_parameters: GlobalParameters,
        time_series: AlignedTimeSeries,
    ) {
        storage_parameters.invest_mode = Some(false);
        storage_parameters.cap_n = Some(40.0);
        let units = catalog(&[("tes1", storage_parameters)]);
        let topology = build(&units, &global_parameters, &time_series).unwrap();
        let tes = NodeLabel::Unit(key("tes1"));

        assert_eq!(
            flow(&topology, NodeLabel::HeatBus, tes).nominal,
            Some(Nominal::Fixed(8.0))
        );
        assert_eq!(
            flow(&topology, tes, NodeLabel::HeatBus).nominal,
            Some(Nominal::Fixed(10.0))
        );
    }

    #[rstest]
    #[case(None, vec![1.0; 3])]
    #[case(Some(vec![0.5, 0.0, 1.0]), vec![0.5, 0.0, 1.0])]
    fn test_external_source_profile(
        #[case] profile: Option<Vec<f64>>,
        #[case] expected: Vec<f64>,
        external_source_parameters: UnitParameters,
        global_parameters: GlobalParameters,
        mut time_series: AlignedTimeSeries,
    ) {
        time_series.ext_heat_profile = profile;
        let units = catalog(&[("exhs1", external_source_parameters)]);
        let topology = build(&units, &global_parameters, &time_series).unwrap();

        let output = flow(&topology, NodeLabel::Unit(key("exhs1")), NodeLabel::HeatBus);
        assert_eq!(output.fix, Some(expected));
        assert_eq!(output.nominal, Some(Nominal::Fixed(2.0)));
    }

    #[rstest]
    fn test_dispatchable_external_source(
        mut external_source_parameters: UnitParameters,
        global_parameters: GlobalParameters,
        time_series: AlignedTimeSeries,
    ) {
        external_source_parameters.fixed_profile = Some(false);
        let units = catalog(&[("exhs1", external_source_parameters)]);
        let topology = build(&units, &global_parameters, &time_series).unwrap();

        let output = flow(&topology, NodeLabel::Unit(key("exhs1")), NodeLabel::HeatBus);
        assert_eq!(output.fix, None);
        assert_eq!(output.max, 1.0);
        assert!(!output.nonconvex);
    }

    #[rstest]
    fn test_full_catalog(
        unit_catalog: UnitCatalog,
        global_parameters: GlobalParameters,
        time_series: AlignedTimeSeries,
    ) {
        let topology = build(&unit_catalog, &global_parameters, &time_series).unwrap();
        assert_eq!(topology.n_steps(), 3);

        // Boiler has a fixed size and pays the energy tax
        let plb = flow(&topology, NodeLabel::Unit(key("plb1")), NodeLabel::HeatBus);
        assert_eq!(plb.nominal, Some(Nominal::Fixed(8.0)));
        assert_eq!(plb.variable_costs, vec![6.5; 3]);
    }

    #[rstest]
    fn test_empty_catalog(global_parameters: GlobalParameters, time_series: AlignedTimeSeries) {
        let err = build(&UnitCatalog::default(), &global_parameters, &time_series).unwrap_err();
        assert!(err.downcast_ref::<ConfigurationError>().is_some());
    }

    #[rstest]
    fn test_length_mismatch(
        unit_catalog: UnitCatalog,
        global_parameters: GlobalParameters,
        mut time_series: AlignedTimeSeries,
    ) {
        time_series.heat_demand.push(crate::units::Energy(1.0));
        let err = build(&unit_catalog, &global_parameters, &time_series).unwrap_err();
        assert!(err.downcast_ref::<ConfigurationError>().is_some());
    }
}
