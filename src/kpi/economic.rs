//! Costs, revenues and the levelised cost of heat.
use super::{CostTable, KeyParam, KeyParams, UnitCosts};
use crate::catalog::{Technology, UnitCatalog, UnitCategory, UnitInstance};
use crate::finance::levelised_cost_of_heat;
use crate::parameters::GlobalParameters;
use crate::results::DecodedResults;
use crate::time_series::AlignedTimeSeries;
use crate::units::{Capacity, Energy, Money, MoneyPerEnergy};
use anyhow::{Context, Result, ensure};
use log::warn;

/// Calculate the costs of every unit and the economic key parameters.
///
/// # Arguments
///
/// * `units` - The units the topology was built from
/// * `decoded` - Decoded solver results, with the capacities of fixed-size units filled in
/// * `params` - Global economic parameters
/// * `series` - The hourly prices used in the optimisation
pub fn calc_econ(
    units: &UnitCatalog,
    decoded: &DecodedResults,
    params: &GlobalParameters,
    series: &AlignedTimeSeries,
) -> Result<(CostTable, KeyParams)> {
    ensure!(
        decoded.table.n_steps() == series.len(),
        "Results cover {} hours, but the time series cover {}",
        decoded.table.n_steps(),
        series.len()
    );

    let mut costs = CostTable::default();
    for unit in units.iter() {
        let unit_costs = unit_costs(unit, decoded, params)
            .with_context(|| format!("Could not calculate costs for unit {}", unit.key))?;
        costs.insert(unit.key, unit_costs);
    }

    let table = &decoded.table;
    let invest_total = costs.invest_total();
    let op_cost_total = costs.op_cost_total();
    let cost_gas = Money(table.weighted_sum("H_source", |t| {
        (series.gas_price[t] + series.co2_price[t] * params.ef_gas).value()
    }));
    let cost_el_grid = Money(table.weighted_sum("P_source", |t| {
        (series.el_spot_price[t] + params.elec_consumer_charges_grid).value()
    }));
    let cost_el_internal = table.energy("P_internal") * params.elec_consumer_charges_self;
    let cost_el = cost_el_grid + cost_el_internal;
    let cost_total = op_cost_total + cost_gas + cost_el;

    let revenues_spotmarket = Money(table.weighted_sum("P_spotmarket", |t| {
        (series.el_spot_price[t] + params.avoided_network_charges).value()
    }));
    let total_heat_demand = table.energy("Q_demand");
    let revenues_heat = total_heat_demand * params.heat_price;
    let revenues_total = revenues_spotmarket + revenues_heat;
    let balance_total = revenues_total - cost_total;

    let lcoh = if total_heat_demand == Energy(0.0) {
        warn!("No heat was delivered, so the levelised cost of heat is undefined");
        MoneyPerEnergy(f64::NAN)
    } else {
        levelised_cost_of_heat(
            invest_total,
            cost_total,
            revenues_spotmarket,
            total_heat_demand,
            params.annuity_factor(),
        )
    };

    let mut key_params = KeyParams::default();
    for (key, value) in [
        (KeyParam::OpCostTotal, op_cost_total.value()),
        (KeyParam::InvestTotal, invest_total.value()),
        (KeyParam::CostGas, cost_gas.value()),
        (KeyParam::CostElGrid, cost_el_grid.value()),
        (KeyParam::CostElInternal, cost_el_internal.value()),
        (KeyParam::CostEl, cost_el.value()),
        (KeyParam::CostTotal, cost_total.value()),
        (KeyParam::RevenuesSpotmarket, revenues_spotmarket.value()),
        (KeyParam::RevenuesHeat, revenues_heat.value()),
        (KeyParam::RevenuesTotal, revenues_total.value()),
        (KeyParam::BalanceTotal, balance_total.value()),
        (KeyParam::Lcoh, lcoh.value()),
        (KeyParam::TotalHeatDemand, total_heat_demand.value()),
    ] {
        key_params.insert(key, value);
    }

    Ok((costs, key_params))
}

/// The capacity which investment and fixed costs of a unit are based on
fn rated_capacity(unit: &UnitInstance, decoded: &DecodedResults) -> Result<Capacity> {
    let key = unit.key;
    let lookup = |name: String| {
        decoded
            .capacities
            .get(&name)
            .with_context(|| format!("No capacity {name} in the results"))
    };

    match unit.technology {
        Technology::Converter { .. } | Technology::SolarThermal { .. } => {
            lookup(format!("cap_{key}"))
        }
        Technology::CombinedHeatPower { eta_el, eta_th, .. } => {
            Ok(lookup(format!("cap_{key}"))? * (eta_el / eta_th))
        }
        Technology::Storage { .. } => lookup(format!("cap_in_{key}")),
        Technology::ExternalSource { nominal, .. } => Ok(nominal),
    }
}

/// The name of the column holding a unit's heat output
fn dispatch_column(unit: &UnitInstance) -> String {
    match unit.category() {
        UnitCategory::HeatPump | UnitCategory::ThermalStorage => format!("Q_out_{}", unit.key),
        _ => format!("Q_{}", unit.key),
    }
}

fn unit_costs(
    unit: &UnitInstance,
    decoded: &DecodedResults,
    params: &GlobalParameters,
) -> Result<UnitCosts> {
    let economics = &unit.economics;
    let capacity = rated_capacity(unit, decoded)?;
    let invest = economics.inv_spez * capacity;
    let op_cost_fix = economics.op_cost_fix * capacity;

    let dispatch = decoded.table.energy(&dispatch_column(unit));
    let op_cost_var = match unit.category() {
        UnitCategory::PeakLoadBoiler | UnitCategory::ElectricBoiler => {
            economics.op_cost_var * dispatch + params.energy_tax * dispatch
        }
        // Solar is charged on the total output of the array, never with a surcharge
        _ => economics.op_cost_var * dispatch,
    };

    Ok(UnitCosts {
        invest,
        op_cost_fix,
        op_cost_var,
        op_cost: op_cost_fix + op_cost_var,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{
        chp_parameters, global_parameters, solar_parameters, storage_parameters, time_series, unit,
        unit_catalog,
    };
    use crate::results::ResultTable;
    use float_cmp::assert_approx_eq;
    use rstest::{fixture, rstest};

    /// Results for the units of [`unit_catalog`] over three hours
    #[fixture]
    fn decoded() -> DecodedResults {
        let mut decoded = DecodedResults {
            table: ResultTable::new(3),
            ..Default::default()
        };
        for (name, values) in [
            ("H_source", [10.0, 10.0, 10.0]),
            ("P_source", [1.0, 2.0, 0.0]),
            ("P_internal", [1.0, 0.0, 1.0]),
            ("P_spotmarket", [2.0, 2.0, 2.0]),
            ("Q_demand", [5.0, 6.0, 4.0]),
            ("Q_out_hp1", [3.0, 3.0, 3.0]),
            ("Q_plb1", [1.0, 0.0, 0.0]),
            ("Q_ccet1", [1.0, 2.0, 1.0]),
            ("Q_out_tes1", [0.0, 1.0, 0.0]),
        ] {
            decoded.table.insert(name.to_string(), values.to_vec());
        }
        for (name, value) in [
            ("cap_hp1", 3.0),
            ("cap_plb1", 8.0),
            ("cap_ccet1", 2.0),
            ("cap_tes1", 10.0),
            ("cap_in_tes1", 2.0),
            ("cap_out_tes1", 2.5),
        ] {
            decoded.capacities.insert(name.to_string(), value);
        }

        decoded
    }

    #[rstest]
    fn test_unit_costs(
        unit_catalog: UnitCatalog,
        decoded: DecodedResults,
        global_parameters: GlobalParameters,
        time_series: AlignedTimeSeries,
    ) {
        let (costs, _) =
            calc_econ(&unit_catalog, &decoded, &global_parameters, &time_series).unwrap();
        assert_eq!(costs.len(), 4);

        let hp = costs.get(&"hp1".parse().unwrap()).unwrap();
        assert_approx_eq!(Money, hp.invest, Money(1_500_000.0));
        assert_approx_eq!(Money, hp.op_cost_fix, Money(6_000.0));
        assert_approx_eq!(Money, hp.op_cost_var, Money(13.5));
        assert_approx_eq!(Money, hp.op_cost, Money(6_013.5));

        // Energy tax is added to the boiler's variable costs
        let plb = costs.get(&"plb1".parse().unwrap()).unwrap();
        assert_approx_eq!(Money, plb.op_cost_var, Money(6.5));

        // Rated on the electrical side: 2 * 0.4 / 0.5
        let chp = costs.get(&"ccet1".parse().unwrap()).unwrap();
        assert_approx_eq!(Money, chp.invest, Money(1.6 * 900_000.0), epsilon = 1e-6);
        assert_approx_eq!(Money, chp.op_cost_var, Money(16.0));

        // Rated on the charging capacity
        let tes = costs.get(&"tes1".parse().unwrap()).unwrap();
        assert_approx_eq!(Money, tes.invest, Money(60_000.0));
        assert_approx_eq!(Money, tes.op_cost_var, Money(0.2), epsilon = 1e-12);
    }

    #[rstest]
    fn test_key_params(
        unit_catalog: UnitCatalog,
        decoded: DecodedResults,
        global_parameters: GlobalParameters,
        time_series: AlignedTimeSeries,
    ) {
        let (costs, key_params) =
            calc_econ(&unit_catalog, &decoded, &global_parameters, &time_series).unwrap();
        let get = |key| key_params.get(key).unwrap();

        // Gas: 10 * (30 + 32 + 31) + 30 * 80 * 0.201
        assert_approx_eq!(f64, get(KeyParam::CostGas), 1412.4, epsilon = 1e-6);
        // Grid: 1 * (50 + 120) + 2 * (60 + 120)
        assert_approx_eq!(f64, get(KeyParam::CostElGrid), 530.0, epsilon = 1e-9);
        assert_approx_eq!(f64, get(KeyParam::CostElInternal), 80.0, epsilon = 1e-9);
        assert_approx_eq!(f64, get(KeyParam::CostEl), 610.0, epsilon = 1e-9);
        // Spot market: 2 * (60 + 70 + 50)
        assert_approx_eq!(f64, get(KeyParam::RevenuesSpotmarket), 360.0, epsilon = 1e-9);
        assert_approx_eq!(f64, get(KeyParam::RevenuesHeat), 1200.0, epsilon = 1e-9);
        assert_approx_eq!(f64, get(KeyParam::RevenuesTotal), 1560.0, epsilon = 1e-9);
        assert_approx_eq!(f64, get(KeyParam::TotalHeatDemand), 15.0);

        let op_cost_total = costs.op_cost_total().value();
        assert_approx_eq!(f64, get(KeyParam::OpCostTotal), op_cost_total);
        let cost_total = op_cost_total + 1412.4 + 610.0;
        assert_approx_eq!(f64, get(KeyParam::CostTotal), cost_total, epsilon = 1e-6);
        assert_approx_eq!(
            f64,
            get(KeyParam::BalanceTotal),
            1560.0 - cost_total,
            epsilon = 1e-6
        );

        let bwsf = global_parameters.annuity_factor().0;
        let expected_lcoh =
            (costs.invest_total().value() + bwsf * (cost_total - 360.0)) / (bwsf * 15.0);
        assert_approx_eq!(f64, get(KeyParam::Lcoh), expected_lcoh, epsilon = 1e-6);
    }

    #[rstest]
    fn test_solar_total_output(
        solar_parameters: crate::catalog::UnitParameters,
        global_parameters: GlobalParameters,
        time_series: AlignedTimeSeries,
    ) {
        let units: UnitCatalog = [unit("sol1", &solar_parameters)].into_iter().collect();
        let mut decoded = DecodedResults {
            table: ResultTable::new(3),
            ..Default::default()
        };
        decoded.table.insert("Q_sol1".into(), vec![0.0, 2.0, 4.0]);
        decoded.capacities.insert("cap_sol1".into(), 4000.0);

        let (costs, _) = calc_econ(&units, &decoded, &global_parameters, &time_series).unwrap();
        let sol = costs.get(&"sol1".parse().unwrap()).unwrap();
        assert_approx_eq!(Money, sol.invest, Money(1_200_000.0));
        assert_approx_eq!(Money, sol.op_cost_var, Money(3.0));
    }

    #[rstest]
    fn test_no_heat_delivered(
        chp_parameters: crate::catalog::UnitParameters,
        global_parameters: GlobalParameters,
        time_series: AlignedTimeSeries,
    ) {
        let units: UnitCatalog = [unit("ice1", &chp_parameters)].into_iter().collect();
        let mut decoded = DecodedResults {
            table: ResultTable::new(3),
            ..Default::default()
        };
        decoded.capacities.insert("cap_ice1".into(), 1.0);

        let (_, key_params) =
            calc_econ(&units, &decoded, &global_parameters, &time_series).unwrap();
        assert!(key_params.get(KeyParam::Lcoh).unwrap().is_nan());
        // Missing columns count as no throughput
        assert_eq!(key_params.get(KeyParam::CostGas), Some(0.0));
    }

    #[rstest]
    fn test_missing_capacity(
        storage_parameters: crate::catalog::UnitParameters,
        global_parameters: GlobalParameters,
        time_series: AlignedTimeSeries,
    ) {
        let units: UnitCatalog = [unit("tes1", &storage_parameters)].into_iter().collect();
        let decoded = DecodedResults {
            table: ResultTable::new(3),
            ..Default::default()
        };
        assert!(calc_econ(&units, &decoded, &global_parameters, &time_series).is_err());
    }
}
