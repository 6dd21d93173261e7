//! Fixtures for tests

use crate::catalog::{UnitCatalog, UnitInstance, UnitKey, UnitParameters};
use crate::parameters::{GlobalParameters, SolverKind};
use crate::time_series::AlignedTimeSeries;
use crate::units::{Dimensionless, EmissionsPerEnergy, Energy, MoneyPerEmissions, MoneyPerEnergy};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// Validate the parameters of a single unit
pub fn unit(key: &str, parameters: &UnitParameters) -> UnitInstance {
    let key: UnitKey = key.parse().unwrap();
    UnitInstance::new(key, parameters).unwrap()
}

#[fixture]
pub fn heat_pump_parameters() -> UnitParameters {
    UnitParameters {
        invest_mode: Some(true),
        cap_min: Some(0.0),
        cap_max: Some(10.0),
        q_min: Some(0.2),
        q_max: Some(1.0),
        cop: Some(3.5),
        inv_spez: Some(500_000.0),
        op_cost_fix: Some(2_000.0),
        op_cost_var: Some(1.5),
        ..Default::default()
    }
}

#[fixture]
pub fn boiler_parameters() -> UnitParameters {
    UnitParameters {
        invest_mode: Some(false),
        cap_n: Some(8.0),
        q_min: Some(0.1),
        q_max: Some(1.0),
        eta: Some(0.95),
        inv_spez: Some(60_000.0),
        op_cost_fix: Some(1_000.0),
        op_cost_var: Some(1.0),
        ..Default::default()
    }
}

#[fixture]
pub fn chp_parameters() -> UnitParameters {
    UnitParameters {
        invest_mode: Some(true),
        cap_min: Some(0.0),
        cap_max: Some(5.0),
        q_min: Some(0.5),
        q_max: Some(1.0),
        eta_el: Some(0.4),
        eta_th: Some(0.5),
        inv_spez: Some(900_000.0),
        op_cost_fix: Some(10_000.0),
        op_cost_var: Some(4.0),
        ..Default::default()
    }
}

#[fixture]
pub fn solar_parameters() -> UnitParameters {
    UnitParameters {
        invest_mode: Some(true),
        a_min: Some(0.0),
        a_max: Some(20_000.0),
        inv_spez: Some(300.0),
        op_cost_fix: Some(2.0),
        op_cost_var: Some(0.5),
        ..Default::default()
    }
}

#[fixture]
pub fn external_source_parameters() -> UnitParameters {
    UnitParameters {
        q_n: Some(2.0),
        fixed_profile: Some(true),
        inv_spez: Some(0.0),
        op_cost_fix: Some(0.0),
        op_cost_var: Some(10.0),
        ..Default::default()
    }
}

#[fixture]
pub fn storage_parameters() -> UnitParameters {
    UnitParameters {
        invest_mode: Some(true),
        cap_min: Some(0.0),
        cap_max: Some(100.0),
        c_in: Some(0.2),
        c_out: Some(0.25),
        q_0: Some(0.5),
        loss_rate: Some(0.001),
        balanced: Some(true),
        inv_spez: Some(30_000.0),
        op_cost_fix: Some(100.0),
        op_cost_var: Some(0.2),
        ..Default::default()
    }
}

/// A heat pump, a gas boiler, a CHP plant and a storage
#[fixture]
pub fn unit_catalog() -> UnitCatalog {
    [
        unit("hp1", &heat_pump_parameters()),
        unit("plb1", &boiler_parameters()),
        unit("ccet1", &chp_parameters()),
        unit("tes1", &storage_parameters()),
    ]
    .into_iter()
    .collect()
}

#[fixture]
pub fn catalog_with_solar() -> UnitCatalog {
    [
        unit("hp1", &heat_pump_parameters()),
        unit("sol1", &solar_parameters()),
    ]
    .into_iter()
    .collect()
}

#[fixture]
pub fn global_parameters() -> GlobalParameters {
    GlobalParameters {
        capital_interest: Dimensionless(0.05),
        lifetime: 20,
        energy_tax: MoneyPerEnergy(5.5),
        ef_gas: EmissionsPerEnergy(0.201),
        heat_price: MoneyPerEnergy(80.0),
        elec_consumer_charges_grid: MoneyPerEnergy(120.0),
        elec_consumer_charges_self: MoneyPerEnergy(40.0),
        avoided_network_charges: MoneyPerEnergy(10.0),
        solver: SolverKind::Highs,
        mip_gap: Dimensionless(0.01),
        time_limit: None,
    }
}

/// Hourly timestamps starting at midnight on 1 January 2023
pub fn hours(n: usize) -> Vec<NaiveDateTime> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    (0..n)
        .map(|hour| start + TimeDelta::hours(hour as i64))
        .collect()
}

/// Three hours of input data
#[fixture]
pub fn time_series() -> AlignedTimeSeries {
    AlignedTimeSeries {
        timestamps: hours(3),
        heat_demand: vec![Energy(5.0), Energy(6.0), Energy(4.0)],
        gas_price: vec![
            MoneyPerEnergy(30.0),
            MoneyPerEnergy(32.0),
            MoneyPerEnergy(31.0),
        ],
        el_spot_price: vec![
            MoneyPerEnergy(50.0),
            MoneyPerEnergy(60.0),
            MoneyPerEnergy(40.0),
        ],
        ef_om: vec![
            EmissionsPerEnergy(0.4),
            EmissionsPerEnergy(0.45),
            EmissionsPerEnergy(0.35),
        ],
        co2_price: vec![MoneyPerEmissions(80.0); 3],
        solar_heat_flow: Some(vec![0.0, 0.0005, 0.001]),
        ext_heat_profile: None,
    }
}
