//! Operating emissions.
use super::{KeyParam, KeyParams};
use crate::parameters::GlobalParameters;
use crate::results::DecodedResults;
use crate::time_series::AlignedTimeSeries;
use anyhow::{Result, ensure};

/// Calculate the emissions caused by buying gas and grid electricity.
///
/// Electricity sold on the spot market displaces grid generation and is credited at the hourly
/// grid emission factor, so its contribution is negative.
pub fn calc_ecol(
    decoded: &DecodedResults,
    params: &GlobalParameters,
    series: &AlignedTimeSeries,
) -> Result<KeyParams> {
    let table = &decoded.table;
    ensure!(
        table.n_steps() == series.len(),
        "Results cover {} hours, but the time series cover {}",
        table.n_steps(),
        series.len()
    );

    let gas = table.energy("H_source") * params.ef_gas;
    let electricity = table.weighted_sum("P_source", |t| series.ef_om[t].value());
    let spotmarket = -table.weighted_sum("P_spotmarket", |t| series.ef_om[t].value());

    let mut key_params = KeyParams::default();
    key_params.insert(KeyParam::EmissionsGas, gas.value());
    key_params.insert(KeyParam::EmissionsElectricity, electricity);
    key_params.insert(KeyParam::EmissionsSpotmarket, spotmarket);
    key_params.insert(
        KeyParam::EmissionsTotal,
        gas.value() + electricity + spotmarket,
    );

    Ok(key_params)
}
