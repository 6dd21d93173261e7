//! Code for reading hourly input data from `time_series.csv`.
use super::{input_err_msg, read_csv};
use crate::time_series::AlignedTimeSeries;
use crate::units::{EmissionsPerEnergy, Energy, MoneyPerEmissions, MoneyPerEnergy};
use anyhow::{Context, Result, bail};
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer};
use std::path::Path;

const TIME_SERIES_FILE_NAME: &str = "time_series.csv";

/// Accepted timestamp formats, tried in order
const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M",
];

/// One row of the time series file
#[derive(Deserialize, Debug, PartialEq)]
struct TimeSeriesRow {
    #[serde(deserialize_with = "deserialise_timestamp")]
    timestamp: NaiveDateTime,
    heat_demand: Energy,
    gas_price: MoneyPerEnergy,
    el_spot_price: MoneyPerEnergy,
    ef_om: EmissionsPerEnergy,
    co2_price: MoneyPerEmissions,
    #[serde(default)]
    solar_heat_flow: Option<f64>,
    #[serde(default)]
    ext_heat_profile: Option<f64>,
}

fn deserialise_timestamp<'de, D>(deserialiser: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserialiser)?;
    parse_timestamp(&value).map_err(serde::de::Error::custom)
}

/// Parse a timestamp in any of the [`TIMESTAMP_FORMATS`]
fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    let value = value.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .with_context(|| format!("Invalid timestamp `{value}`"))
}

/// Collect an optional column, which must either be filled in every row or in none
fn optional_column<F>(rows: &[TimeSeriesRow], name: &str, get: F) -> Result<Option<Vec<f64>>>
where
    F: Fn(&TimeSeriesRow) -> Option<f64>,
{
    let values: Vec<_> = rows.iter().map(get).collect();
    match values.iter().filter(|value| value.is_some()).count() {
        0 => Ok(None),
        n if n == values.len() => Ok(Some(values.into_iter().flatten().collect())),
        _ => bail!("Column {name} must have a value in every row or in none"),
    }
}

/// Read the time series from the model directory.
///
/// The columns `solar_heat_flow` and `ext_heat_profile` are optional.
pub fn read_time_series(model_dir: &Path) -> Result<AlignedTimeSeries> {
    let file_path = model_dir.join(TIME_SERIES_FILE_NAME);
    let rows: Vec<TimeSeriesRow> = read_csv(&file_path)?;
    time_series_from_rows(&rows).with_context(|| input_err_msg(&file_path))
}

fn time_series_from_rows(rows: &[TimeSeriesRow]) -> Result<AlignedTimeSeries> {
    Ok(AlignedTimeSeries {
        timestamps: rows.iter().map(|row| row.timestamp).collect(),
        heat_demand: rows.iter().map(|row| row.heat_demand).collect(),
        gas_price: rows.iter().map(|row| row.gas_price).collect(),
        el_spot_price: rows.iter().map(|row| row.el_spot_price).collect(),
        ef_om: rows.iter().map(|row| row.ef_om).collect(),
        co2_price: rows.iter().map(|row| row.co2_price).collect(),
        solar_heat_flow: optional_column(rows, "solar_heat_flow", |row| row.solar_heat_flow)?,
        ext_heat_profile: optional_column(rows, "ext_heat_profile", |row| row.ext_heat_profile)?,
    })
}
