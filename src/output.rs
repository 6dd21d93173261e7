//! The module responsible for writing output data to disk.
use crate::kpi::{CostTable, KeyParams};
use crate::results::{CapacityTable, ResultTable};
use crate::simulation::RunResults;
use anyhow::{Context, Result, ensure};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "heatplan_results";

/// The output file name for hourly results
const TIME_SERIES_FILE_NAME: &str = "time_series.csv";

/// The output file name for capacities
const CAPACITIES_FILE_NAME: &str = "capacities.csv";

/// The output file name for unit costs
const COSTS_FILE_NAME: &str = "costs.csv";

/// The output file name for key parameters
const KEY_PARAMETERS_FILE_NAME: &str = "key_parameters.csv";

/// Get the default output directory for the model in the specified directory
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    // Get the model name from the dir path. This ends up being convoluted because we need to check
    // for all possible errors. Ugh.
    let model_dir = model_dir
        .canonicalize() // canonicalise in case the user has specified "."
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    // Construct path
    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create a new output directory for the model.
///
/// If the directory already exists and is not empty, its contents are deleted if `allow_overwrite`
/// is set and an error is raised otherwise.
///
/// # Returns
///
/// Whether an existing directory is being overwritten
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let overwrite = if let Ok(mut it) = fs::read_dir(output_dir) {
        if it.next().is_none() {
            // Folder exists and is empty: nothing to do
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. Use --overwrite to replace it."
        );

        fs::remove_dir_all(output_dir)?;
        true
    } else {
        false
    };

    // Try to create the directory, with parents
    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// A row of the capacities file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct CapacityRow {
    unit: String,
    capacity: f64,
}

/// A row of the costs file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct CostRow {
    unit: String,
    invest: f64,
    op_cost_fix: f64,
    op_cost_var: f64,
    op_cost: f64,
}

/// A row of the key parameters file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct KeyParameterRow {
    name: String,
    value: f64,
}

/// Write the hourly results with one column per decoded quantity
fn write_time_series(
    file_path: &Path,
    timestamps: &[NaiveDateTime],
    table: &ResultTable,
) -> Result<()> {
    ensure!(
        timestamps.len() == table.n_steps(),
        "Results cover {} hours, but there are {} timestamps",
        table.n_steps(),
        timestamps.len()
    );

    let mut writer = csv::Writer::from_path(file_path)?;
    writer.write_record(std::iter::once("timestamp").chain(table.column_names()))?;
    for (t, timestamp) in timestamps.iter().enumerate() {
        let mut record = vec![timestamp.format("%Y-%m-%d %H:%M:%S").to_string()];
        record.extend(table.iter().map(|(_, values)| values[t].to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()?;

    Ok(())
}

fn write_capacities(file_path: &Path, capacities: &CapacityTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(file_path)?;
    for (unit, capacity) in capacities.iter() {
        writer.serialize(CapacityRow {
            unit: unit.to_string(),
            capacity: capacity.value(),
        })?;
    }
    writer.flush()?;

    Ok(())
}

fn write_costs(file_path: &Path, costs: &CostTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(file_path)?;
    for (unit, costs) in costs.iter() {
        writer.serialize(CostRow {
            unit: unit.to_string(),
            invest: costs.invest.value(),
            op_cost_fix: costs.op_cost_fix.value(),
            op_cost_var: costs.op_cost_var.value(),
            op_cost: costs.op_cost.value(),
        })?;
    }
    writer.flush()?;

    Ok(())
}

fn write_key_parameters(file_path: &Path, key_params: &KeyParams) -> Result<()> {
    let mut writer = csv::Writer::from_path(file_path)?;
    for (key, value) in key_params.iter() {
        writer.serialize(KeyParameterRow {
            name: key.to_string(),
            value,
        })?;
    }
    writer.flush()?;

    Ok(())
}

/// Write all result tables of a run to CSV files in the output folder.
///
/// # Arguments
///
/// * `output_path` - Folder where files will be saved
/// * `timestamps` - The time index of the run
/// * `results` - The results to write
pub fn write_results(
    output_path: &Path,
    timestamps: &[NaiveDateTime],
    results: &RunResults,
) -> Result<()> {
    let path = |file_name| output_path.join(file_name);
    write_time_series(&path(TIME_SERIES_FILE_NAME), timestamps, &results.decoded.table)
        .context("Could not write time series results")?;
    write_capacities(&path(CAPACITIES_FILE_NAME), &results.decoded.capacities)
        .context("Could not write capacities")?;
    write_costs(&path(COSTS_FILE_NAME), &results.costs).context("Could not write costs")?;
    write_key_parameters(&path(KEY_PARAMETERS_FILE_NAME), &results.key_params)
        .context("Could not write key parameters")?;

    Ok(())
}
