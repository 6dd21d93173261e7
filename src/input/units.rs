//! Code for reading the unit catalog from `units.toml`.
use super::{input_err_msg, read_toml};
use crate::catalog::{UnitCatalog, UnitKey, UnitParameters};
use crate::error::config_ensure;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

const UNITS_FILE_NAME: &str = "units.toml";

/// Read the selected units and their parameters from the model directory.
///
/// The file has one table per unit, named by its key (e.g. `[hp1]`).
pub fn read_units(model_dir: &Path) -> Result<UnitCatalog> {
    let file_path = model_dir.join(UNITS_FILE_NAME);
    let raw: BTreeMap<UnitKey, UnitParameters> = read_toml(&file_path)?;
    read_units_from_map(&raw).with_context(|| input_err_msg(&file_path))
}

fn read_units_from_map(raw: &BTreeMap<UnitKey, UnitParameters>) -> Result<UnitCatalog> {
    config_ensure!(!raw.is_empty(), "No units were selected");
    UnitCatalog::from_parameters(raw)
}
