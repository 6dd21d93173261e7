//! Turns raw solver results into named result tables.
use crate::results::{CapacityTable, DecodeWarning, DecodedResults, ResultTable};
use crate::solver::{RawEdgeResults, RawKey, RawValue};
use crate::topology::NodeLabel;
use anyhow::{Context, Result};
use log::{debug, trace, warn};

pub mod rules;

/// Decode the results of a solver run.
///
/// Results no rule applies to are skipped with a [`DecodeWarning`]. When two results decode to
/// the same name, the first one is kept. Hourly results not covering exactly the run's hours are
/// skipped with a warning too. Status columns and total capacities are dropped, and both tables
/// are sorted by name.
///
/// Placeholder capacities are the non-finite ones. An invested capacity of zero is kept.
pub fn decode(raw: &RawEdgeResults) -> DecodedResults {
    let mut table = ResultTable::new(raw.n_steps());
    let mut capacities = CapacityTable::default();
    let mut warnings = Vec::new();

    for (key, value) in raw.iter() {
        let name = match column_name(key) {
            Ok(name) => name,
            Err(err) => {
                warnings.push(DecodeWarning {
                    key: key.clone(),
                    reason: format!("{err:#}"),
                });
                continue;
            }
        };

        let inserted = match (key.kind.is_time_series(), value) {
            (true, RawValue::Series(values)) if values.len() != raw.n_steps() => {
                warnings.push(DecodeWarning {
                    key: key.clone(),
                    reason: format!(
                        "Expected {} hourly values, got {}",
                        raw.n_steps(),
                        values.len()
                    ),
                });
                continue;
            }
            (true, RawValue::Series(values)) => table.insert(name.clone(), values.clone()),
            (false, RawValue::Scalar(value)) => capacities.insert(name.clone(), *value),
            _ => {
                warnings.push(DecodeWarning {
                    key: key.clone(),
                    reason: format!("Value does not match the variable kind {}", key.kind),
                });
                continue;
            }
        };
        if !inserted {
            debug!("Dropping duplicate result {name} from {key}");
        }
    }

    table.retain(|name| !name.starts_with("state_"));
    table.sort();
    capacities.retain(|name, value| !name.starts_with("total_") && value.is_finite());
    capacities.sort();

    for warning in &warnings {
        warn!("{warning}");
    }

    DecodedResults {
        table,
        capacities,
        warnings,
    }
}

/// Work out the name of a result from the labels in its key
fn column_name(key: &RawKey) -> Result<String> {
    let source: NodeLabel = key.source.parse()?;
    let target: Option<NodeLabel> = key.target.as_deref().map(str::parse).transpose()?;
    let (rule, name) =
        rules::column_name(source, target, key.kind).context("No decoding rule applies")?;
    trace!("Decoded {key} as {name} ({rule})");

    Ok(name)
}
