//! Decoded result tables.
use crate::catalog::{Technology, UnitCatalog, UnitInstance};
use crate::solver::RawKey;
use crate::units::{Capacity, Energy};
use indexmap::IndexMap;
use indexmap::map::Entry;
use std::fmt;

/// Time-indexed results with one uniquely named column per unit and quantity
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultTable {
    n_steps: usize,
    columns: IndexMap<String, Vec<f64>>,
}

impl ResultTable {
    /// Create an empty table covering the given number of hours
    pub fn new(n_steps: usize) -> Self {
        Self {
            n_steps,
            columns: IndexMap::new(),
        }
    }

    /// The number of hours covered
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Add a column. Returns `false` and leaves the table unchanged if the name is taken.
    pub fn insert(&mut self, name: String, values: Vec<f64>) -> bool {
        match self.columns.entry(name) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(values);
                true
            }
        }
    }

    /// The values of a column
    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// The sum of a column, or zero if the column is absent
    pub fn sum(&self, name: &str) -> f64 {
        self.get(name).map_or(0.0, |values| values.iter().sum())
    }

    /// The sum of a column weighted by a per-hour factor, or zero if the column is absent
    pub fn weighted_sum<F>(&self, name: &str, weight: F) -> f64
    where
        F: Fn(usize) -> f64,
    {
        self.get(name).map_or(0.0, |values| {
            values
                .iter()
                .enumerate()
                .map(|(t, value)| value * weight(t))
                .sum()
        })
    }

    /// The total energy in a column, or zero if the column is absent
    pub fn energy(&self, name: &str) -> Energy {
        Energy(self.sum(name))
    }

    /// Remove every column whose name matches the predicate
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.columns.retain(|name, _| keep(name));
    }

    /// Sort the columns by name
    pub fn sort(&mut self) {
        self.columns.sort_keys();
    }

    /// Iterate over the columns in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.columns
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// The column names in order
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// The number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether there are no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Optimised or fixed capacities, keyed by column name (e.g. `cap_hp1`, `cap_in_tes1`)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CapacityTable(IndexMap<String, f64>);

impl CapacityTable {
    /// Add a capacity. Returns `false` and leaves the table unchanged if the name is taken.
    pub fn insert(&mut self, name: String, value: f64) -> bool {
        match self.0.entry(name) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(value);
                true
            }
        }
    }

    /// Look up a capacity
    pub fn get(&self, name: &str) -> Option<Capacity> {
        self.0.get(name).copied().map(Capacity)
    }

    /// Remove every entry which doesn't match the predicate
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str, f64) -> bool,
    {
        self.0.retain(|name, value| keep(name, *value));
    }

    /// Sort the entries by name
    pub fn sort(&mut self) {
        self.0.sort_keys();
    }

    /// Iterate over the entries in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Capacity)> {
        self.0.iter().map(|(name, value)| (name.as_str(), Capacity(*value)))
    }

    /// The number of entries
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Add the capacities of units whose size was not a decision variable.
    ///
    /// Entries reported by the solver take precedence.
    pub fn fill_fixed(&mut self, units: &UnitCatalog) {
        for unit in units.iter() {
            for (name, value) in fixed_capacities(unit) {
                self.insert(name, value);
            }
        }
        self.sort();
    }
}

/// The capacity entries for a unit of fixed size
fn fixed_capacities(unit: &UnitInstance) -> Vec<(String, f64)> {
    let Some(capacity) = unit.fixed_capacity() else {
        return Vec::new();
    };
    let key = unit.key;
    let mut entries = vec![(format!("cap_{key}"), capacity.value())];
    if let Technology::Storage { c_in, c_out, .. } = unit.technology {
        entries.push((format!("cap_in_{key}"), c_in.0 * capacity.value()));
        entries.push((format!("cap_out_{key}"), c_out.0 * capacity.value()));
    }

    entries
}

/// A raw solver result which could not be decoded
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeWarning {
    /// The result which was skipped
    pub key: RawKey,
    /// Why it was skipped
    pub reason: String,
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Skipped solver result {}: {}", self.key, self.reason)
    }
}

/// The decoded output of one solver run
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedResults {
    /// Time series results
    pub table: ResultTable,
    /// Scalar capacity results
    pub capacities: CapacityTable,
    /// Results which could not be decoded
    pub warnings: Vec<DecodeWarning>,
}
