//! Key performance indicators derived from decoded results.
use crate::catalog::UnitKey;
use crate::units::Money;
use indexmap::IndexMap;
use strum::{Display, EnumIter, EnumString};

pub mod ecological;
pub mod economic;
pub use ecological::calc_ecol;
pub use economic::calc_econ;

/// The names of the scalar key parameters
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, EnumString,
)]
pub enum KeyParam {
    /// Total operating costs of all units
    #[strum(serialize = "op_cost_total")]
    OpCostTotal,
    /// Total investment in all units
    #[strum(serialize = "invest_total")]
    InvestTotal,
    /// Cost of gas including CO₂ certificates
    #[strum(serialize = "cost_gas")]
    CostGas,
    /// Cost of electricity from the grid including consumer charges
    #[strum(serialize = "cost_el_grid")]
    CostElGrid,
    /// Consumer charges on self-generated electricity
    #[strum(serialize = "cost_el_internal")]
    CostElInternal,
    /// Total cost of electricity
    #[strum(serialize = "cost_el")]
    CostEl,
    /// Total annual costs
    #[strum(serialize = "cost_total")]
    CostTotal,
    /// Revenue from electricity sold on the spot market
    #[strum(serialize = "revenues_spotmarket")]
    RevenuesSpotmarket,
    /// Revenue from heat delivered
    #[strum(serialize = "revenues_heat")]
    RevenuesHeat,
    /// Total annual revenues
    #[strum(serialize = "revenues_total")]
    RevenuesTotal,
    /// Revenues minus costs
    #[strum(serialize = "balance_total")]
    BalanceTotal,
    /// Levelised cost of heat
    #[strum(serialize = "LCOH")]
    Lcoh,
    /// Total heat delivered to the network
    #[strum(serialize = "total_heat_demand")]
    TotalHeatDemand,
    /// Emissions from burning gas
    #[strum(serialize = "Emissions OM (Gas)")]
    EmissionsGas,
    /// Emissions from grid electricity
    #[strum(serialize = "Emissions OM (Electricity)")]
    EmissionsElectricity,
    /// Emissions avoided by exporting electricity (negative)
    #[strum(serialize = "Emissions OM (Spotmarket)")]
    EmissionsSpotmarket,
    /// Net emissions
    #[strum(serialize = "Total Emissions OM")]
    EmissionsTotal,
}

/// Named scalar results
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeyParams(IndexMap<KeyParam, f64>);

impl KeyParams {
    /// Set a value
    pub fn insert(&mut self, key: KeyParam, value: f64) {
        self.0.insert(key, value);
    }

    /// Get a value
    pub fn get(&self, key: KeyParam) -> Option<f64> {
        self.0.get(&key).copied()
    }

    /// Add all values from another set, replacing existing ones
    pub fn merge(&mut self, other: KeyParams) {
        self.0.extend(other.0);
    }

    /// Iterate over the values in [`KeyParam`] order
    pub fn iter(&self) -> impl Iterator<Item = (KeyParam, f64)> + '_ {
        let mut entries: Vec<_> = self.0.iter().map(|(key, value)| (*key, *value)).collect();
        entries.sort_by_key(|(key, _)| *key);
        entries.into_iter()
    }

    /// The number of values
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no values
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The costs of one unit
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UnitCosts {
    /// One-off investment
    pub invest: Money,
    /// Annual fixed operating cost
    pub op_cost_fix: Money,
    /// Annual variable operating cost
    pub op_cost_var: Money,
    /// Annual operating cost
    pub op_cost: Money,
}

/// Costs per unit, in unit order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CostTable(IndexMap<UnitKey, UnitCosts>);

impl CostTable {
    /// Set the costs of a unit
    pub fn insert(&mut self, key: UnitKey, costs: UnitCosts) {
        self.0.insert(key, costs);
    }

    /// The costs of a unit
    pub fn get(&self, key: &UnitKey) -> Option<&UnitCosts> {
        self.0.get(key)
    }

    /// Iterate over the rows
    pub fn iter(&self) -> impl Iterator<Item = (&UnitKey, &UnitCosts)> {
        self.0.iter()
    }

    /// Total investment over all units
    pub fn invest_total(&self) -> Money {
        self.0.values().map(|costs| costs.invest).sum()
    }

    /// Total operating cost over all units
    pub fn op_cost_total(&self) -> Money {
        self.0.values().map(|costs| costs.op_cost).sum()
    }

    /// The number of rows
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no rows
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
