//! The catalog of heat supply units selected for a run.
//!
//! Each unit belongs to one [`UnitCategory`] and is identified by a [`UnitKey`], which pairs the
//! category with an instance number so that several units of the same category can coexist.
use crate::error::ConfigurationError;
use crate::units::{Capacity, Dimensionless, MoneyPerCapacity, MoneyPerEnergy};
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use strum::{EnumIter, EnumString, IntoStaticStr};

pub mod parameters;
pub use parameters::UnitParameters;

/// The kinds of unit which can be part of a heat supply system
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, EnumString, IntoStaticStr,
)]
pub enum UnitCategory {
    /// Heat pump, driven by electricity
    #[strum(serialize = "hp")]
    HeatPump,
    /// Combined-cycle combined heat and power plant
    #[strum(serialize = "ccet")]
    CombinedCycle,
    /// Internal-combustion combined heat and power plant
    #[strum(serialize = "ice")]
    InternalCombustion,
    /// Solar thermal collector array
    #[strum(serialize = "sol")]
    SolarThermal,
    /// Gas-fired peak load boiler
    #[strum(serialize = "plb")]
    PeakLoadBoiler,
    /// Electrode boiler
    #[strum(serialize = "eb")]
    ElectricBoiler,
    /// External heat source, e.g. industrial waste heat
    #[strum(serialize = "exhs")]
    ExternalHeatSource,
    /// Thermal energy storage
    #[strum(serialize = "tes")]
    ThermalStorage,
}

impl UnitCategory {
    /// The short name of the category, used as the prefix of unit keys
    pub fn prefix(self) -> &'static str {
        self.into()
    }

    /// A human-readable name for the category
    pub fn long_name(self) -> &'static str {
        match self {
            Self::HeatPump => "heat pump",
            Self::CombinedCycle => "combined-cycle CHP plant",
            Self::InternalCombustion => "internal-combustion CHP plant",
            Self::SolarThermal => "solar thermal array",
            Self::PeakLoadBoiler => "peak load boiler",
            Self::ElectricBoiler => "electrode boiler",
            Self::ExternalHeatSource => "external heat source",
            Self::ThermalStorage => "thermal energy storage",
        }
    }

    /// Whether the category produces both heat and electricity
    pub fn is_chp(self) -> bool {
        matches!(self, Self::CombinedCycle | Self::InternalCombustion)
    }

    /// Whether the category is a storage
    pub fn is_storage(self) -> bool {
        self == Self::ThermalStorage
    }
}

impl fmt::Display for UnitCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

/// Identifies one unit: its category plus an instance number starting at one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitKey {
    /// The kind of unit
    pub category: UnitCategory,
    /// Distinguishes units of the same category
    pub instance: u32,
}

impl UnitKey {
    /// Create a new [`UnitKey`]
    pub fn new(category: UnitCategory, instance: u32) -> Self {
        Self { category, instance }
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.category.prefix(), self.instance)
    }
}

impl FromStr for UnitKey {
    type Err = ConfigurationError;

    /// Parse a key of the form `<prefix><instance>`, e.g. `hp1` or `tes12`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let split = s
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| ConfigurationError::new(format!("Unit key `{s}` has no instance number")))?;
        let (prefix, instance) = s.split_at(split);

        if instance.starts_with('0') && instance.len() > 1 {
            return Err(ConfigurationError::new(format!(
                "Instance number in `{s}` has a leading zero"
            )));
        }

        let category = UnitCategory::from_str(prefix)
            .map_err(|_| ConfigurationError::new(format!("Unknown unit category `{prefix}`")))?;
        let instance: u32 = instance
            .parse()
            .map_err(|_| ConfigurationError::new(format!("Invalid instance number in `{s}`")))?;
        if instance == 0 {
            return Err(ConfigurationError::new(format!(
                "Instance numbers start at 1, got `{s}`"
            )));
        }

        Ok(Self { category, instance })
    }
}

impl<'de> Deserialize<'de> for UnitKey {
    fn deserialize<D>(deserialiser: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let key = String::deserialize(deserialiser)?;
        key.parse().map_err(serde::de::Error::custom)
    }
}

impl Serialize for UnitKey {
    fn serialize<S>(&self, serialiser: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serialiser.collect_str(self)
    }
}

/// How the capacity of a unit is determined
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sizing {
    /// Capacity is a decision variable within the given bounds
    Invest {
        /// Lower bound for the invested capacity
        minimum: Capacity,
        /// Upper bound for the invested capacity
        maximum: Capacity,
    },
    /// Capacity is fixed
    Fixed(Capacity),
}

/// The bus a single-input converter draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fuel {
    /// Draws from the gas bus
    Gas,
    /// Draws from the electricity bus
    Electricity,
}

/// Validated technical description of a unit, one variant per structural kind
#[derive(Debug, Clone, PartialEq)]
pub enum Technology {
    /// Single-input, single-output converter (heat pumps and boilers)
    Converter {
        /// How capacity is determined (thermal output, MW)
        sizing: Sizing,
        /// The input commodity
        fuel: Fuel,
        /// Heat out per unit of input (COP or thermal efficiency)
        efficiency: Dimensionless,
        /// Minimum output as a fraction of capacity while running
        min_load: Dimensionless,
        /// Maximum output as a fraction of capacity
        max_load: Dimensionless,
    },
    /// Gas-fired combined heat and power plant
    CombinedHeatPower {
        /// How capacity is determined (thermal output, MW)
        sizing: Sizing,
        /// Electricity out per unit of gas in
        eta_el: Dimensionless,
        /// Heat out per unit of gas in
        eta_th: Dimensionless,
        /// Minimum output as a fraction of capacity while running
        min_load: Dimensionless,
        /// Maximum output as a fraction of capacity
        max_load: Dimensionless,
    },
    /// Solar thermal array sized by collector area (m²)
    SolarThermal {
        /// How the area is determined
        sizing: Sizing,
    },
    /// Heat source of fixed size
    ExternalSource {
        /// Nominal thermal output (MW)
        nominal: Capacity,
        /// Whether output follows the external heat profile instead of being dispatched freely
        fixed_profile: bool,
    },
    /// Thermal energy storage
    Storage {
        /// How the storage capacity is determined (MWh)
        sizing: Sizing,
        /// Charging capacity per unit of storage capacity
        c_in: Dimensionless,
        /// Discharging capacity per unit of storage capacity
        c_out: Dimensionless,
        /// Fill level at the start of the horizon as a fraction of capacity
        initial_level: Dimensionless,
        /// Fraction of the content lost every hour
        loss_rate: Dimensionless,
        /// Whether the final fill level must equal the initial one
        balanced: bool,
    },
}

/// Cost parameters common to all units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Economics {
    /// Specific investment cost per unit of capacity
    pub inv_spez: MoneyPerCapacity,
    /// Annual fixed operating cost per unit of capacity
    pub op_cost_fix: MoneyPerCapacity,
    /// Variable operating cost per MWh of output
    pub op_cost_var: MoneyPerEnergy,
}

/// A unit selected for the heat supply system, with validated parameters
#[derive(Debug, Clone, PartialEq)]
pub struct UnitInstance {
    /// Identifies the unit
    pub key: UnitKey,
    /// The technical description of the unit
    pub technology: Technology,
    /// The unit's cost parameters
    pub economics: Economics,
}

impl UnitInstance {
    /// Validate raw parameters against the requirements of the unit's category
    pub fn new(key: UnitKey, parameters: &UnitParameters) -> Result<Self> {
        let technology = parameters.technology(key)?;
        let economics = parameters.economics(key)?;

        Ok(Self {
            key,
            technology,
            economics,
        })
    }

    /// The unit's category
    pub fn category(&self) -> UnitCategory {
        self.key.category
    }

    /// The capacity of the unit if it is fixed, i.e. not a decision variable
    pub fn fixed_capacity(&self) -> Option<Capacity> {
        match &self.technology {
            Technology::Converter { sizing, .. }
            | Technology::CombinedHeatPower { sizing, .. }
            | Technology::SolarThermal { sizing }
            | Technology::Storage { sizing, .. } => match sizing {
                Sizing::Fixed(capacity) => Some(*capacity),
                Sizing::Invest { .. } => None,
            },
            Technology::ExternalSource { nominal, .. } => Some(*nominal),
        }
    }
}

/// The units of a heat supply system, keyed and ordered by [`UnitKey`]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UnitCatalog(IndexMap<UnitKey, UnitInstance>);

impl UnitCatalog {
    /// Validate the raw parameters for every selected unit
    pub fn from_parameters<'a, I>(parameters: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a UnitKey, &'a UnitParameters)>,
    {
        let mut units = IndexMap::new();
        for (key, params) in parameters {
            let unit = UnitInstance::new(*key, params)
                .with_context(|| format!("Invalid parameters for unit {key}"))?;
            units.insert(*key, unit);
        }
        units.sort_keys();

        Ok(Self(units))
    }

    /// Iterate over the units in key order
    pub fn iter(&self) -> impl Iterator<Item = &UnitInstance> {
        self.0.values()
    }

    /// Get the unit with the given key
    pub fn get(&self, key: &UnitKey) -> Option<&UnitInstance> {
        self.0.get(key)
    }

    /// The number of units
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no units
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether at least one combined heat and power unit is present
    pub fn has_chp(&self) -> bool {
        self.0.keys().any(|key| key.category.is_chp())
    }

    /// Whether at least one unit of the given category is present
    pub fn contains_category(&self, category: UnitCategory) -> bool {
        self.0.keys().any(|key| key.category == category)
    }
}

impl FromIterator<UnitInstance> for UnitCatalog {
    fn from_iter<T: IntoIterator<Item = UnitInstance>>(iter: T) -> Self {
        let mut units: IndexMap<_, _> = iter.into_iter().map(|unit| (unit.key, unit)).collect();
        units.sort_keys();
        Self(units)
    }
}
