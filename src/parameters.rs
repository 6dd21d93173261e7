//! Defines the [`GlobalParameters`] struct, which represents the contents of `parameters.toml`.
use crate::error::config_ensure;
use crate::finance::annuity_factor;
use crate::input::read_toml;
use crate::solver::SolverOptions;
use crate::units::{Dimensionless, EmissionsPerEnergy, MoneyPerEnergy};
use anyhow::Result;
use serde::Deserialize;
use serde_string_enum::DeserializeLabeledStringEnum;
use std::path::Path;

const PARAMETERS_FILE_NAME: &str = "parameters.toml";

macro_rules! define_unit_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            <$type>::from($value)
        }
    };
}

define_unit_param_default!(default_mip_gap, Dimensionless, 0.01);

/// Economic and operating parameters shared by all units of a run.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GlobalParameters {
    /// Interest rate on capital, as a fraction
    pub capital_interest: Dimensionless,
    /// Economic lifetime of the system in years
    pub lifetime: u32,
    /// Energy tax on heat from boilers (€/MWh)
    pub energy_tax: MoneyPerEnergy,
    /// Emission factor of natural gas (t CO₂/MWh)
    pub ef_gas: EmissionsPerEnergy,
    /// Price received for heat delivered (€/MWh)
    pub heat_price: MoneyPerEnergy,
    /// Consumer charges on electricity drawn from the grid (€/MWh)
    pub elec_consumer_charges_grid: MoneyPerEnergy,
    /// Consumer charges on self-generated electricity consumed on site (€/MWh)
    pub elec_consumer_charges_self: MoneyPerEnergy,
    /// Avoided network charges paid on top of the spot price for exported electricity (€/MWh)
    #[serde(rename = "vNNE")]
    pub avoided_network_charges: MoneyPerEnergy,
    /// Which solver to use
    #[serde(default)]
    pub solver: SolverKind,
    /// Relative MIP gap at which the solver may stop
    #[serde(default = "default_mip_gap")]
    pub mip_gap: Dimensionless,
    /// Wall-clock limit for the solver in seconds
    #[serde(default)]
    pub time_limit: Option<f64>,
}

/// The available MILP solvers
#[derive(DeserializeLabeledStringEnum, Debug, Clone, Copy, PartialEq, Default)]
pub enum SolverKind {
    /// The HiGHS solver
    #[default]
    #[string = "highs"]
    Highs,
}

/// Check that the `capital_interest` parameter is valid
fn check_capital_interest(value: Dimensionless) -> Result<()> {
    config_ensure!(
        (0.0..=1.0).contains(&value.0),
        "capital_interest must be between 0 and 1, got {}",
        value.0
    );

    Ok(())
}

/// Check that the `lifetime` parameter is valid
fn check_lifetime(value: u32) -> Result<()> {
    config_ensure!(value > 0, "lifetime cannot be zero");

    Ok(())
}

/// Check that the solver options are valid
fn check_solver_options(mip_gap: Dimensionless, time_limit: Option<f64>) -> Result<()> {
    config_ensure!(
        mip_gap.0.is_finite() && mip_gap.0 >= 0.0,
        "mip_gap must be a finite number not less than zero"
    );
    if let Some(time_limit) = time_limit {
        config_ensure!(
            time_limit.is_finite() && time_limit > 0.0,
            "time_limit must be a finite number greater than zero"
        );
    }

    Ok(())
}

/// Check that the prices and charges are finite numbers
fn check_prices(params: &GlobalParameters) -> Result<()> {
    for (name, value) in [
        ("energy_tax", params.energy_tax),
        ("heat_price", params.heat_price),
        ("elec_consumer_charges_grid", params.elec_consumer_charges_grid),
        ("elec_consumer_charges_self", params.elec_consumer_charges_self),
        ("vNNE", params.avoided_network_charges),
    ] {
        config_ensure!(value.is_finite(), "{name} must be a finite number");
    }
    config_ensure!(
        params.ef_gas.is_finite() && params.ef_gas.value() >= 0.0,
        "ef_gas must be a finite number not less than zero"
    );

    Ok(())
}

impl GlobalParameters {
    /// Read the parameters file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The file contents as a [`GlobalParameters`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<GlobalParameters> {
        let file_path = model_dir.as_ref().join(PARAMETERS_FILE_NAME);
        let params: GlobalParameters = read_toml(&file_path)?;
        params.validate()?;

        Ok(params)
    }

    /// Check that all parameters are within their valid ranges
    pub fn validate(&self) -> Result<()> {
        check_capital_interest(self.capital_interest)?;
        check_lifetime(self.lifetime)?;
        check_solver_options(self.mip_gap, self.time_limit)?;
        check_prices(self)?;

        Ok(())
    }

    /// The annuity factor for the system's interest rate and lifetime.
    ///
    /// Used both to annualise investments in the optimisation and to discount costs in the
    /// levelised cost of heat.
    pub fn annuity_factor(&self) -> Dimensionless {
        annuity_factor(self.capital_interest, self.lifetime)
    }

    /// The options passed through to the solver
    pub fn solver_options(&self) -> SolverOptions {
        SolverOptions {
            mip_gap: self.mip_gap.0,
            time_limit: self.time_limit,
        }
    }
}
