//! Raw unit parameters and their validation against the requirements of each category.
use super::{Economics, Fuel, Sizing, Technology, UnitCategory, UnitKey};
use crate::error::{ConfigurationError, config_bail, config_ensure};
use crate::units::{Capacity, Dimensionless, MoneyPerCapacity, MoneyPerEnergy};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// The parameter record for one unit, as supplied by the caller.
///
/// Which fields are required depends on the unit's category; fields that a category does not use
/// are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnitParameters {
    /// Whether capacity is optimised (`true`) or fixed at the nominal value (`false`)
    pub invest_mode: Option<bool>,
    /// Minimum capacity when optimising
    pub cap_min: Option<f64>,
    /// Maximum capacity when optimising
    pub cap_max: Option<f64>,
    /// Nominal capacity when not optimising
    #[serde(rename = "cap_N")]
    pub cap_n: Option<f64>,
    /// Minimum collector area when optimising (m²)
    #[serde(rename = "A_min")]
    pub a_min: Option<f64>,
    /// Maximum collector area when optimising (m²)
    #[serde(rename = "A_max")]
    pub a_max: Option<f64>,
    /// Nominal collector area when not optimising (m²)
    #[serde(rename = "A_N")]
    pub a_n: Option<f64>,
    /// Nominal heat output of a fixed-size source (MW)
    #[serde(rename = "Q_N")]
    pub q_n: Option<f64>,
    /// Minimum output while running as a fraction of capacity
    #[serde(rename = "Q_min")]
    pub q_min: Option<f64>,
    /// Maximum output as a fraction of capacity
    #[serde(rename = "Q_max")]
    pub q_max: Option<f64>,
    /// Coefficient of performance
    pub cop: Option<f64>,
    /// Thermal efficiency of a boiler
    pub eta: Option<f64>,
    /// Electrical efficiency of a CHP plant
    pub eta_el: Option<f64>,
    /// Thermal efficiency of a CHP plant
    pub eta_th: Option<f64>,
    /// Charging capacity per unit of storage capacity
    pub c_in: Option<f64>,
    /// Discharging capacity per unit of storage capacity
    pub c_out: Option<f64>,
    /// Initial storage fill level as a fraction of capacity
    #[serde(rename = "Q_0")]
    pub q_0: Option<f64>,
    /// Hourly storage loss as a fraction of the content
    pub loss_rate: Option<f64>,
    /// Whether the storage level at the end must equal the level at the start
    pub balanced: Option<bool>,
    /// Whether an external heat source follows a fixed profile
    pub fixed_profile: Option<bool>,
    /// Specific investment cost
    pub inv_spez: Option<f64>,
    /// Specific annual fixed operating cost
    pub op_cost_fix: Option<f64>,
    /// Variable operating cost per MWh
    pub op_cost_var: Option<f64>,
}

/// Get a required parameter, failing with a [`ConfigurationError`] if it is absent
fn require<T: Copy>(value: Option<T>, key: UnitKey, name: &str) -> Result<T> {
    value.ok_or_else(|| {
        ConfigurationError::new(format!("Unit {key} is missing required parameter `{name}`"))
            .into()
    })
}

/// Check that a value lies within the unit interval
fn check_fraction(value: f64, key: UnitKey, name: &str) -> Result<Dimensionless> {
    config_ensure!(
        (0.0..=1.0).contains(&value),
        "Parameter `{name}` of unit {key} must be between 0 and 1, got {value}"
    );

    Ok(Dimensionless(value))
}

/// Check that a value is strictly positive
fn check_positive(value: f64, key: UnitKey, name: &str) -> Result<Dimensionless> {
    config_ensure!(
        value.is_finite() && value > 0.0,
        "Parameter `{name}` of unit {key} must be greater than zero, got {value}"
    );

    Ok(Dimensionless(value))
}

/// Check that a value is finite and not negative
fn check_non_negative(value: f64, key: UnitKey, name: &str) -> Result<f64> {
    config_ensure!(
        value.is_finite() && value >= 0.0,
        "Parameter `{name}` of unit {key} cannot be negative, got {value}"
    );

    Ok(value)
}

impl UnitParameters {
    /// Derive the sizing from either the investment bounds or the nominal value
    fn sizing(
        &self,
        key: UnitKey,
        min: (Option<f64>, &str),
        max: (Option<f64>, &str),
        nominal: (Option<f64>, &str),
    ) -> Result<Sizing> {
        if require(self.invest_mode, key, "invest_mode")? {
            let minimum = check_non_negative(require(min.0, key, min.1)?, key, min.1)?;
            let maximum = check_non_negative(require(max.0, key, max.1)?, key, max.1)?;
            config_ensure!(
                minimum <= maximum,
                "Unit {key}: `{}` ({minimum}) cannot exceed `{}` ({maximum})",
                min.1,
                max.1
            );

            Ok(Sizing::Invest {
                minimum: Capacity(minimum),
                maximum: Capacity(maximum),
            })
        } else {
            let value = check_non_negative(require(nominal.0, key, nominal.1)?, key, nominal.1)?;
            Ok(Sizing::Fixed(Capacity(value)))
        }
    }

    /// Sizing in units of capacity (MW or MWh)
    fn capacity_sizing(&self, key: UnitKey) -> Result<Sizing> {
        self.sizing(
            key,
            (self.cap_min, "cap_min"),
            (self.cap_max, "cap_max"),
            (self.cap_n, "cap_N"),
        )
    }

    /// The relative dispatch range of a converter
    fn load_range(&self, key: UnitKey) -> Result<(Dimensionless, Dimensionless)> {
        let min_load = check_fraction(require(self.q_min, key, "Q_min")?, key, "Q_min")?;
        let max_load = check_fraction(require(self.q_max, key, "Q_max")?, key, "Q_max")?;
        config_ensure!(
            min_load <= max_load,
            "Unit {key}: `Q_min` cannot exceed `Q_max`"
        );

        Ok((min_load, max_load))
    }

    /// Validate the technical parameters required by the unit's category
    pub fn technology(&self, key: UnitKey) -> Result<Technology> {
        let technology = match key.category {
            UnitCategory::HeatPump | UnitCategory::PeakLoadBoiler | UnitCategory::ElectricBoiler => {
                let (fuel, efficiency, name) = match key.category {
                    UnitCategory::HeatPump => (Fuel::Electricity, self.cop, "cop"),
                    UnitCategory::PeakLoadBoiler => (Fuel::Gas, self.eta, "eta"),
                    _ => (Fuel::Electricity, self.eta, "eta"),
                };
                let efficiency = check_positive(require(efficiency, key, name)?, key, name)?;
                let (min_load, max_load) = self.load_range(key)?;

                Technology::Converter {
                    sizing: self.capacity_sizing(key)?,
                    fuel,
                    efficiency,
                    min_load,
                    max_load,
                }
            }
            UnitCategory::CombinedCycle | UnitCategory::InternalCombustion => {
                let eta_el = check_positive(require(self.eta_el, key, "eta_el")?, key, "eta_el")?;
                let eta_th = check_positive(require(self.eta_th, key, "eta_th")?, key, "eta_th")?;
                let (min_load, max_load) = self.load_range(key)?;

                Technology::CombinedHeatPower {
                    sizing: self.capacity_sizing(key)?,
                    eta_el,
                    eta_th,
                    min_load,
                    max_load,
                }
            }
            UnitCategory::SolarThermal => Technology::SolarThermal {
                sizing: self.sizing(
                    key,
                    (self.a_min, "A_min"),
                    (self.a_max, "A_max"),
                    (self.a_n, "A_N"),
                )?,
            },
            UnitCategory::ExternalHeatSource => {
                let nominal = check_non_negative(require(self.q_n, key, "Q_N")?, key, "Q_N")?;

                Technology::ExternalSource {
                    nominal: Capacity(nominal),
                    fixed_profile: require(self.fixed_profile, key, "fixed_profile")?,
                }
            }
            UnitCategory::ThermalStorage => {
                let c_in = check_positive(require(self.c_in, key, "c_in")?, key, "c_in")?;
                let c_out = check_positive(require(self.c_out, key, "c_out")?, key, "c_out")?;
                let initial_level = check_fraction(require(self.q_0, key, "Q_0")?, key, "Q_0")?;
                let loss_rate =
                    check_fraction(require(self.loss_rate, key, "loss_rate")?, key, "loss_rate")?;
                if loss_rate == Dimensionless(1.0) {
                    config_bail!("Unit {key}: a loss rate of 1 would empty the storage every hour");
                }

                Technology::Storage {
                    sizing: self.capacity_sizing(key)?,
                    c_in,
                    c_out,
                    initial_level,
                    loss_rate,
                    balanced: require(self.balanced, key, "balanced")?,
                }
            }
        };

        Ok(technology)
    }

    /// Validate the cost parameters
    pub fn economics(&self, key: UnitKey) -> Result<Economics> {
        let inv_spez = check_non_negative(require(self.inv_spez, key, "inv_spez")?, key, "inv_spez")?;
        let op_cost_fix =
            check_non_negative(require(self.op_cost_fix, key, "op_cost_fix")?, key, "op_cost_fix")?;
        let op_cost_var = require(self.op_cost_var, key, "op_cost_var")?;
        config_ensure!(
            op_cost_var.is_finite(),
            "Parameter `op_cost_var` of unit {key} must be finite"
        );

        Ok(Economics {
            inv_spez: MoneyPerCapacity(inv_spez),
            op_cost_fix: MoneyPerCapacity(op_cost_fix),
            op_cost_var: MoneyPerEnergy(op_cost_var),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, heat_pump_parameters, storage_parameters};
    use rstest::rstest;

    fn key(s: &str) -> UnitKey {
        s.parse().unwrap()
    }

    #[rstest]
    fn test_heat_pump_technology(heat_pump_parameters: UnitParameters) {
        let technology = heat_pump_parameters.technology(key("hp1")).unwrap();
        assert_eq!(
            technology,
            Technology::Converter {
                sizing: Sizing::Invest {
                    minimum: Capacity(0.0),
                    maximum: Capacity(10.0)
                },
                fuel: Fuel::Electricity,
                efficiency: Dimensionless(3.5),
                min_load: Dimensionless(0.2),
                max_load: Dimensionless(1.0),
            }
        );
    }

    #[rstest]
    fn test_fixed_sizing(mut heat_pump_parameters: UnitParameters) {
        heat_pump_parameters.invest_mode = Some(false);
        heat_pump_parameters.cap_n = Some(4.0);
        let Technology::Converter { sizing, .. } =
            heat_pump_parameters.technology(key("hp1")).unwrap()
        else {
            panic!("Expected converter");
        };
        assert_eq!(sizing, Sizing::Fixed(Capacity(4.0)));
    }

    #[rstest]
    fn test_missing_parameter(mut heat_pump_parameters: UnitParameters) {
        heat_pump_parameters.cop = None;
        let result = heat_pump_parameters.technology(key("hp2"));
        assert_error!(
            result,
            "Invalid configuration: Unit hp2 is missing required parameter `cop`"
        );
    }

    #[rstest]
    fn test_boiler_needs_eta(heat_pump_parameters: UnitParameters) {
        // A heat pump's parameter set has no `eta`
        let err = heat_pump_parameters.technology(key("plb1")).unwrap_err();
        assert!(err.downcast_ref::<ConfigurationError>().is_some());
    }

    #[rstest]
    fn test_invalid_cap_range(mut heat_pump_parameters: UnitParameters) {
        heat_pump_parameters.cap_min = Some(20.0);
        assert!(heat_pump_parameters.technology(key("hp1")).is_err());
    }

    #[rstest]
    fn test_invalid_load_range(mut heat_pump_parameters: UnitParameters) {
        heat_pump_parameters.q_min = Some(1.5);
        assert!(heat_pump_parameters.technology(key("hp1")).is_err());
    }

    #[rstest]
    fn test_storage_technology(storage_parameters: UnitParameters) {
        let technology = storage_parameters.technology(key("tes1")).unwrap();
        assert_eq!(
            technology,
            Technology::Storage {
                sizing: Sizing::Invest {
                    minimum: Capacity(0.0),
                    maximum: Capacity(100.0)
                },
                c_in: Dimensionless(0.2),
                c_out: Dimensionless(0.25),
                initial_level: Dimensionless(0.5),
                loss_rate: Dimensionless(0.001),
                balanced: true,
            }
        );
    }

    #[rstest]
    fn test_storage_full_loss(mut storage_parameters: UnitParameters) {
        storage_parameters.loss_rate = Some(1.0);
        assert!(storage_parameters.technology(key("tes1")).is_err());
    }

    #[test]
    fn test_external_source_technology() {
        let params = UnitParameters {
            q_n: Some(2.0),
            fixed_profile: Some(true),
            ..Default::default()
        };
        assert_eq!(
            params.technology(key("exhs1")).unwrap(),
            Technology::ExternalSource {
                nominal: Capacity(2.0),
                fixed_profile: true
            }
        );
    }

    #[rstest]
    fn test_economics(heat_pump_parameters: UnitParameters) {
        let economics = heat_pump_parameters.economics(key("hp1")).unwrap();
        assert_eq!(economics.inv_spez, MoneyPerCapacity(500_000.0));
        assert_eq!(economics.op_cost_fix, MoneyPerCapacity(2_000.0));
        assert_eq!(economics.op_cost_var, MoneyPerEnergy(1.5));
    }

    #[test]
    fn test_deserialise_renamed_fields() {
        let params: UnitParameters =
            toml::from_str("invest_mode = false\ncap_N = 3.0\nQ_min = 0.1\nQ_max = 1.0").unwrap();
        assert_eq!(params.cap_n, Some(3.0));
        assert_eq!(params.q_min, Some(0.1));
        assert_eq!(params.invest_mode, Some(false));
    }

    #[test]
    fn test_deserialise_unknown_field() {
        assert!(toml::from_str::<UnitParameters>("capacity = 3.0").is_err());
    }
}
