//! Hourly input time series sharing one time index.
use crate::catalog::{UnitCatalog, UnitCategory};
use crate::error::{config_bail, config_ensure};
use crate::units::{Energy, EmissionsPerEnergy, MoneyPerEmissions, MoneyPerEnergy};
use anyhow::Result;
use chrono::{NaiveDateTime, TimeDelta};
use itertools::Itertools;

/// The time series of one run, all indexed by the same hourly timestamps
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlignedTimeSeries {
    /// Start of each hour
    pub timestamps: Vec<NaiveDateTime>,
    /// Heat demand of the network (MWh per hour)
    pub heat_demand: Vec<Energy>,
    /// Gas procurement price
    pub gas_price: Vec<MoneyPerEnergy>,
    /// Day-ahead electricity spot price
    pub el_spot_price: Vec<MoneyPerEnergy>,
    /// Emission factor of grid electricity
    pub ef_om: Vec<EmissionsPerEnergy>,
    /// Price of CO₂ certificates
    pub co2_price: Vec<MoneyPerEmissions>,
    /// Solar irradiation converted to heat, in MWh per m² of collector area
    pub solar_heat_flow: Option<Vec<f64>>,
    /// Available output of external heat sources as a fraction of their nominal size
    pub ext_heat_profile: Option<Vec<f64>>,
}

impl AlignedTimeSeries {
    /// The number of hours covered
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether no hours are covered
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Check the series against each other and against the units which will consume them
    pub fn validate(&self, units: &UnitCatalog) -> Result<()> {
        config_ensure!(!self.is_empty(), "Time series cannot be empty");
        check_hourly(&self.timestamps)?;

        let len = self.len();
        check_len("heat_demand", self.heat_demand.len(), len)?;
        check_len("gas_price", self.gas_price.len(), len)?;
        check_len("el_spot_price", self.el_spot_price.len(), len)?;
        check_len("ef_om", self.ef_om.len(), len)?;
        check_len("co2_price", self.co2_price.len(), len)?;
        if let Some(series) = &self.solar_heat_flow {
            check_len("solar_heat_flow", series.len(), len)?;
        }
        if let Some(series) = &self.ext_heat_profile {
            check_len("ext_heat_profile", series.len(), len)?;
        }

        config_ensure!(
            self.heat_demand.iter().all(|q| q.is_finite() && q.value() >= 0.0),
            "heat_demand must contain finite values not less than zero"
        );
        if units.contains_category(UnitCategory::SolarThermal) {
            config_ensure!(
                self.solar_heat_flow.is_some(),
                "The solar_heat_flow time series is required when a solar thermal unit is selected"
            );
        }

        Ok(())
    }

    /// The external heat profile value for the given hour, defaulting to full availability
    pub fn ext_heat_availability(&self, hour: usize) -> f64 {
        self.ext_heat_profile
            .as_ref()
            .map_or(1.0, |profile| profile[hour])
    }
}

/// Check that a series has the same number of entries as the time index
fn check_len(name: &str, actual: usize, expected: usize) -> Result<()> {
    config_ensure!(
        actual == expected,
        "Time series {name} has {actual} entries, but the time index has {expected}"
    );

    Ok(())
}

/// Check that the timestamps advance in steps of exactly one hour
fn check_hourly(timestamps: &[NaiveDateTime]) -> Result<()> {
    for (prev, next) in timestamps.iter().tuple_windows() {
        if *next - *prev != TimeDelta::hours(1) {
            config_bail!("Timestamps must be hourly, but {prev} is followed by {next}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, catalog_with_solar, time_series};
    use rstest::rstest;

    #[rstest]
    fn test_validate_ok(time_series: AlignedTimeSeries) {
        assert!(time_series.validate(&UnitCatalog::default()).is_ok());
    }

    #[rstest]
    fn test_validate_length_mismatch(mut time_series: AlignedTimeSeries) {
        time_series.gas_price.pop();
        assert_error!(
            time_series.validate(&UnitCatalog::default()),
            "Invalid configuration: Time series gas_price has 2 entries, but the time index has 3"
        );
    }

    #[rstest]
    fn test_validate_not_hourly(mut time_series: AlignedTimeSeries) {
        time_series.timestamps[2] = time_series.timestamps[1];
        assert!(time_series.validate(&UnitCatalog::default()).is_err());
    }

    #[rstest]
    fn test_validate_missing_solar(
        mut time_series: AlignedTimeSeries,
        catalog_with_solar: UnitCatalog,
    ) {
        time_series.solar_heat_flow = None;
        assert_error!(
            time_series.validate(&catalog_with_solar),
            "Invalid configuration: The solar_heat_flow time series is required when a solar \
             thermal unit is selected"
        );
    }

    #[rstest]
    fn test_ext_heat_availability(mut time_series: AlignedTimeSeries) {
        time_series.ext_heat_profile = None;
        assert_eq!(time_series.ext_heat_availability(1), 1.0);
        time_series.ext_heat_profile = Some(vec![0.2, 0.4, 0.6]);
        assert_eq!(time_series.ext_heat_availability(1), 0.4);
    }
}
