//! General functions related to finance.
use crate::units::{Dimensionless, Energy, Money, MoneyPerCapacity, MoneyPerEnergy};

/// Calculates the annuity (present value) factor for a given interest rate and lifetime.
///
/// This is the factor by which a uniform annual payment has to be multiplied to obtain its present
/// value, i.e. `((1+i)^n - 1) / ((1+i)^n * i)`. Dividing a one-off investment by it gives the
/// equivalent annual cost.
pub fn annuity_factor(interest_rate: Dimensionless, lifetime: u32) -> Dimensionless {
    if lifetime == 0 {
        return Dimensionless(0.0);
    }
    if interest_rate == Dimensionless(0.0) {
        // Limit of the expression as the interest rate approaches zero
        return Dimensionless(lifetime as f64);
    }
    let factor = (Dimensionless(1.0) + interest_rate).powi(lifetime as i32);
    (factor - Dimensionless(1.0)) / (factor * interest_rate)
}

/// Calculates the annualised cost of one unit of capacity.
///
/// This is the investment term the optimisation sees for an invested component.
pub fn annualised_investment_cost(
    specific_investment: MoneyPerCapacity,
    interest_rate: Dimensionless,
    lifetime: u32,
) -> MoneyPerCapacity {
    let factor = annuity_factor(interest_rate, lifetime);
    if factor == Dimensionless(0.0) {
        return MoneyPerCapacity(0.0);
    }
    specific_investment / factor
}

/// Calculates the levelised cost of heat.
///
/// Annual costs net of non-heat revenues are discounted over the economic lifetime with `bwsf` and
/// added to the one-off investment, then divided by the heat delivered over the same lifetime.
///
/// # Arguments
///
/// * `invest_total` - One-off investment for all units
/// * `cost_total` - Annual operating and procurement costs
/// * `revenue_excl_heat` - Annual revenues other than from selling heat
/// * `heat_delivered` - Annual heat delivered
/// * `bwsf` - Annuity factor (see [`annuity_factor`])
pub fn levelised_cost_of_heat(
    invest_total: Money,
    cost_total: Money,
    revenue_excl_heat: Money,
    heat_delivered: Energy,
    bwsf: Dimensionless,
) -> MoneyPerEnergy {
    let discounted = invest_total + bwsf * (cost_total - revenue_excl_heat);
    discounted / (bwsf * heat_delivered)
}
