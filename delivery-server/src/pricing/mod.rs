//! Delivery fare calculation.

use shared::util::round2;

use crate::config::PricingConfig;

/// Distance-based delivery fare with a floor.
///
/// `cost = max(min_fare, base_fare + per_km * distance)`, negative distances
/// priced as zero.
#[derive(Debug, Clone, Copy)]
pub struct DeliveryPricing {
    base_fare: f64,
    per_km: f64,
    min_fare: f64,
}

impl DeliveryPricing {
    pub fn new(cfg: PricingConfig) -> Self {
        Self {
            base_fare: cfg.base_fare,
            per_km: cfg.per_km,
            min_fare: cfg.min_fare,
        }
    }

    /// Fare for a delivery over `distance_km`, rounded to two digits.
    pub fn cost(&self, distance_km: f64) -> f64 {
        let distance_km = distance_km.max(0.0);
        let cost = self.base_fare + distance_km * self.per_km;
        round2(cost.max(self.min_fare))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pricing() -> DeliveryPricing {
        DeliveryPricing::new(PricingConfig {
            base_fare: 100.0,
            per_km: 20.0,
            min_fare: 150.0,
        })
    }

    #[test]
    fn applies_minimum_fare() {
        // base 100 + 1 km * 20 = 120, below the 150 floor
        assert_eq!(pricing().cost(1.0), 150.0);
    }

    #[test]
    fn charges_per_kilometer_above_minimum() {
        assert_eq!(pricing().cost(5.0), 200.0);
        assert_eq!(pricing().cost(10.0), 300.0);
    }

    #[test]
    fn negative_distance_priced_as_zero() {
        assert_eq!(pricing().cost(-3.0), pricing().cost(0.0));
    }

    #[test]
    fn zero_distance_is_floored() {
        assert_eq!(pricing().cost(0.0), 150.0);
    }
}
