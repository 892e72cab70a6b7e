//! Small shared helpers.

/// Round a monetary amount to two fractional digits, half away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::round2;

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round2(2.344), 2.34);
        assert_eq!(round2(2.345), 2.35);
        assert_eq!(round2(-1.005), -1.01);
    }

    #[test]
    fn preserves_exact_cents() {
        assert_eq!(round2(405.0), 405.0);
        assert_eq!(round2(45.0), 45.0);
    }
}
