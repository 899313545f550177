// src/analytics/mod.rs

//! Pure calculators over normalized records. Nothing here touches storage.

pub mod question_success;
pub mod statistics;

pub use question_success::calculate_question_success;
pub use statistics::calculate_statistics;

/// Rounds to `decimals` places, ties to even.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(73.333, 1), 73.3);
        assert_eq!(round_to(3.456, 2), 3.46);
        assert_eq!(round_to(2.5, 0), 2.0);
        assert_eq!(round_to(f64::NAN, 1), 0.0);
    }
}
