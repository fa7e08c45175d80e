use std::time::Instant;

/// Milliseconds elapsed since `start`.
pub fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Rounds a runtime to two decimal places for reporting.
pub fn round_ms(ms: f64) -> f64 {
    (ms * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_round_ms() {
        assert_relative_eq!(round_ms(1.23456), 1.23);
        assert_relative_eq!(round_ms(0.005), 0.01);
        assert_relative_eq!(round_ms(0.0), 0.0);
    }

    #[test]
    fn test_elapsed_is_non_negative() {
        assert!(elapsed_ms(Instant::now()) >= 0.0);
    }
}
