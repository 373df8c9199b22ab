//! Weight mutation primitive.
//!
//! A mutated weight is drawn uniformly from an amplitude-bounded
//! neighborhood of the range midpoint. Amplitude 0 collapses to the midpoint
//! (pure exploitation); amplitude 1 spans the full original range width on
//! either side of the midpoint (pure exploration). This is the single knob
//! controlling the exploration/exploitation trade-off for every mutated
//! weight in the system.

use crate::error::{Result, TuneError};
use crate::rng::RandomNumberGenerator;

const RANGE_EPSILON: f32 = 0.000_000_1;

/// Draws a mutated weight from `[mean - w, mean + w]` where
/// `mean = (min + max) / 2` and `w = (max - min) * amplitude`.
///
/// # Errors
///
/// Returns a configuration error when `amplitude` is outside `[0, 1]`.
pub fn mutated_weight(
    min: f32,
    max: f32,
    amplitude: f64,
    rng: &mut RandomNumberGenerator,
) -> Result<f32> {
    if !(0.0..=1.0).contains(&amplitude) {
        return Err(TuneError::Configuration(format!(
            "mutation amplitude must be >= 0 and <= 1, got {}",
            amplitude
        )));
    }
    if (max - min).abs() < RANGE_EPSILON {
        return Ok(min);
    }
    let length = max - min;
    let mean = (max + min) / 2.0;
    let half_width = length * amplitude as f32;
    Ok(rng.uniform_f32(mean - half_width, mean + half_width))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_amplitude_returns_midpoint() {
        let mut rng = RandomNumberGenerator::from_seed(3);
        for _ in 0..20 {
            let v = mutated_weight(0.0, 10.0, 0.0, &mut rng).unwrap();
            assert!((v - 5.0).abs() < 1e-6);
        }
    }

    #[test]
    fn collapsed_range_returns_min() {
        let mut rng = RandomNumberGenerator::from_seed(3);
        let v = mutated_weight(4.0, 4.0, 0.7, &mut rng).unwrap();
        assert_eq!(v, 4.0);
    }

    #[test]
    fn values_stay_within_amplitude_neighborhood() {
        let mut rng = RandomNumberGenerator::from_seed(3);
        let (min, max, amplitude) = (2.0_f32, 6.0_f32, 0.25_f64);
        let mean = (min + max) / 2.0;
        let half_width = (max - min) * amplitude as f32;
        for _ in 0..500 {
            let v = mutated_weight(min, max, amplitude, &mut rng).unwrap();
            assert!(v >= mean - half_width && v <= mean + half_width);
        }
    }

    #[test]
    fn amplitude_out_of_range_fails() {
        let mut rng = RandomNumberGenerator::from_seed(3);
        assert!(mutated_weight(0.0, 1.0, -0.1, &mut rng).is_err());
        assert!(mutated_weight(0.0, 1.0, 1.1, &mut rng).is_err());
    }
}
