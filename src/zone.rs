//! Heart-rate effort zones.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Effort band derived from an instantaneous heart rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Zone {
    Low,
    Moderate,
    High,
    Maximum,
}

/// Lower bounds (inclusive) of each zone above `Low`, with the ideal tempo.
const ZONE_TABLE: [(f64, Zone, u32); 4] = [
    (f64::NEG_INFINITY, Zone::Low, 100),
    (140.0, Zone::Moderate, 130),
    (160.0, Zone::High, 150),
    (180.0, Zone::Maximum, 170),
];

impl Zone {
    /// Ideal track tempo for this zone, in BPM.
    #[must_use]
    pub const fn ideal_tempo(self) -> u32 {
        match self {
            Zone::Low => 100,
            Zone::Moderate => 130,
            Zone::High => 150,
            Zone::Maximum => 170,
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Zone::Low => "low",
            Zone::Moderate => "moderate",
            Zone::High => "high",
            Zone::Maximum => "maximum",
        };
        f.write_str(name)
    }
}

/// Map a heart rate to its zone and ideal tempo.
///
/// Total over every input. Nothing is validated here: negative values land in
/// `Low`, absurdly high ones in `Maximum`, and NaN (which compares below no
/// threshold) in `Low`.
#[must_use]
pub fn classify(heart_rate: f64) -> (Zone, u32) {
    let (_, zone, ideal) = ZONE_TABLE
        .iter()
        .rev()
        .find(|(lower, _, _)| heart_rate >= *lower)
        .copied()
        .unwrap_or(ZONE_TABLE[0]);
    log::trace!("Classified {heart_rate} bpm as {zone} (ideal tempo {ideal})");
    (zone, ideal)
}

/// Like [`classify`], but for the "no heart rate yet" case a runner at rest
/// is assumed.
#[must_use]
pub fn classify_or_resting(heart_rate: Option<f64>) -> (Zone, u32) {
    match heart_rate {
        Some(hr) => classify(hr),
        None => (Zone::Low, Zone::Low.ideal_tempo()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_boundaries() {
        assert_eq!(classify(139.0), (Zone::Low, 100));
        assert_eq!(classify(140.0), (Zone::Moderate, 130));
        assert_eq!(classify(159.0), (Zone::Moderate, 130));
        assert_eq!(classify(160.0), (Zone::High, 150));
        assert_eq!(classify(179.0), (Zone::High, 150));
        assert_eq!(classify(180.0), (Zone::Maximum, 170));
    }

    #[test]
    fn test_fractional_values_between_boundaries() {
        assert_eq!(classify(139.9).0, Zone::Low);
        assert_eq!(classify(159.5).0, Zone::Moderate);
    }

    #[test]
    fn test_extremes_are_classified() {
        assert_eq!(classify(-20.0).0, Zone::Low);
        assert_eq!(classify(0.0).0, Zone::Low);
        assert_eq!(classify(400.0).0, Zone::Maximum);
        assert_eq!(classify(f64::INFINITY).0, Zone::Maximum);
        assert_eq!(classify(f64::NEG_INFINITY).0, Zone::Low);
        assert_eq!(classify(f64::NAN).0, Zone::Low);
    }

    #[test]
    fn test_table_matches_ideal_tempo() {
        for (_, zone, ideal) in ZONE_TABLE {
            assert_eq!(zone.ideal_tempo(), ideal);
        }
    }

    #[test]
    fn test_resting_default() {
        assert_eq!(classify_or_resting(None), (Zone::Low, 100));
        assert_eq!(classify_or_resting(Some(165.0)), (Zone::High, 150));
    }
}
