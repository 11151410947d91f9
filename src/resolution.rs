use std::fmt;

use serde::{Deserialize, Serialize};

pub const MIN_RESOLUTION: u8 = 6;
pub const MAX_RESOLUTION: u8 = 10;

/// Discrete grid granularity. Higher levels mean smaller, more numerous
/// cells; only levels 6 through 10 carry aggregated data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ResolutionLevel(u8);

impl ResolutionLevel {
    /// The resolution the map starts at before any zoom event arrives.
    pub const DEFAULT: ResolutionLevel = ResolutionLevel(8);

    pub fn new(level: u8) -> Option<Self> {
        if (MIN_RESOLUTION..=MAX_RESOLUTION).contains(&level) {
            Some(ResolutionLevel(level))
        } else {
            None
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for ResolutionLevel {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        ResolutionLevel::new(level)
            .ok_or_else(|| format!("resolution {level} outside {MIN_RESOLUTION}..={MAX_RESOLUTION}"))
    }
}

impl From<ResolutionLevel> for u8 {
    fn from(level: ResolutionLevel) -> u8 {
        level.0
    }
}

impl fmt::Display for ResolutionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maps viewport zoom to a grid resolution. Thresholds are evaluated
/// high to low, first match wins, so the mapping is monotone in zoom.
pub fn resolution_for_zoom(zoom: f64) -> ResolutionLevel {
    if zoom >= 12.5 {
        ResolutionLevel(10)
    } else if zoom >= 11.5 {
        ResolutionLevel(9)
    } else if zoom >= 10.0 {
        ResolutionLevel(8)
    } else if zoom >= 9.0 {
        ResolutionLevel(7)
    } else {
        ResolutionLevel(6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_table() {
        assert_eq!(resolution_for_zoom(14.0).get(), 10);
        assert_eq!(resolution_for_zoom(12.5).get(), 10);
        assert_eq!(resolution_for_zoom(12.49).get(), 9);
        assert_eq!(resolution_for_zoom(11.5).get(), 9);
        assert_eq!(resolution_for_zoom(11.49).get(), 8);
        assert_eq!(resolution_for_zoom(10.0).get(), 8);
        assert_eq!(resolution_for_zoom(9.99).get(), 7);
        assert_eq!(resolution_for_zoom(9.0).get(), 7);
        assert_eq!(resolution_for_zoom(8.99).get(), 6);
        assert_eq!(resolution_for_zoom(0.0).get(), 6);
        assert_eq!(resolution_for_zoom(-3.0).get(), 6);
    }

    #[test]
    fn test_monotone_in_zoom() {
        let mut previous = resolution_for_zoom(0.0);
        let mut zoom = 0.0;
        while zoom <= 16.0 {
            let current = resolution_for_zoom(zoom);
            assert!(
                current >= previous,
                "resolution decreased at zoom {zoom}: {previous} -> {current}"
            );
            previous = current;
            zoom += 0.01;
        }
    }

    #[test]
    fn test_level_bounds() {
        assert!(ResolutionLevel::new(5).is_none());
        assert!(ResolutionLevel::new(11).is_none());
        assert_eq!(ResolutionLevel::new(6).unwrap().get(), 6);
        assert_eq!(ResolutionLevel::new(10).unwrap().get(), 10);
        assert_eq!(ResolutionLevel::DEFAULT.get(), 8);
    }
}
