#[cfg(feature = "defmt")]
use defmt::Format;
use libm::{ceil, pow};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::depth_to_pressure;
use crate::plan::Segment;

/// NOAA single exposure limits: ppO2 (bar) -> minutes.
const CNS_LIMITS: [(f64, f64); 11] = [
    (0.6, 720.0),
    (0.7, 570.0),
    (0.8, 450.0),
    (0.9, 360.0),
    (1.0, 300.0),
    (1.1, 240.0),
    (1.2, 210.0),
    (1.3, 180.0),
    (1.4, 150.0),
    (1.5, 120.0),
    (1.6, 45.0),
];

const TOXIC_PPO2: f64 = 0.5;
const MIN_CNS_LIMIT: f64 = 1.0;
const SLICE_SECONDS: f64 = 60.0;

/// Minutes allowed at `ppo2` before reaching 100% CNS, or `None` when the
/// partial pressure is not toxic.
pub fn cns_limit_minutes(ppo2: f64) -> Option<f64> {
    if ppo2 <= TOXIC_PPO2 {
        return None;
    }
    let (first_ppo2, first_limit) = CNS_LIMITS[0];
    if ppo2 <= first_ppo2 {
        return Some(first_limit);
    }
    for pair in CNS_LIMITS.windows(2) {
        let (low_ppo2, low_limit) = pair[0];
        let (high_ppo2, high_limit) = pair[1];
        if ppo2 <= high_ppo2 {
            let fraction = (ppo2 - low_ppo2) / (high_ppo2 - low_ppo2);
            return Some(low_limit + (high_limit - low_limit) * fraction);
        }
    }
    // beyond the table: keep the last slope
    let (p1, l1) = CNS_LIMITS[CNS_LIMITS.len() - 2];
    let (p2, l2) = CNS_LIMITS[CNS_LIMITS.len() - 1];
    let slope = (l2 - l1) / (p2 - p1);
    Some((l2 + slope * (ppo2 - p2)).max(MIN_CNS_LIMIT))
}

/// CNS percent accumulated per minute at `ppo2`.
pub fn cns_per_minute(ppo2: f64) -> f64 {
    cns_limit_minutes(ppo2).map_or(0.0, |limit| 100.0 / limit)
}

/// Oxygen tolerance units accumulated per minute at `ppo2`.
pub fn otu_per_minute(ppo2: f64) -> f64 {
    if ppo2 <= TOXIC_PPO2 {
        return 0.0;
    }
    pow((ppo2 - TOXIC_PPO2) / TOXIC_PPO2, 0.83)
}

#[derive(Debug, Default, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Exposure {
    pub cns: f64,
    pub otu: f64,
}

/// Running CNS% and OTU totals over a segment stream.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ExposureTracker {
    surface_pressure: f64,
    cns: f64,
    otu: f64,
    max_cns: f64,
}

impl ExposureTracker {
    pub fn new(surface_pressure: f64) -> Self {
        ExposureTracker {
            surface_pressure,
            cns: 0.0,
            otu: 0.0,
            max_cns: 0.0,
        }
    }

    /// Adds one segment and returns the totals after it. Travel segments are
    /// integrated in slices of at most a minute at the slice mid depth.
    pub fn record(&mut self, segment: &Segment) -> Exposure {
        if segment.duration > 0 {
            let seconds = segment.duration as f64;
            let slices = ceil(seconds / SLICE_SECONDS).max(1.0) as u32;
            let slice_minutes = seconds / slices as f64 / 60.0;
            for i in 0..slices {
                let fraction = (i as f64 + 0.5) / slices as f64;
                let depth = segment.start_depth + (segment.end_depth - segment.start_depth) * fraction;
                let ppo2 = segment.gas.ppo2(depth_to_pressure(depth, self.surface_pressure));
                self.cns += cns_per_minute(ppo2) * slice_minutes;
                self.otu += otu_per_minute(ppo2) * slice_minutes;
            }
            self.max_cns = self.max_cns.max(self.cns);
        }
        self.current()
    }

    pub fn current(&self) -> Exposure {
        Exposure {
            cns: self.cns,
            otu: self.otu,
        }
    }

    pub fn cns(&self) -> f64 {
        self.cns
    }

    pub fn otu(&self) -> f64 {
        self.otu
    }

    pub fn max_cns(&self) -> f64 {
        self.max_cns
    }
}
