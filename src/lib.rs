#![cfg_attr(not(feature = "std"), no_std)]

//! Dive plan core: Bühlmann ZHL-16 tissue simulation with gradient factors,
//! decompression stop scheduling, oxygen toxicity and gas consumption
//! tracking for a diving logbook planner.

extern crate alloc;

#[cfg(feature = "defmt")]
use defmt::Format;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

macro_rules! deco_log {
    ($($arg:tt)+) => {{
        #[cfg(feature = "tracing")]
        tracing::debug!($($arg)+);
        #[cfg(feature = "defmt")]
        defmt::debug!($($arg)+);
    }};
}

pub mod ceiling;
pub mod consumption;
pub mod exposure;
pub mod gas;
pub mod generation;
pub mod m_value;
pub mod ndl;
pub mod plan;
pub mod planner;
pub mod simulate;
pub mod tissue;
pub mod zhl16;

pub use ceiling::{ceiling, Ceiling, GradientFactors};
pub use gas::{best_mix, Cylinder, GasMix, GasSwitchPolicy, LowestNarcoticDepth, MAX_CYLINDERS};
pub use plan::{Diagnostic, Plan, PlannerState, Segment, SegmentKind, Waypoint};
pub use planner::DivePlanner;
pub use tissue::{Compartment, TissueState};
pub use zhl16::{CoefficientTable, CompartmentCoefficients};

/// Lung water vapour pressure at 37 deg celsius, in bar (47 mmHg).
pub const WATER_VAPOR_PRESSURE: f64 = 0.0627;
/// Standard sea level pressure in bar.
pub const SURFACE_PRESSURE: f64 = 1.01325;
/// Metres of sea water per bar of pressure.
pub const METERS_PER_BAR: f64 = 10.0;
pub const FO2_AIR: f64 = 0.21;
pub const FN2_AIR: f64 = 0.79;

/// Absolute ambient pressure at `depth` metres.
pub fn depth_to_pressure(depth: f64, surface_pressure: f64) -> f64 {
    surface_pressure + depth / METERS_PER_BAR
}

/// Depth in metres for an absolute pressure; negative above the surface.
pub fn pressure_to_depth(pressure: f64, surface_pressure: f64) -> f64 {
    (pressure - surface_pressure) * METERS_PER_BAR
}

#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default, rename_all = "camelCase"))]
pub struct DiveParameters {
    pub gf_low: u8,                         // percent, 1..=100
    pub gf_high: u8,                        // percent, 1..=100
    pub stop_increment: f64,                // m
    pub last_stop_depth: f64,               // m
    pub ascent_rate: f64,                   // m/min
    pub descent_rate: f64,                  // m/min
    pub ppo2_max: f64,                      // bar
    pub safety_stop_enabled: bool,
    pub safety_stop_depth: f64,             // m
    pub safety_stop_duration: u32,          // s
    pub stop_time_step: u32,                // s
    pub surface_pressure: f64,              // bar
    pub bottom_sac: f64,                    // litres per minute
    pub deco_sac: f64,                      // litres per minute
    pub narcotic_limit_depth: f64,          // m
}

impl DiveParameters {
    pub fn new(gf_low: u8, gf_high: u8) -> Self {
        DiveParameters {
            gf_low,
            gf_high,
            ..Default::default()
        }
    }

    pub fn with_gradient_factors(mut self, gf_low: u8, gf_high: u8) -> Self {
        self.gf_low = gf_low;
        self.gf_high = gf_high;
        self
    }

    pub fn with_stops(mut self, stop_increment: f64, last_stop_depth: f64) -> Self {
        self.stop_increment = stop_increment;
        self.last_stop_depth = last_stop_depth;
        self
    }

    pub fn with_rates(mut self, descent_rate: f64, ascent_rate: f64) -> Self {
        self.descent_rate = descent_rate;
        self.ascent_rate = ascent_rate;
        self
    }

    pub fn with_ppo2_max(mut self, ppo2_max: f64) -> Self {
        self.ppo2_max = ppo2_max;
        self
    }

    pub fn with_safety_stop(mut self, enabled: bool) -> Self {
        self.safety_stop_enabled = enabled;
        self
    }

    pub fn with_surface_pressure(mut self, surface_pressure: f64) -> Self {
        self.surface_pressure = surface_pressure;
        self
    }

    pub fn with_sac(mut self, bottom_sac: f64, deco_sac: f64) -> Self {
        self.bottom_sac = bottom_sac;
        self.deco_sac = deco_sac;
        self
    }

    /// Gradient factors as fractions.
    pub fn gradient_factors(&self) -> GradientFactors {
        GradientFactors::new(self.gf_low as f64 / 100.0, self.gf_high as f64 / 100.0)
    }

    pub fn validate(&self) -> Result<(), DecoError> {
        let gf_ok = (1..=100).contains(&self.gf_low)
            && (1..=100).contains(&self.gf_high)
            && self.gf_low <= self.gf_high;
        if !gf_ok {
            return Err(DecoError::NumericDomainError(NumericDomain::GradientFactor));
        }
        let positive = [
            self.stop_increment,
            self.ascent_rate,
            self.descent_rate,
            self.ppo2_max,
            self.surface_pressure,
        ];
        if positive.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(DecoError::NumericDomainError(NumericDomain::Parameter));
        }
        let non_negative = [
            self.last_stop_depth,
            self.safety_stop_depth,
            self.bottom_sac,
            self.deco_sac,
            self.narcotic_limit_depth,
        ];
        if non_negative.iter().any(|v| !v.is_finite() || *v < 0.0) || self.stop_time_step == 0 {
            return Err(DecoError::NumericDomainError(NumericDomain::Parameter));
        }
        Ok(())
    }

    /// Loads a configuration from JSON; absent keys keep their defaults.
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let params: DiveParameters = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }
}

impl Default for DiveParameters {
    fn default() -> Self {
        DiveParameters {
            gf_low: 30,
            gf_high: 85,
            stop_increment: 3.0,
            last_stop_depth: 3.0,
            ascent_rate: 9.0,
            descent_rate: 18.0,
            ppo2_max: 1.4,
            safety_stop_enabled: true,
            safety_stop_depth: 5.0,
            safety_stop_duration: 180,
            stop_time_step: 60,
            surface_pressure: SURFACE_PRESSURE,
            bottom_sac: 20.0,
            deco_sac: 17.0,
            narcotic_limit_depth: 30.0,
        }
    }
}

/// Why a value fell outside the domain the model is defined on.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum NumericDomain {
    NegativeDuration,
    NonPositivePressure,
    NonFinite,
    InvalidCoefficient,
    GradientFactor,
    Parameter,
    AscentDidNotConverge,
}

#[derive(Debug, Copy, Clone, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum DecoError {
    #[error("invalid gas mix: {o2} permille O2 and {he} permille He")]
    InvalidGasKind { o2: i32, he: i32 },
    #[error("waypoint {waypoint} is not time-ordered")]
    NonMonotonicWaypoints { waypoint: usize },
    #[error("cylinder {cylinder} cannot be breathed at {depth} m and no substitute is available")]
    GasUnavailableAtDepth { cylinder: usize, depth: f64 },
    #[error("cylinder {cylinder} runs into its reserve")]
    InsufficientGasSupply { cylinder: usize },
    #[error("too many gas mixes: {count} (at most {max})")]
    TooManyGasMixes { count: usize, max: usize },
    #[error("numeric domain error: {0:?}")]
    NumericDomainError(NumericDomain),
    #[error("can't find gas {cylinder}/{available}")]
    UnknownCylinder { cylinder: usize, available: usize },
    #[error("planning request superseded by a newer generation")]
    Superseded,
}

#[cfg(feature = "serde")]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] DecoError),
}

pub(crate) fn check_finite(value: f64) -> Result<f64, DecoError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DecoError::NumericDomainError(NumericDomain::NonFinite))
    }
}
