#[cfg(feature = "defmt")]
use defmt::Format;
use libm::{ceil, fabs, floor, sqrt};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::m_value::{blended_coefficients, tolerated_pressure};
use crate::tissue::{Compartment, TissueState};
use crate::{depth_to_pressure, pressure_to_depth, DecoError, NumericDomain};

const ROUNDING_SLACK: f64 = 1e-9;

/// Gradient factors as fractions: `high` applies at the surface, `low` at
/// the first stop.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GradientFactors {
    pub low: f64,
    pub high: f64,
}

impl GradientFactors {
    pub fn new(low: f64, high: f64) -> Self {
        GradientFactors { low, high }
    }

    pub fn validate(&self) -> Result<(), DecoError> {
        let in_range = |gf: f64| gf > 0.0 && gf <= 1.0;
        if in_range(self.low) && in_range(self.high) && self.low <= self.high {
            Ok(())
        } else {
            Err(DecoError::NumericDomainError(NumericDomain::GradientFactor))
        }
    }

    /// Gradient factor in effect at `amb_pressure`. Without an anchor (first
    /// stop not known yet) `low` applies everywhere.
    pub fn at_pressure(&self, amb_pressure: f64, surface_pressure: f64, anchor: Option<f64>) -> f64 {
        match anchor {
            None => self.low,
            Some(anchor) if anchor <= surface_pressure => self.high,
            Some(anchor) => {
                if amb_pressure >= anchor {
                    self.low
                } else if amb_pressure <= surface_pressure {
                    self.high
                } else {
                    let fraction = (amb_pressure - surface_pressure) / (anchor - surface_pressure);
                    self.high + (self.low - self.high) * fraction
                }
            }
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Ceiling {
    /// Metres, never negative.
    pub depth: f64,
    /// Tolerated ambient pressure of the leading compartment, bar.
    pub pressure: f64,
    pub leading_compartment: usize,
}

impl Ceiling {
    pub fn in_obligation(&self) -> bool {
        self.depth > 0.0
    }
}

/// Tolerated ambient pressure for one compartment when the gradient factor
/// itself depends on depth.
fn compartment_tolerance(
    compartment: &Compartment,
    gf: &GradientFactors,
    surface_pressure: f64,
    anchor: Option<f64>,
) -> f64 {
    let (a, b) = blended_coefficients(compartment);
    let p_inert = compartment.total_inert();
    let at_low = tolerated_pressure(p_inert, a, b, gf.low);

    let anchor = match anchor {
        None => return at_low,
        Some(anchor) if anchor <= surface_pressure => {
            return tolerated_pressure(p_inert, a, b, gf.high);
        }
        Some(anchor) => anchor,
    };
    if at_low >= anchor {
        return at_low;
    }

    // Inside the interpolation band gf(p) = g0 + m * p, and the tolerance
    // condition p_inert = p + gf(p) * (a + p * (1/b - 1)) is a quadratic in p.
    let m = (gf.low - gf.high) / (anchor - surface_pressure);
    let g0 = gf.high - m * surface_pressure;
    let c = 1.0 / b - 1.0;
    let qa = m * c;
    let qb = 1.0 + g0 * c + m * a;
    let qc = g0 * a - p_inert;

    if fabs(qa) < 1e-12 {
        if fabs(qb) < 1e-12 {
            return at_low;
        }
        return -qc / qb;
    }
    let discriminant = qb * qb - 4.0 * qa * qc;
    if discriminant < 0.0 {
        return at_low;
    }
    let denominator = qb + sqrt(discriminant);
    if denominator <= 0.0 {
        return at_low;
    }
    // smaller root, written to stay stable as qa -> 0
    -2.0 * qc / denominator
}

/// Shallowest depth the diver may ascend to, and the compartment that sets it.
///
/// `first_stop_depth` anchors `gf_low`; between it and the surface the
/// gradient factor moves linearly to `gf_high`. Pass `None` before the first
/// stop is known to evaluate with `gf_low` throughout.
pub fn ceiling(
    tissues: &TissueState,
    gf_low: f64,
    gf_high: f64,
    first_stop_depth: Option<f64>,
    surface_pressure: f64,
) -> Result<Ceiling, DecoError> {
    let gf = GradientFactors::new(gf_low, gf_high);
    gf.validate()?;
    if !(surface_pressure > 0.0) || !surface_pressure.is_finite() {
        return Err(DecoError::NumericDomainError(NumericDomain::NonPositivePressure));
    }
    let anchor = first_stop_depth.map(|depth| depth_to_pressure(depth.max(0.0), surface_pressure));

    let mut max_pressure = f64::NEG_INFINITY;
    let mut leading_compartment = 0;
    for (i, compartment) in tissues.compartments().iter().enumerate() {
        let tolerated = compartment_tolerance(compartment, &gf, surface_pressure, anchor);
        if tolerated > max_pressure {
            max_pressure = tolerated;
            leading_compartment = i;
        }
    }
    if !max_pressure.is_finite() {
        return Err(DecoError::NumericDomainError(NumericDomain::NonFinite));
    }

    Ok(Ceiling {
        depth: pressure_to_depth(max_pressure, surface_pressure).max(0.0),
        pressure: max_pressure,
        leading_compartment,
    })
}

/// Rounds a depth up to the next multiple of `increment`.
pub fn round_up_to_increment(depth: f64, increment: f64) -> f64 {
    if depth <= 0.0 {
        return 0.0;
    }
    ceil(depth / increment - ROUNDING_SLACK) * increment
}

/// Rounds a depth down to a multiple of `increment`.
pub fn round_down_to_increment(depth: f64, increment: f64) -> f64 {
    if depth <= 0.0 {
        return 0.0;
    }
    floor(depth / increment + ROUNDING_SLACK) * increment
}
