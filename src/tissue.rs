use core::f64::consts::LN_2;

#[cfg(feature = "defmt")]
use defmt::Format;
use libm::exp;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::gas::GasMix;
use crate::zhl16::{CoefficientTable, CompartmentCoefficients, COMPARTMENTS};
use crate::{check_finite, DecoError, NumericDomain, FN2_AIR, WATER_VAPOR_PRESSURE};

#[derive(Debug, Default, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Compartment {
    pub coefficients: CompartmentCoefficients,
    pub pressure_n2: f64,
    pub pressure_he: f64,
}

// pt(t) = palv0 + R(t - 1/k) - [palv0 - pt0 - R/k] * e^(-kt)
// pt(t) -> partial pressure of the gas in the tissue at time t
// pt0 -> initial partial pressure of the gas in the tissue at t=0
// palv0 -> initial alveolar partial pressure of the gas in the mix at t=0
// k -> tissue time constant, ln2 / half time
// R -> rate of change of the inert gas partial pressure in the alveoli (bar/min)
//      R = Q * Ramb in which Q is the fraction of the inert gas and Ramb is the
//      rate of change of the ambient pressure
// t -> time in minutes
fn schreiner(pt0: f64, palv0: f64, rate: f64, minutes: f64, half_time: f64) -> f64 {
    let k = LN_2 / half_time;
    palv0 + rate * (minutes - 1.0 / k) - (palv0 - pt0 - rate / k) * exp(-k * minutes)
}

impl Compartment {
    pub fn new(coefficients: CompartmentCoefficients) -> Self {
        Compartment {
            coefficients,
            pressure_n2: 0.0,
            pressure_he: 0.0,
        }
    }

    pub fn total_inert(&self) -> f64 {
        self.pressure_n2 + self.pressure_he
    }

    /// Inert gas load relative to breathing air at `amb_pressure`, percent.
    pub fn saturation_percent(&self, amb_pressure: f64) -> f64 {
        let equilibrium = (amb_pressure - WATER_VAPOR_PRESSURE) * FN2_AIR;
        if equilibrium <= 0.0 {
            return 0.0;
        }
        self.total_inert() / equilibrium * 100.0
    }

    /// Loads or unloads both inert gas channels over a linear ambient
    /// pressure ramp from `amb_start` to `amb_end` lasting `minutes`.
    pub fn advance(
        &mut self,
        amb_start: f64,
        amb_end: f64,
        minutes: f64,
        gas: &GasMix,
    ) -> Result<(), DecoError> {
        check_finite(amb_start)?;
        check_finite(amb_end)?;
        check_finite(minutes)?;
        if amb_start <= 0.0 || amb_end <= 0.0 {
            return Err(DecoError::NumericDomainError(NumericDomain::NonPositivePressure));
        }
        if minutes < 0.0 {
            return Err(DecoError::NumericDomainError(NumericDomain::NegativeDuration));
        }
        if minutes == 0.0 {
            return Ok(());
        }

        let (palv_n2, palv_he) = gas.inspired_pressures(amb_start);
        let amb_rate = (amb_end - amb_start) / minutes;
        let rate_n2 = gas.fn2() * amb_rate;
        let rate_he = gas.fhe() * amb_rate;

        let c = &self.coefficients;
        let n2 = schreiner(self.pressure_n2, palv_n2, rate_n2, minutes, c.half_time_n2);
        let he = schreiner(self.pressure_he, palv_he, rate_he, minutes, c.half_time_he);

        self.pressure_n2 = check_finite(n2)?.max(0.0);
        self.pressure_he = check_finite(he)?.max(0.0);
        Ok(())
    }
}

/// Inert gas loading of every compartment of a coefficient table, in table
/// order.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TissueState {
    compartments: [Compartment; COMPARTMENTS],
}

impl TissueState {
    /// Tissues saturated with air at `surface_pressure`.
    pub fn equilibrated(table: &CoefficientTable, surface_pressure: f64) -> Self {
        let load_n2 = (surface_pressure - WATER_VAPOR_PRESSURE).max(0.0) * FN2_AIR;
        let mut compartments = [Compartment::default(); COMPARTMENTS];
        for (compartment, row) in compartments.iter_mut().zip(table.rows()) {
            *compartment = Compartment {
                coefficients: *row,
                pressure_n2: load_n2,
                pressure_he: 0.0,
            };
        }
        TissueState { compartments }
    }

    pub fn from_compartments(compartments: [Compartment; COMPARTMENTS]) -> Self {
        TissueState { compartments }
    }

    pub fn compartments(&self) -> &[Compartment; COMPARTMENTS] {
        &self.compartments
    }

    pub fn compartment(&self, index: usize) -> &Compartment {
        &self.compartments[index]
    }

    pub fn advance(
        &mut self,
        amb_start: f64,
        amb_end: f64,
        minutes: f64,
        gas: &GasMix,
    ) -> Result<(), DecoError> {
        for compartment in self.compartments.iter_mut() {
            compartment.advance(amb_start, amb_end, minutes, gas)?;
        }
        Ok(())
    }

    /// Index of the compartment holding the most inert gas; first wins ties.
    pub fn most_loaded(&self) -> usize {
        let mut index = 0;
        for (i, compartment) in self.compartments.iter().enumerate() {
            if compartment.total_inert() > self.compartments[index].total_inert() {
                index = i;
            }
        }
        index
    }
}
