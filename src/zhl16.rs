#[cfg(feature = "defmt")]
use defmt::Format;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{DecoError, NumericDomain};

pub const COMPARTMENTS: usize = 16;

const N2_HALF_LIFE: [f64; COMPARTMENTS] = [
    5.0, 8.0, 12.5, 18.5, 27.0, 38.3, 54.3, 77.0, 109.0, 146.0, 187.0, 239.0, 305.0, 390.0, 498.0,
    635.0,
];

const HE_HALF_LIFE: [f64; COMPARTMENTS] = [
    1.88, 3.02, 4.72, 6.99, 10.21, 14.48, 20.53, 29.11, 41.20, 55.19, 70.69, 90.34, 115.29, 147.42,
    188.24, 240.03,
];

const N2_A_C: [f64; COMPARTMENTS] = [
    1.1696, 1.0000, 0.8618, 0.7562, 0.6200, 0.5043, 0.4410, 0.4000, 0.3750, 0.3500, 0.3295, 0.3065,
    0.2835, 0.2610, 0.2480, 0.2327,
];

// ZHL-16B differs from C only in the N2 `a` of the middle compartments.
const N2_A_B: [f64; COMPARTMENTS] = [
    1.1696, 1.0000, 0.8618, 0.7562, 0.6667, 0.5600, 0.4947, 0.4500, 0.4187, 0.3798, 0.3497, 0.3223,
    0.2850, 0.2737, 0.2523, 0.2327,
];

const N2_B: [f64; COMPARTMENTS] = [
    0.5578, 0.6514, 0.7222, 0.7825, 0.8126, 0.8434, 0.8693, 0.8910, 0.9092, 0.9222, 0.9319, 0.9403,
    0.9477, 0.9544, 0.9602, 0.9653,
];

const HE_A: [f64; COMPARTMENTS] = [
    1.6189, 1.3830, 1.1919, 1.0458, 0.9220, 0.8205, 0.7305, 0.6502, 0.5950, 0.5545, 0.5333, 0.5189,
    0.5181, 0.5176, 0.5172, 0.5119,
];

const HE_B: [f64; COMPARTMENTS] = [
    0.4770, 0.5747, 0.6527, 0.7223, 0.7582, 0.7957, 0.8279, 0.8553, 0.8757, 0.8903, 0.8997, 0.9073,
    0.9122, 0.9171, 0.9217, 0.9267,
];

/// Half-times (minutes) and Bühlmann `a`/`b` coefficients of one compartment.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CompartmentCoefficients {
    pub half_time_n2: f64,
    pub half_time_he: f64,
    pub a_n2: f64,
    pub b_n2: f64,
    pub a_he: f64,
    pub b_he: f64,
}

impl CompartmentCoefficients {
    fn is_valid(&self) -> bool {
        let half_times = [self.half_time_n2, self.half_time_he];
        let a = [self.a_n2, self.a_he];
        let b = [self.b_n2, self.b_he];
        half_times.iter().all(|t| t.is_finite() && *t > 0.0)
            && a.iter().all(|a| a.is_finite() && *a >= 0.0)
            && b.iter().all(|b| b.is_finite() && *b > 0.0 && *b <= 1.0)
    }
}

/// Ordered compartment parameter set. The index of a row is the identity of
/// the compartment it describes.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "TableRows"))]
pub struct CoefficientTable {
    rows: [CompartmentCoefficients; COMPARTMENTS],
}

impl CoefficientTable {
    pub fn zhl16c() -> Self {
        Self::build(&N2_A_C)
    }

    pub fn zhl16b() -> Self {
        Self::build(&N2_A_B)
    }

    fn build(a_n2: &[f64; COMPARTMENTS]) -> Self {
        let mut rows = [CompartmentCoefficients::default(); COMPARTMENTS];
        for (i, row) in rows.iter_mut().enumerate() {
            *row = CompartmentCoefficients {
                half_time_n2: N2_HALF_LIFE[i],
                half_time_he: HE_HALF_LIFE[i],
                a_n2: a_n2[i],
                b_n2: N2_B[i],
                a_he: HE_A[i],
                b_he: HE_B[i],
            };
        }
        CoefficientTable { rows }
    }

    /// Builds a table from caller supplied rows. A malformed row is a
    /// configuration defect and rejects the whole table.
    pub fn from_rows(rows: [CompartmentCoefficients; COMPARTMENTS]) -> Result<Self, DecoError> {
        let table = CoefficientTable { rows };
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> Result<(), DecoError> {
        if self.rows.iter().all(CompartmentCoefficients::is_valid) {
            Ok(())
        } else {
            Err(DecoError::NumericDomainError(NumericDomain::InvalidCoefficient))
        }
    }

    pub fn rows(&self) -> &[CompartmentCoefficients; COMPARTMENTS] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> &CompartmentCoefficients {
        &self.rows[index]
    }
}

#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct TableRows {
    rows: [CompartmentCoefficients; COMPARTMENTS],
}

#[cfg(feature = "serde")]
impl TryFrom<TableRows> for CoefficientTable {
    type Error = DecoError;

    fn try_from(table: TableRows) -> Result<Self, Self::Error> {
        CoefficientTable::from_rows(table.rows)
    }
}

impl Default for CoefficientTable {
    fn default() -> Self {
        Self::zhl16c()
    }
}
