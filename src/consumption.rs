use alloc::vec::Vec;

use crate::gas::Cylinder;
use crate::plan::{Diagnostic, Segment, SegmentKind};
use crate::{depth_to_pressure, DiveParameters};

/// Surface equivalent gas use per cylinder, checked against the usable
/// volume above each cylinder's reserve.
#[derive(Debug, Clone, PartialEq)]
pub struct GasConsumptionEstimator {
    surface_pressure: f64,
    bottom_sac: f64,
    deco_sac: f64,
    usable: Vec<f64>,
    used: Vec<f64>,
    flagged: Vec<bool>,
}

impl GasConsumptionEstimator {
    pub fn new(params: &DiveParameters, cylinders: &[Cylinder]) -> Self {
        GasConsumptionEstimator {
            surface_pressure: params.surface_pressure,
            bottom_sac: params.bottom_sac,
            deco_sac: params.deco_sac,
            usable: cylinders.iter().map(Cylinder::usable_volume).collect(),
            used: alloc::vec![0.0; cylinders.len()],
            flagged: alloc::vec![false; cylinders.len()],
        }
    }

    /// SAC in litres per minute for the phase of the dive `kind` belongs to.
    pub fn sac_rate(&self, kind: SegmentKind) -> f64 {
        match kind {
            SegmentKind::Descent | SegmentKind::Travel => self.bottom_sac,
            SegmentKind::Ascent | SegmentKind::DecoStop | SegmentKind::SafetyStop => self.deco_sac,
        }
    }

    /// Litres breathed over `segment`, at the segment's mean ambient pressure.
    pub fn consumption(&self, segment: &Segment) -> f64 {
        let ambient = depth_to_pressure(segment.mean_depth(), self.surface_pressure);
        self.sac_rate(segment.kind) * ambient * segment.minutes()
    }

    /// Books `segment` against its cylinder. Returns a diagnostic the first
    /// time the cylinder's use runs into its reserve.
    pub fn record(&mut self, segment_index: usize, segment: &Segment) -> Option<Diagnostic> {
        let litres = self.consumption(segment);
        let cylinder = segment.cylinder;
        let used = self.used.get_mut(cylinder)?;
        *used += litres;
        let required = *used;
        let usable = self.usable[cylinder];
        if required > usable && !self.flagged[cylinder] {
            self.flagged[cylinder] = true;
            return Some(Diagnostic::InsufficientGasSupply {
                segment: segment_index,
                cylinder,
                required,
                usable,
            });
        }
        None
    }

    pub fn gas_used(&self) -> &[f64] {
        &self.used
    }

    pub fn into_gas_used(self) -> Vec<f64> {
        self.used
    }
}
