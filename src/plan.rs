use alloc::vec::Vec;
use core::fmt;

#[cfg(feature = "defmt")]
use defmt::Format;
use libm::{fabs, round};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::exposure::Exposure;
use crate::gas::{Cylinder, GasMix};
use crate::tissue::TissueState;
use crate::DecoError;

/// A user requested level: reach `depth` and stay there for `duration`
/// seconds breathing from `cylinder`. A negative duration means the point
/// ends before it starts.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Waypoint {
    pub depth: f64,
    pub duration: i32,
    pub cylinder: usize,
}

impl Waypoint {
    pub fn new(depth: f64, duration: i32, cylinder: usize) -> Self {
        Waypoint {
            depth,
            duration,
            cylinder,
        }
    }

    pub fn minutes(depth: f64, minutes: i32, cylinder: usize) -> Self {
        Waypoint::new(depth, minutes * 60, cylinder)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SegmentKind {
    Descent,
    Travel,
    Ascent,
    DecoStop,
    SafetyStop,
}

impl SegmentKind {
    pub fn is_stop(&self) -> bool {
        matches!(self, SegmentKind::DecoStop | SegmentKind::SafetyStop)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Segment {
    pub start_depth: f64,
    pub end_depth: f64,
    /// Seconds.
    pub duration: u32,
    pub cylinder: usize,
    pub gas: GasMix,
    pub kind: SegmentKind,
}

impl Segment {
    pub fn minutes(&self) -> f64 {
        self.duration as f64 / 60.0
    }

    pub fn max_depth(&self) -> f64 {
        self.start_depth.max(self.end_depth)
    }

    pub fn mean_depth(&self) -> f64 {
        (self.start_depth + self.end_depth) / 2.0
    }

    pub fn is_level(&self) -> bool {
        self.start_depth == self.end_depth
    }
}

/// Where the planner is in its state machine.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PlannerState {
    Descending,
    AtDepth,
    Ascending,
    DecoStop,
    SafetyStop,
    Surfaced,
}

/// An infeasibility found while planning. The plan is still produced.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Diagnostic {
    NonMonotonicWaypoints {
        waypoint: usize,
    },
    GasUnavailableAtDepth {
        segment: usize,
        cylinder: usize,
        depth: f64,
        mod_depth: f64,
    },
    InsufficientGasSupply {
        segment: usize,
        cylinder: usize,
        required: f64,
        usable: f64,
    },
}

impl Diagnostic {
    pub fn error(&self) -> DecoError {
        match *self {
            Diagnostic::NonMonotonicWaypoints { waypoint } => {
                DecoError::NonMonotonicWaypoints { waypoint }
            }
            Diagnostic::GasUnavailableAtDepth { cylinder, depth, .. } => {
                DecoError::GasUnavailableAtDepth { cylinder, depth }
            }
            Diagnostic::InsufficientGasSupply { cylinder, .. } => {
                DecoError::InsufficientGasSupply { cylinder }
            }
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Diagnostic::NonMonotonicWaypoints { waypoint } => {
                write!(f, "waypoint {} is not time-ordered, plan stops before it", waypoint + 1)
            }
            Diagnostic::GasUnavailableAtDepth {
                segment,
                cylinder,
                depth,
                mod_depth,
            } => write!(
                f,
                "cylinder {} used at {} m in segment {} beyond its MOD of {} m",
                cylinder + 1,
                DepthFmt(depth),
                segment + 1,
                DepthFmt(mod_depth)
            ),
            Diagnostic::InsufficientGasSupply {
                segment,
                cylinder,
                required,
                usable,
            } => write!(
                f,
                "cylinder {} needs {:.0} l by segment {} but only {:.0} l are usable above reserve",
                cylinder + 1,
                required,
                segment + 1,
                usable
            ),
        }
    }
}

/// A finalized dive plan. Editing waypoints means computing a new plan.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Plan {
    pub(crate) segments: Vec<Segment>,
    pub(crate) exposures: Vec<Exposure>,
    pub(crate) final_tissue_state: TissueState,
    pub(crate) cns_percent: f64,
    pub(crate) max_cns: f64,
    pub(crate) otu_total: f64,
    pub(crate) gas_used: Vec<f64>,
    pub(crate) cylinders: Vec<Cylinder>,
    pub(crate) diagnostics: Vec<Diagnostic>,
    pub(crate) state: PlannerState,
    pub(crate) ndl: Option<u32>,
    pub(crate) tts: u32,
    pub(crate) first_stop_depth: Option<f64>,
    pub(crate) gf_low: u8,
    pub(crate) gf_high: u8,
}

impl Plan {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Running CNS/OTU totals after each segment.
    pub fn exposures(&self) -> &[Exposure] {
        &self.exposures
    }

    pub fn final_tissue_state(&self) -> &TissueState {
        &self.final_tissue_state
    }

    pub fn cns_percent(&self) -> f64 {
        self.cns_percent
    }

    pub fn max_cns(&self) -> f64 {
        self.max_cns
    }

    pub fn otu_total(&self) -> f64 {
        self.otu_total
    }

    /// Litres used from each cylinder, indexed like the planner's cylinders.
    pub fn gas_used(&self) -> &[f64] {
        &self.gas_used
    }

    pub fn cylinders(&self) -> &[Cylinder] {
        &self.cylinders
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn state(&self) -> PlannerState {
        self.state
    }

    /// No-decompression time left at the end of the last waypoint, minutes.
    /// `None` when the dive is already in deco.
    pub fn ndl(&self) -> Option<u32> {
        self.ndl
    }

    /// Time to surface from the end of the last waypoint, seconds.
    pub fn tts(&self) -> u32 {
        self.tts
    }

    /// Depth of the first deco stop held, `None` for a no-stop ascent.
    pub fn first_stop_depth(&self) -> Option<f64> {
        self.first_stop_depth
    }

    pub fn runtime(&self) -> u32 {
        self.segments.iter().map(|s| s.duration).sum()
    }

    pub fn max_depth(&self) -> f64 {
        self.segments.iter().map(Segment::max_depth).fold(0.0, f64::max)
    }

    pub fn deco_stops(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(|s| s.kind == SegmentKind::DecoStop)
    }

    pub fn is_feasible(&self) -> bool {
        self.diagnostics.is_empty() && self.state == PlannerState::Surfaced
    }

    /// The first diagnostic as an error, for callers that treat any
    /// infeasibility as failure.
    pub fn check(&self) -> Result<(), DecoError> {
        match self.diagnostics.first() {
            Some(diagnostic) => Err(diagnostic.error()),
            None => Ok(()),
        }
    }

    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<alloc::string::String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

struct DepthFmt(f64);

impl fmt::Display for DepthFmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if fabs(self.0 - round(self.0)) < 0.05 {
            write!(f, "{:.0}", self.0)
        } else {
            write!(f, "{:.1}", self.0)
        }
    }
}

struct MinSec(u32);

impl fmt::Display for MinSec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dive plan")?;
        writeln!(f, "based on GFlow = {} and GFhigh = {}", self.gf_low, self.gf_high)?;
        writeln!(f)?;

        let mut runtime = 0;
        let mut cylinder = None;
        for segment in &self.segments {
            runtime += segment.duration;
            if cylinder.is_some() && cylinder != Some(segment.cylinder) {
                writeln!(f, "Switch gas to {}", segment.gas)?;
            }
            cylinder = Some(segment.cylinder);
            if segment.is_level() {
                writeln!(
                    f,
                    "Stay at {} m for {} min - runtime {} on {}",
                    DepthFmt(segment.end_depth),
                    MinSec(segment.duration),
                    MinSec(runtime),
                    segment.gas
                )?;
            } else {
                writeln!(
                    f,
                    "Transition to {} m in {} min - runtime {} on {}",
                    DepthFmt(segment.end_depth),
                    MinSec(segment.duration),
                    MinSec(runtime),
                    segment.gas
                )?;
            }
        }

        writeln!(f)?;
        writeln!(f, "CNS: {:.0}%", self.cns_percent)?;
        writeln!(f, "OTU: {:.0}", self.otu_total)?;
        writeln!(f, "Gas consumption:")?;
        for (cylinder, used) in self.cylinders.iter().zip(&self.gas_used) {
            writeln!(f, "{:.0} l of {}", used, cylinder.mix)?;
        }
        for diagnostic in &self.diagnostics {
            writeln!(f, "Warning: {}", diagnostic)?;
        }
        Ok(())
    }
}
