use alloc::vec::Vec;

use crate::ceiling::{ceiling, Ceiling};
use crate::plan::Segment;
use crate::tissue::TissueState;
use crate::zhl16::CoefficientTable;
use crate::{depth_to_pressure, DecoError, DiveParameters};

/// Loads `tissues` with one segment, ramping ambient pressure linearly from
/// the start to the end depth.
pub fn advance_segment(
    tissues: &mut TissueState,
    segment: &Segment,
    surface_pressure: f64,
) -> Result<(), DecoError> {
    tissues.advance(
        depth_to_pressure(segment.start_depth, surface_pressure),
        depth_to_pressure(segment.end_depth, surface_pressure),
        segment.minutes(),
        &segment.gas,
    )
}

/// Replays a segment list, e.g. a logged dive, from surface saturation.
pub fn simulate(
    segments: &[Segment],
    table: &CoefficientTable,
    surface_pressure: f64,
) -> Result<TissueState, DecoError> {
    table.validate()?;
    let mut tissues = TissueState::equilibrated(table, surface_pressure);
    for segment in segments {
        advance_segment(&mut tissues, segment, surface_pressure)?;
    }
    Ok(tissues)
}

/// Ceiling after each segment of a replayed profile, with `gf_low` anchored
/// at the deepest ceiling seen so far.
pub fn ceilings_along(
    segments: &[Segment],
    table: &CoefficientTable,
    params: &DiveParameters,
) -> Result<Vec<Ceiling>, DecoError> {
    params.validate()?;
    table.validate()?;
    let gf = params.gradient_factors();
    let surface = params.surface_pressure;
    let mut tissues = TissueState::equilibrated(table, surface);
    let mut anchor: Option<f64> = None;
    let mut ceilings = Vec::with_capacity(segments.len());
    for segment in segments {
        advance_segment(&mut tissues, segment, surface)?;
        let deepest = ceiling(&tissues, gf.low, gf.high, None, surface)?;
        if deepest.in_obligation() && anchor.is_none_or(|a| deepest.depth > a) {
            anchor = Some(deepest.depth);
        }
        ceilings.push(ceiling(&tissues, gf.low, gf.high, anchor, surface)?);
    }
    Ok(ceilings)
}
