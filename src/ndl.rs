use crate::ceiling::ceiling;
use crate::gas::GasMix;
use crate::tissue::TissueState;
use crate::{depth_to_pressure, DecoError, DiveParameters};

pub const NDL_CAP_MINUTES: u32 = 999;

/// Whole minutes that can still be spent at `depth` on `gas` before a direct
/// ascent would break the `gf_high` ceiling. `None` when that is already the
/// case.
pub fn ndl(
    tissues: &TissueState,
    depth: f64,
    gas: &GasMix,
    params: &DiveParameters,
) -> Result<Option<u32>, DecoError> {
    let gf_high = params.gradient_factors().high;
    let surface = params.surface_pressure;
    let amb_pressure = depth_to_pressure(depth, surface);
    let direct_ascent_blocked =
        |t: &TissueState| ceiling(t, gf_high, gf_high, None, surface).map(|c| c.in_obligation());

    let mut tissues = *tissues;
    if direct_ascent_blocked(&tissues)? {
        return Ok(None);
    }
    // while the ceiling is 0 keep looping
    for bottom_time in 0..NDL_CAP_MINUTES {
        tissues.advance(amb_pressure, amb_pressure, 1.0, gas)?;
        if direct_ascent_blocked(&tissues)? {
            return Ok(Some(bottom_time));
        }
    }
    Ok(Some(NDL_CAP_MINUTES))
}
