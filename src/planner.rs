use alloc::vec::Vec;

use libm::{ceil, fabs};

use crate::ceiling::{ceiling, round_down_to_increment, round_up_to_increment};
use crate::consumption::GasConsumptionEstimator;
use crate::exposure::{Exposure, ExposureTracker};
use crate::gas::{Cylinder, GasMix, GasSwitchPolicy, LowestNarcoticDepth, MAX_CYLINDERS};
use crate::generation::PlanGeneration;
use crate::ndl::ndl;
use crate::plan::{Diagnostic, Plan, PlannerState, Segment, SegmentKind, Waypoint};
use crate::simulate::advance_segment;
use crate::tissue::TissueState;
use crate::zhl16::CoefficientTable;
use crate::{depth_to_pressure, DecoError, DiveParameters, NumericDomain};

/// Stop time the ascent may accumulate before the schedule is declared
/// non-converging.
pub const MAX_ASCENT_SECONDS: u32 = 48 * 3600;
pub const MAX_ASCENT_ITERATIONS: u32 = 10_000;
/// Safety stops are only added to dives deeper than this.
pub const SAFETY_STOP_MIN_DEPTH: f64 = 10.0;

const DEPTH_EPSILON: f64 = 1e-6;

/// Turns waypoints into a full plan: user legs, then an ascent with
/// decompression and safety stops, with gas switches chosen by `P`.
#[derive(Debug, Clone)]
pub struct DivePlanner<P = LowestNarcoticDepth> {
    params: DiveParameters,
    table: CoefficientTable,
    cylinders: Vec<Cylinder>,
    policy: P,
}

impl DivePlanner<LowestNarcoticDepth> {
    pub fn new(
        params: DiveParameters,
        table: CoefficientTable,
        cylinders: &[Cylinder],
    ) -> Result<Self, DecoError> {
        let policy = LowestNarcoticDepth::new(params.narcotic_limit_depth);
        DivePlanner::with_policy(params, table, cylinders, policy)
    }
}

impl<P: GasSwitchPolicy> DivePlanner<P> {
    pub fn with_policy(
        params: DiveParameters,
        table: CoefficientTable,
        cylinders: &[Cylinder],
        policy: P,
    ) -> Result<Self, DecoError> {
        params.validate()?;
        table.validate()?;
        if cylinders.len() > MAX_CYLINDERS {
            return Err(DecoError::TooManyGasMixes {
                count: cylinders.len(),
                max: MAX_CYLINDERS,
            });
        }
        let volumes_ok = cylinders.iter().all(|c| {
            [c.size_litres, c.start_pressure_bar, c.reserve_bar]
                .iter()
                .all(|v| v.is_finite() && *v >= 0.0)
        });
        if !volumes_ok {
            return Err(DecoError::NumericDomainError(NumericDomain::Parameter));
        }
        Ok(DivePlanner {
            params,
            table,
            cylinders: cylinders.to_vec(),
            policy,
        })
    }

    pub fn params(&self) -> &DiveParameters {
        &self.params
    }

    pub fn table(&self) -> &CoefficientTable {
        &self.table
    }

    pub fn cylinders(&self) -> &[Cylinder] {
        &self.cylinders
    }

    pub fn plan(&self, waypoints: &[Waypoint]) -> Result<Plan, DecoError> {
        Dive::new(self, None).run(waypoints)
    }

    /// Like [`plan`](Self::plan), but gives up with `Superseded` as soon as
    /// `generation` has moved past `ticket`.
    pub fn plan_generation(
        &self,
        waypoints: &[Waypoint],
        generation: &PlanGeneration,
        ticket: u64,
    ) -> Result<Plan, DecoError> {
        Dive::new(self, Some((generation, ticket))).run(waypoints)
    }
}

fn travel_seconds(distance: f64, rate_per_minute: f64) -> u32 {
    ceil(fabs(distance) / rate_per_minute * 60.0 - DEPTH_EPSILON) as u32
}

/// Working state of one planning run.
struct Dive<'a, P> {
    planner: &'a DivePlanner<P>,
    cancel: Option<(&'a PlanGeneration, u64)>,
    tissues: TissueState,
    depth: f64,
    max_depth: f64,
    cylinder: usize,
    state: PlannerState,
    segments: Vec<Segment>,
    exposures: Vec<Exposure>,
    exposure: ExposureTracker,
    consumption: GasConsumptionEstimator,
    diagnostics: Vec<Diagnostic>,
    /// Depth that anchors `gf_low` for the rest of the ascent.
    anchor: Option<f64>,
    first_stop_depth: Option<f64>,
}

impl<'a, P: GasSwitchPolicy> Dive<'a, P> {
    fn new(planner: &'a DivePlanner<P>, cancel: Option<(&'a PlanGeneration, u64)>) -> Self {
        let params = &planner.params;
        Dive {
            planner,
            cancel,
            tissues: TissueState::equilibrated(&planner.table, params.surface_pressure),
            depth: 0.0,
            max_depth: 0.0,
            cylinder: 0,
            state: PlannerState::Descending,
            segments: Vec::new(),
            exposures: Vec::new(),
            exposure: ExposureTracker::new(params.surface_pressure),
            consumption: GasConsumptionEstimator::new(params, &planner.cylinders),
            diagnostics: Vec::new(),
            anchor: None,
            first_stop_depth: None,
        }
    }

    fn params(&self) -> &DiveParameters {
        &self.planner.params
    }

    fn mix(&self, cylinder: usize) -> GasMix {
        self.planner.cylinders[cylinder].mix
    }

    fn checkpoint(&self) -> Result<(), DecoError> {
        match self.cancel {
            Some((generation, ticket)) if !generation.is_current(ticket) => {
                deco_log!("planning generation {} superseded", ticket);
                Err(DecoError::Superseded)
            }
            _ => Ok(()),
        }
    }

    fn run(mut self, waypoints: &[Waypoint]) -> Result<Plan, DecoError> {
        let completed = self.follow_waypoints(waypoints)?;
        let mut ndl_minutes = None;
        let mut tts = 0;
        if completed {
            if self.depth > 0.0 {
                let gas = self.mix(self.cylinder);
                ndl_minutes = ndl(&self.tissues, self.depth, &gas, self.params())?;
            }
            let ascent_start = self.runtime();
            self.ascend()?;
            tts = self.runtime() - ascent_start;
        }
        Ok(self.finish(ndl_minutes, tts))
    }

    fn runtime(&self) -> u32 {
        self.segments.iter().map(|s| s.duration).sum()
    }

    /// Emits the user legs. Returns `false` when the list had to be cut short.
    fn follow_waypoints(&mut self, waypoints: &[Waypoint]) -> Result<bool, DecoError> {
        for (i, waypoint) in waypoints.iter().enumerate() {
            self.checkpoint()?;
            if waypoint.duration < 0 {
                deco_log!("waypoint {} is not time-ordered", i);
                self.diagnostics.push(Diagnostic::NonMonotonicWaypoints { waypoint: i });
                return Ok(false);
            }
            if waypoint.cylinder >= self.planner.cylinders.len() {
                return Err(DecoError::UnknownCylinder {
                    cylinder: waypoint.cylinder,
                    available: self.planner.cylinders.len(),
                });
            }
            if !waypoint.depth.is_finite() || waypoint.depth < 0.0 {
                return Err(DecoError::NumericDomainError(NumericDomain::Parameter));
            }

            self.cylinder = waypoint.cylinder;
            if waypoint.depth != self.depth {
                let deeper = waypoint.depth > self.depth;
                let (kind, rate) = if deeper {
                    self.state = PlannerState::Descending;
                    (SegmentKind::Descent, self.params().descent_rate)
                } else {
                    self.state = PlannerState::Ascending;
                    (SegmentKind::Travel, self.params().ascent_rate)
                };
                let seconds = travel_seconds(waypoint.depth - self.depth, rate);
                self.emit(kind, waypoint.depth, seconds)?;
            }
            self.state = PlannerState::AtDepth;
            if waypoint.duration > 0 {
                self.emit(SegmentKind::Travel, waypoint.depth, waypoint.duration as u32)?;
            }
        }
        Ok(true)
    }

    /// Appends a segment from the current depth, loading tissues and feeding
    /// the exposure and consumption trackers.
    fn emit(&mut self, kind: SegmentKind, end_depth: f64, duration: u32) -> Result<(), DecoError> {
        let start_depth = self.depth;
        let deepest = start_depth.max(end_depth);
        let ppo2_max = self.params().ppo2_max;
        let surface = self.params().surface_pressure;

        let mix = self.mix(self.cylinder);
        if !mix.allowed_at(deepest, ppo2_max) {
            match self.planner.policy.select(deepest, ppo2_max, &self.planner.cylinders) {
                Some(substitute) => {
                    deco_log!("cylinder {} replaces {} at {} m", substitute, self.cylinder, deepest);
                    self.cylinder = substitute;
                }
                None => {
                    let repeated = matches!(
                        self.diagnostics.last(),
                        Some(Diagnostic::GasUnavailableAtDepth { cylinder, .. }) if *cylinder == self.cylinder
                    );
                    if !repeated {
                        deco_log!("no breathable gas at {} m", deepest);
                        self.diagnostics.push(Diagnostic::GasUnavailableAtDepth {
                            segment: self.segments.len(),
                            cylinder: self.cylinder,
                            depth: deepest,
                            mod_depth: mix.mod_depth(ppo2_max),
                        });
                    }
                }
            }
        }

        let segment = Segment {
            start_depth,
            end_depth,
            duration,
            cylinder: self.cylinder,
            gas: self.mix(self.cylinder),
            kind,
        };
        advance_segment(&mut self.tissues, &segment, surface)?;
        let exposure = self.exposure.record(&segment);

        let merge = match self.segments.last() {
            Some(last) => {
                last.kind == kind
                    && last.cylinder == segment.cylinder
                    && last.end_depth == start_depth
                    && match kind {
                        SegmentKind::Ascent => true,
                        SegmentKind::DecoStop => last.is_level() && segment.is_level(),
                        _ => false,
                    }
            }
            None => false,
        };
        let index = if merge { self.segments.len() - 1 } else { self.segments.len() };
        if let Some(diagnostic) = self.consumption.record(index, &segment) {
            deco_log!("cylinder {} runs into its reserve at segment {}", segment.cylinder, index);
            self.diagnostics.push(diagnostic);
        }

        match (merge, self.segments.last_mut(), self.exposures.last_mut()) {
            (true, Some(last), Some(last_exposure)) => {
                last.end_depth = end_depth;
                last.duration += duration;
                *last_exposure = exposure;
            }
            _ => {
                self.segments.push(segment);
                self.exposures.push(exposure);
            }
        }

        self.depth = end_depth;
        self.max_depth = self.max_depth.max(deepest);
        Ok(())
    }

    /// Next stop level strictly shallower than the current depth.
    fn next_level(&self) -> f64 {
        let params = self.params();
        let next = round_down_to_increment(self.depth - DEPTH_EPSILON, params.stop_increment);
        if next < params.last_stop_depth - DEPTH_EPSILON {
            0.0
        } else {
            next
        }
    }

    /// Whether the tissues would respect the ceiling after ascending to
    /// `target` on the current gas.
    fn can_ascend_to(&self, target: f64) -> Result<bool, DecoError> {
        let params = self.params();
        let gf = params.gradient_factors();
        let surface = params.surface_pressure;
        let seconds = travel_seconds(self.depth - target, params.ascent_rate);
        let mut trial = self.tissues;
        trial.advance(
            depth_to_pressure(self.depth, surface),
            depth_to_pressure(target, surface),
            seconds as f64 / 60.0,
            &self.mix(self.cylinder),
        )?;
        let ceiling = ceiling(&trial, gf.low, gf.high, self.anchor, surface)?;
        Ok(ceiling.depth <= target + DEPTH_EPSILON)
    }

    fn in_obligation(&self) -> Result<bool, DecoError> {
        let params = self.params();
        let gf = params.gradient_factors();
        let ceiling = ceiling(
            &self.tissues,
            gf.low,
            gf.high,
            self.anchor,
            params.surface_pressure,
        )?;
        Ok(ceiling.in_obligation())
    }

    fn ascend(&mut self) -> Result<(), DecoError> {
        let params = *self.params();
        let gf = params.gradient_factors();
        let initial = ceiling(&self.tissues, gf.low, gf.high, None, params.surface_pressure)?;
        if initial.in_obligation() {
            let anchor = round_up_to_increment(initial.depth, params.stop_increment);
            deco_log!(
                "ascent from {} m, gf_low ceiling {} m, leading compartment {}",
                self.depth,
                anchor,
                initial.leading_compartment
            );
            self.anchor = Some(anchor);
        }

        let mut stop_time: u32 = 0;
        let mut iterations: u32 = 0;
        let mut safety_stop_done = false;
        while self.depth > 0.0 {
            iterations += 1;
            if iterations > MAX_ASCENT_ITERATIONS {
                return Err(DecoError::NumericDomainError(NumericDomain::AscentDidNotConverge));
            }
            self.checkpoint()?;

            if let Some(best) =
                self.planner.policy.select(self.depth, params.ppo2_max, &self.planner.cylinders)
            {
                if best != self.cylinder {
                    deco_log!("switch to cylinder {} at {} m", best, self.depth);
                    self.cylinder = best;
                }
            }

            let next = self.next_level();
            let safety_depth = params.safety_stop_depth;
            let crosses_safety_depth = self.depth + DEPTH_EPSILON >= safety_depth
                && next < safety_depth - DEPTH_EPSILON;
            if params.safety_stop_enabled
                && !safety_stop_done
                && self.max_depth > SAFETY_STOP_MIN_DEPTH
                && crosses_safety_depth
                && !self.in_obligation()?
            {
                if self.depth > safety_depth {
                    self.state = PlannerState::Ascending;
                    let seconds = travel_seconds(self.depth - safety_depth, params.ascent_rate);
                    self.emit(SegmentKind::Ascent, safety_depth, seconds)?;
                }
                self.state = PlannerState::SafetyStop;
                self.emit(SegmentKind::SafetyStop, safety_depth, params.safety_stop_duration)?;
                safety_stop_done = true;
                continue;
            }

            if self.can_ascend_to(next)? {
                self.state = PlannerState::Ascending;
                let seconds = travel_seconds(self.depth - next, params.ascent_rate);
                self.emit(SegmentKind::Ascent, next, seconds)?;
                continue;
            }

            self.state = PlannerState::DecoStop;
            let stop_depth = self.depth;
            self.first_stop_depth.get_or_insert(stop_depth);
            deco_log!("deco stop at {} m until {} m clears", stop_depth, next);
            loop {
                self.emit(SegmentKind::DecoStop, stop_depth, params.stop_time_step)?;
                stop_time = stop_time.saturating_add(params.stop_time_step);
                if stop_time > MAX_ASCENT_SECONDS {
                    deco_log!("ascent did not converge after {} s of stops", stop_time);
                    return Err(DecoError::NumericDomainError(NumericDomain::AscentDidNotConverge));
                }
                self.checkpoint()?;
                if self.can_ascend_to(next)? {
                    break;
                }
            }
        }
        self.state = PlannerState::Surfaced;
        Ok(())
    }

    fn finish(self, ndl: Option<u32>, tts: u32) -> Plan {
        let params = &self.planner.params;
        Plan {
            cns_percent: self.exposure.cns(),
            max_cns: self.exposure.max_cns(),
            otu_total: self.exposure.otu(),
            segments: self.segments,
            exposures: self.exposures,
            final_tissue_state: self.tissues,
            gas_used: self.consumption.into_gas_used(),
            cylinders: self.planner.cylinders.clone(),
            diagnostics: self.diagnostics,
            state: self.state,
            ndl,
            tts,
            first_stop_depth: self.first_stop_depth,
            gf_low: params.gf_low,
            gf_high: params.gf_high,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_travel_seconds_round_up() {
        assert_eq!(travel_seconds(18.0, 18.0), 60);
        assert_eq!(travel_seconds(3.0, 9.0), 20);
        assert_eq!(travel_seconds(-2.0, 9.0), 14);
        assert_eq!(travel_seconds(0.0, 9.0), 0);
    }
}
