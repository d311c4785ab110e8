use dive_plan_core::ceiling::{ceiling, round_down_to_increment, round_up_to_increment, GradientFactors};
use dive_plan_core::m_value::{blended_coefficients, gf_m_value};
use dive_plan_core::simulate::ceilings_along;
use dive_plan_core::tissue::{Compartment, TissueState};
use dive_plan_core::zhl16::{CoefficientTable, COMPARTMENTS};
use dive_plan_core::{
    depth_to_pressure, DecoError, DiveParameters, GasMix, NumericDomain, Segment, SegmentKind,
    SURFACE_PRESSURE,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Surface-saturated tissues with the first compartment loaded to `load_n2`.
fn fast_compartment_loaded(load_n2: f64) -> TissueState {
    let table = CoefficientTable::zhl16c();
    let mut compartments = [Compartment::default(); COMPARTMENTS];
    for (i, compartment) in compartments.iter_mut().enumerate() {
        *compartment = Compartment {
            coefficients: *table.row(i),
            pressure_n2: if i == 0 { load_n2 } else { 0.75 },
            pressure_he: 0.0,
        };
    }
    TissueState::from_compartments(compartments)
}

fn after_bottom_time(depth: f64, minutes: f64) -> TissueState {
    let mut tissues = TissueState::equilibrated(&CoefficientTable::zhl16c(), SURFACE_PRESSURE);
    let amb_pressure = depth_to_pressure(depth, SURFACE_PRESSURE);
    tissues
        .advance(amb_pressure, amb_pressure, minutes, &GasMix::air())
        .unwrap();
    tissues
}

#[test]
fn test_surface_saturation_has_no_ceiling() {
    let tissues = TissueState::equilibrated(&CoefficientTable::zhl16c(), SURFACE_PRESSURE);
    for (gf_low, gf_high) in [(0.3, 0.85), (1.0, 1.0), (0.1, 0.1)] {
        let result = ceiling(&tissues, gf_low, gf_high, None, SURFACE_PRESSURE).unwrap();
        assert_eq!(result.depth, 0.0);
        assert!(!result.in_obligation());
    }
}

#[test]
fn test_ceiling_single_loaded_compartment() {
    let tissues = fast_compartment_loaded(3.0);
    let result = ceiling(&tissues, 1.0, 1.0, None, 1.0).unwrap();
    // (p - a) * b for compartment 1
    let expected_pressure = (3.0 - 1.1696) * 0.5578;
    assert!((result.pressure - expected_pressure).abs() < 1e-9);
    assert!((result.depth - (expected_pressure - 1.0) * 10.0).abs() < 1e-9);
    assert_eq!(result.leading_compartment, 0);
}

#[test]
fn test_lower_gf_gives_deeper_ceiling() {
    let tissues = after_bottom_time(40.0, 25.0);
    let liberal = ceiling(&tissues, 1.0, 1.0, None, SURFACE_PRESSURE).unwrap();
    let conservative = ceiling(&tissues, 0.3, 0.85, None, SURFACE_PRESSURE).unwrap();
    assert!(liberal.in_obligation());
    assert!(conservative.depth > liberal.depth);
}

#[test]
fn test_anchored_ceiling_between_gf_bounds() {
    let tissues = after_bottom_time(40.0, 25.0);
    let low_only = ceiling(&tissues, 0.3, 0.85, None, SURFACE_PRESSURE).unwrap();
    let high_only = ceiling(&tissues, 0.85, 0.85, None, SURFACE_PRESSURE).unwrap();
    let first_stop = round_up_to_increment(low_only.depth, 3.0);
    let anchored = ceiling(&tissues, 0.3, 0.85, Some(first_stop), SURFACE_PRESSURE).unwrap();

    assert!(anchored.depth <= low_only.depth + 1e-9);
    assert!(anchored.depth >= high_only.depth - 1e-9);
}

#[test]
fn test_interpolated_ceiling_sits_on_the_gf_line() {
    let surface = 1.0;
    let tissues = fast_compartment_loaded(3.0);
    let first_stop = 12.0;
    let result = ceiling(&tissues, 0.3, 0.85, Some(first_stop), surface).unwrap();
    assert_eq!(result.leading_compartment, 0);
    assert!(result.depth > 0.0 && result.depth < first_stop);

    // at the returned pressure the compartment sits exactly on its
    // gradient-factor-reduced M-value
    let gf = GradientFactors::new(0.3, 0.85);
    let anchor = depth_to_pressure(first_stop, surface);
    let gf_here = gf.at_pressure(result.pressure, surface, Some(anchor));
    let (a, b) = blended_coefficients(tissues.compartment(0));
    let limit = gf_m_value(a, b, result.pressure, gf_here);
    assert!((limit - 3.0).abs() < 1e-9, "limit {} should equal load 3.0", limit);
}

#[test]
fn test_leading_compartment_tie_goes_to_first() {
    let row = *CoefficientTable::zhl16c().row(2);
    let compartment = Compartment {
        coefficients: row,
        pressure_n2: 2.5,
        pressure_he: 0.0,
    };
    let tissues = TissueState::from_compartments([compartment; COMPARTMENTS]);
    let result = ceiling(&tissues, 0.5, 0.5, None, SURFACE_PRESSURE).unwrap();
    assert_eq!(result.leading_compartment, 0);
}

#[test]
fn test_ceiling_never_negative() {
    let table = CoefficientTable::zhl16c();
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..500 {
        let mut compartments = [Compartment::default(); COMPARTMENTS];
        for (i, compartment) in compartments.iter_mut().enumerate() {
            *compartment = Compartment {
                coefficients: *table.row(i),
                pressure_n2: rng.random_range(0.0..4.0),
                pressure_he: rng.random_range(0.0..2.0),
            };
        }
        let tissues = TissueState::from_compartments(compartments);
        let gf_low = rng.random_range(0.1..=1.0);
        let gf_high = rng.random_range(gf_low..=1.0);
        let first_stop = if rng.random_bool(0.5) {
            Some(rng.random_range(0.0..30.0))
        } else {
            None
        };
        let result = ceiling(&tissues, gf_low, gf_high, first_stop, SURFACE_PRESSURE).unwrap();
        assert!(result.depth >= 0.0);
        assert!(result.leading_compartment < COMPARTMENTS);
    }
}

#[test]
fn test_invalid_gradient_factors_rejected() {
    let tissues = after_bottom_time(30.0, 20.0);
    let gf_error = Err(DecoError::NumericDomainError(NumericDomain::GradientFactor));
    assert_eq!(ceiling(&tissues, 0.9, 0.4, None, SURFACE_PRESSURE), gf_error);
    assert_eq!(ceiling(&tissues, 0.0, 0.4, None, SURFACE_PRESSURE), gf_error);
    assert_eq!(ceiling(&tissues, 0.3, 1.2, None, SURFACE_PRESSURE), gf_error);
}

#[test]
fn test_non_positive_surface_pressure_rejected() {
    let tissues = after_bottom_time(30.0, 20.0);
    assert_eq!(
        ceiling(&tissues, 0.3, 0.85, None, 0.0),
        Err(DecoError::NumericDomainError(NumericDomain::NonPositivePressure))
    );
}

#[test]
fn test_stop_rounding() {
    assert_eq!(round_up_to_increment(13.4, 3.0), 15.0);
    assert_eq!(round_up_to_increment(0.2, 3.0), 3.0);
    assert_eq!(round_up_to_increment(0.0, 3.0), 0.0);
    assert_eq!(round_down_to_increment(14.9, 3.0), 12.0);
    assert_eq!(round_down_to_increment(9.0, 3.0), 9.0);
    assert_eq!(round_down_to_increment(5.0, 5.0), 5.0);
}

#[test]
fn test_ceilings_along_a_logged_profile() {
    let air = GasMix::air();
    let leg = |start_depth: f64, end_depth: f64, duration: u32, kind: SegmentKind| Segment {
        start_depth,
        end_depth,
        duration,
        cylinder: 0,
        gas: air,
        kind,
    };
    let logged = [
        leg(0.0, 40.0, 140, SegmentKind::Descent),
        leg(40.0, 40.0, 25 * 60, SegmentKind::Travel),
        leg(40.0, 5.0, 240, SegmentKind::Travel),
        leg(5.0, 5.0, 60 * 60, SegmentKind::Travel),
    ];
    let ceilings =
        ceilings_along(&logged, &CoefficientTable::zhl16c(), &DiveParameters::default()).unwrap();
    assert_eq!(ceilings.len(), logged.len());
    assert!(ceilings[1].in_obligation());
    assert!(ceilings.iter().all(|c| c.depth >= 0.0));
    // an hour at 5 m washes most of it out
    assert!(ceilings[3].depth < ceilings[1].depth);
}
