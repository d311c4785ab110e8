use dive_plan_core::tissue::{Compartment, TissueState};
use dive_plan_core::zhl16::{CoefficientTable, CompartmentCoefficients, COMPARTMENTS};
use dive_plan_core::{
    depth_to_pressure, DecoError, GasMix, NumericDomain, FN2_AIR, SURFACE_PRESSURE,
    WATER_VAPOR_PRESSURE,
};

fn surface_tissues() -> TissueState {
    TissueState::equilibrated(&CoefficientTable::zhl16c(), SURFACE_PRESSURE)
}

#[test]
fn test_equilibrated_tissues_hold_surface_air() {
    let tissues = surface_tissues();
    let expected = (SURFACE_PRESSURE - WATER_VAPOR_PRESSURE) * FN2_AIR;
    for compartment in tissues.compartments() {
        assert!((compartment.pressure_n2 - expected).abs() < 1e-12);
        assert_eq!(compartment.pressure_he, 0.0);
        assert!((compartment.saturation_percent(SURFACE_PRESSURE) - 100.0).abs() < 1e-9);
    }
}

#[test]
fn test_advance_no_change_for_zero_time() {
    let mut tissues = surface_tissues();
    let before = tissues;
    let amb_pressure = depth_to_pressure(30.0, SURFACE_PRESSURE);
    tissues.advance(amb_pressure, amb_pressure, 0.0, &GasMix::air()).unwrap();
    assert_eq!(tissues, before);
}

#[test]
fn test_uptake_at_depth_strictly_increases() {
    let mut tissues = surface_tissues();
    let amb_pressure = depth_to_pressure(40.0, SURFACE_PRESSURE);
    let air = GasMix::air();
    for _minute in 0..120 {
        let before = tissues;
        tissues.advance(amb_pressure, amb_pressure, 1.0, &air).unwrap();
        for (new, old) in tissues.compartments().iter().zip(before.compartments()) {
            assert!(
                new.pressure_n2 > old.pressure_n2,
                "N2 should keep loading at 40 m: {} -> {}",
                old.pressure_n2,
                new.pressure_n2
            );
        }
    }
}

#[test]
fn test_uptake_converges_to_inspired_pressure() {
    let mut tissues = surface_tissues();
    let amb_pressure = depth_to_pressure(40.0, SURFACE_PRESSURE);
    let gas = GasMix::trimix(21, 35).unwrap();
    tissues.advance(amb_pressure, amb_pressure, 30_000.0, &gas).unwrap();
    let (inspired_n2, inspired_he) = gas.inspired_pressures(amb_pressure);
    for compartment in tissues.compartments() {
        assert!((compartment.pressure_n2 - inspired_n2).abs() < 1e-6);
        assert!((compartment.pressure_he - inspired_he).abs() < 1e-6);
    }
}

#[test]
fn test_washout_after_ascent_strictly_decreases() {
    let mut tissues = surface_tissues();
    let deep = depth_to_pressure(40.0, SURFACE_PRESSURE);
    let shallow = depth_to_pressure(10.0, SURFACE_PRESSURE);
    let air = GasMix::air();
    tissues.advance(deep, deep, 30_000.0, &air).unwrap();
    let (equilibrium, _) = air.inspired_pressures(shallow);

    for _minute in 0..120 {
        let before = tissues;
        tissues.advance(shallow, shallow, 1.0, &air).unwrap();
        for (new, old) in tissues.compartments().iter().zip(before.compartments()) {
            assert!(new.pressure_n2 < old.pressure_n2);
            assert!(new.pressure_n2 > equilibrium);
        }
    }
}

#[test]
fn test_descent_ramp_stays_between_equilibria() {
    let mut tissues = surface_tissues();
    let start = SURFACE_PRESSURE;
    let end = depth_to_pressure(30.0, SURFACE_PRESSURE);
    let air = GasMix::air();
    tissues.advance(start, end, 100.0 / 60.0, &air).unwrap();

    let (surface_n2, _) = air.inspired_pressures(start);
    let (bottom_n2, _) = air.inspired_pressures(end);
    for compartment in tissues.compartments() {
        assert!(compartment.pressure_n2 > surface_n2);
        assert!(compartment.pressure_n2 < bottom_n2);
    }
    // the fastest compartment follows the ramp most closely
    assert_eq!(tissues.most_loaded(), 0);
}

#[test]
fn test_ramp_matches_fine_constant_steps() {
    let air = GasMix::air();
    let start = SURFACE_PRESSURE;
    let end = depth_to_pressure(45.0, SURFACE_PRESSURE);
    let minutes = 2.5;

    let mut ramp = surface_tissues();
    ramp.advance(start, end, minutes, &air).unwrap();

    let steps = 10_000;
    let mut stepped = surface_tissues();
    for i in 0..steps {
        let fraction = (i as f64 + 0.5) / steps as f64;
        let amb_pressure = start + (end - start) * fraction;
        stepped
            .advance(amb_pressure, amb_pressure, minutes / steps as f64, &air)
            .unwrap();
    }
    for (a, b) in ramp.compartments().iter().zip(stepped.compartments()) {
        assert!((a.pressure_n2 - b.pressure_n2).abs() < 1e-4);
    }
}

#[test]
fn test_negative_duration_is_rejected() {
    let mut tissues = surface_tissues();
    let result = tissues.advance(2.0, 2.0, -1.0, &GasMix::air());
    assert_eq!(
        result,
        Err(DecoError::NumericDomainError(NumericDomain::NegativeDuration))
    );
}

#[test]
fn test_non_positive_ambient_pressure_is_rejected() {
    let mut compartment = Compartment::new(*CoefficientTable::zhl16c().row(3));
    let result = compartment.advance(0.0, 1.0, 1.0, &GasMix::air());
    assert_eq!(
        result,
        Err(DecoError::NumericDomainError(NumericDomain::NonPositivePressure))
    );
}

#[test]
fn test_table_rows_keep_their_order() {
    let table = CoefficientTable::zhl16c();
    let tissues = TissueState::equilibrated(&table, SURFACE_PRESSURE);
    for i in 0..COMPARTMENTS {
        assert_eq!(tissues.compartment(i).coefficients, *table.row(i));
    }
    assert_eq!(table.row(0).half_time_n2, 5.0);
    assert_eq!(table.row(15).half_time_n2, 635.0);
}

#[test]
fn test_malformed_coefficient_table_is_rejected() {
    let mut rows = *CoefficientTable::zhl16c().rows();
    rows[7] = CompartmentCoefficients {
        b_n2: 1.3,
        ..rows[7]
    };
    assert_eq!(
        CoefficientTable::from_rows(rows),
        Err(DecoError::NumericDomainError(NumericDomain::InvalidCoefficient))
    );

    let mut rows = *CoefficientTable::zhl16c().rows();
    rows[0].half_time_he = 0.0;
    assert!(CoefficientTable::from_rows(rows).is_err());
}

#[test]
fn test_zhl16b_differs_in_middle_n2_a() {
    let b = CoefficientTable::zhl16b();
    let c = CoefficientTable::zhl16c();
    assert!(b.row(5).a_n2 > c.row(5).a_n2);
    assert_eq!(b.row(5).b_n2, c.row(5).b_n2);
    assert_eq!(b.row(0), c.row(0));
    assert_eq!(b.row(15), c.row(15));
}

#[cfg(feature = "serde")]
#[test]
fn test_deserialized_table_is_validated() {
    let table = CoefficientTable::zhl16b();
    let json = serde_json::to_string(&table).unwrap();
    assert_eq!(serde_json::from_str::<CoefficientTable>(&json).unwrap(), table);

    let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
    value["rows"][4]["b_n2"] = serde_json::json!(0.0);
    assert!(serde_json::from_value::<CoefficientTable>(value).is_err());
}
