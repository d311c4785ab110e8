use dive_plan_core::exposure::{cns_limit_minutes, cns_per_minute, otu_per_minute, ExposureTracker};
use dive_plan_core::{GasMix, Segment, SegmentKind};

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn segment(start_depth: f64, end_depth: f64, minutes: u32, gas: GasMix) -> Segment {
    Segment {
        start_depth,
        end_depth,
        duration: minutes * 60,
        cylinder: 0,
        gas,
        kind: SegmentKind::Travel,
    }
}

#[test]
fn test_cns_limit_table() {
    assert_eq!(cns_limit_minutes(0.5), None);
    assert_eq!(cns_limit_minutes(0.21), None);
    assert_eq!(cns_limit_minutes(0.55), Some(720.0));
    assert!(approx(cns_limit_minutes(1.45).unwrap(), 135.0));
    assert!(approx(cns_limit_minutes(1.0).unwrap(), 300.0));
    assert!(approx(cns_limit_minutes(1.65).unwrap(), 7.5));
    assert_eq!(cns_limit_minutes(2.5), Some(1.0));
}

#[test]
fn test_per_minute_rates() {
    assert_eq!(cns_per_minute(0.4), 0.0);
    assert!(approx(cns_per_minute(1.4), 100.0 / 150.0));
    assert_eq!(otu_per_minute(0.5), 0.0);
    assert!(approx(otu_per_minute(1.0), 1.0));
    assert!(otu_per_minute(1.6) > otu_per_minute(1.4));
}

#[test]
fn test_oxygen_at_four_metres() {
    let mut tracker = ExposureTracker::new(1.0);
    let exposure = tracker.record(&segment(4.0, 4.0, 60, GasMix::oxygen()));
    assert!((exposure.cns - 40.0).abs() < 1e-6);
    let otu = 60.0 * libm::pow(0.9 / 0.5, 0.83);
    assert!((exposure.otu - otu).abs() < 1e-6);
    assert_eq!(tracker.max_cns(), tracker.cns());
}

#[test]
fn test_air_in_the_shallows_is_free() {
    let mut tracker = ExposureTracker::new(1.01325);
    let exposure = tracker.record(&segment(10.0, 10.0, 90, GasMix::air()));
    assert_eq!(exposure.cns, 0.0);
    assert_eq!(exposure.otu, 0.0);
}

#[test]
fn test_travel_uses_depth_along_the_ramp() {
    let ean50 = GasMix::nitrox(50).unwrap();
    let mut ramp = ExposureTracker::new(1.0);
    ramp.record(&segment(20.0, 0.0, 10, ean50));
    let mut bottom = ExposureTracker::new(1.0);
    bottom.record(&segment(20.0, 20.0, 10, ean50));
    let mut top = ExposureTracker::new(1.0);
    top.record(&segment(0.0, 0.0, 10, ean50));

    assert!(ramp.cns() > top.cns());
    assert!(ramp.cns() < bottom.cns());
    assert!(ramp.otu() < bottom.otu());
}

#[test]
fn test_totals_never_decrease() {
    let mut tracker = ExposureTracker::new(1.01325);
    let profile = [
        segment(0.0, 40.0, 3, GasMix::air()),
        segment(40.0, 40.0, 20, GasMix::air()),
        segment(40.0, 21.0, 2, GasMix::air()),
        segment(21.0, 21.0, 0, GasMix::air()),
        segment(18.0, 6.0, 2, GasMix::nitrox(50).unwrap()),
        segment(6.0, 6.0, 15, GasMix::nitrox(50).unwrap()),
        segment(6.0, 0.0, 1, GasMix::nitrox(50).unwrap()),
    ];
    let mut previous = tracker.current();
    for step in &profile {
        let exposure = tracker.record(step);
        assert!(exposure.cns >= previous.cns);
        assert!(exposure.otu >= previous.otu);
        previous = exposure;
    }
    assert!(tracker.cns() > 0.0);
    assert_eq!(tracker.max_cns(), tracker.cns());
}
