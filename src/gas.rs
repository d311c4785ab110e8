use core::fmt;

#[cfg(feature = "defmt")]
use defmt::Format;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{DecoError, FN2_AIR, METERS_PER_BAR, WATER_VAPOR_PRESSURE};

/// Number of cylinders a plan can carry.
pub const MAX_CYLINDERS: usize = 8;

/// Slack applied when comparing a MOD against a depth, so that e.g. EAN50 at
/// 1.4 bar is usable at exactly 18 m.
const MOD_TOLERANCE: f64 = 1e-6;

/// Breathing gas in per-mille fractions. Nitrogen is whatever remains.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "GasMixFields"))]
pub struct GasMix {
    o2_permille: u16,
    he_permille: u16,
}

impl GasMix {
    pub fn new(o2: i32, he: i32) -> Result<Self, DecoError> {
        if o2 < 0 || he < 0 || o2 as i64 + he as i64 > 1000 {
            return Err(DecoError::InvalidGasKind { o2, he });
        }
        Ok(GasMix {
            o2_permille: o2 as u16,
            he_permille: he as u16,
        })
    }

    pub const fn air() -> Self {
        GasMix {
            o2_permille: 210,
            he_permille: 0,
        }
    }

    pub const fn oxygen() -> Self {
        GasMix {
            o2_permille: 1000,
            he_permille: 0,
        }
    }

    /// Nitrox with `percent` oxygen, e.g. `nitrox(32)` for EAN32.
    pub fn nitrox(percent: u8) -> Result<Self, DecoError> {
        GasMix::new(percent as i32 * 10, 0)
    }

    /// Trimix as `o2/he` percentages, e.g. `trimix(18, 45)`.
    pub fn trimix(o2_percent: u8, he_percent: u8) -> Result<Self, DecoError> {
        GasMix::new(o2_percent as i32 * 10, he_percent as i32 * 10)
    }

    pub fn o2_permille(&self) -> u16 {
        self.o2_permille
    }

    pub fn he_permille(&self) -> u16 {
        self.he_permille
    }

    pub fn n2_permille(&self) -> u16 {
        1000 - self.o2_permille - self.he_permille
    }

    pub fn fo2(&self) -> f64 {
        self.o2_permille as f64 / 1000.0
    }

    pub fn fhe(&self) -> f64 {
        self.he_permille as f64 / 1000.0
    }

    pub fn fn2(&self) -> f64 {
        self.n2_permille() as f64 / 1000.0
    }

    pub fn is_air(&self) -> bool {
        self.he_permille == 0 && (209..=210).contains(&self.o2_permille)
    }

    /// Maximum operating depth in metres for the given ppO2 limit.
    pub fn mod_depth(&self, ppo2_max: f64) -> f64 {
        if self.o2_permille == 0 {
            return f64::INFINITY;
        }
        ((ppo2_max / self.fo2() - 1.0) * METERS_PER_BAR).max(0.0)
    }

    pub fn allowed_at(&self, depth: f64, ppo2_max: f64) -> bool {
        self.mod_depth(ppo2_max) + MOD_TOLERANCE >= depth
    }

    /// Narcotic equivalent depth, counting nitrogen as the only narcotic gas.
    pub fn end(&self, depth: f64) -> f64 {
        ((depth + METERS_PER_BAR) * self.fn2() / FN2_AIR - METERS_PER_BAR).max(0.0)
    }

    pub fn ppo2(&self, ambient_pressure: f64) -> f64 {
        self.fo2() * ambient_pressure
    }

    /// Alveolar (N2, He) partial pressures at `ambient_pressure`.
    pub fn inspired_pressures(&self, ambient_pressure: f64) -> (f64, f64) {
        let dry = (ambient_pressure - WATER_VAPOR_PRESSURE).max(0.0);
        (dry * self.fn2(), dry * self.fhe())
    }
}

/// Wire form of [`GasMix`]; deserialized mixes go through [`GasMix::new`].
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct GasMixFields {
    o2_permille: i32,
    he_permille: i32,
}

#[cfg(feature = "serde")]
impl TryFrom<GasMixFields> for GasMix {
    type Error = DecoError;

    fn try_from(fields: GasMixFields) -> Result<Self, Self::Error> {
        GasMix::new(fields.o2_permille, fields.he_permille)
    }
}

impl Default for GasMix {
    fn default() -> Self {
        GasMix::air()
    }
}

impl fmt::Display for GasMix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_air() {
            write!(f, "air")
        } else if self.o2_permille == 1000 {
            write!(f, "oxygen")
        } else if self.he_permille == 0 {
            write!(f, "EAN{}", (self.o2_permille + 5) / 10)
        } else {
            write!(f, "{}/{}", (self.o2_permille + 5) / 10, (self.he_permille + 5) / 10)
        }
    }
}

/// A cylinder the diver carries. Volumes are surface equivalent litres.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cylinder {
    pub mix: GasMix,
    pub size_litres: f64,
    pub start_pressure_bar: f64,
    pub reserve_bar: f64,
}

impl Cylinder {
    pub fn new(mix: GasMix, size_litres: f64, start_pressure_bar: f64) -> Self {
        Cylinder {
            mix,
            size_litres,
            start_pressure_bar,
            reserve_bar: 0.0,
        }
    }

    pub fn with_reserve(mut self, reserve_bar: f64) -> Self {
        self.reserve_bar = reserve_bar;
        self
    }

    pub fn available_volume(&self) -> f64 {
        self.size_litres * self.start_pressure_bar
    }

    pub fn reserve_volume(&self) -> f64 {
        self.size_litres * self.reserve_bar
    }

    /// Gas that may be used before touching the reserve.
    pub fn usable_volume(&self) -> f64 {
        (self.available_volume() - self.reserve_volume()).max(0.0)
    }
}

/// Picks the candidate with the lowest narcotic equivalent depth among those
/// whose MOD covers `target_depth`. Candidates deeper than the narcotic limit
/// only count when nothing else qualifies. Ties go to the first declared.
pub fn best_mix(
    target_depth: f64,
    ppo2_max: f64,
    narcotic_limit_depth: f64,
    candidates: &[GasMix],
) -> Option<usize> {
    let pick = |within_limit: bool| {
        let mut best: Option<(usize, f64)> = None;
        for (i, mix) in candidates.iter().enumerate() {
            if !mix.allowed_at(target_depth, ppo2_max) {
                continue;
            }
            if within_limit && mix.end(target_depth) > narcotic_limit_depth + MOD_TOLERANCE {
                continue;
            }
            // END clamps at the surface, rank on the N2 pressure behind it
            let narcotic = mix.fn2() * (target_depth + METERS_PER_BAR);
            match best {
                Some((_, best_narcotic)) if best_narcotic <= narcotic => {}
                _ => best = Some((i, narcotic)),
            }
        }
        best.map(|(i, _)| i)
    };
    pick(true).or_else(|| pick(false))
}

/// Chooses which cylinder to breathe at a given depth.
pub trait GasSwitchPolicy {
    fn select(&self, depth: f64, ppo2_max: f64, cylinders: &[Cylinder]) -> Option<usize>;
}

/// Switches to the breathable gas with the lowest narcotic depth.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LowestNarcoticDepth {
    pub narcotic_limit_depth: f64,
}

impl LowestNarcoticDepth {
    pub fn new(narcotic_limit_depth: f64) -> Self {
        LowestNarcoticDepth { narcotic_limit_depth }
    }
}

impl GasSwitchPolicy for LowestNarcoticDepth {
    fn select(&self, depth: f64, ppo2_max: f64, cylinders: &[Cylinder]) -> Option<usize> {
        let mut mixes = [GasMix::air(); MAX_CYLINDERS];
        let count = cylinders.len().min(MAX_CYLINDERS);
        for (slot, cylinder) in mixes.iter_mut().zip(cylinders) {
            *slot = cylinder.mix;
        }
        best_mix(depth, ppo2_max, self.narcotic_limit_depth, &mixes[..count])
    }
}
