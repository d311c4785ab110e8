use crate::tissue::Compartment;

/// Bühlmann `a`/`b` of a compartment, weighted by its N2 and He loading.
pub fn blended_coefficients(compartment: &Compartment) -> (f64, f64) {
    let c = &compartment.coefficients;
    let p_total = compartment.total_inert();
    if p_total <= 0.0 {
        return (c.a_n2, c.b_n2);
    }
    let a = (c.a_n2 * compartment.pressure_n2 + c.a_he * compartment.pressure_he) / p_total;
    let b = (c.b_n2 * compartment.pressure_n2 + c.b_he * compartment.pressure_he) / p_total;
    (a, b)
}

/// Maximum tolerated inert gas pressure at `amb_pressure`.
pub fn m_value(a: f64, b: f64, amb_pressure: f64) -> f64 {
    amb_pressure / b + a
}

/// M-value reduced by a gradient factor: the ambient pressure plus `gf` of
/// the supersaturation allowance.
pub fn gf_m_value(a: f64, b: f64, amb_pressure: f64, gf: f64) -> f64 {
    amb_pressure + gf * (m_value(a, b, amb_pressure) - amb_pressure)
}

/// Lowest ambient pressure at which `p_inert` stays within the
/// gradient-factor-reduced M-value, for a constant `gf`.
pub fn tolerated_pressure(p_inert: f64, a: f64, b: f64, gf: f64) -> f64 {
    (p_inert - a * gf) / (gf / b + 1.0 - gf)
}
