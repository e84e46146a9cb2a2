//! Derived design and outcome columns.
//!
//! Raw simulation exports carry physical quantities (moat width, spectral
//! acceleration, plan dimension, story count). The surrogates are trained on
//! dimensionless ratios of those quantities.

use crate::math::interp;

/// Truncated π the simulation database was generated with.
const PI: f64 = 3.14159;

/// Gravitational acceleration, in/s².
pub const GRAVITY: f64 = 386.4;

/// Damping ratios of the code damping-coefficient table.
const ZETA_REF: [f64; 7] = [0.02, 0.05, 0.10, 0.20, 0.30, 0.40, 0.50];
/// Damping coefficient `B_m` at each `ZETA_REF` entry.
const BM_REF: [f64; 7] = [0.8, 1.0, 1.2, 1.5, 1.7, 1.9, 2.0];

/// Replacement cost per unit floor area.
pub const COST_PER_AREA: f64 = 600.0;

/// Damping coefficient `B_m`, linearly interpolated and clamped at the table ends.
pub fn damping_coefficient(zeta: f64) -> f64 {
    interp(zeta, &ZETA_REF, &BM_REF)
}

/// Moat clearance over the code displacement demand at the isolated period.
///
/// `D_m = g · (S_a / B_m) · T_m² / (4π²)`; the ratio is `moat / D_m`.
pub fn gap_ratio(moat: f64, sa_tm: f64, t_m: f64, zeta: f64) -> Option<f64> {
    let demand = GRAVITY * (sa_tm / damping_coefficient(zeta)) * t_m * t_m;
    if !(demand.is_finite() && demand > 0.0) {
        return None;
    }
    finite(moat * 4.0 * PI * PI / demand)
}

pub fn period_ratio(t_m: f64, t_fb: f64) -> Option<f64> {
    if t_fb <= 0.0 {
        return None;
    }
    finite(t_m / t_fb)
}

/// Total floor area: plan area times (stories + roof).
pub fn building_area(l_bldg: f64, num_stories: f64) -> f64 {
    l_bldg * l_bldg * (num_stories + 1.0)
}

pub fn replacement_cost(l_bldg: f64, num_stories: f64) -> f64 {
    COST_PER_AREA * building_area(l_bldg, num_stories)
}

/// Replacement time in days (one year per 1000 units of floor area).
pub fn replacement_time(l_bldg: f64, num_stories: f64) -> f64 {
    building_area(l_bldg, num_stories) / 1000.0 * 365.0
}

pub fn cost_ratio(median_cost: f64, l_bldg: f64, num_stories: f64) -> Option<f64> {
    let denom = replacement_cost(l_bldg, num_stories);
    (denom > 0.0).then(|| median_cost / denom).and_then(finite)
}

pub fn time_ratio(median_time: f64, l_bldg: f64, num_stories: f64) -> Option<f64> {
    let denom = replacement_time(l_bldg, num_stories);
    (denom > 0.0).then(|| median_time / denom).and_then(finite)
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}
