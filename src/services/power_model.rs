//! ============================================================
//!  Empirical array power model
//!
//!  Factor pipeline (multiplicative, in order):
//!   1. Irradiance scaling  – P = P_nom × (G / 1000)
//!   2. Temperature derate  – 1 + α × (T − 25), α = −0.004 /°C
//!   3. Orientation         – coarse time-of-day proxy for sun geometry
//!   4. Cloud attenuation   – 1 − 0.8 × cloud fraction
//!   5. System loss         – 1 − damping
//! ============================================================

use chrono::Timelike;

use crate::models::array::ArrayDescriptor;
use crate::models::forecast::ForecastPoint;

/// Standard test condition irradiance (W/m²)
const STC_IRRADIANCE: f64 = 1000.0;
/// Typical c-Si temperature coefficient (1/°C)
const TEMP_COEFFICIENT: f64 = -0.004;
const STC_TEMPERATURE_C: f64 = 25.0;
/// Share of output lost under full overcast; the rest is diffuse light
const MAX_CLOUD_LOSS: f64 = 0.8;

/// Instantaneous power (kW) for one array at one forecast hour. Never negative.
pub fn compute_power(array: &ArrayDescriptor, point: &ForecastPoint) -> f64 {
    let g = point.irradiance_w_m2;
    if g <= 0.0 {
        return 0.0;
    }

    let base_power = (g / STC_IRRADIANCE) * array.peak_power_kwp;
    let temp_factor = 1.0 + TEMP_COEFFICIENT * (point.temperature_c - STC_TEMPERATURE_C);
    let orientation = orientation_factor(array.declination_deg, array.azimuth_deg, point.timestamp.hour());
    let cloud_factor = 1.0 - (point.cloud_cover_pct / 100.0) * MAX_CLOUD_LOSS;
    let loss_factor = 1.0 - array.damping;

    (base_power * temp_factor * orientation * cloud_factor * loss_factor).max(0.0)
}

/// Time-of-day multiplier on the local wall-clock hour.
///
/// Declination and azimuth are accepted but do not change the result yet.
pub fn orientation_factor(_declination_deg: f64, _azimuth_deg: f64, hour: u32) -> f64 {
    match hour {
        h if h < 6 || h > 20 => 0.0,
        h if h < 8 || h > 18 => 0.2,
        h if h < 10 || h > 16 => 0.6,
        _ => 1.0,
    }
}
