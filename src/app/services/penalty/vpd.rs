//! Vapor pressure deficit from air temperature and relative humidity
//!
//! Magnus-form saturation vapor pressure over water; VPD in kPa. Used to
//! recompute VPD after air temperature has been limited on critical days.

/// Saturation vapor pressure (kPa) at air temperature `ta` (degC)
pub fn saturation_vapor_pressure(ta: f64) -> f64 {
    0.6108 * (17.27 * ta / (ta + 237.3)).exp()
}

/// VPD (kPa) from air temperature (degC) and relative humidity (%).
/// Missing inputs yield a missing result.
pub fn vpd_from_ta_rh(ta: f64, rh: f64) -> f64 {
    if ta.is_nan() || rh.is_nan() {
        return f64::NAN;
    }
    saturation_vapor_pressure(ta) * (1.0 - rh / 100.0)
}

/// Element-wise VPD over aligned temperature and humidity slices
pub fn vpd_series(ta: &[f64], rh: &[f64]) -> Vec<f64> {
    ta.iter()
        .zip(rh.iter())
        .map(|(&t, &h)| vpd_from_ta_rh(t, h))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn saturated_air_has_zero_vpd() {
        assert_approx_eq!(f64, vpd_from_ta_rh(25.0, 100.0), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn vpd_at_reference_conditions() {
        // es(20 degC) = 2.338 kPa, 50% RH -> VPD = 1.169 kPa
        assert_approx_eq!(f64, saturation_vapor_pressure(20.0), 2.338, epsilon = 0.002);
        assert_approx_eq!(f64, vpd_from_ta_rh(20.0, 50.0), 1.169, epsilon = 0.002);
    }

    #[test]
    fn missing_inputs_propagate() {
        assert!(vpd_from_ta_rh(f64::NAN, 50.0).is_nan());
        assert!(vpd_from_ta_rh(20.0, f64::NAN).is_nan());
    }
}
