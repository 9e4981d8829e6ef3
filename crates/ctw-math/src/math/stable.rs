//! Numerically stable primitives for log-domain probability math.
//!
//! Context-tree weighting multiplies millions of probabilities together, so
//! every quantity is carried as a natural log. Zero probability is
//! `f64::NEG_INFINITY` and must flow through these helpers without turning
//! into NaN.

use std::f64::consts::PI;

/// ln(1/2), the log weight of each half of a two-way mixture.
pub const LN_HALF: f64 = -std::f64::consts::LN_2;

/// Beyond this gap the smaller term of a log-mean is below f64 resolution.
const LOG_MEAN_CUTOFF: f64 = 64.0;

const LOG_SQRT_2PI: f64 = 0.918_938_533_204_672_8; // 0.5 * ln(2*pi)
const LANCZOS_G: f64 = 7.0;
#[allow(clippy::excessive_precision)] // These are published numerical constants
const LANCZOS_COEFFS: [f64; 9] = [
    0.999_999_999_999_809_93,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_59,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_571_6e-6,
    1.505_632_735_149_311_6e-7,
];

/// Stable log(0.5 * (exp(a) + exp(b))), the CTW averaging step.
///
/// Equal arguments return unchanged so that repeated weighting of identical
/// branches stays exact. When the gap exceeds [`LOG_MEAN_CUTOFF`] the
/// smaller term is dropped instead of calling `exp`.
pub fn log_mean_exp(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        return f64::NAN;
    }
    if a == b {
        return a;
    }
    let (hi, lo) = if a > b { (a, b) } else { (b, a) };
    if hi == f64::INFINITY {
        return f64::INFINITY;
    }
    if hi - lo > LOG_MEAN_CUTOFF {
        return LN_HALF + hi;
    }
    LN_HALF + hi + (lo - hi).exp().ln_1p()
}

/// Natural log of the Gamma function (log |Gamma(z)|).
///
/// Uses a Lanczos approximation with reflection for z < 0.5.
pub fn log_gamma(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    if z == f64::INFINITY {
        return f64::INFINITY;
    }
    if z == f64::NEG_INFINITY {
        return f64::NAN;
    }
    if z <= 0.0 && (z - z.round()).abs() < 1e-15 {
        return f64::NAN;
    }
    if z < 0.5 {
        let sin_pi = (PI * z).sin();
        if sin_pi == 0.0 {
            return f64::NAN;
        }
        return PI.ln() - sin_pi.abs().ln() - log_gamma(1.0 - z);
    }

    let z_minus = z - 1.0;
    let mut x = LANCZOS_COEFFS[0];
    for (i, coeff) in LANCZOS_COEFFS.iter().enumerate().skip(1) {
        x += coeff / (z_minus + i as f64);
    }
    let t = z_minus + LANCZOS_G + 0.5;
    LOG_SQRT_2PI + (z_minus + 0.5) * t.ln() - t + x.ln()
}

/// log Beta(a, b) = log Gamma(a) + log Gamma(b) - log Gamma(a+b).
pub fn log_beta(a: f64, b: f64) -> f64 {
    log_gamma(a) + log_gamma(b) - log_gamma(a + b)
}
