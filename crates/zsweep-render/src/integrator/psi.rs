//! Closed-form pieces of linear ray integration.
//!
//! Along a segment of length `D` whose attenuation varies linearly from
//! `tau_f` to `tau_b`, the emitted color depends on
//!
//! ```text
//! psi = integral_0^1 exp(-D (tau_f t + (tau_b - tau_f) t^2 / 2)) dt
//! ```
//!
//! With increasing attenuation the integral is expressed through the scaled
//! complementary error function, with decreasing attenuation through Dawson's
//! integral. Both forms cancel badly when the attenuation barely changes over
//! the segment, so that regime uses a short series instead.

/// `sqrt(pi)`.
const SQRT_PI: f64 = 1.772_453_850_905_516;

/// Below this attenuation change (times length) the segment is homogeneous.
const HOMOGENEOUS_THRESHOLD: f64 = 1.0e-8;

/// Half-quadratic coefficients up to this magnitude use the series.
const SERIES_LIMIT: f64 = 0.05;

/// Terms of the series in the quadratic coefficient.
const SERIES_TERMS: usize = 9;

/// Scaled complementary error function `exp(x^2) erfc(x)` for `x >= 0`.
///
/// Chebyshev fit with relative error below `1.2e-7`, written in scaled form
/// so it neither overflows nor underflows for large arguments.
pub fn erfcx(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let poly = -1.265_512_23
        + t * (1.000_023_68
            + t * (0.374_091_96
                + t * (0.096_784_18
                    + t * (-0.186_288_06
                        + t * (0.278_868_07
                            + t * (-1.135_203_98
                                + t * (1.488_515_87
                                    + t * (-0.822_152_23 + t * 0.170_872_77))))))));
    let scaled = t * poly.exp();
    if x >= 0.0 {
        scaled
    } else {
        // erfc(-z) = 2 - erfc(z)
        2.0 * (z * z).exp() - scaled
    }
}

/// Dawson's integral `F(x) = exp(-x^2) integral_0^x exp(t^2) dt`.
///
/// Rybicki's method; absolute error around `2e-7`.
pub fn dawson(x: f64) -> f64 {
    const H: f64 = 0.4;
    const A1: f64 = 2.0 / 3.0;
    const A2: f64 = 0.4;
    const A3: f64 = 2.0 / 7.0;
    const NMAX: i32 = 6;
    const INV_SQRT_PI: f64 = 0.564_189_583_547_756_3;

    if x.abs() < 0.2 {
        let x2 = x * x;
        return x * (1.0 - A1 * x2 * (1.0 - A2 * x2 * (1.0 - A3 * x2)));
    }
    let xx = x.abs();
    let n0 = 2.0 * (0.5 * xx / H + 0.5).floor();
    let xp = xx - n0 * H;
    let mut e1 = (2.0 * xp * H).exp();
    let e2 = e1 * e1;
    let mut d1 = n0 + 1.0;
    let mut d2 = d1 - 2.0;
    let mut sum = 0.0;
    for i in 1..=NMAX {
        let c = -((f64::from(2 * i - 1) * H).powi(2));
        sum += c.exp() * (e1 / d1 + 1.0 / (d2 * e1));
        d1 += 2.0;
        d2 -= 2.0;
        e1 *= e2;
    }
    INV_SQRT_PI * (-xp * xp).exp() * sum * x.signum()
}

/// Moments `M_n(c) = integral_0^1 t^n exp(-c t) dt` for `n < N`.
fn exponential_moments<const N: usize>(c: f64) -> [f64; N] {
    let mut moments = [0.0; N];
    if c <= 2.0 {
        // Power series; alternating but short for small c.
        for (n, m) in moments.iter_mut().enumerate() {
            let mut term = 1.0;
            let mut sum = 0.0;
            let mut k = 0usize;
            loop {
                let contribution = term / (n + k + 1) as f64;
                sum += contribution;
                if contribution.abs() < 1.0e-17 * sum.abs().max(1.0e-300) || k > 60 {
                    break;
                }
                k += 1;
                term *= -c / k as f64;
            }
            *m = sum;
        }
    } else {
        let e = (-c).exp();
        moments[0] = -(-c).exp_m1() / c;
        for n in 1..N {
            moments[n] = (n as f64 * moments[n - 1] - e) / c;
        }
    }
    moments
}

/// `psi` for a segment of `length` with attenuation going from
/// `tau_front` to `tau_back` (both non-negative, per unit length).
pub fn psi(length: f64, tau_front: f64, tau_back: f64) -> f64 {
    let diff = length * (tau_back - tau_front);
    if diff.abs() < HOMOGENEOUS_THRESHOLD {
        let tau_d = 0.5 * length * (tau_front + tau_back);
        if tau_d < HOMOGENEOUS_THRESHOLD {
            return 1.0;
        }
        return -(-tau_d).exp_m1() / tau_d;
    }

    let c = length * tau_front;
    let eps = 0.5 * diff;
    if eps.abs() <= SERIES_LIMIT {
        // exp(-eps t^2) expanded in powers of eps.
        let moments = exponential_moments::<{ 2 * SERIES_TERMS }>(c);
        let mut sum = 0.0;
        let mut coefficient = 1.0;
        for k in 0..SERIES_TERMS {
            sum += coefficient * moments[2 * k];
            coefficient *= -eps / (k + 1) as f64;
        }
        return sum.clamp(0.0, 1.0);
    }

    let value = if eps > 0.0 {
        let a = eps.sqrt();
        let u_front = c / (2.0 * a);
        let u_back = length * tau_back / (2.0 * a);
        let decay = (u_front * u_front - u_back * u_back).exp();
        SQRT_PI / (2.0 * a) * (erfcx(u_front) - decay * erfcx(u_back))
    } else {
        let b = (-eps).sqrt();
        let v_front = c / (2.0 * b);
        let v_back = length * tau_back / (2.0 * b);
        let decay = (v_back * v_back - v_front * v_front).exp();
        (dawson(v_front) - decay * dawson(v_back)) / b
    };
    value.clamp(0.0, 1.0)
}

/// Color and opacity of one sub-segment with linearly varying color and
/// attenuation, premultiplied by opacity.
///
/// `color = C_f (1 - psi) + C_b (psi - zeta)` and `alpha = 1 - zeta` with
/// `zeta = exp(-D (tau_f + tau_b) / 2)`.
pub fn integrate_linear_segment(
    length: f64,
    front: [f64; 4],
    back: [f64; 4],
    psi: f64,
) -> [f64; 4] {
    let zeta = (-0.5 * length * (front[3] + back[3])).exp();
    let front_weight = 1.0 - psi;
    let back_weight = psi - zeta;
    [
        front[0] * front_weight + back[0] * back_weight,
        front[1] * front_weight + back[1] * back_weight,
        front[2] * front_weight + back[2] * back_weight,
        1.0 - zeta,
    ]
}
