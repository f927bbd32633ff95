// Least-squares regression: SLOPE, INTERCEPT, RSQ, STEYX, FORECAST
//
// All functions take `(known_ys, known_xs)` in spreadsheet argument order and
// return `None` instead of a number when the input is degenerate: fewer than
// two points, mismatched lengths, zero variance, or a non-finite result.

/// Sums of squares and cross products around the means.
struct Moments {
    n: f64,
    mean_x: f64,
    mean_y: f64,
    sxx: f64,
    syy: f64,
    sxy: f64,
}

fn moments(ys: &[f64], xs: &[f64]) -> Option<Moments> {
    if ys.len() != xs.len() || xs.len() < 2 {
        return None;
    }
    if xs.iter().chain(ys.iter()).any(|v| !v.is_finite()) {
        return None;
    }
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut sxy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    if sxx == 0.0 {
        return None;
    }
    Some(Moments {
        n,
        mean_x,
        mean_y,
        sxx,
        syy,
        sxy,
    })
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

/// `Σ(x-x̄)(y-ȳ) / Σ(x-x̄)²`
pub fn slope(known_ys: &[f64], known_xs: &[f64]) -> Option<f64> {
    let m = moments(known_ys, known_xs)?;
    finite(m.sxy / m.sxx)
}

/// `ȳ - slope · x̄`
pub fn intercept(known_ys: &[f64], known_xs: &[f64]) -> Option<f64> {
    let m = moments(known_ys, known_xs)?;
    finite(m.mean_y - (m.sxy / m.sxx) * m.mean_x)
}

/// Squared Pearson correlation of xs and ys.
pub fn rsq(known_ys: &[f64], known_xs: &[f64]) -> Option<f64> {
    let m = moments(known_ys, known_xs)?;
    if m.syy == 0.0 {
        return None;
    }
    finite((m.sxy * m.sxy) / (m.sxx * m.syy))
}

/// Standard error of the predicted y: `sqrt((Syy - Sxy²/Sxx) / (n - 2))`.
///
/// Needs at least three points.
pub fn steyx(known_ys: &[f64], known_xs: &[f64]) -> Option<f64> {
    let m = moments(known_ys, known_xs)?;
    if m.n < 3.0 {
        return None;
    }
    // Rounding can push a perfect fit slightly below zero.
    let residual = (m.syy - (m.sxy * m.sxy) / m.sxx).max(0.0);
    finite((residual / (m.n - 2.0)).sqrt())
}

/// `slope · x + intercept`
pub fn forecast(x: f64, known_ys: &[f64], known_xs: &[f64]) -> Option<f64> {
    if !x.is_finite() {
        return None;
    }
    let m = moments(known_ys, known_xs)?;
    let slope = m.sxy / m.sxx;
    let intercept = m.mean_y - slope * m.mean_x;
    finite(slope * x + intercept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const XS: [f64; 3] = [1.0, 2.0, 3.0];
    const YS: [f64; 3] = [10.0, 20.0, 30.0];

    #[test]
    fn test_exact_line() {
        assert_eq!(slope(&YS, &XS), Some(10.0));
        assert_eq!(intercept(&YS, &XS), Some(0.0));
        assert_eq!(rsq(&YS, &XS), Some(1.0));
        assert_eq!(steyx(&YS, &XS), Some(0.0));
        assert_eq!(forecast(4.0, &YS, &XS), Some(40.0));
    }

    #[test]
    fn test_noisy_fit() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        let ys = [2.0, 4.0, 5.0, 4.0];
        // x̄ = 2.5, ȳ = 3.75, Sxx = 5, Sxy = 3.5, Syy = 4.75
        assert!((slope(&ys, &xs).unwrap() - 0.7).abs() < 1e-12);
        assert!((intercept(&ys, &xs).unwrap() - 2.0).abs() < 1e-12);
        assert!((rsq(&ys, &xs).unwrap() - 12.25 / 23.75).abs() < 1e-12);
        let expected_se = ((4.75 - 12.25 / 5.0) / 2.0f64).sqrt();
        assert!((steyx(&ys, &xs).unwrap() - expected_se).abs() < 1e-12);
        assert!((forecast(5.0, &ys, &xs).unwrap() - 5.5).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_inputs_fail_closed() {
        // Too few points
        assert_eq!(slope(&[1.0], &[1.0]), None);
        assert_eq!(forecast(1.0, &[], &[]), None);
        // Mismatched lengths
        assert_eq!(intercept(&[1.0, 2.0], &[1.0, 2.0, 3.0]), None);
        // Zero-variance xs
        assert_eq!(slope(&[1.0, 2.0, 3.0], &[5.0, 5.0, 5.0]), None);
        assert_eq!(forecast(5.0, &[1.0, 2.0, 3.0], &[5.0, 5.0, 5.0]), None);
        // Zero-variance ys has no correlation
        assert_eq!(rsq(&[4.0, 4.0, 4.0], &XS), None);
        // Two points fit exactly but leave no degrees of freedom
        assert_eq!(steyx(&[1.0, 2.0], &[1.0, 2.0]), None);
        // Non-finite data
        assert_eq!(slope(&[1.0, f64::NAN], &[1.0, 2.0]), None);
        assert_eq!(forecast(f64::INFINITY, &YS, &XS), None);
    }

    proptest! {
        #[test]
        fn points_on_a_line_are_recovered(
            a in -1000i32..1000,
            b in -1000i32..1000,
            n in 3usize..12,
        ) {
            let xs: Vec<f64> = (0..n).map(|i| i as f64).collect();
            let ys: Vec<f64> = xs.iter().map(|x| a as f64 * x + b as f64).collect();
            let tol = 1e-6 * (1.0 + a.abs() as f64 + b.abs() as f64);

            prop_assert!((slope(&ys, &xs).unwrap() - a as f64).abs() < tol);
            prop_assert!((intercept(&ys, &xs).unwrap() - b as f64).abs() < tol);
            prop_assert!(steyx(&ys, &xs).unwrap() < tol);
            let predicted = forecast(n as f64, &ys, &xs).unwrap();
            prop_assert!((predicted - (a as f64 * n as f64 + b as f64)).abs() < tol * n as f64);
        }
    }
}
