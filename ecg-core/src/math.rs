//! Small numeric primitives shared across the Digitization Core and the
//! Clinical Signal Analyzers. Kept dependency-free and allocation-light —
//! every stage in this pipeline is synchronous and CPU-bound (spec.md §5).

pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

pub fn median(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<f64> = xs.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

pub fn stdev(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    let variance = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (xs.len() - 1) as f64;
    variance.sqrt()
}

/// Coefficient of variation: stdev / |mean|.
pub fn coefficient_of_variation(xs: &[f64]) -> f64 {
    let m = mean(xs);
    if m.abs() < 1e-12 {
        return 0.0;
    }
    stdev(xs) / m.abs()
}

/// Pearson correlation coefficient between two equal-length series.
pub fn pearson_correlation(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.len() < 2 {
        return 0.0;
    }
    let ma = mean(a);
    let mb = mean(b);
    let mut num = 0.0;
    let mut da = 0.0;
    let mut db = 0.0;
    for i in 0..a.len() {
        let xa = a[i] - ma;
        let xb = b[i] - mb;
        num += xa * xb;
        da += xa * xa;
        db += xb * xb;
    }
    if da <= 0.0 || db <= 0.0 {
        return 0.0;
    }
    num / (da.sqrt() * db.sqrt())
}

pub fn mean_absolute_error(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return f64::INFINITY;
    }
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum::<f64>() / a.len() as f64
}

/// Simple moving average with the given odd-biased window, edge-clamped.
pub fn moving_average(xs: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    let half = window / 2;
    (0..xs.len())
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + half + 1).min(xs.len());
            mean(&xs[start..end])
        })
        .collect()
}

/// Linear interpolation of `y` at `time`, given parallel time/value arrays
/// sorted ascending by time. Clamps outside the series' range.
pub fn linear_interp(times: &[f64], values: &[f64], time: f64) -> f64 {
    if times.is_empty() {
        return 0.0;
    }
    if time <= times[0] {
        return values[0];
    }
    if time >= *times.last().unwrap() {
        return *values.last().unwrap();
    }
    let idx = match times.binary_search_by(|t| t.partial_cmp(&time).unwrap()) {
        Ok(i) => return values[i],
        Err(i) => i,
    };
    let (t0, t1) = (times[idx - 1], times[idx]);
    let (v0, v1) = (values[idx - 1], values[idx]);
    let frac = (time - t0) / (t1 - t0);
    v0 + (v1 - v0) * frac
}

/// Catmull-Rom spline interpolation through 4 control points at parameter
/// t in [0,1] between p1 and p2.
pub fn catmull_rom(p0: f64, p1: f64, p2: f64, p3: f64, t: f64) -> f64 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((2.0 * p1)
        + (-p0 + p2) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t3)
}

/// Find the lag (in samples) of the strongest autocorrelation peak within
/// `[min_lag, max_lag]`, used both for grid-spacing recovery (local-CV
/// fallback) and beat-period estimation. Returns `None` if the series is
/// too short or flat.
pub fn autocorrelation_peak(series: &[f64], min_lag: usize, max_lag: usize) -> Option<(usize, f64)> {
    if series.len() < max_lag + 1 || min_lag >= max_lag {
        return None;
    }
    let m = mean(series);
    let centered: Vec<f64> = series.iter().map(|v| v - m).collect();
    let mut best_lag = None;
    let mut best_score = f64::NEG_INFINITY;
    for lag in min_lag..=max_lag {
        let count = centered.len() - lag;
        if count == 0 {
            continue;
        }
        let mut score = 0.0;
        for i in 0..count {
            score += centered[i] * centered[i + lag];
        }
        score /= count as f64;
        if score > best_score {
            best_score = score;
            best_lag = Some(lag);
        }
    }
    best_lag.map(|lag| (lag, best_score))
}

/// Five-point central-difference derivative, edge-clamped by repeating the
/// nearest interior value.
pub fn central_difference(xs: &[f64]) -> Vec<f64> {
    let n = xs.len();
    if n < 5 {
        return vec![0.0; n];
    }
    let mut d = vec![0.0; n];
    for i in 2..n - 2 {
        d[i] = (-xs[i + 2] + 8.0 * xs[i + 1] - 8.0 * xs[i - 1] + xs[i - 2]) / 12.0;
    }
    d[0] = d[2];
    d[1] = d[2];
    d[n - 1] = d[n - 3];
    d[n - 2] = d[n - 3];
    d
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_odd_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[1.0, 2.0, 3.0, 4.0]), 2.5);
    }

    #[test]
    fn perfect_correlation() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [2.0, 4.0, 6.0, 8.0, 10.0];
        assert!((pearson_correlation(&a, &b) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn linear_interp_clamps() {
        let t = [0.0, 1.0, 2.0];
        let v = [0.0, 10.0, 20.0];
        assert_eq!(linear_interp(&t, &v, -1.0), 0.0);
        assert_eq!(linear_interp(&t, &v, 3.0), 20.0);
        assert_eq!(linear_interp(&t, &v, 0.5), 5.0);
    }

    #[test]
    fn autocorrelation_finds_known_period() {
        let series: Vec<f64> = (0..200).map(|i| (i as f64 * std::f64::consts::PI / 10.0).sin()).collect();
        let (lag, _) = autocorrelation_peak(&series, 5, 40).unwrap();
        assert_eq!(lag, 20);
    }
}
