// ==========================================
// 供应链计划引擎 - 统计工具
// ==========================================
// 职责: 标准正态分布 CDF / 逆 CDF、描述性统计
// 说明: 逆 CDF 使用 Abramowitz-Stegun 26.2.23 有理逼近
// ==========================================

/// 标准正态分布累积分布函数 Φ(z)
pub fn normal_cdf(z: f64) -> f64 {
    if z.is_nan() {
        return 0.5;
    }
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

/// 误差函数（Abramowitz-Stegun 7.1.26，最大误差 1.5e-7）
fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();
    sign * y
}

/// 标准正态分布逆 CDF（分位点函数）
///
/// # 规则
/// - p ≤ 0 返回 -5.0，p ≥ 1 返回 5.0（截断在 ±5σ）
pub fn inverse_normal_cdf(p: f64) -> f64 {
    if p.is_nan() {
        return 0.0;
    }
    if p >= 1.0 {
        return 5.0;
    }
    if p <= 0.0 {
        return -5.0;
    }
    if (p - 0.5).abs() < f64::EPSILON {
        return 0.0;
    }

    // 逼近公式对 0 < q ≤ 0.5 成立，p > 0.5 时对称取负
    let q = if p < 0.5 { p } else { 1.0 - p };
    let t = (-2.0 * q.ln()).sqrt();

    let c0 = 2.515517;
    let c1 = 0.802853;
    let c2 = 0.010328;
    let d1 = 1.432788;
    let d2 = 0.189269;
    let d3 = 0.001308;

    let z = t - (c0 + c1 * t + c2 * t * t) / (1.0 + d1 * t + d2 * t * t + d3 * t * t * t);
    if p < 0.5 {
        -z
    } else {
        z
    }
}

// ==========================================
// 描述性统计
// ==========================================

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// 样本标准差（n-1），少于 2 个样本返回 0
pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sorted = sorted_copy(values);
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// 最近秩百分位：sorted[floor(fraction * n)]，下标截断到 n-1
pub fn percentile(values: &[f64], fraction: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sorted = sorted_copy(values);
    let idx = ((fraction.clamp(0.0, 1.0) * sorted.len() as f64) as usize).min(sorted.len() - 1);
    sorted[idx]
}

fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_cdf_reference_points() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-7);
        assert!((normal_cdf(1.0) - 0.841_344_7).abs() < 1e-5);
        assert!((normal_cdf(-1.96) - 0.024_997_9).abs() < 1e-5);
        assert!(normal_cdf(8.0) <= 1.0);
        assert!(normal_cdf(-8.0) >= 0.0);
    }

    #[test]
    fn test_inverse_normal_cdf_round_trip_band() {
        // 逼近误差 < 4.5e-4
        assert!((inverse_normal_cdf(0.95) - 1.644_85).abs() < 5e-3);
        assert!((inverse_normal_cdf(0.05) + 1.644_85).abs() < 5e-3);
        assert_eq!(inverse_normal_cdf(0.5), 0.0);
        assert_eq!(inverse_normal_cdf(1.0), 5.0);
        assert_eq!(inverse_normal_cdf(0.0), -5.0);
    }

    #[test]
    fn test_descriptive_statistics() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(mean(&values), 2.5);
        assert_eq!(median(&values), 2.5);
        assert_eq!(percentile(&values, 0.25), 2.0);
        assert_eq!(percentile(&values, 0.95), 4.0);
        assert!((sample_std_dev(&values) - 1.290_994).abs() < 1e-5);
        assert_eq!(mean(&[]), 0.0);
    }
}
