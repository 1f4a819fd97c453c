// ==========================================
// 供应链计划引擎 - 金额类型
// ==========================================
// 职责: 金额统一使用定点小数 (rust_decimal)
// 约定: 数量 (qty) 仍为 f64，金额与数量相乘时在此模块完成换算
// ==========================================

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

/// 金额类型
pub type Money = Decimal;

/// 金额保留小数位
pub const MONEY_SCALE: u32 = 4;

/// f64 → 金额（NaN/无穷返回 0）
pub fn money_from_f64(value: f64) -> Money {
    Decimal::from_f64(value)
        .unwrap_or(Decimal::ZERO)
        .round_dp(MONEY_SCALE)
}

/// 金额 → f64（仅用于评分/求解等浮点计算）
pub fn money_to_f64(value: Money) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// 单价 × 数量
pub fn extend(unit_price: Money, quantity: f64) -> Money {
    (unit_price * money_from_f64(quantity)).round_dp(MONEY_SCALE)
}

/// 金额占比（百分比，total 为 0 时返回 0）
pub fn share_pct(part: Money, total: Money) -> f64 {
    if total.is_zero() {
        return 0.0;
    }
    money_to_f64(part / total * Decimal::ONE_HUNDRED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extend_is_exact_for_decimal_prices() {
        let unit = Decimal::new(1, 1); // 0.1
        let mut total = Decimal::ZERO;
        for _ in 0..1000 {
            total += extend(unit, 1.0);
        }
        assert_eq!(total, Decimal::from(100));
    }

    #[test]
    fn test_money_from_non_finite() {
        assert_eq!(money_from_f64(f64::NAN), Decimal::ZERO);
        assert_eq!(money_from_f64(12.5), Decimal::new(125, 1));
    }

    #[test]
    fn test_share_pct() {
        assert_eq!(share_pct(Decimal::from(25), Decimal::from(100)), 25.0);
        assert_eq!(share_pct(Decimal::from(25), Decimal::ZERO), 0.0);
    }
}
