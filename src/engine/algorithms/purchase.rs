// ==========================================
// 供应链计划引擎 - 多准则采购
// ==========================================
// 职责: 按关键度加权 价格/交期/质量 选择供应商报价
// 约束: 数量按 MOQ 取整，超预算时按预算截断
// ==========================================

use crate::domain::money::{money_from_f64, money_to_f64};
use crate::domain::types::Criticality;
use tracing::debug;

use super::base::{
    AlgorithmError, AlgorithmInput, AlgorithmOutput, AlgorithmType, AlternativeConsidered,
    SourcingAlgorithm, SupplierQuote,
};

/// 交期下限（天），避免除零
const MIN_LEAD_TIME_DAYS: f64 = 0.1;

/// (价格, 交期, 质量) 权重
pub fn criteria_weights(criticality: Criticality) -> (f64, f64, f64) {
    match criticality {
        Criticality::Critical => (0.2, 0.4, 0.4),
        Criticality::High => (0.3, 0.35, 0.35),
        Criticality::Medium => (0.4, 0.3, 0.3),
        Criticality::Low => (0.6, 0.2, 0.2),
    }
}

#[derive(Debug, Clone, Default)]
pub struct PurchaseMulticriterionAlgorithm;

impl PurchaseMulticriterionAlgorithm {
    pub fn new() -> Self {
        Self
    }

    /// 报价得分: 价格与交期按最优值相对化，质量取原值
    pub fn score_quotes(quotes: &[&SupplierQuote], criticality: Criticality) -> Vec<f64> {
        let min_price = quotes
            .iter()
            .map(|q| q.unit_price)
            .filter(|p| *p > 0.0)
            .fold(f64::INFINITY, f64::min);
        let min_lead = quotes
            .iter()
            .map(|q| q.lead_time_days.max(MIN_LEAD_TIME_DAYS))
            .fold(f64::INFINITY, f64::min);
        let (wp, wl, wq) = criteria_weights(criticality);

        quotes
            .iter()
            .map(|q| {
                let price_score = if q.unit_price > 0.0 && min_price.is_finite() {
                    min_price / q.unit_price
                } else {
                    1.0
                };
                let lead_score = min_lead / q.lead_time_days.max(MIN_LEAD_TIME_DAYS);
                wp * price_score + wl * lead_score + wq * q.quality_rating.clamp(0.0, 1.0)
            })
            .collect()
    }

    /// 按 MOQ 向上取整
    pub fn order_quantity(demand: f64, moq: f64) -> f64 {
        if moq <= 0.0 {
            return demand;
        }
        (demand / moq).ceil() * moq
    }
}

impl SourcingAlgorithm for PurchaseMulticriterionAlgorithm {
    fn algorithm_type(&self) -> AlgorithmType {
        AlgorithmType::PurchaseMulticriterion
    }

    fn strategy(&self) -> &'static str {
        "关键度加权多准则评分"
    }

    fn validate_input(&self, input: &AlgorithmInput) -> Result<(), AlgorithmError> {
        input.check_common()?;
        if input.context.supplier_quotes.is_empty() {
            return Err(AlgorithmError::InvalidInput(format!(
                "物料 {} 无供应商报价",
                input.item_id
            )));
        }
        if let Some(budget) = input.budget {
            if money_to_f64(budget) <= 0.0 {
                return Err(AlgorithmError::InvalidInput("采购预算必须 > 0".to_string()));
            }
        }
        Ok(())
    }

    fn execute(&self, input: &AlgorithmInput) -> Result<AlgorithmOutput, AlgorithmError> {
        let days = input.days_to_deadline();
        let all: Vec<&SupplierQuote> = input.context.supplier_quotes.iter().collect();

        // 优先按期报价，全部超期时退回全集
        let on_time: Vec<&SupplierQuote> = all
            .iter()
            .copied()
            .filter(|q| q.lead_time_days <= days)
            .collect();
        let all_late = on_time.is_empty();
        let pool = if all_late { all } else { on_time };

        let scores = Self::score_quotes(&pool, input.criticality);
        let (best_idx, best_score) = scores
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .ok_or_else(|| AlgorithmError::Computation("报价评分为空".to_string()))?;
        let best = pool[best_idx];

        let mut quantity = Self::order_quantity(input.demand_quantity, best.minimum_order_quantity);
        let mut capped = false;
        if let Some(budget) = input.budget {
            let budget = money_to_f64(budget);
            if best.unit_price > 0.0 && quantity * best.unit_price > budget {
                quantity = (budget / best.unit_price).floor();
                capped = true;
            }
        }
        debug!(item_id = %input.item_id, supplier = %best.supplier_id, quantity, capped, "采购报价选定");

        let mut output = if quantity > 0.0 {
            AlgorithmOutput::completed(
                self.algorithm_type(),
                &input.item_id,
                format!("PURCHASE:{}", best.supplier_id),
            )
        } else {
            AlgorithmOutput::completed(self.algorithm_type(), &input.item_id, "PURCHASE_NONE")
        };
        output.proposed_quantity = quantity.max(0.0);
        output.estimated_cost = money_from_f64(quantity.max(0.0) * best.unit_price);
        output.estimated_lead_time_days = best.lead_time_days;
        output.confidence = if all_late { best_score * 0.5 } else { best_score };
        output.reasoning = format!(
            "{} 个报价中选定 {}，单价 {:.2}，交期 {:.1} 天，质量 {:.2}{}{}",
            pool.len(),
            best.supplier_id,
            best.unit_price,
            best.lead_time_days,
            best.quality_rating,
            if all_late { "，全部报价超期" } else { "" },
            if capped { "，数量受预算截断" } else { "" }
        );
        output.alternatives_considered = pool
            .iter()
            .zip(scores.iter())
            .map(|(q, s)| AlternativeConsidered {
                label: format!("PURCHASE:{}", q.supplier_id),
                quantity: Self::order_quantity(input.demand_quantity, q.minimum_order_quantity),
                score: *s,
            })
            .collect();
        Ok(output)
    }
}
