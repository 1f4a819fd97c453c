// ==========================================
// 供应链计划引擎 - 边际成本释放预留
// ==========================================
// 职责: 比较当前需求与预留持有方的缺料边际成本，决定是否释放
// 规则: 只考虑关键度低于当前需求的持有方
// ==========================================

use crate::config::AlgorithmsConfig;
use crate::domain::money::{extend, money_from_f64, money_to_f64, Money};
use crate::domain::types::Criticality;
use rust_decimal::Decimal;

use super::base::{
    AlgorithmError, AlgorithmInput, AlgorithmOutput, AlgorithmType, AlternativeConsidered,
    Reservation, SourcingAlgorithm,
};

/// 缺料边际成本系数（相对基准单价）
pub fn marginal_cost_factor(criticality: Criticality) -> f64 {
    match criticality {
        Criticality::Critical => 1.5,
        Criticality::High => 1.25,
        Criticality::Medium => 1.1,
        Criticality::Low => 1.0,
    }
}

#[derive(Debug, Clone)]
pub struct ReleaseMarginalCostAlgorithm {
    full_saving: f64,
    partial_saving: f64,
    partial_reserved_share: f64,
    partial_demand_share: f64,
}

impl ReleaseMarginalCostAlgorithm {
    pub fn new(config: &AlgorithmsConfig) -> Self {
        Self {
            full_saving: config.release_full_saving,
            partial_saving: config.release_partial_saving,
            partial_reserved_share: config.release_partial_reserved_share,
            partial_demand_share: config.release_partial_demand_share,
        }
    }

    /// 释放节省率（替代单价与持有单价相同时）
    pub fn saving_ratio(requester: Criticality, holder: Criticality) -> f64 {
        Self::saving_ratio_with_costs(1.0, 1.0, requester, holder)
    }

    /// 释放节省率 = (保留成本 − 释放成本) / 保留成本
    ///
    /// # 规则
    /// - 保留成本: 需求方改走替代路径的单价 × 需求方系数
    /// - 释放成本: 持有方按基准单价补货 × 持有方系数
    /// - 单价缺失（≤ 0）时只比较关键度系数
    pub fn saving_ratio_with_costs(
        alternative_unit_cost: f64,
        holding_unit_cost: f64,
        requester: Criticality,
        holder: Criticality,
    ) -> f64 {
        let (alt, hold) = if alternative_unit_cost > 0.0 && holding_unit_cost > 0.0 {
            (alternative_unit_cost, holding_unit_cost)
        } else {
            (1.0, 1.0)
        };
        let keep = alt * marginal_cost_factor(requester);
        (keep - hold * marginal_cost_factor(holder)) / keep
    }
}

impl Default for ReleaseMarginalCostAlgorithm {
    fn default() -> Self {
        Self::new(&AlgorithmsConfig::default())
    }
}

impl SourcingAlgorithm for ReleaseMarginalCostAlgorithm {
    fn algorithm_type(&self) -> AlgorithmType {
        AlgorithmType::ReleaseMarginal
    }

    fn strategy(&self) -> &'static str {
        "缺料边际成本比较"
    }

    fn validate_input(&self, input: &AlgorithmInput) -> Result<(), AlgorithmError> {
        input.check_common()
    }

    fn execute(&self, input: &AlgorithmInput) -> Result<AlgorithmOutput, AlgorithmError> {
        let stock = input.total_local_stock();
        let reservations = &input.context.reservations;

        if stock <= 0.0 || reservations.is_empty() {
            let mut output =
                AlgorithmOutput::completed(self.algorithm_type(), &input.item_id, "RELEASE_NONE");
            output.confidence = 0.0;
            output.reasoning = "无库存或无可释放预留".to_string();
            return Ok(output);
        }

        let holding = money_to_f64(input.reference_unit_cost);
        let alternative = input
            .context
            .alternative_unit_cost
            .map(money_to_f64)
            .unwrap_or(holding);

        // 关键度低于当前需求的预留
        let candidates: Vec<(&Reservation, f64)> = reservations
            .iter()
            .filter(|r| r.holder_criticality.rank() > input.criticality.rank() && r.quantity > 0.0)
            .map(|r| {
                let saving = Self::saving_ratio_with_costs(
                    alternative,
                    holding,
                    input.criticality,
                    r.holder_criticality,
                );
                (r, saving)
            })
            .collect();

        let best_saving = candidates.iter().map(|(_, s)| *s).fold(0.0_f64, f64::max);

        let (label, quantity) = if best_saving >= self.full_saving {
            let releasable: f64 = candidates
                .iter()
                .filter(|(_, s)| *s >= self.full_saving)
                .map(|(r, _)| r.quantity)
                .sum();
            ("RELEASE_FULL", input.demand_quantity.min(releasable).min(stock))
        } else if best_saving >= self.partial_saving {
            let reserved: f64 = candidates
                .iter()
                .filter(|(_, s)| *s >= self.partial_saving)
                .map(|(r, _)| r.quantity)
                .sum();
            let qty = (reserved * self.partial_reserved_share)
                .min(input.demand_quantity * self.partial_demand_share)
                .min(stock);
            ("RELEASE_PARTIAL", qty)
        } else {
            ("RELEASE_NONE", 0.0)
        };

        // 补偿成本按持有方的边际成本计
        let holder_factor = candidates
            .iter()
            .filter(|(_, s)| (*s - best_saving).abs() < f64::EPSILON)
            .map(|(r, _)| marginal_cost_factor(r.holder_criticality))
            .next()
            .unwrap_or(1.0);
        let unit_cost: Money = input.reference_unit_cost * money_from_f64(holder_factor);
        let estimated_cost = if quantity > 0.0 {
            extend(unit_cost, quantity)
        } else {
            Decimal::ZERO
        };

        let coverage = (quantity / input.demand_quantity).min(1.0);
        let mut output = AlgorithmOutput::completed(self.algorithm_type(), &input.item_id, label);
        output.proposed_quantity = quantity;
        output.estimated_cost = estimated_cost;
        output.estimated_lead_time_days = 0.0;
        output.confidence = if quantity > 0.0 {
            0.5 * (best_saving / self.full_saving.max(0.01)).min(1.0) + 0.5 * coverage
        } else {
            0.0
        };
        output.reasoning = format!(
            "候选预留 {} 条，最大节省率 {:.1}%，建议释放 {:.2}",
            candidates.len(),
            best_saving * 100.0,
            quantity
        );
        output.alternatives_considered = candidates
            .iter()
            .map(|(r, s)| AlternativeConsidered {
                label: format!("RESERVATION:{}", r.reservation_id),
                quantity: r.quantity,
                score: *s,
            })
            .collect();
        Ok(output)
    }
}
