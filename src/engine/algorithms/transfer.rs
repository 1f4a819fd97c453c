// ==========================================
// 供应链计划引擎 - 库位调拨 (TDABC)
// ==========================================
// 职责: 以时间驱动作业成本法估算各来源调拨成本，选最便宜的可行来源
// 成本: (固定分钟 + 单件分钟 × 数量) × 人工费率 + 运输小时 × 运输费率
// ==========================================

use crate::config::AlgorithmsConfig;
use crate::domain::money::{money_from_f64, money_to_f64};
use std::cmp::Ordering;

use super::base::{
    AlgorithmError, AlgorithmInput, AlgorithmOutput, AlgorithmType, AlternativeConsidered,
    SourcingAlgorithm, TransferSource,
};

/// 单来源调拨估算
#[derive(Debug, Clone, PartialEq)]
pub struct TransferQuote {
    pub location_id: String,
    pub quantity: f64,
    pub activity_cost: f64,
    pub transport_cost: f64,
    pub lead_time_days: f64,
    pub reliability: f64,
    pub meets_deadline: bool,
}

impl TransferQuote {
    pub fn total_cost(&self) -> f64 {
        self.activity_cost + self.transport_cost
    }

    pub fn cost_per_unit(&self) -> f64 {
        if self.quantity <= 0.0 {
            return f64::INFINITY;
        }
        self.total_cost() / self.quantity
    }
}

#[derive(Debug, Clone)]
pub struct TransferTdabcAlgorithm {
    labor_rate_per_minute: f64,
    transport_rate_per_hour: f64,
}

impl Default for TransferTdabcAlgorithm {
    fn default() -> Self {
        Self::new(&AlgorithmsConfig::default())
    }
}

impl TransferTdabcAlgorithm {
    pub fn new(config: &AlgorithmsConfig) -> Self {
        Self {
            labor_rate_per_minute: config.transfer_labor_rate_per_minute,
            transport_rate_per_hour: config.transfer_rate_per_hour,
        }
    }

    pub fn quote(&self, source: &TransferSource, demand: f64, days_available: f64) -> TransferQuote {
        let quantity = demand.min(source.available_qty.max(0.0));
        let minutes = source.fixed_minutes + source.handling_minutes_per_unit * quantity;
        TransferQuote {
            location_id: source.location_id.clone(),
            quantity,
            activity_cost: minutes * self.labor_rate_per_minute,
            transport_cost: source.transport_hours * self.transport_rate_per_hour,
            lead_time_days: source.lead_time_days,
            reliability: source.reliability,
            meets_deadline: source.lead_time_days <= days_available,
        }
    }

    /// 选择来源
    ///
    /// # 规则
    /// 1. 只考虑能按期到达且有量的来源
    /// 2. 能全量覆盖的来源优先，其中总成本最低者胜出
    /// 3. 否则取单件成本最低的部分覆盖来源
    pub fn select<'a>(quotes: &'a [TransferQuote], demand: f64) -> Option<&'a TransferQuote> {
        let viable: Vec<&TransferQuote> = quotes
            .iter()
            .filter(|q| q.meets_deadline && q.quantity > 0.0)
            .collect();
        let full = viable
            .iter()
            .copied()
            .filter(|q| q.quantity >= demand)
            .min_by(|a, b| a.total_cost().partial_cmp(&b.total_cost()).unwrap_or(Ordering::Equal));
        full.or_else(|| {
            viable
                .iter()
                .copied()
                .min_by(|a, b| a.cost_per_unit().partial_cmp(&b.cost_per_unit()).unwrap_or(Ordering::Equal))
        })
    }
}

impl SourcingAlgorithm for TransferTdabcAlgorithm {
    fn algorithm_type(&self) -> AlgorithmType {
        AlgorithmType::TransferTdabc
    }

    fn strategy(&self) -> &'static str {
        "时间驱动作业成本法"
    }

    fn validate_input(&self, input: &AlgorithmInput) -> Result<(), AlgorithmError> {
        input.check_common()?;
        if input.context.transfer_sources.is_empty() {
            return Err(AlgorithmError::InvalidInput(format!(
                "物料 {} 无调拨来源数据",
                input.item_id
            )));
        }
        Ok(())
    }

    fn execute(&self, input: &AlgorithmInput) -> Result<AlgorithmOutput, AlgorithmError> {
        let days = input.days_to_deadline();
        let quotes: Vec<TransferQuote> = input
            .context
            .transfer_sources
            .iter()
            .map(|s| self.quote(s, input.demand_quantity, days))
            .collect();

        let alternatives = quotes
            .iter()
            .map(|q| AlternativeConsidered {
                label: format!("TRANSFER:{}", q.location_id),
                quantity: q.quantity,
                score: q.total_cost(),
            })
            .collect();

        let Some(best) = Self::select(&quotes, input.demand_quantity) else {
            let mut output =
                AlgorithmOutput::completed(self.algorithm_type(), &input.item_id, "TRANSFER_NONE");
            output.reasoning = format!("{} 个来源均无法按期调拨", quotes.len());
            output.alternatives_considered = alternatives;
            return Ok(output);
        };

        let reference = money_to_f64(input.reference_unit_cost);
        let cost_component = if reference > 0.0 {
            1.0 - (best.cost_per_unit() / reference).min(1.0)
        } else {
            0.5
        };
        let confidence = 0.5 * best.reliability
            + 0.3 * (1.0 - (best.lead_time_days / 10.0).min(1.0))
            + 0.2 * cost_component;

        let mut output = AlgorithmOutput::completed(
            self.algorithm_type(),
            &input.item_id,
            format!("TRANSFER:{}", best.location_id),
        );
        output.proposed_quantity = best.quantity;
        output.estimated_cost = money_from_f64(best.total_cost());
        output.estimated_lead_time_days = best.lead_time_days;
        output.confidence = confidence;
        output.reasoning = format!(
            "来源 {} 调拨 {:.2}，作业成本 {:.2} + 运输成本 {:.2}，{:.1} 天到达",
            best.location_id,
            best.quantity,
            best.activity_cost,
            best.transport_cost,
            best.lead_time_days
        );
        output.alternatives_considered = alternatives;
        Ok(output)
    }
}
