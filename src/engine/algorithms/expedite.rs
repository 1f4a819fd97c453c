// ==========================================
// 供应链计划引擎 - 概率加急
// ==========================================
// 职责: 在加急档位间比较按期到达概率与溢价，选效用最高的档位
// 效用: w(关键度)·成功率·Φ((剩余天数 − 交期)/σ) − 溢价·价格敏感度
// ==========================================

use crate::config::{AlgorithmsConfig, ExpediteTier};
use crate::domain::money::{extend, money_from_f64};
use crate::domain::types::Criticality;
use crate::stats::normal_cdf;

use super::base::{
    AlgorithmError, AlgorithmInput, AlgorithmOutput, AlgorithmType, AlternativeConsidered,
    SourcingAlgorithm,
};

/// 交期标准差下限（天）
const MIN_LEAD_TIME_STD: f64 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct TierEvaluation {
    pub label: String,
    pub on_time_probability: f64,
    pub utility: f64,
    pub premium_pct: f64,
    pub lead_time_days: f64,
}

#[derive(Debug, Clone)]
pub struct ExpediteProbabilityAlgorithm {
    tiers: Vec<ExpediteTier>,
}

impl Default for ExpediteProbabilityAlgorithm {
    fn default() -> Self {
        Self::new(&AlgorithmsConfig::default())
    }
}

impl ExpediteProbabilityAlgorithm {
    pub fn new(config: &AlgorithmsConfig) -> Self {
        Self {
            tiers: config.expedite_tiers.clone(),
        }
    }

    fn urgency_weight(criticality: Criticality) -> f64 {
        match criticality {
            Criticality::Critical => 1.0,
            Criticality::High => 0.85,
            Criticality::Medium => 0.7,
            Criticality::Low => 0.4,
        }
    }

    fn price_sensitivity(criticality: Criticality) -> f64 {
        match criticality {
            Criticality::Critical => 0.2,
            Criticality::High => 0.5,
            Criticality::Medium => 1.0,
            Criticality::Low => 2.0,
        }
    }

    pub fn evaluate(&self, days_available: f64, criticality: Criticality) -> Vec<TierEvaluation> {
        let weight = Self::urgency_weight(criticality);
        let sensitivity = Self::price_sensitivity(criticality);
        self.tiers
            .iter()
            .map(|tier| {
                let std = tier.lead_time_std_days.max(MIN_LEAD_TIME_STD);
                let p_on_time =
                    tier.success_probability * normal_cdf((days_available - tier.lead_time_days) / std);
                TierEvaluation {
                    label: tier.label.clone(),
                    on_time_probability: p_on_time,
                    utility: weight * p_on_time - tier.premium_pct * sensitivity,
                    premium_pct: tier.premium_pct,
                    lead_time_days: tier.lead_time_days,
                }
            })
            .collect()
    }
}

impl SourcingAlgorithm for ExpediteProbabilityAlgorithm {
    fn algorithm_type(&self) -> AlgorithmType {
        AlgorithmType::ExpediteProbability
    }

    fn strategy(&self) -> &'static str {
        "按期概率 × 溢价效用比较"
    }

    fn validate_input(&self, input: &AlgorithmInput) -> Result<(), AlgorithmError> {
        input.check_common()?;
        if self.tiers.is_empty() {
            return Err(AlgorithmError::InvalidInput("未配置加急档位".to_string()));
        }
        Ok(())
    }

    fn execute(&self, input: &AlgorithmInput) -> Result<AlgorithmOutput, AlgorithmError> {
        let days = input.days_to_deadline();
        let evaluations = self.evaluate(days, input.criticality);
        let best = evaluations
            .iter()
            .max_by(|a, b| a.utility.total_cmp(&b.utility))
            .cloned()
            .ok_or_else(|| AlgorithmError::Computation("加急档位评估为空".to_string()))?;

        let pressure = (best.lead_time_days / days.max(MIN_LEAD_TIME_STD)).min(1.0);
        let confidence = 0.5 * best.on_time_probability
            + 0.3 * Self::urgency_weight(input.criticality)
            + 0.2 * (1.0 - pressure);

        let unit_cost = input.reference_unit_cost * money_from_f64(1.0 + best.premium_pct);
        let mut output = AlgorithmOutput::completed(
            self.algorithm_type(),
            &input.item_id,
            format!("EXPEDITE_{}", best.label),
        );
        output.proposed_quantity = input.demand_quantity;
        output.estimated_cost = extend(unit_cost, input.demand_quantity);
        output.estimated_lead_time_days = best.lead_time_days;
        output.confidence = confidence;
        output.reasoning = format!(
            "剩余 {:.0} 天，档位 {} 按期概率 {:.1}%，溢价 {:.0}%，效用 {:.3}",
            days,
            best.label,
            best.on_time_probability * 100.0,
            best.premium_pct * 100.0,
            best.utility
        );
        output.alternatives_considered = evaluations
            .iter()
            .map(|e| AlternativeConsidered {
                label: format!("EXPEDITE_{}", e.label),
                quantity: input.demand_quantity,
                score: e.utility,
            })
            .collect();
        Ok(output)
    }
}
