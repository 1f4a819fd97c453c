// ==========================================
// 供应链计划引擎 - CTE 评分模型
// ==========================================
// 职责: 成本拆分、交期风险、质量风险、归一化分数、CTE 结果
// 约定: 所有分数 value ∈ [0,1]，越大越好
// ==========================================

use crate::config::planner_config::check_weights;
use crate::config::{CriticalityRule, ScoringConfig};
use crate::domain::money::{money_to_f64, Money};
use crate::domain::sourcing::SourcingOption;
use crate::domain::types::{AbcClass, Criticality, SourcingPathType};
use crate::error::PlannerResult;
use crate::stats::{inverse_normal_cdf, normal_cdf};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// ScoringDimension - 评分维度
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScoringDimension {
    Cost,
    Time,
    Risk,
    Quality,
    Availability,
    Integrated,
}

impl fmt::Display for ScoringDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScoringDimension::Cost => "COST",
            ScoringDimension::Time => "TIME",
            ScoringDimension::Risk => "RISK",
            ScoringDimension::Quality => "QUALITY",
            ScoringDimension::Availability => "AVAILABILITY",
            ScoringDimension::Integrated => "INTEGRATED",
        };
        write!(f, "{}", s)
    }
}

// ==========================================
// CostBreakdown - 单位成本拆分
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub unit_cost: Money,
    #[serde(default)]
    pub transportation_cost: Money,
    #[serde(default)]
    pub customs_duty: Money,
    #[serde(default)]
    pub handling_cost: Money,
}

impl CostBreakdown {
    pub fn from_option(option: &SourcingOption) -> Self {
        Self {
            unit_cost: option.unit_cost,
            transportation_cost: option.transportation_cost,
            customs_duty: option.customs_duty,
            handling_cost: option.handling_cost,
        }
    }

    pub fn total_cost_per_unit(&self) -> Money {
        self.unit_cost + self.transportation_cost + self.customs_duty + self.handling_cost
    }

    /// (单价 + 运费 + 关税) / 总成本
    pub fn total_cost_ratio(&self) -> f64 {
        let total = money_to_f64(self.total_cost_per_unit()).max(0.01);
        money_to_f64(self.unit_cost + self.transportation_cost + self.customs_duty) / total
    }
}

// ==========================================
// TimeRiskAssessment - 交期风险
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeRiskAssessment {
    pub lead_time_mean: f64,
    pub lead_time_std: f64,
    #[serde(default)]
    pub lead_time_p95: Option<f64>,
    pub on_time_percentage: f64,
}

impl TimeRiskAssessment {
    pub fn from_option(option: &SourcingOption) -> Self {
        Self {
            lead_time_mean: option.lead_time_days_mean,
            lead_time_std: option.lead_time_days_std,
            lead_time_p95: option.lead_time_days_p95,
            on_time_percentage: option.on_time_percentage,
        }
    }

    /// P(交付 ≤ 需求日) = Φ((可用天数 − μ) / max(σ, 下限))
    pub fn probability_on_time(&self, days_available: f64, min_std: f64) -> f64 {
        let z = (days_available - self.lead_time_mean) / self.lead_time_std.max(min_std);
        normal_cdf(z)
    }

    /// 达到目标服务水平所需交期
    pub fn service_level_lead_time(&self, service_level: f64, min_std: f64) -> f64 {
        self.lead_time_mean + inverse_normal_cdf(service_level) * self.lead_time_std.max(min_std)
    }

    /// 变异指数 min(σ/μ, 1)
    pub fn variability_index(&self) -> f64 {
        if self.lead_time_mean <= 0.0 {
            return 0.0;
        }
        (self.lead_time_std / self.lead_time_mean).min(1.0)
    }

    /// 交付可靠度 = 准时率 × (1 − 变异指数)
    pub fn delivery_reliability(&self) -> f64 {
        self.on_time_percentage * (1.0 - self.variability_index())
    }
}

// ==========================================
// QualityRiskAssessment - 质量风险
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityRiskAssessment {
    pub quality_acceptance_rate: f64,
    pub availability_percentage: f64,
    #[serde(default)]
    pub reliability_score: Option<f64>, // 历史可靠度（可选）
}

impl QualityRiskAssessment {
    pub fn from_option(option: &SourcingOption) -> Self {
        Self {
            quality_acceptance_rate: option.quality_acceptance_rate,
            availability_percentage: option.availability_percentage,
            reliability_score: None,
        }
    }

    pub fn quality_risk(&self) -> f64 {
        1.0 - self.quality_acceptance_rate
    }

    /// 合格率 × 可用率 × (历史可靠度)
    pub fn integrated_reliability(&self) -> f64 {
        let base = self.quality_acceptance_rate * self.availability_percentage;
        match self.reliability_score {
            Some(r) => base * r,
            None => base,
        }
    }
}

// ==========================================
// ScoreBand / NormalizedScore
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScoreBand {
    Excellent, // ≥ 0.8
    Good,      // [0.6, 0.8)
    Acceptable, // [0.4, 0.6)
    Poor,      // < 0.4
}

impl ScoreBand {
    pub fn of(value: f64) -> Self {
        if value >= 0.8 {
            ScoreBand::Excellent
        } else if value >= 0.6 {
            ScoreBand::Good
        } else if value >= 0.4 {
            ScoreBand::Acceptable
        } else {
            ScoreBand::Poor
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedScore {
    pub dimension: ScoringDimension,
    pub value: f64,     // 0-1
    pub raw_value: f64, // 归一化前的原始值
    #[serde(default)]
    pub percentile: f64,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

impl NormalizedScore {
    pub fn new(dimension: ScoringDimension, value: f64, raw_value: f64) -> Self {
        Self {
            dimension,
            value: value.clamp(0.0, 1.0),
            raw_value,
            percentile: 0.0,
            confidence: 1.0,
        }
    }

    pub fn band(&self) -> ScoreBand {
        ScoreBand::of(self.value)
    }
}

// ==========================================
// ScoreWeights - CTE 权重
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub cost: f64,
    pub time: f64,
    pub risk: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            cost: 0.4,
            time: 0.3,
            risk: 0.3,
        }
    }
}

impl ScoreWeights {
    /// 创建权重（非负且和为 1）
    pub fn new(cost: f64, time: f64, risk: f64) -> PlannerResult<Self> {
        let weights = Self { cost, time, risk };
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> PlannerResult<()> {
        check_weights(self.cost, self.time, self.risk)
    }

    pub fn from_config(config: &ScoringConfig) -> Self {
        Self {
            cost: config.weight_cost,
            time: config.weight_time,
            risk: config.weight_risk,
        }
    }

    pub fn from_rule(rule: &CriticalityRule) -> Self {
        Self {
            cost: rule.weight_cost,
            time: rule.weight_time,
            risk: rule.weight_risk,
        }
    }
}

// ==========================================
// CteScore - 成本/交期/风险综合评分
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CteScore {
    pub option_id: String,
    pub item_id: String,

    // ===== 分项 =====
    pub cost_score: NormalizedScore,
    pub time_score: NormalizedScore, // raw = P(准时)
    pub risk_score: NormalizedScore, // raw = 综合可靠度

    // ===== 综合 =====
    pub cte_value: f64, // 0-1，越大越好
    pub weights: ScoreWeights,

    // ===== 元数据 =====
    #[serde(default)]
    pub sourcing_path: Option<SourcingPathType>,
    #[serde(default)]
    pub supplier_id: Option<String>,
}

impl CteScore {
    pub fn weighted_cost(&self) -> f64 {
        self.cost_score.value * self.weights.cost
    }

    pub fn weighted_time(&self) -> f64 {
        self.time_score.value * self.weights.time
    }

    pub fn weighted_risk(&self) -> f64 {
        self.risk_score.value * self.weights.risk
    }

    pub fn band(&self) -> ScoreBand {
        ScoreBand::of(self.cte_value)
    }

    /// 单行分析摘要
    pub fn analysis_summary(&self) -> String {
        format!(
            "{} CTE={:.3} | cost {:.3} ({:.3}, {:.2}/u) | time {:.3} ({:.3}, P={:.1}%) | risk {:.3} ({:.3}, R={:.1}%)",
            self.option_id,
            self.cte_value,
            self.weighted_cost(),
            self.cost_score.value,
            self.cost_score.raw_value,
            self.weighted_time(),
            self.time_score.value,
            self.time_score.raw_value * 100.0,
            self.weighted_risk(),
            self.risk_score.value,
            self.risk_score.raw_value * 100.0,
        )
    }
}

// ==========================================
// ScoringContext - 评分上下文
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringContext {
    pub required_date: NaiveDate,
    pub as_of: NaiveDate,
    pub criticality: Criticality,
    pub abc_class: AbcClass,
    pub demand_quantity: f64,
    pub target_service_level: f64,
    pub cost_penalty_multiplier: f64, // 紧急时成本分除以该系数（> 1 生效）
}

impl ScoringContext {
    pub fn new(required_date: NaiveDate, as_of: NaiveDate, criticality: Criticality) -> Self {
        Self {
            required_date,
            as_of,
            criticality,
            abc_class: AbcClass::B,
            demand_quantity: 1.0,
            target_service_level: 0.95,
            cost_penalty_multiplier: 1.0,
        }
    }

    pub fn days_to_deadline(&self) -> f64 {
        (self.required_date - self.as_of).num_days() as f64
    }

    pub fn is_urgent(&self, threshold_days: f64) -> bool {
        self.days_to_deadline() <= threshold_days
    }

    pub fn is_critical(&self) -> bool {
        self.criticality.is_critical()
    }
}
