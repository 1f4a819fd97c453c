// ==========================================
// 供应链计划引擎 - CTE 评分器
// ==========================================
// 成本: 本次运行观测到的单位成本做反向 min-max
// 交期: Φ((可用天数 − μ)/σ)，紧急时取 p^1.5
// 风险: 合格率 × 可用率 × (历史可靠度)
// CTE = w_c·cost + w_t·time + w_r·risk
// ==========================================

use crate::config::ScoringConfig;
use crate::domain::money::money_to_f64;
use crate::domain::sourcing::SourcingOption;
use crate::domain::types::SourcingPathType;
use crate::error::PlannerResult;
use serde::Serialize;
use std::cmp::Ordering;
use tracing::{debug, instrument};

use super::model::{
    CostBreakdown, CteScore, NormalizedScore, QualityRiskAssessment, ScoreBand, ScoreWeights,
    ScoringContext, ScoringDimension, TimeRiskAssessment,
};

// ==========================================
// ScoringReport - 评分报告
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct ScoringReport {
    pub total_scored: usize,
    pub min_cost: Option<f64>,
    pub max_cost: Option<f64>,
    pub band_counts: [usize; 4], // excellent / good / acceptable / poor
    pub top_options: Vec<String>, // 单行摘要
}

// ==========================================
// CteScorer - CTE 评分器
// ==========================================
#[derive(Debug, Clone)]
pub struct CteScorer {
    config: ScoringConfig,
    scored_options: Vec<CteScore>,
    cost_range: Option<(f64, f64)>, // (min, max)
}

impl Default for CteScorer {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}

impl CteScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            config,
            scored_options: Vec::new(),
            cost_range: None,
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn default_weights(&self) -> ScoreWeights {
        ScoreWeights::from_config(&self.config)
    }

    // ==========================================
    // 归一化
    // ==========================================

    /// 预先登记一批单位成本（使评分结果与评分顺序无关）
    pub fn observe_costs<I: IntoIterator<Item = f64>>(&mut self, costs: I) {
        for cost in costs {
            self.observe_cost(cost);
        }
    }

    fn observe_cost(&mut self, cost: f64) {
        self.cost_range = Some(match self.cost_range {
            Some((min, max)) => (min.min(cost), max.max(cost)),
            None => (cost, cost),
        });
    }

    /// 成本归一化（越便宜越高）
    ///
    /// # 规则
    /// - 成本区间退化时返回 0.5
    /// - 紧急且惩罚系数 > 1 时除以该系数
    pub fn normalize_cost(&self, cost: f64, context: Option<&ScoringContext>) -> f64 {
        let (min, max) = match self.cost_range {
            Some((min, max)) if max > min => (min, max),
            _ => return 0.5,
        };

        let mut normalized = 1.0 - (cost - min) / (max - min);
        if let Some(ctx) = context {
            if ctx.is_urgent(self.config.urgent_threshold_days) && ctx.cost_penalty_multiplier > 1.0 {
                normalized /= ctx.cost_penalty_multiplier;
            }
        }
        normalized.clamp(0.0, 1.0)
    }

    /// 交期分
    ///
    /// # 返回
    /// (分数, 原始准时概率)
    pub fn time_score(&self, time_risk: &TimeRiskAssessment, context: &ScoringContext) -> (f64, f64) {
        let probability = time_risk.probability_on_time(context.days_to_deadline(), self.config.min_lead_time_std);
        let value = if context.is_urgent(self.config.urgent_threshold_days) {
            probability.powf(self.config.urgent_time_exponent)
        } else {
            probability
        };
        (value, probability)
    }

    pub fn risk_score(&self, quality_risk: &QualityRiskAssessment) -> f64 {
        quality_risk.integrated_reliability()
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 计算 CTE
    ///
    /// # 参数
    /// - `weights`: None 时使用配置权重
    ///
    /// # 返回
    /// - Err: 权重为负或和不为 1
    #[allow(clippy::too_many_arguments)]
    pub fn calculate_cte(
        &mut self,
        option_id: &str,
        item_id: &str,
        cost: &CostBreakdown,
        time_risk: &TimeRiskAssessment,
        quality_risk: &QualityRiskAssessment,
        context: &ScoringContext,
        weights: Option<ScoreWeights>,
    ) -> PlannerResult<CteScore> {
        let weights = weights.unwrap_or_else(|| self.default_weights());
        weights.validate()?;
        let total_cost = money_to_f64(cost.total_cost_per_unit());
        self.observe_cost(total_cost);

        let cost_score = NormalizedScore::new(
            ScoringDimension::Cost,
            self.normalize_cost(total_cost, Some(context)),
            total_cost,
        );
        let (time_value, on_time) = self.time_score(time_risk, context);
        let time_score = NormalizedScore::new(ScoringDimension::Time, time_value, on_time);
        let reliability = self.risk_score(quality_risk);
        let risk_score = NormalizedScore::new(ScoringDimension::Risk, reliability, reliability);

        let cte_value = (cost_score.value * weights.cost + time_score.value * weights.time + risk_score.value * weights.risk)
            .clamp(0.0, 1.0);

        let score = CteScore {
            option_id: option_id.to_string(),
            item_id: item_id.to_string(),
            cost_score,
            time_score,
            risk_score,
            cte_value,
            weights,
            sourcing_path: None,
            supplier_id: None,
        };
        debug!(option_id, cte = score.cte_value, "CTE 计算完成");
        self.scored_options.push(score.clone());
        Ok(score)
    }

    /// 对寻源选项评分
    pub fn score_option(
        &mut self,
        option: &SourcingOption,
        context: &ScoringContext,
        weights: Option<ScoreWeights>,
    ) -> PlannerResult<CteScore> {
        let mut score = self.calculate_cte(
            &option.option_id,
            &option.item_id,
            &CostBreakdown::from_option(option),
            &TimeRiskAssessment::from_option(option),
            &QualityRiskAssessment::from_option(option),
            context,
            weights,
        )?;
        score.sourcing_path = Some(option.sourcing_path);
        score.supplier_id = option.supplier_id.clone();
        if let Some(last) = self.scored_options.last_mut() {
            last.sourcing_path = score.sourcing_path;
            last.supplier_id = score.supplier_id.clone();
        }
        Ok(score)
    }

    /// 批量评分（先登记全部成本，再逐个评分）
    #[instrument(skip(self, options, context), fields(options = options.len()))]
    pub fn score_options(
        &mut self,
        options: &[&SourcingOption],
        context: &ScoringContext,
        weights: Option<ScoreWeights>,
    ) -> PlannerResult<Vec<CteScore>> {
        self.observe_costs(options.iter().map(|o| money_to_f64(o.total_cost_per_unit())));
        options
            .iter()
            .map(|option| self.score_option(option, context, weights))
            .collect()
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn scored_options(&self) -> &[CteScore] {
        &self.scored_options
    }

    /// CTE 最高的前 N 个
    pub fn top_options(&self, limit: usize) -> Vec<&CteScore> {
        let mut sorted: Vec<&CteScore> = self.scored_options.iter().collect();
        sorted.sort_by(|a, b| b.cte_value.partial_cmp(&a.cte_value).unwrap_or(Ordering::Equal));
        sorted.truncate(limit);
        sorted
    }

    pub fn best_for_path(&self, path: SourcingPathType) -> Option<&CteScore> {
        self.scored_options
            .iter()
            .filter(|s| s.sourcing_path == Some(path))
            .max_by(|a, b| a.cte_value.partial_cmp(&b.cte_value).unwrap_or(Ordering::Equal))
    }

    pub fn scoring_report(&self) -> ScoringReport {
        let mut band_counts = [0usize; 4];
        for score in &self.scored_options {
            let idx = match score.band() {
                ScoreBand::Excellent => 0,
                ScoreBand::Good => 1,
                ScoreBand::Acceptable => 2,
                ScoreBand::Poor => 3,
            };
            band_counts[idx] += 1;
        }
        ScoringReport {
            total_scored: self.scored_options.len(),
            min_cost: self.cost_range.map(|(min, _)| min),
            max_cost: self.cost_range.map(|(_, max)| max),
            band_counts,
            top_options: self.top_options(10).iter().map(|s| s.analysis_summary()).collect(),
        }
    }

    /// 清空历史与成本区间（新一轮计划）
    pub fn reset(&mut self) {
        self.scored_options.clear();
        self.cost_range = None;
    }
}
