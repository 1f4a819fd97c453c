// ==========================================
// 供应链计划引擎 - 计划配置项
// ==========================================
// 职责: 过滤/评分/关键度规则/求解器/算法/路径决策/计划流程 七个配置段
// 约定: 所有字段带默认值，部分 JSON 文件即可生效
// ==========================================

use crate::domain::types::Criticality;
use crate::engine::optimization::SolverStrategy;
use crate::error::{PlannerError, PlannerResult};
use serde::{Deserialize, Serialize};

/// 权重和允许的误差
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

// ==========================================
// PlannerConfig - 顶层配置
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub filter: FilterConfig,
    pub scoring: ScoringConfig,
    pub criticality_rules: CriticalityRules,
    pub solver: SolverConfig,
    pub algorithms: AlgorithmsConfig,
    pub decision: DecisionConfig,
    pub planner: PlannerSection,
}

impl PlannerConfig {
    /// 校验配置一致性
    ///
    /// # 规则
    /// - 各组权重之和为 1
    /// - 时间/节点/迭代上限为正
    /// - gap 在 [0,1]
    pub fn validate(&self) -> PlannerResult<()> {
        self.filter.validate()?;
        check_weights(self.scoring.weight_cost, self.scoring.weight_time, self.scoring.weight_risk)?;
        for criticality in [Criticality::Critical, Criticality::High, Criticality::Medium, Criticality::Low] {
            let rule = self.criticality_rules.for_criticality(criticality);
            check_weights(rule.weight_cost, rule.weight_time, rule.weight_risk)?;
            if !(0.0..=1.0).contains(&rule.min_acceptable_service_level)
                || !(0.0..=1.0).contains(&rule.max_acceptable_risk)
            {
                return Err(PlannerError::Config(format!(
                    "关键度规则越界: criticality={}",
                    criticality
                )));
            }
        }
        self.solver.validate()?;
        self.algorithms.validate()?;
        self.decision.validate()?;
        if !(0.0..=100.0).contains(&self.planner.budget_contingency_pct) {
            return Err(PlannerError::Config(format!(
                "预算预留比例必须在 [0,100]: {}",
                self.planner.budget_contingency_pct
            )));
        }
        Ok(())
    }
}

pub(crate) fn check_weights(cost: f64, time: f64, risk: f64) -> PlannerResult<()> {
    let all_valid = [cost, time, risk].iter().all(|w| (0.0..=1.0).contains(w));
    if !all_valid || ((cost + time + risk) - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(PlannerError::InvalidWeights { cost, time, risk });
    }
    Ok(())
}

// ==========================================
// FilterConfig - 技术/法规过滤
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub critical_expiration_days: i64, // 批次临期窗口
    pub min_storage_buffer_days: i64,  // 最短保质期（存放缓冲）
    pub min_equivalent_match: f64,     // 等效物料最低技术匹配度
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            critical_expiration_days: 7,
            min_storage_buffer_days: 14,
            min_equivalent_match: 0.85,
        }
    }
}

impl FilterConfig {
    fn validate(&self) -> PlannerResult<()> {
        if self.critical_expiration_days < 0 || self.min_storage_buffer_days < 0 {
            return Err(PlannerError::Config("过滤天数阈值不能为负".to_string()));
        }
        if !(0.0..=1.0).contains(&self.min_equivalent_match) {
            return Err(PlannerError::Config(format!(
                "等效匹配阈值超出 [0,1]: {}",
                self.min_equivalent_match
            )));
        }
        Ok(())
    }
}

// ==========================================
// ScoringConfig - CTE 评分
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    // ===== 默认权重 =====
    pub weight_cost: f64,
    pub weight_time: f64,
    pub weight_risk: f64,

    // ===== 紧急判定 =====
    pub urgent_threshold_days: f64,  // 距需求日 ≤ 该天数视为紧急
    pub urgent_time_exponent: f64,   // 紧急时 P(准时) 的幂次
    pub cost_penalty_multiplier: f64, // 紧急时成本分除以该系数（> 1 生效）

    pub min_lead_time_std: f64,      // 标准差下限，避免除零
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weight_cost: 0.4,
            weight_time: 0.3,
            weight_risk: 0.3,
            urgent_threshold_days: 5.0,
            urgent_time_exponent: 1.5,
            cost_penalty_multiplier: 1.0,
            min_lead_time_std: 0.1,
        }
    }
}

// ==========================================
// CriticalityRule - 关键度评分规则
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalityRule {
    pub weight_cost: f64,
    pub weight_time: f64,
    pub weight_risk: f64,
    pub min_acceptable_service_level: f64, // TIME 截断
    pub max_acceptable_risk: f64,          // RISK 截断: risk ≥ 1 - max
    pub allow_single_source: bool,
    pub cost_threshold_multiplier: f64,    // COST 截断: 成本 > 参考 × 倍数
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CriticalityRules {
    pub critical: CriticalityRule,
    pub high: CriticalityRule,
    pub medium: CriticalityRule,
    pub low: CriticalityRule,
}

impl Default for CriticalityRules {
    fn default() -> Self {
        Self {
            critical: CriticalityRule {
                weight_cost: 0.2,
                weight_time: 0.5,
                weight_risk: 0.3,
                min_acceptable_service_level: 0.99,
                max_acceptable_risk: 0.01,
                allow_single_source: false,
                cost_threshold_multiplier: 2.0,
            },
            high: CriticalityRule {
                weight_cost: 0.3,
                weight_time: 0.4,
                weight_risk: 0.3,
                min_acceptable_service_level: 0.95,
                max_acceptable_risk: 0.05,
                allow_single_source: true,
                cost_threshold_multiplier: 1.5,
            },
            medium: CriticalityRule {
                weight_cost: 0.4,
                weight_time: 0.3,
                weight_risk: 0.3,
                min_acceptable_service_level: 0.85,
                max_acceptable_risk: 0.15,
                allow_single_source: true,
                cost_threshold_multiplier: 1.2,
            },
            low: CriticalityRule {
                weight_cost: 0.6,
                weight_time: 0.2,
                weight_risk: 0.2,
                min_acceptable_service_level: 0.70,
                max_acceptable_risk: 0.30,
                allow_single_source: true,
                cost_threshold_multiplier: 1.0,
            },
        }
    }
}

impl CriticalityRules {
    pub fn for_criticality(&self, criticality: Criticality) -> &CriticalityRule {
        match criticality {
            Criticality::Critical => &self.critical,
            Criticality::High => &self.high,
            Criticality::Medium => &self.medium,
            Criticality::Low => &self.low,
        }
    }

    /// 按字符串取规则（未知关键度按 MEDIUM）
    pub fn for_label(&self, label: &str) -> &CriticalityRule {
        self.for_criticality(Criticality::from_str_lenient(label))
    }
}

// ==========================================
// SolverConfig - 求解器
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub strategy: SolverStrategy,
    pub time_limit_seconds: u64,
    pub gap_tolerance: f64,      // 相对 gap，达到即停止分支
    pub greedy_iterations: u32,
    pub reopt_max_iterations: u32,
    pub max_nodes: u64,          // 分支定界节点上限
    pub max_simplex_iterations: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            strategy: SolverStrategy::Exact,
            time_limit_seconds: 300,
            gap_tolerance: 0.05,
            greedy_iterations: 10,
            reopt_max_iterations: 5,
            max_nodes: 100_000,
            max_simplex_iterations: 50_000,
        }
    }
}

impl SolverConfig {
    fn validate(&self) -> PlannerResult<()> {
        if self.time_limit_seconds == 0 || self.max_nodes == 0 || self.max_simplex_iterations == 0 {
            return Err(PlannerError::Config(
                "求解时间/节点/迭代上限必须 > 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.gap_tolerance) {
            return Err(PlannerError::Config(format!(
                "gap 必须在 [0,1]: {}",
                self.gap_tolerance
            )));
        }
        Ok(())
    }
}

// ==========================================
// AlgorithmsConfig - 各路径算法参数
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlgorithmsConfig {
    // ===== 释放预留（边际成本） =====
    pub release_full_saving: f64,         // 节省 ≥ 该比例 → 全量释放
    pub release_partial_saving: f64,      // 节省 ≥ 该比例 → 部分释放
    pub release_partial_reserved_share: f64,
    pub release_partial_demand_share: f64,

    // ===== 拆解（背包） =====
    pub disassembly_budget_share: f64,    // 无预算时容量 = 物料价值 × 该比例
    pub disassembly_full_efficiency: f64,
    pub disassembly_partial_efficiency: f64,

    // ===== 替代图 =====
    pub substitutes_max_depth: usize,
    pub substitutes_min_compatibility: f64,

    // ===== CTP 流水车间 =====
    pub ctp_stage1_hours_per_unit: f64,
    pub ctp_stage2_hours_per_unit: f64,
    pub ctp_hours_per_day: f64,
    pub ctp_optimal_max_utilization: f64,

    // ===== 调拨作业成本 =====
    pub transfer_labor_rate_per_minute: f64,
    pub transfer_rate_per_hour: f64,

    // ===== 加急档位 =====
    pub expedite_tiers: Vec<ExpediteTier>,
}

/// 加急档位
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpediteTier {
    pub label: String,
    pub lead_time_days: f64,
    pub lead_time_std_days: f64,
    pub premium_pct: f64,          // 相对基准单价的溢价比例
    pub success_probability: f64,
}

impl ExpediteTier {
    pub fn new(label: &str, lead_time_days: f64, lead_time_std_days: f64, premium_pct: f64, success_probability: f64) -> Self {
        Self {
            label: label.to_string(),
            lead_time_days,
            lead_time_std_days,
            premium_pct,
            success_probability,
        }
    }
}

impl Default for AlgorithmsConfig {
    fn default() -> Self {
        Self {
            release_full_saving: 0.20,
            release_partial_saving: 0.05,
            release_partial_reserved_share: 0.5,
            release_partial_demand_share: 0.3,
            disassembly_budget_share: 0.20,
            disassembly_full_efficiency: 0.30,
            disassembly_partial_efficiency: 0.10,
            substitutes_max_depth: 3,
            substitutes_min_compatibility: 0.70,
            ctp_stage1_hours_per_unit: 0.5,
            ctp_stage2_hours_per_unit: 0.3,
            ctp_hours_per_day: 8.0,
            ctp_optimal_max_utilization: 0.85,
            transfer_labor_rate_per_minute: 0.75,
            transfer_rate_per_hour: 45.0,
            expedite_tiers: vec![
                ExpediteTier::new("NONE", 10.0, 1.0, 0.0, 0.95),
                ExpediteTier::new("PARTIAL", 6.0, 1.0, 0.15, 0.85),
                ExpediteTier::new("FULL", 3.0, 1.0, 0.35, 0.92),
            ],
        }
    }
}

impl AlgorithmsConfig {
    fn validate(&self) -> PlannerResult<()> {
        if self.release_partial_saving > self.release_full_saving {
            return Err(PlannerError::Config(
                "部分释放阈值不能高于全量释放阈值".to_string(),
            ));
        }
        if self.disassembly_partial_efficiency > self.disassembly_full_efficiency {
            return Err(PlannerError::Config(
                "部分拆解阈值不能高于全量拆解阈值".to_string(),
            ));
        }
        if self.substitutes_max_depth == 0 {
            return Err(PlannerError::Config("替代搜索深度必须 > 0".to_string()));
        }
        if self.ctp_hours_per_day <= 0.0 {
            return Err(PlannerError::Config("每日工时必须 > 0".to_string()));
        }
        if self.expedite_tiers.is_empty() {
            return Err(PlannerError::Config("加急档位不能为空".to_string()));
        }
        for tier in &self.expedite_tiers {
            if !(0.0..=1.0).contains(&tier.success_probability) || tier.premium_pct < 0.0 {
                return Err(PlannerError::Config(format!(
                    "加急档位参数越界: {}",
                    tier.label
                )));
            }
        }
        Ok(())
    }
}

// ==========================================
// DecisionConfig - 路径决策树
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    pub enabled: bool,
    pub stop_at_first_open: bool,       // true 时选中首条路径即停止遍历
    pub min_coverage_ratio: f64,        // 库存/调拨门: 可用量 ≥ 需求 × 比例
    pub min_reliability: f64,           // 质量门
    pub min_on_time_probability: f64,   // 协作类路径的准时门
    pub max_cost_multiplier: f64,       // 成本门: 单位成本 ≤ 标准成本 × 倍数
    pub cache_size: usize,              // 门判定缓存条数上限
    pub disabled_gates: Vec<String>,    // 按 gate_id 停用

    // ===== 路径比较权重 =====
    pub compare_weight_composite: f64,
    pub compare_weight_lead_time: f64,
    pub compare_weight_cost: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stop_at_first_open: false,
            min_coverage_ratio: 1.0,
            min_reliability: 0.9,
            min_on_time_probability: 0.8,
            max_cost_multiplier: 1.5,
            cache_size: 1000,
            disabled_gates: Vec::new(),
            compare_weight_composite: 0.5,
            compare_weight_lead_time: 0.25,
            compare_weight_cost: 0.25,
        }
    }
}

impl DecisionConfig {
    fn validate(&self) -> PlannerResult<()> {
        for (name, value) in [
            ("min_coverage_ratio", self.min_coverage_ratio),
            ("min_reliability", self.min_reliability),
            ("min_on_time_probability", self.min_on_time_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PlannerError::Config(format!("决策阈值 {} 超出 [0,1]: {}", name, value)));
            }
        }
        if !(self.max_cost_multiplier >= 1.0) {
            return Err(PlannerError::Config(format!(
                "成本门倍数必须 ≥ 1: {}",
                self.max_cost_multiplier
            )));
        }
        check_weights(
            self.compare_weight_composite,
            self.compare_weight_lead_time,
            self.compare_weight_cost,
        )
    }
}

// ==========================================
// PlannerSection - 计划流程
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerSection {
    pub run_algorithms: bool,          // 是否用路径算法修正候选数量/成本
    pub apply_criticality_cut: bool,
    pub target_service_level: f64,     // 交期约束的服务水平
    pub budget_contingency_pct: f64,   // 预算预留（百分比）
    pub enforce_single_source: bool,   // 按关键度规则施加 one-in
}

impl Default for PlannerSection {
    fn default() -> Self {
        Self {
            run_algorithms: true,
            apply_criticality_cut: true,
            target_service_level: 0.95,
            budget_contingency_pct: 0.0,
            enforce_single_source: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PlannerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.criticality_rules.for_criticality(Criticality::Critical).min_acceptable_service_level, 0.99);
        assert_eq!(config.criticality_rules.for_label("unknown").weight_cost, 0.4);
    }

    #[test]
    fn test_rejects_weights_not_summing_to_one() {
        let mut config = PlannerConfig::default();
        config.scoring.weight_cost = 0.5;
        assert!(matches!(config.validate(), Err(PlannerError::InvalidWeights { .. })));
    }

    #[test]
    fn test_rejects_gap_out_of_range() {
        let mut config = PlannerConfig::default();
        config.solver.gap_tolerance = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_decision_thresholds_out_of_range() {
        let mut config = PlannerConfig::default();
        config.decision.min_reliability = 1.2;
        assert!(matches!(config.validate(), Err(PlannerError::Config(_))));

        let mut config = PlannerConfig::default();
        config.decision.compare_weight_cost = 0.6;
        assert!(matches!(config.validate(), Err(PlannerError::InvalidWeights { .. })));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PlannerConfig =
            serde_json::from_str(r#"{"solver": {"strategy": "GREEDY", "gap_tolerance": 0.01}}"#).unwrap();
        assert_eq!(config.solver.strategy, SolverStrategy::Greedy);
        assert_eq!(config.solver.gap_tolerance, 0.01);
        assert_eq!(config.solver.time_limit_seconds, 300);
        assert_eq!(config.filter.min_storage_buffer_days, 14);
        assert!(config.decision.enabled);
        assert_eq!(config.decision.cache_size, 1000);
    }
}
