// ==========================================
// 供应链计划引擎 - 决策门
// ==========================================
// 职责: 门定义、门判定（含自定义规则）、缓存、批量/回退判定、统计与审计
// 红线: 门关闭不是错误，以 GateEvaluation.state 表达并附 note
// 红线: 自定义规则出错时门状态为 UNKNOWN，按关闭处理
// ==========================================

use super::facts::{DecisionInput, RouteFacts};
use crate::domain::types::{Criticality, SourcingPathType};
use crate::error::PlannerResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

// ==========================================
// 门分类 / 严重度 / 状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateKind {
    Availability,
    Timing,
    Cost,
    Quality,
    Risk,
    Regulatory,
    Relationship,
    Complex,
}

impl GateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateKind::Availability => "AVAILABILITY",
            GateKind::Timing => "TIMING",
            GateKind::Cost => "COST",
            GateKind::Quality => "QUALITY",
            GateKind::Risk => "RISK",
            GateKind::Regulatory => "REGULATORY",
            GateKind::Relationship => "RELATIONSHIP",
            GateKind::Complex => "COMPLEX",
        }
    }
}

impl fmt::Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 严重度: WARNING 失败只记录，不关闭路径
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateSeverity {
    Critical,
    #[default]
    Normal,
    Warning,
}

impl GateSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateSeverity::Critical => "CRITICAL",
            GateSeverity::Normal => "NORMAL",
            GateSeverity::Warning => "WARNING",
        }
    }

    pub fn blocks(&self) -> bool {
        !matches!(self, GateSeverity::Warning)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateState {
    Open,
    Closed,
    Bypassed, // 门已停用
    Unknown,  // 门未登记或自定义规则出错
}

impl GateState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateState::Open => "OPEN",
            GateState::Closed => "CLOSED",
            GateState::Bypassed => "BYPASSED",
            GateState::Unknown => "UNKNOWN",
        }
    }

    pub fn passed(&self) -> bool {
        matches!(self, GateState::Open | GateState::Bypassed)
    }
}

// ==========================================
// GateCheck - 门的判定条件
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateCheck {
    /// 路径上至少一个选项通过过滤与评分
    HasAcceptedOptions,
    /// 路径上至少一个选项通过技术/法规过滤
    FilterPassed,
    /// 已接受数量 ≥ 需求 × 比例
    MinCoverage(f64),
    /// 最短交期 ≤ 剩余天数
    LeadTimeWithinDeadline,
    MinOnTimeProbability(f64),
    MinReliability(f64),
    /// 最优单位成本 ≤ 标准成本 × 倍数（无标准成本时放行）
    CostWithinReference(f64),
    /// 最优单位成本 × min(需求, 可用量) ≤ 预算（无预算时放行）
    WithinBudget,
    /// 物料关键度不低于给定级别
    CriticalityAtLeast(Criticality),
    /// 按名称调用已登记的 GateRule
    Custom(String),
}

// ==========================================
// Trait: GateRule - 自定义门规则
// ==========================================
pub trait GateRule: Send + Sync {
    fn name(&self) -> &str;

    /// Ok(true) 放行；Err(说明) 表示规则无法判定
    fn evaluate(&self, facts: &RouteFacts, input: &DecisionInput) -> Result<bool, String>;
}

// ==========================================
// Gate / GateConfig
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    pub gate_id: String,
    pub kind: GateKind,
    pub description: String,
    pub check: GateCheck,
}

impl Gate {
    pub fn new(gate_id: &str, kind: GateKind, description: &str, check: GateCheck) -> Self {
        Self {
            gate_id: gate_id.to_string(),
            kind,
            description: description.to_string(),
            check,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    pub enabled: bool,
    pub severity: GateSeverity,
}

impl GateConfig {
    pub fn with_severity(severity: GateSeverity) -> Self {
        Self { enabled: true, severity }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self::with_severity(GateSeverity::Normal)
    }
}

// ==========================================
// GateEvaluation - 单次门判定（审计记录）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateEvaluation {
    pub gate_id: String,
    pub kind: GateKind,
    pub route: SourcingPathType,
    pub state: GateState,
    pub severity: GateSeverity,
    pub passed: bool,
    #[serde(default)]
    pub actual: Option<f64>,
    #[serde(default)]
    pub threshold: Option<f64>,
    pub note: String,
    #[serde(default)]
    pub cached: bool,
    pub evaluated_at: DateTime<Utc>,
}

impl GateEvaluation {
    /// 失败且严重度会关闭路径
    pub fn blocks(&self) -> bool {
        !self.passed && self.severity.blocks()
    }
}

/// 批量判定结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub open: bool,
    pub used_fallback: bool,
    pub warnings: usize,
    pub evaluations: Vec<GateEvaluation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GateStatistics {
    pub gate_id: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

impl GateStatistics {
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.passed as f64 / self.total as f64
    }
}

struct CheckOutcome {
    state: GateState,
    actual: Option<f64>,
    threshold: Option<f64>,
    note: String,
}

impl CheckOutcome {
    fn from_bool(passed: bool, actual: Option<f64>, threshold: Option<f64>, note: String) -> Self {
        let state = if passed { GateState::Open } else { GateState::Closed };
        Self { state, actual, threshold, note }
    }

    fn unknown(note: String) -> Self {
        Self { state: GateState::Unknown, actual: None, threshold: None, note }
    }
}

// ==========================================
// GateManager - 门登记与判定
// ==========================================
pub struct GateManager {
    gates: BTreeMap<String, Gate>,
    configs: BTreeMap<String, GateConfig>,
    rules: BTreeMap<String, Arc<dyn GateRule>>,

    cache: HashMap<String, GateEvaluation>,
    cache_order: VecDeque<String>,
    max_cache_size: usize,

    audit: Vec<GateEvaluation>,
    stats: BTreeMap<String, GateStatistics>,
}

impl fmt::Debug for GateManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GateManager")
            .field("gates", &self.gates.len())
            .field("rules", &self.rules.keys().collect::<Vec<_>>())
            .field("cached", &self.cache.len())
            .field("audit", &self.audit.len())
            .finish()
    }
}

impl GateManager {
    pub fn new(max_cache_size: usize) -> Self {
        Self {
            gates: BTreeMap::new(),
            configs: BTreeMap::new(),
            rules: BTreeMap::new(),
            cache: HashMap::new(),
            cache_order: VecDeque::new(),
            max_cache_size,
            audit: Vec::new(),
            stats: BTreeMap::new(),
        }
    }

    // ===== 登记 =====

    /// 登记门（同 id 覆盖旧定义与配置）
    pub fn register_gate(&mut self, gate: Gate, config: GateConfig) {
        self.configs.insert(gate.gate_id.clone(), config);
        self.gates.insert(gate.gate_id.clone(), gate);
        self.clear_cache();
    }

    pub fn register_rule(&mut self, rule: Arc<dyn GateRule>) {
        self.rules.insert(rule.name().to_string(), rule);
        self.clear_cache();
    }

    /// 启停门；返回该门是否存在
    pub fn set_enabled(&mut self, gate_id: &str, enabled: bool) -> bool {
        let Some(config) = self.configs.get_mut(gate_id) else {
            return false;
        };
        config.enabled = enabled;
        self.clear_cache();
        true
    }

    pub fn is_registered(&self, gate_id: &str) -> bool {
        self.gates.contains_key(gate_id)
    }

    pub fn gate(&self, gate_id: &str) -> Option<&Gate> {
        self.gates.get(gate_id)
    }

    pub fn config(&self, gate_id: &str) -> Option<&GateConfig> {
        self.configs.get(gate_id)
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    // ==========================================
    // 判定
    // ==========================================

    /// 判定单个门
    ///
    /// # 参数
    /// - use_cache: 命中缓存时返回 cached=true 的副本，不计入统计与审计
    pub fn evaluate_gate(
        &mut self,
        gate_id: &str,
        facts: &RouteFacts,
        input: &DecisionInput,
        use_cache: bool,
    ) -> GateEvaluation {
        let cache_key = format!(
            "{}|{}|{}|{:.4}|{:.1}|{}|{}",
            gate_id,
            facts.route,
            input.item_id,
            input.demand,
            input.days_to_deadline,
            input.criticality,
            facts.fingerprint()
        );
        if use_cache {
            if let Some(hit) = self.cache.get(&cache_key) {
                trace!(gate_id, route = %facts.route, "门判定命中缓存");
                let mut hit = hit.clone();
                hit.cached = true;
                return hit;
            }
        }

        let config = self.configs.get(gate_id).copied().unwrap_or_default();
        let (kind, outcome) = match self.gates.get(gate_id) {
            None => (GateKind::Complex, CheckOutcome::unknown(format!("门未登记: {}", gate_id))),
            Some(gate) if !config.enabled => (
                gate.kind,
                CheckOutcome {
                    state: GateState::Bypassed,
                    actual: None,
                    threshold: None,
                    note: "门已停用".to_string(),
                },
            ),
            Some(gate) => (gate.kind, self.run_check(&gate.check, facts, input)),
        };

        let evaluation = GateEvaluation {
            gate_id: gate_id.to_string(),
            kind,
            route: facts.route,
            state: outcome.state,
            severity: config.severity,
            passed: outcome.state.passed(),
            actual: outcome.actual,
            threshold: outcome.threshold,
            note: outcome.note,
            cached: false,
            evaluated_at: Utc::now(),
        };
        debug!(
            gate_id,
            route = %facts.route,
            state = evaluation.state.as_str(),
            note = %evaluation.note,
            "门判定"
        );

        self.record(&evaluation);
        if use_cache && self.max_cache_size > 0 {
            self.insert_cache(cache_key, evaluation.clone());
        }
        evaluation
    }

    /// 顺序判定一组门
    ///
    /// # 规则
    /// - 有阻断失败（CRITICAL/NORMAL 未通过）则 open = false
    /// - stop_on_fail 时遇首个阻断失败即停止
    pub fn evaluate_batch(
        &mut self,
        gate_ids: &[String],
        facts: &RouteFacts,
        input: &DecisionInput,
        stop_on_fail: bool,
    ) -> BatchOutcome {
        let mut open = true;
        let mut warnings = 0;
        let mut evaluations = Vec::with_capacity(gate_ids.len());

        for gate_id in gate_ids {
            let evaluation = self.evaluate_gate(gate_id, facts, input, true);
            let blocks = evaluation.blocks();
            if !evaluation.passed && !blocks {
                warnings += 1;
            }
            evaluations.push(evaluation);
            if blocks {
                open = false;
                if stop_on_fail {
                    break;
                }
            }
        }

        BatchOutcome { open, used_fallback: false, warnings, evaluations }
    }

    /// 主门组未通过时改判回退门组
    pub fn evaluate_with_fallback(
        &mut self,
        primary: &[String],
        fallback: &[String],
        facts: &RouteFacts,
        input: &DecisionInput,
    ) -> BatchOutcome {
        let first = self.evaluate_batch(primary, facts, input, true);
        if first.open || fallback.is_empty() {
            return first;
        }

        let second = self.evaluate_batch(fallback, facts, input, true);
        debug!(route = %facts.route, open = second.open, "主门组关闭，改判回退门组");
        let mut evaluations = first.evaluations;
        evaluations.extend(second.evaluations);
        BatchOutcome {
            open: second.open,
            used_fallback: true,
            warnings: first.warnings + second.warnings,
            evaluations,
        }
    }

    fn run_check(&self, check: &GateCheck, facts: &RouteFacts, input: &DecisionInput) -> CheckOutcome {
        match check {
            GateCheck::HasAcceptedOptions => CheckOutcome::from_bool(
                facts.has_accepted(),
                Some(facts.accepted_options as f64),
                Some(1.0),
                format!(
                    "候选 {} 个，过滤通过 {} 个，评分接受 {} 个",
                    facts.total_options, facts.filter_feasible, facts.accepted_options
                ),
            ),
            GateCheck::FilterPassed => CheckOutcome::from_bool(
                facts.filter_feasible > 0,
                Some(facts.filter_feasible as f64),
                Some(1.0),
                format!("过滤通过 {}/{}", facts.filter_feasible, facts.total_options),
            ),
            GateCheck::MinCoverage(ratio) => {
                let coverage = facts.coverage(input.demand);
                CheckOutcome::from_bool(
                    coverage + 1e-9 >= *ratio,
                    Some(coverage),
                    Some(*ratio),
                    format!("可用量 {:.2} / 需求 {:.2}", facts.accepted_quantity, input.demand),
                )
            }
            GateCheck::LeadTimeWithinDeadline => match facts.min_lead_time_days {
                None => CheckOutcome::from_bool(false, None, Some(input.days_to_deadline), "无可用交期".to_string()),
                Some(lead) => CheckOutcome::from_bool(
                    lead <= input.days_to_deadline,
                    Some(lead),
                    Some(input.days_to_deadline),
                    format!("最短交期 {:.1} 天，剩余 {:.1} 天", lead, input.days_to_deadline),
                ),
            },
            GateCheck::MinOnTimeProbability(min) => {
                min_value_check(facts.best_on_time_probability, *min, "P(准时)")
            }
            GateCheck::MinReliability(min) => min_value_check(facts.best_reliability, *min, "可靠度"),
            GateCheck::CostWithinReference(multiplier) => {
                match (facts.best_unit_cost, input.reference_unit_cost) {
                    (Some(cost), Some(reference)) => {
                        let limit = reference * multiplier;
                        CheckOutcome::from_bool(
                            cost <= limit + 1e-9,
                            Some(cost),
                            Some(limit),
                            format!("单位成本 {:.2}，上限 {:.2}", cost, limit),
                        )
                    }
                    (None, _) => CheckOutcome::from_bool(false, None, None, "无可用成本".to_string()),
                    (Some(cost), None) => {
                        CheckOutcome::from_bool(true, Some(cost), None, "无标准成本，放行".to_string())
                    }
                }
            }
            GateCheck::WithinBudget => match (facts.best_unit_cost, input.budget) {
                (Some(cost), Some(budget)) => {
                    let spend = cost * input.demand.min(facts.accepted_quantity);
                    CheckOutcome::from_bool(
                        spend <= budget + 1e-9,
                        Some(spend),
                        Some(budget),
                        format!("预计支出 {:.2}，预算 {:.2}", spend, budget),
                    )
                }
                (None, _) => CheckOutcome::from_bool(false, None, input.budget, "无可用成本".to_string()),
                (Some(_), None) => CheckOutcome::from_bool(true, None, None, "未设预算，放行".to_string()),
            },
            GateCheck::CriticalityAtLeast(level) => CheckOutcome::from_bool(
                input.criticality.rank() <= level.rank(),
                Some(input.criticality.score()),
                Some(level.score()),
                format!("物料关键度 {}，要求 ≥ {}", input.criticality, level),
            ),
            GateCheck::Custom(name) => match self.rules.get(name) {
                None => CheckOutcome::unknown(format!("自定义规则未登记: {}", name)),
                Some(rule) => match rule.evaluate(facts, input) {
                    Ok(passed) => CheckOutcome::from_bool(passed, None, None, format!("自定义规则 {}", name)),
                    Err(e) => CheckOutcome::unknown(format!("自定义规则 {} 无法判定: {}", name, e)),
                },
            },
        }
    }

    fn record(&mut self, evaluation: &GateEvaluation) {
        let stats = self
            .stats
            .entry(evaluation.gate_id.clone())
            .or_insert_with(|| GateStatistics { gate_id: evaluation.gate_id.clone(), ..Default::default() });
        stats.total += 1;
        if evaluation.passed {
            stats.passed += 1;
        } else {
            stats.failed += 1;
        }
        self.audit.push(evaluation.clone());
    }

    fn insert_cache(&mut self, key: String, evaluation: GateEvaluation) {
        while self.cache.len() >= self.max_cache_size {
            let Some(oldest) = self.cache_order.pop_front() else {
                break;
            };
            self.cache.remove(&oldest);
        }
        if self.cache.insert(key.clone(), evaluation).is_none() {
            self.cache_order.push_back(key);
        }
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.cache_order.clear();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    // ==========================================
    // 统计与审计
    // ==========================================

    pub fn statistics(&self, gate_id: &str) -> Option<&GateStatistics> {
        self.stats.get(gate_id)
    }

    pub fn all_statistics(&self) -> Vec<&GateStatistics> {
        self.stats.values().collect()
    }

    pub fn audit_trail(&self) -> &[GateEvaluation] {
        &self.audit
    }

    pub fn clear_audit(&mut self) {
        self.audit.clear();
    }

    pub fn export_audit_json(&self, path: &Path) -> PlannerResult<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, &self.audit)?;
        Ok(())
    }

    pub fn write_audit_csv<W: Write>(&self, writer: W) -> PlannerResult<()> {
        write_evaluations_csv(&self.audit, writer)
    }

    pub fn export_audit_csv(&self, path: &Path) -> PlannerResult<()> {
        let file = std::fs::File::create(path)?;
        self.write_audit_csv(file)
    }
}

fn min_value_check(value: Option<f64>, min: f64, label: &str) -> CheckOutcome {
    match value {
        None => CheckOutcome::from_bool(false, None, Some(min), format!("无{}数据", label)),
        Some(v) => CheckOutcome::from_bool(
            v + 1e-9 >= min,
            Some(v),
            Some(min),
            format!("{} {:.3}，要求 ≥ {:.3}", label, v, min),
        ),
    }
}

/// 审计宽表: evaluated_at,gate_id,kind,route,state,severity,passed,actual,threshold,note
pub fn write_evaluations_csv<W: Write>(evaluations: &[GateEvaluation], writer: W) -> PlannerResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record([
        "evaluated_at",
        "gate_id",
        "kind",
        "route",
        "state",
        "severity",
        "passed",
        "actual",
        "threshold",
        "note",
    ])?;
    for e in evaluations {
        wtr.write_record([
            e.evaluated_at.to_rfc3339(),
            e.gate_id.clone(),
            e.kind.as_str().to_string(),
            e.route.as_str().to_string(),
            e.state.as_str().to_string(),
            e.severity.as_str().to_string(),
            e.passed.to_string(),
            e.actual.map(|v| v.to_string()).unwrap_or_default(),
            e.threshold.map(|v| v.to_string()).unwrap_or_default(),
            e.note.clone(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
