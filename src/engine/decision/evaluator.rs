// ==========================================
// 供应链计划引擎 - 路径可行性评估
// ==========================================
// 职责: 按路径画像给出成功/交期/成本/风险四项分与综合分，
//       判定可行等级，并在多条路径间排序、比较
// 约定: 分数均在 [0,1]；等级只由未通过的指标个数决定
// ==========================================

use super::facts::{DecisionInput, RouteFacts};
use crate::config::planner_config::check_weights;
use crate::domain::types::{Criticality, SourcingPathType};
use crate::error::PlannerResult;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

// ==========================================
// RouteProfile - 路径画像
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteProfile {
    pub route: SourcingPathType,
    pub base_success_rate: f64,

    // ===== 综合分权重（和为 1） =====
    pub weight_success: f64,
    pub weight_lead_time: f64,
    pub weight_cost: f64,
    pub weight_risk: f64,

    // ===== 阈值 =====
    pub acceptable_cost_premium: f64,   // 成本比超出 1 的容忍幅度
    pub critical_lead_time_margin: f64, // 交期迟到的容忍天数
    pub min_quality: f64,

    pub suited_for: Vec<Criticality>,
}

impl RouteProfile {
    /// 各路径的默认画像
    pub fn standard(route: SourcingPathType) -> Self {
        use Criticality::*;
        use SourcingPathType as P;

        // (成功率, 权重[成功,交期,成本,风险], 成本容忍, 交期容忍, 最低质量, 适用关键度)
        let (base, w, premium, margin, quality, suited): (f64, [f64; 4], f64, f64, f64, Vec<Criticality>) =
            match route {
                P::StockLocal => (0.95, [0.30, 0.20, 0.35, 0.15], 0.05, 0.5, 0.99, vec![Critical, High, Medium, Low]),
                P::StockLiberation => (0.85, [0.25, 0.25, 0.30, 0.20], 0.10, 1.0, 0.97, vec![Medium]),
                P::Disassembly => (0.70, [0.20, 0.30, 0.35, 0.15], 0.25, 2.0, 0.92, vec![Medium, Low]),
                P::Equivalent => (0.75, [0.25, 0.25, 0.30, 0.20], 0.15, 1.5, 0.94, vec![Medium, Low]),
                P::Recovery => (0.60, [0.15, 0.35, 0.35, 0.15], 0.50, 3.0, 0.90, vec![Low]),
                P::Manufacturing => (0.80, [0.25, 0.30, 0.30, 0.15], 0.20, 2.0, 0.96, vec![High, Medium, Low]),
                P::Transfer => (0.88, [0.25, 0.30, 0.25, 0.20], 0.12, 1.5, 0.97, vec![High, Medium, Low]),
                P::Intercompany => (0.82, [0.25, 0.25, 0.30, 0.20], 0.10, 1.0, 0.96, vec![High, Medium, Low]),
                P::Vmi => (0.90, [0.30, 0.25, 0.25, 0.20], 0.08, 0.8, 0.98, vec![High, Medium]),
                P::Loan => (0.65, [0.20, 0.30, 0.20, 0.30], 0.30, 2.0, 0.93, vec![Critical]),
                P::Expedite => (0.75, [0.20, 0.40, 0.25, 0.15], 0.50, 0.5, 0.95, vec![Critical, High]),
                P::Purchase => (0.85, [0.20, 0.30, 0.35, 0.15], 0.20, 2.0, 0.96, vec![High, Medium, Low]),
                P::PurchaseImport => (0.80, [0.20, 0.35, 0.30, 0.15], 0.25, 3.0, 0.96, vec![Medium, Low]),
            };

        Self {
            route,
            base_success_rate: base,
            weight_success: w[0],
            weight_lead_time: w[1],
            weight_cost: w[2],
            weight_risk: w[3],
            acceptable_cost_premium: premium,
            critical_lead_time_margin: margin,
            min_quality: quality,
            suited_for: suited,
        }
    }

    pub fn suits(&self, criticality: Criticality) -> bool {
        self.suited_for.contains(&criticality)
    }
}

// ==========================================
// 可行性指标与等级
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeasibilityMetric {
    Available,
    Coverage,
    LeadTime,
    Cost,
    Quality,
    CriticalityFit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeasibilityLevel {
    Full,
    Partial,
    Marginal,
    Infeasible,
}

impl FeasibilityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeasibilityLevel::Full => "FULL",
            FeasibilityLevel::Partial => "PARTIAL",
            FeasibilityLevel::Marginal => "MARGINAL",
            FeasibilityLevel::Infeasible => "INFEASIBLE",
        }
    }

    fn from_failures(failed: usize) -> Self {
        match failed {
            0 => FeasibilityLevel::Full,
            1 => FeasibilityLevel::Partial,
            2 => FeasibilityLevel::Marginal,
            _ => FeasibilityLevel::Infeasible,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteFeasibility {
    pub route: SourcingPathType,
    pub level: FeasibilityLevel,
    pub composite_score: f64,
    pub success_score: f64,
    pub lead_time_score: f64,
    pub cost_score: f64,
    pub risk_score: f64,
    #[serde(default)]
    pub lead_time_margin_days: Option<f64>,
    #[serde(default)]
    pub cost_ratio: Option<f64>,
    pub failed_metrics: Vec<FeasibilityMetric>,
    pub notes: Vec<String>,
}

impl RouteFeasibility {
    pub fn is_feasible(&self) -> bool {
        self.level != FeasibilityLevel::Infeasible
    }
}

/// 路径比较权重（综合分 / 交期分 / 成本分）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparisonWeights {
    pub composite: f64,
    pub lead_time: f64,
    pub cost: f64,
}

impl Default for ComparisonWeights {
    fn default() -> Self {
        Self { composite: 0.5, lead_time: 0.25, cost: 0.25 }
    }
}

impl ComparisonWeights {
    pub fn validate(&self) -> PlannerResult<()> {
        check_weights(self.composite, self.lead_time, self.cost)
    }

    fn score(&self, feasibility: &RouteFeasibility) -> f64 {
        feasibility.composite_score * self.composite
            + feasibility.lead_time_score * self.lead_time
            + feasibility.cost_score * self.cost
    }
}

// ==========================================
// 分段评分
// ==========================================

/// 交期分
///
/// - 余量 ≥ 0: 1
/// - 迟到 ≤ margin: 1 → 0.5 线性
/// - 迟到 ≤ 2·margin: 0.5 → 0 线性，之后为 0
pub fn lead_time_score(days_margin: f64, critical_margin: f64) -> f64 {
    if days_margin >= 0.0 {
        return 1.0;
    }
    let margin = critical_margin.max(1e-6);
    let late = -days_margin;
    if late <= margin {
        1.0 - late / margin * 0.5
    } else {
        (0.5 - (late - margin) / margin * 0.5).max(0.0)
    }
}

/// 成本分
///
/// - 成本比 ≤ 1: 1
/// - 超出 ≤ premium: 1 → 0.5 线性
/// - 超出 ≤ 2·premium: 0.5 → 0 线性，之后为 0
pub fn cost_score(cost_ratio: f64, acceptable_premium: f64) -> f64 {
    if cost_ratio <= 1.0 {
        return 1.0;
    }
    let premium = acceptable_premium.max(1e-6);
    let excess = cost_ratio - 1.0;
    if excess <= premium {
        1.0 - excess / premium * 0.5
    } else {
        (0.5 - (excess - premium) / premium * 0.5).max(0.0)
    }
}

/// 关键度越高，风险分扣得越多
fn criticality_penalty(criticality: Criticality) -> f64 {
    match criticality {
        Criticality::Low => 0.0,
        Criticality::Medium => 0.05,
        Criticality::High => 0.10,
        Criticality::Critical => 0.20,
    }
}

// ==========================================
// RouteEvaluator
// ==========================================
#[derive(Debug, Clone)]
pub struct RouteEvaluator {
    profiles: BTreeMap<SourcingPathType, RouteProfile>,
    comparison: ComparisonWeights,
}

impl Default for RouteEvaluator {
    fn default() -> Self {
        Self::new(ComparisonWeights::default())
    }
}

impl RouteEvaluator {
    pub fn new(comparison: ComparisonWeights) -> Self {
        let profiles = SourcingPathType::ALL
            .iter()
            .map(|&route| (route, RouteProfile::standard(route)))
            .collect();
        Self { profiles, comparison }
    }

    pub fn set_profile(&mut self, profile: RouteProfile) {
        self.profiles.insert(profile.route, profile);
    }

    pub fn profile(&self, route: SourcingPathType) -> Option<&RouteProfile> {
        self.profiles.get(&route)
    }

    pub fn comparison(&self) -> ComparisonWeights {
        self.comparison
    }

    /// 评估单条路径
    ///
    /// # 规则
    /// - 成本比: 有预算时 = 预计支出 / 预算；否则 = 单位成本 / 标准成本；都没有时为 1
    /// - 无已接受选项: 直接 INFEASIBLE，各项分为 0
    pub fn evaluate(&self, facts: &RouteFacts, input: &DecisionInput) -> RouteFeasibility {
        let profile = self
            .profiles
            .get(&facts.route)
            .cloned()
            .unwrap_or_else(|| RouteProfile::standard(facts.route));

        if !facts.has_accepted() {
            return RouteFeasibility {
                route: facts.route,
                level: FeasibilityLevel::Infeasible,
                composite_score: 0.0,
                success_score: 0.0,
                lead_time_score: 0.0,
                cost_score: 0.0,
                risk_score: 0.0,
                lead_time_margin_days: None,
                cost_ratio: None,
                failed_metrics: vec![FeasibilityMetric::Available],
                notes: vec![format!("路径 {} 无通过过滤与评分的选项", facts.route)],
            };
        }

        let mut failed = Vec::new();
        let mut notes = Vec::new();

        // 成功: 基础成功率 × 覆盖率
        let coverage = facts.coverage(input.demand).min(1.0);
        let success_score = profile.base_success_rate * coverage;
        if coverage + 1e-9 < 1.0 {
            failed.push(FeasibilityMetric::Coverage);
            notes.push(format!("可用量仅覆盖需求的 {:.0}%", coverage * 100.0));
        }

        // 交期
        let margin = facts.min_lead_time_days.map(|lead| input.days_to_deadline - lead);
        let lead_score = margin.map_or(0.0, |m| lead_time_score(m, profile.critical_lead_time_margin));
        if margin.map_or(true, |m| m < 0.0) {
            failed.push(FeasibilityMetric::LeadTime);
            notes.push(format!(
                "最短交期 {:.1} 天超过剩余 {:.1} 天",
                facts.min_lead_time_days.unwrap_or(f64::INFINITY),
                input.days_to_deadline
            ));
        }

        // 成本
        let (ratio, ratio_ok) = match (facts.best_unit_cost, input.budget, input.reference_unit_cost) {
            (Some(cost), Some(budget), _) if budget > 0.0 => {
                let ratio = cost * input.demand.min(facts.accepted_quantity) / budget;
                (ratio, ratio <= 1.0 + 1e-9)
            }
            (Some(cost), _, Some(reference)) => {
                let ratio = cost / reference;
                (ratio, ratio <= 1.0 + profile.acceptable_cost_premium + 1e-9)
            }
            _ => (1.0, true),
        };
        let c_score = cost_score(ratio, profile.acceptable_cost_premium);
        if !ratio_ok {
            failed.push(FeasibilityMetric::Cost);
            notes.push(format!("成本比 {:.2} 超出可接受范围", ratio));
        }

        // 风险 / 质量
        let reliability = facts.best_reliability.unwrap_or(0.0);
        let risk_score = (reliability - criticality_penalty(input.criticality)).clamp(0.0, 1.0);
        if reliability + 1e-9 < profile.min_quality {
            failed.push(FeasibilityMetric::Quality);
            notes.push(format!("可靠度 {:.3} 低于路径要求 {:.3}", reliability, profile.min_quality));
        }

        if !profile.suits(input.criticality) {
            failed.push(FeasibilityMetric::CriticalityFit);
            notes.push(format!("路径不适用于 {} 关键度", input.criticality));
        }

        let composite = (success_score * profile.weight_success
            + lead_score * profile.weight_lead_time
            + c_score * profile.weight_cost
            + risk_score * profile.weight_risk)
            .clamp(0.0, 1.0);

        RouteFeasibility {
            route: facts.route,
            level: FeasibilityLevel::from_failures(failed.len()),
            composite_score: composite,
            success_score,
            lead_time_score: lead_score,
            cost_score: c_score,
            risk_score,
            lead_time_margin_days: margin,
            cost_ratio: Some(ratio),
            failed_metrics: failed,
            notes,
        }
    }

    /// 评估并排序：先按等级，再按综合分降序；同分保持输入顺序
    pub fn rank(&self, input: &DecisionInput, routes: &[SourcingPathType]) -> Vec<RouteFeasibility> {
        let mut ranked: Vec<RouteFeasibility> = routes
            .iter()
            .map(|&route| self.evaluate(&input.route_or_empty(route), input))
            .collect();
        ranked.sort_by(|a, b| {
            a.level
                .cmp(&b.level)
                .then(b.composite_score.partial_cmp(&a.composite_score).unwrap_or(Ordering::Equal))
        });
        ranked
    }

    /// 在可行路径中按比较权重选最优
    ///
    /// # 返回
    /// (路径, 比较分)；全部不可行时 None
    pub fn compare(&self, evaluated: &[RouteFeasibility]) -> Option<(SourcingPathType, f64)> {
        evaluated
            .iter()
            .filter(|f| f.is_feasible())
            .map(|f| (f.route, self.comparison.score(f)))
            .fold(None, |best: Option<(SourcingPathType, f64)>, (route, score)| match best {
                Some((_, best_score)) if best_score >= score => best,
                _ => Some((route, score)),
            })
    }
}

// ==========================================
// 可行性报告导出
// ==========================================

pub fn write_feasibility_csv<W: Write>(ranking: &[RouteFeasibility], writer: W) -> PlannerResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record([
        "route",
        "level",
        "composite",
        "success",
        "lead_time",
        "cost",
        "risk",
        "failed_metrics",
    ])?;
    for f in ranking {
        let failed: Vec<String> = f.failed_metrics.iter().map(|m| format!("{:?}", m)).collect();
        wtr.write_record([
            f.route.as_str().to_string(),
            f.level.as_str().to_string(),
            format!("{:.4}", f.composite_score),
            format!("{:.4}", f.success_score),
            format!("{:.4}", f.lead_time_score),
            format!("{:.4}", f.cost_score),
            format!("{:.4}", f.risk_score),
            failed.join(";"),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn export_feasibility_json(ranking: &[RouteFeasibility], path: &Path) -> PlannerResult<()> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, ranking)?;
    Ok(())
}
