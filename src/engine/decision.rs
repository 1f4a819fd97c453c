// ==========================================
// 供应链计划引擎 - 路径决策树
// ==========================================
// 职责: 以过滤/评分结果为输入，按偏好级联判定各路径的门，
//       给出主路径、开放路径的可行性排序与完整门审计
// 红线: 只读输入，不影响组合求解
// 红线: 每次门判定都进入审计，关闭原因写入 note
// ==========================================

mod cascade;
mod evaluator;
mod facts;
mod gates;

#[cfg(test)]
mod tests;

pub use cascade::{
    available_gate, export_traces_json, DecisionEngine, DecisionTrace, ExecutionStatistics, NodeVisit,
    RouteCascade, RouteCascadeBuilder, RouteNode,
};
pub use evaluator::{
    cost_score, export_feasibility_json, lead_time_score, write_feasibility_csv, ComparisonWeights,
    FeasibilityLevel, FeasibilityMetric, RouteEvaluator, RouteFeasibility, RouteProfile,
};
pub use facts::{collect_route_facts, DecisionInput, RouteFacts};
pub use gates::{
    write_evaluations_csv, BatchOutcome, Gate, GateCheck, GateConfig, GateEvaluation, GateKind, GateManager,
    GateRule, GateSeverity, GateState, GateStatistics,
};
