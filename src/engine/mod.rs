// ==========================================
// 供应链计划引擎 - 引擎层
// ==========================================
// 层级: Level 1 过滤 → Level 2 评分/路径决策/路径算法 → Level 3 组合优化
// ==========================================
// 职责: 实现寻源决策规则，不做持久化
// 红线: 所有拒绝/截断/降级必须输出 reason
// ==========================================

pub mod algorithms;
pub mod context;
pub mod data_source;
pub mod decision;
pub mod filter;
pub mod optimization;
pub mod orchestrator;
pub mod scoring;

// 重导出核心引擎
pub use algorithms::{
    AlgorithmExecutor, AlgorithmInput, AlgorithmOutput, AlgorithmRegistry, AlgorithmType,
    ExecutionPolicy, SourcingAlgorithm,
};
pub use context::PlanningContext;
pub use data_source::{InMemoryDataSource, PlanningBundle, PlanningDataSource};
pub use decision::{DecisionEngine, DecisionInput, DecisionTrace, GateManager, GateRule, RouteEvaluator};
pub use filter::{ComplianceRegistry, FilterReason, FilterReport, FilterResult, TechnicalLegalFilter};
pub use optimization::{
    ConstraintBuilder, ConstraintSet, ModelAnalyzer, PlanningReport, PortfolioCandidate,
    SolverManager, SolverResult, SolverStrategy,
};
pub use orchestrator::{
    apply_algorithm_output, objective_coefficient, PlanningOutcome, PlanningRequest, SourcingPlanner,
    SupplierPreference,
};
pub use scoring::{CriticalityAwareScorer, CteScore, CteScorer, ScoreWeights, ScoringContext};
