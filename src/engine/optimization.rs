// ==========================================
// 供应链计划引擎 - 组合优化层 (Level 3)
// ==========================================
// 职责: 约束构建 → 建模 → 求解 (精确/贪心/贪心+局部搜索) → 求解后分析
// 红线: 精确求解失败必须降级为贪心，不向调用方抛出
// ==========================================

mod analyzer;
mod constraints;
mod formulation;
mod simplex;
mod solver;
mod solver_manager;

#[cfg(test)]
mod tests;

pub use analyzer::{
    CostBreakdownEntry, FeasibilityReport, ModelAnalyzer, PlanningReport, RobustnessReport,
    Scenario, ScenarioOutcome, SensitivityReport, SolutionAnalysis,
};
pub use constraints::{
    BudgetConstraint, CapacityConstraint, ConstraintBuilder, ConstraintSet, ConstraintType,
    DemandConstraint, FefoBatch, FefoConstraint, LeadTimeConstraint, OneInConstraint,
    ServiceLevelConstraint, SourcingPreferenceConstraint, TransferConstraint,
};
pub use formulation::{
    constraint_activity, prepare_candidates, ConstraintActivity, ExcludedCandidate, ModelVariable,
    OptimizationModel, PortfolioCandidate, PortfolioSolution, SelectedPortfolioOption,
};
pub use simplex::{solve_lp, LinearProgram, LinearRow, LpSolution, LpStatus, RowSense};
pub use solver::{
    BranchAndBoundSolver, ExactSolver, MipProblem, MipSolution, MipStatus, SolveLimits, SolverError,
};
pub use solver_manager::{
    BatchItem, PortfolioSummary, SolveStatus, SolverManager, SolverResult, SolverStrategy,
};
