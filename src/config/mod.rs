// ==========================================
// 供应链计划引擎 - 配置层
// ==========================================
// 职责: 计划参数定义、分层加载（默认 → 文件 → 环境变量）
// ==========================================

pub mod config_manager;
pub mod planner_config;

// 重导出核心配置类型
pub use config_manager::{config_keys, ConfigManager, ConfigSource};
pub use planner_config::{
    AlgorithmsConfig, CriticalityRule, CriticalityRules, DecisionConfig, ExpediteTier, FilterConfig,
    PlannerConfig, PlannerSection, ScoringConfig, SolverConfig,
};
