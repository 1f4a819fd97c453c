// ==========================================
// 供应链计划引擎 - 核心库
// ==========================================
// 系统定位: 缺料寻源决策支持 (人工最终控制权)
// 技术栈: Rust + tokio + serde + tracing
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 引擎层 - 过滤/评分/路径决策/路径算法/组合优化
pub mod engine;

// 配置层 - 计划参数
pub mod config;

// 错误类型
pub mod error;

// 统计工具
pub mod stats;

// 日志系统
pub mod logging;

// 性能统计
pub mod perf;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{AbcClass, Criticality, ProcurementType, QualityStatus, SourcingPathType};

// 领域实体
pub use domain::{
    InventoryLot, InventorySnapshot, ItemMaster, LeadTimeDistribution, Money, ResourceCapacity,
    SelectedAllocation, SourcingOption, SourcingPath,
};

// 引擎
pub use engine::{
    CriticalityAwareScorer, CteScorer, DecisionEngine, InMemoryDataSource, ModelAnalyzer, PlanningContext,
    PlanningDataSource, PlanningOutcome, PlanningRequest, SolverManager, SolverStrategy,
    SourcingPlanner, TechnicalLegalFilter,
};

// 配置与错误
pub use config::{ConfigManager, PlannerConfig};
pub use error::{PlannerError, PlannerResult};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "供应链计划引擎";
