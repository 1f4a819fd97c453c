// ==========================================
// 供应链计划引擎 - 统一错误类型
// ==========================================
// 职责: 定义引擎对外暴露的错误分类
// 约定: 不可行不是错误 (以 has_feasible_solution=false 表达)
// 约定: 过滤拒绝不是错误 (以 FilterReason 表达)
// ==========================================

use crate::engine::optimization::SolverError;
use thiserror::Error;

/// 引擎错误类型
///
/// 所有错误信息必须包含显式原因，便于调用方向用户解释
#[derive(Error, Debug)]
pub enum PlannerError {
    // ==========================================
    // 输入校验错误 (快速失败)
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("缺少必填字段: {0}")]
    MissingField(&'static str),

    #[error("未知计量单位: item_id={item_id}, uom={uom}")]
    UnknownUnit { item_id: String, uom: String },

    #[error("权重之和必须为 1: cost={cost}, time={time}, risk={risk}")]
    InvalidWeights { cost: f64, time: f64, risk: f64 },

    #[error("约束无效: {0}")]
    InvalidConstraint(String),

    // ==========================================
    // 算法与求解错误
    // ==========================================
    #[error("算法未注册: {0}")]
    AlgorithmNotRegistered(String),

    #[error("求解器错误: {0}")]
    Solver(#[from] SolverError),

    // ==========================================
    // 配置错误
    // ==========================================
    #[error("配置错误: {0}")]
    Config(String),

    // ==========================================
    // 基础设施错误
    // ==========================================
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON 序列化错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV 导出错误: {0}")]
    Csv(#[from] csv::Error),

    #[error("数据源错误: {0}")]
    DataSource(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PlannerError {
    /// 是否属于输入校验类错误
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PlannerError::InvalidInput(_)
                | PlannerError::MissingField(_)
                | PlannerError::UnknownUnit { .. }
                | PlannerError::InvalidWeights { .. }
                | PlannerError::InvalidConstraint(_)
        )
    }
}

/// 引擎统一 Result 类型
pub type PlannerResult<T> = Result<T, PlannerError>;
