// ==========================================
// 供应链计划引擎 - 技术/法规过滤器 (Level 1)
// ==========================================
// 红线: 过滤拒绝不是错误，以 FilterReason 表达
// 红线: 检查顺序固定，首个失败即短路
// ==========================================
// 职责: 判定候选寻源选项的技术/法规可行性
// 输入: 寻源选项 + 物料主数据 + 需求日期 + (可选) 库存批次
// 输出: FilterResult (可行/原因码/说明)
// ==========================================

mod core;
mod registry;
mod report;

#[cfg(test)]
mod tests;

pub use self::core::{FilterReason, FilterResult, TechnicalLegalFilter};
pub use registry::{ComplianceRegistry, CustomFilterRule};
pub use report::{FeasibleOptionSummary, FilterReport, RejectedOptionSummary};
