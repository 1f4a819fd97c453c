// ==========================================
// 供应链计划引擎 - 路径算法
// ==========================================
// 职责: 每类寻源路径的专用决策算法（预留/释放/拆解/替代/CTP/调拨/加急/采购）
// 输出: 建议数量、成本、交期与置信度，供编排器修正候选选项
// ==========================================

mod base;
mod ctp_johnson;
mod disassembly;
mod executor;
mod expedite;
mod purchase;
mod registry;
mod release;
mod reserve;
mod substitutes;
mod transfer;


pub use base::{
    AlgorithmContext, AlgorithmError, AlgorithmInput, AlgorithmOutput, AlgorithmStatus,
    AlgorithmType, AlternativeConsidered, CompetingRequest, ComponentValue, FlowShopJob,
    Reservation, SourcingAlgorithm, SubstituteEdge, SupplierQuote, TransferSource,
};
pub use ctp_johnson::{
    johnson_sequence, simulate, CtpJohnsonAlgorithm, FlowShopSchedule, ScheduleStatus, ScheduledJob,
};
pub use disassembly::{DisassemblyKnapsackAlgorithm, KnapsackSelection};
pub use executor::{AlgorithmExecutor, ExecutionPolicy};
pub use expedite::{ExpediteProbabilityAlgorithm, TierEvaluation};
pub use purchase::{criteria_weights, PurchaseMulticriterionAlgorithm};
pub use registry::{AlgorithmMetadata, AlgorithmRegistry};
pub use release::{marginal_cost_factor, ReleaseMarginalCostAlgorithm};
pub use reserve::ReserveDynamicAlgorithm;
pub use substitutes::{SubstitutePath, SubstitutesGraphAlgorithm};
pub use transfer::{TransferQuote, TransferTdabcAlgorithm};
