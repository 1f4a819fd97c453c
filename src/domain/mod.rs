// ==========================================
// 供应链计划引擎 - 领域模型层
// ==========================================
// 职责: 物料、库存批次、交期分布、资源能力、寻源选项
// 红线: 纯数据 + 只读派生属性，不含引擎逻辑
// ==========================================

pub mod capacity;
pub mod inventory;
pub mod item;
pub mod lead_time;
pub mod money;
pub mod sourcing;
pub mod types;

// 重导出核心类型
pub use capacity::{CapacityCheck, CapacityType, ResourceCapacity};
pub use inventory::{InventoryLot, InventorySnapshot, LotLocation};
pub use item::{BomComponent, EquivalentItem, ItemMaster};
pub use lead_time::{LeadTimeDistribution, LeadTimeEstimate, LeadTimeObservation};
pub use money::Money;
pub use sourcing::{SelectedAllocation, SourcingOption, SourcingPath};
pub use types::{AbcClass, Criticality, ProcurementType, QualityStatus, SourcingPathType};
