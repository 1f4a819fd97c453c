// ==========================================
// 供应链计划引擎 - 组合优化约束
// ==========================================
// 职责: 约束类型定义 + 流式 ConstraintBuilder + 一致性校验
// 约束: 需求 / FEFO / 容量 / 交期 / 服务水平 / 调拨 / one-in / 预算 / 来源偏好
// ==========================================

use crate::domain::inventory::InventoryLot;
use crate::domain::money::{money_from_f64, money_to_f64, Money};
use crate::error::{PlannerError, PlannerResult};
use crate::stats::inverse_normal_cdf;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintType {
    Demand,
    Fefo,
    Capacity,
    LeadTime,
    ServiceLevel,
    Transfer,
    OneIn,
    Budget,
    Sourcing,
}

impl ConstraintType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintType::Demand => "DEMAND",
            ConstraintType::Fefo => "FEFO",
            ConstraintType::Capacity => "CAPACITY",
            ConstraintType::LeadTime => "LEAD_TIME",
            ConstraintType::ServiceLevel => "SERVICE_LEVEL",
            ConstraintType::Transfer => "TRANSFER",
            ConstraintType::OneIn => "ONE_IN",
            ConstraintType::Budget => "BUDGET",
            ConstraintType::Sourcing => "SOURCING",
        }
    }
}

impl fmt::Display for ConstraintType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 约束定义
// ==========================================

/// 需求下限: Σ qty ≥ demand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandConstraint {
    pub item_id: String,
    pub quantity_required: f64,
    pub unit_of_measure: String,
}

impl DemandConstraint {
    pub fn new(item_id: &str, quantity_required: f64, unit_of_measure: &str) -> PlannerResult<Self> {
        if !(quantity_required > 0.0) {
            return Err(PlannerError::InvalidConstraint(format!(
                "需求必须 > 0: item_id={}, qty={}",
                item_id, quantity_required
            )));
        }
        Ok(Self {
            item_id: item_id.to_string(),
            quantity_required,
            unit_of_measure: unit_of_measure.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FefoBatch {
    pub batch_id: String,
    pub expiration_date: Option<NaiveDate>,
    pub receipt_date: Option<NaiveDate>,
    pub quantity: f64,
}

impl FefoBatch {
    pub fn from_lot(lot: &InventoryLot) -> Self {
        Self {
            batch_id: lot.lot_number.clone(),
            expiration_date: lot.expiration_date,
            receipt_date: Some(lot.receipt_date),
            quantity: lot.quantity_available(),
        }
    }
}

/// FEFO: 按到期日消耗（无到期日排最后）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FefoConstraint {
    pub item_id: String,
    pub batches: Vec<FefoBatch>,
    pub consumption_sequence: Vec<String>,
}

impl FefoConstraint {
    pub fn new(item_id: &str, batches: Vec<FefoBatch>) -> Self {
        let mut constraint = Self {
            item_id: item_id.to_string(),
            batches,
            consumption_sequence: Vec::new(),
        };
        constraint.apply();
        constraint
    }

    /// 计算消耗顺序: 到期日升序，其次入库日升序
    pub fn apply(&mut self) -> &[String] {
        let mut sorted: Vec<&FefoBatch> = self.batches.iter().collect();
        sorted.sort_by_key(|b| {
            (
                b.expiration_date.unwrap_or(NaiveDate::MAX),
                b.receipt_date.unwrap_or(NaiveDate::MAX),
            )
        });
        self.consumption_sequence = sorted.into_iter().map(|b| b.batch_id.clone()).collect();
        &self.consumption_sequence
    }

    /// 批次在消耗顺序中的位置
    pub fn rank_of(&self, batch_id: &str) -> Option<usize> {
        self.consumption_sequence.iter().position(|id| id == batch_id)
    }
}

/// 库位容量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityConstraint {
    pub location_id: String,
    pub max_units: f64,
    #[serde(default)]
    pub max_value: Option<Money>,
    #[serde(default)]
    pub current_inventory: f64,
}

impl CapacityConstraint {
    pub fn available_capacity(&self) -> f64 {
        (self.max_units - self.current_inventory).max(0.0)
    }

    /// 利用率（百分比）
    pub fn utilization_rate(&self) -> f64 {
        if self.max_units == 0.0 {
            return 0.0;
        }
        self.current_inventory / self.max_units * 100.0
    }
}

/// 交期: 服务水平分位交期 ≤ 剩余天数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadTimeConstraint {
    pub option_id: String,
    pub required_date: NaiveDate,
    pub as_of: NaiveDate,
    pub lead_time_mean_days: f64,
    pub lead_time_std_days: f64,
    pub service_level: f64,
}

impl LeadTimeConstraint {
    /// μ + z(SL)·σ
    pub fn sl_lead_time_days(&self) -> f64 {
        self.lead_time_mean_days + inverse_normal_cdf(self.service_level) * self.lead_time_std_days
    }

    pub fn days_available(&self) -> f64 {
        (self.required_date - self.as_of).num_days() as f64
    }

    pub fn is_met(&self) -> bool {
        self.sl_lead_time_days() <= self.days_available()
    }
}

/// 服务水平下限
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceLevelConstraint {
    pub item_id: String,
    pub min_service_level: f64,
    #[serde(default)]
    pub current_availability: Option<f64>,
}

impl ServiceLevelConstraint {
    pub fn is_compliant(&self) -> bool {
        self.current_availability
            .map(|a| a >= self.min_service_level)
            .unwrap_or(false)
    }
}

/// 库位间调拨
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferConstraint {
    pub from_location: String,
    pub to_location: String,
    #[serde(default)]
    pub max_transfer_qty: Option<f64>,
    #[serde(default)]
    pub transfer_cost_per_unit: Money,
    #[serde(default)]
    pub transfer_lead_time_days: i64,
}

impl TransferConstraint {
    /// 按上限数量调拨的总成本（无上限时为 0）
    pub fn transfer_cost_total(&self) -> Money {
        match self.max_transfer_qty {
            Some(qty) => crate::domain::money::extend(self.transfer_cost_per_unit, qty),
            None => Money::ZERO,
        }
    }
}

/// one-in: 允许列表中至多选一个供应商
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneInConstraint {
    pub item_id: String,
    pub allowed_suppliers: Vec<String>,
}

impl OneInConstraint {
    pub fn new(item_id: &str, allowed_suppliers: Vec<String>) -> PlannerResult<Self> {
        if allowed_suppliers.is_empty() {
            return Err(PlannerError::InvalidConstraint(format!(
                "one-in 约束至少需要 1 个供应商: item_id={}",
                item_id
            )));
        }
        Ok(Self {
            item_id: item_id.to_string(),
            allowed_suppliers,
        })
    }

    pub fn covers(&self, supplier_id: &str) -> bool {
        self.allowed_suppliers.iter().any(|s| s == supplier_id)
    }
}

/// 总预算
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetConstraint {
    pub total_budget: Money,
    pub currency: String,
    #[serde(default)]
    pub contingency_pct: f64,
}

impl BudgetConstraint {
    /// 扣除预留后的可用预算
    pub fn available_budget(&self) -> Money {
        let factor = money_from_f64(1.0 - self.contingency_pct / 100.0);
        (self.total_budget * factor).round_dp(crate::domain::money::MONEY_SCALE)
    }
}

/// 来源偏好（软约束）: 非偏好供应商系数 × penalty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcingPreferenceConstraint {
    pub item_id: String,
    pub preferred_supplier: String,
    pub penalty_multiplier: f64,
}

// ==========================================
// ConstraintSet - 构建结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintSet {
    pub demand: Vec<DemandConstraint>,
    pub fefo: Vec<FefoConstraint>,
    pub capacity: Vec<CapacityConstraint>,
    pub lead_time: Vec<LeadTimeConstraint>,
    pub service_level: Vec<ServiceLevelConstraint>,
    pub transfer: Vec<TransferConstraint>,
    pub one_in: Vec<OneInConstraint>,
    pub budget: Vec<BudgetConstraint>,
    pub sourcing: Vec<SourcingPreferenceConstraint>,
}

impl ConstraintSet {
    pub fn count(&self, constraint_type: ConstraintType) -> usize {
        match constraint_type {
            ConstraintType::Demand => self.demand.len(),
            ConstraintType::Fefo => self.fefo.len(),
            ConstraintType::Capacity => self.capacity.len(),
            ConstraintType::LeadTime => self.lead_time.len(),
            ConstraintType::ServiceLevel => self.service_level.len(),
            ConstraintType::Transfer => self.transfer.len(),
            ConstraintType::OneIn => self.one_in.len(),
            ConstraintType::Budget => self.budget.len(),
            ConstraintType::Sourcing => self.sourcing.len(),
        }
    }

    pub fn total(&self) -> usize {
        ALL_TYPES.iter().map(|t| self.count(*t)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// 非空类型 → 条数
    pub fn summary(&self) -> BTreeMap<ConstraintType, usize> {
        ALL_TYPES
            .iter()
            .map(|t| (*t, self.count(*t)))
            .filter(|(_, n)| *n > 0)
            .collect()
    }

    /// 一致性问题列表（空表示一致）
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if !self.fefo.is_empty() && self.capacity.is_empty() {
            issues.push("存在 FEFO 约束但没有任何容量约束".to_string());
        }
        if self.demand.len() > 1 {
            issues.push(format!("需求约束应唯一，实际 {} 条", self.demand.len()));
        }
        if let (Some(demand), Some(budget)) = (self.demand.first(), self.budget.first()) {
            if budget.available_budget() <= Money::ZERO && demand.quantity_required > 0.0 {
                issues.push("可用预算为 0，无法覆盖任何需求".to_string());
            }
        }
        for sl in &self.service_level {
            if !(0.0..=1.0).contains(&sl.min_service_level) {
                issues.push(format!("服务水平越界: {}", sl.min_service_level));
            }
        }
        issues
    }

    pub fn demand_quantity(&self) -> Option<f64> {
        self.demand.first().map(|d| d.quantity_required)
    }

    /// 最紧的可用预算
    pub fn available_budget(&self) -> Option<Money> {
        self.budget.iter().map(|b| b.available_budget()).min()
    }

    pub fn capacity_for(&self, location_id: &str) -> Option<&CapacityConstraint> {
        self.capacity.iter().find(|c| c.location_id == location_id)
    }

    pub fn transfer_from(&self, location_id: &str) -> Option<&TransferConstraint> {
        self.transfer.iter().find(|t| t.from_location == location_id)
    }

    pub fn lead_time_for(&self, option_id: &str) -> Option<&LeadTimeConstraint> {
        self.lead_time.iter().find(|l| l.option_id == option_id)
    }

    /// 服务水平下限（取最严）
    pub fn min_service_level(&self) -> Option<f64> {
        self.service_level
            .iter()
            .map(|s| s.min_service_level)
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
    }

    /// 供应商偏好惩罚系数（偏好供应商或无约束时为 1）
    pub fn preference_penalty(&self, supplier_id: Option<&str>) -> f64 {
        self.sourcing
            .iter()
            .filter(|p| supplier_id.map_or(false, |s| s != p.preferred_supplier))
            .map(|p| p.penalty_multiplier.max(1.0))
            .fold(1.0, f64::max)
    }

    /// FEFO 消耗顺序中的位置
    pub fn fefo_rank(&self, batch_id: &str) -> Option<usize> {
        self.fefo.iter().find_map(|f| f.rank_of(batch_id))
    }
}

const ALL_TYPES: [ConstraintType; 9] = [
    ConstraintType::Demand,
    ConstraintType::Fefo,
    ConstraintType::Capacity,
    ConstraintType::LeadTime,
    ConstraintType::ServiceLevel,
    ConstraintType::Transfer,
    ConstraintType::OneIn,
    ConstraintType::Budget,
    ConstraintType::Sourcing,
];

// ==========================================
// ConstraintBuilder - 流式构建
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ConstraintBuilder {
    set: ConstraintSet,
}

impl ConstraintBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_demand(mut self, item_id: &str, quantity_required: f64, unit_of_measure: &str) -> PlannerResult<Self> {
        let constraint = DemandConstraint::new(item_id, quantity_required, unit_of_measure)?;
        debug!(item_id, quantity_required, "添加需求约束");
        self.set.demand.push(constraint);
        Ok(self)
    }

    pub fn add_fefo(mut self, item_id: &str, batches: Vec<FefoBatch>) -> Self {
        debug!(item_id, batches = batches.len(), "添加 FEFO 约束");
        self.set.fefo.push(FefoConstraint::new(item_id, batches));
        self
    }

    pub fn add_capacity(mut self, location_id: &str, max_units: f64, max_value: Option<Money>, current_inventory: f64) -> Self {
        debug!(location_id, max_units, "添加容量约束");
        self.set.capacity.push(CapacityConstraint {
            location_id: location_id.to_string(),
            max_units,
            max_value,
            current_inventory,
        });
        self
    }

    pub fn add_lead_time(
        mut self,
        option_id: &str,
        required_date: NaiveDate,
        as_of: NaiveDate,
        lead_time_mean_days: f64,
        lead_time_std_days: f64,
        service_level: f64,
    ) -> Self {
        self.set.lead_time.push(LeadTimeConstraint {
            option_id: option_id.to_string(),
            required_date,
            as_of,
            lead_time_mean_days,
            lead_time_std_days,
            service_level,
        });
        self
    }

    pub fn add_service_level(mut self, item_id: &str, min_service_level: f64, current_availability: Option<f64>) -> Self {
        self.set.service_level.push(ServiceLevelConstraint {
            item_id: item_id.to_string(),
            min_service_level,
            current_availability,
        });
        self
    }

    pub fn add_transfer(
        mut self,
        from_location: &str,
        to_location: &str,
        max_transfer_qty: Option<f64>,
        transfer_cost_per_unit: Money,
        transfer_lead_time_days: i64,
    ) -> Self {
        self.set.transfer.push(TransferConstraint {
            from_location: from_location.to_string(),
            to_location: to_location.to_string(),
            max_transfer_qty,
            transfer_cost_per_unit,
            transfer_lead_time_days,
        });
        self
    }

    pub fn add_one_in(mut self, item_id: &str, allowed_suppliers: Vec<String>) -> PlannerResult<Self> {
        let constraint = OneInConstraint::new(item_id, allowed_suppliers)?;
        self.set.one_in.push(constraint);
        Ok(self)
    }

    pub fn add_budget(mut self, total_budget: Money, currency: &str, contingency_pct: f64) -> PlannerResult<Self> {
        if total_budget < Money::ZERO || !(0.0..100.0).contains(&contingency_pct) {
            return Err(PlannerError::InvalidConstraint(format!(
                "预算参数无效: budget={}, contingency={}%",
                total_budget, contingency_pct
            )));
        }
        debug!(budget = money_to_f64(total_budget), contingency_pct, "添加预算约束");
        self.set.budget.push(BudgetConstraint {
            total_budget,
            currency: currency.to_string(),
            contingency_pct,
        });
        Ok(self)
    }

    pub fn add_sourcing_preference(mut self, item_id: &str, preferred_supplier: &str, penalty_multiplier: f64) -> Self {
        self.set.sourcing.push(SourcingPreferenceConstraint {
            item_id: item_id.to_string(),
            preferred_supplier: preferred_supplier.to_string(),
            penalty_multiplier,
        });
        self
    }

    pub fn summary(&self) -> BTreeMap<ConstraintType, usize> {
        self.set.summary()
    }

    pub fn validate(&self) -> Vec<String> {
        self.set.validate()
    }

    pub fn clear(&mut self) {
        self.set = ConstraintSet::default();
        debug!("约束已清空");
    }

    /// 输出约束集（一致性问题只告警不拒绝）
    pub fn build(self) -> ConstraintSet {
        let issues = self.set.validate();
        if !issues.is_empty() {
            warn!(issues = ?issues, "约束集存在一致性问题");
        }
        self.set
    }
}
