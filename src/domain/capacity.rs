// ==========================================
// 供应链计划引擎 - 资源能力领域模型
// ==========================================
// 职责: 供应商/仓库/运输等资源的能力占用
// 约定: available = max(0, capacity - reserved - allocated)
// ==========================================

use crate::error::{PlannerError, PlannerResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 能力类型 (Capacity Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CapacityType {
    SupplierCapacity,  // 供应商产能
    WarehouseCapacity, // 仓储空间
    TransportCapacity, // 运力
    MachineCapacity,   // 设备产能（自制）
    CashFlow,          // 资金额度
    CustomsCapacity,   // 通关能力
}

impl fmt::Display for CapacityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacityType::SupplierCapacity => write!(f, "SUPPLIER_CAPACITY"),
            CapacityType::WarehouseCapacity => write!(f, "WAREHOUSE_CAPACITY"),
            CapacityType::TransportCapacity => write!(f, "TRANSPORT_CAPACITY"),
            CapacityType::MachineCapacity => write!(f, "MACHINE_CAPACITY"),
            CapacityType::CashFlow => write!(f, "CASH_FLOW"),
            CapacityType::CustomsCapacity => write!(f, "CUSTOMS_CAPACITY"),
        }
    }
}

// ==========================================
// ResourceCapacity - 资源能力
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceCapacity {
    // ===== 标识 =====
    pub resource_id: String,
    pub capacity_type: CapacityType,

    // ===== 能力 =====
    pub capacity_value: f64,
    pub capacity_unit: String,

    // ===== 占用 =====
    #[serde(default)]
    pub reserved_value: f64,  // 软占用
    #[serde(default)]
    pub allocated_value: f64, // 硬占用

    // ===== 可用窗口 =====
    #[serde(default)]
    pub available_from: Option<NaiveDate>,
    #[serde(default)]
    pub available_until: Option<NaiveDate>,
}

impl ResourceCapacity {
    pub fn new(resource_id: &str, capacity_type: CapacityType, capacity_value: f64, capacity_unit: &str) -> PlannerResult<Self> {
        if resource_id.trim().is_empty() {
            return Err(PlannerError::MissingField("resource_id"));
        }
        if !(capacity_value >= 0.0) {
            return Err(PlannerError::InvalidInput(format!(
                "能力值必须 ≥ 0: resource_id={}, value={}",
                resource_id, capacity_value
            )));
        }
        Ok(Self {
            resource_id: resource_id.to_string(),
            capacity_type,
            capacity_value,
            capacity_unit: capacity_unit.to_string(),
            reserved_value: 0.0,
            allocated_value: 0.0,
            available_from: None,
            available_until: None,
        })
    }

    /// 占用能力
    ///
    /// # 参数
    /// - `value`: 占用量
    /// - `is_hard`: true=硬占用，false=软占用
    ///
    /// # 返回
    /// - `true`: 占用成功
    /// - `false`: 剩余能力不足（不做部分占用）
    pub fn allocate(&mut self, value: f64, is_hard: bool) -> bool {
        if !self.can_allocate(value) {
            return false;
        }
        if is_hard {
            self.allocated_value += value;
        } else {
            self.reserved_value += value;
        }
        true
    }

    /// 释放能力（不低于 0）
    pub fn release(&mut self, value: f64, is_hard: bool) {
        if is_hard {
            self.allocated_value = (self.allocated_value - value).max(0.0);
        } else {
            self.reserved_value = (self.reserved_value - value).max(0.0);
        }
    }

    /// 是否在可用窗口内
    pub fn is_available_on(&self, date: NaiveDate) -> bool {
        let after_start = self.available_from.map(|d| date >= d).unwrap_or(true);
        let before_end = self.available_until.map(|d| date <= d).unwrap_or(true);
        after_start && before_end
    }
}

// ==========================================
// Trait: CapacityCheck
// ==========================================
// 用途: 求解器与资源模型共用的能力检查接口
pub trait CapacityCheck {
    /// 剩余可用能力
    fn remaining_capacity(&self) -> f64;

    /// 利用率（百分比）
    fn utilization_pct(&self) -> f64;

    /// 是否可容纳指定占用量
    fn can_allocate(&self, value: f64) -> bool {
        self.remaining_capacity() >= value
    }
}

impl CapacityCheck for ResourceCapacity {
    fn remaining_capacity(&self) -> f64 {
        (self.capacity_value - self.reserved_value - self.allocated_value).max(0.0)
    }

    fn utilization_pct(&self) -> f64 {
        if self.capacity_value <= 0.0 {
            return 0.0;
        }
        (self.reserved_value + self.allocated_value) / self.capacity_value * 100.0
    }
}
