// ==========================================
// 供应链计划引擎 - 库存批次领域模型
// ==========================================
// 职责: 批次数量口径、效期派生、FEFO 出库顺序
// 红线: on_hand ≤ received; available = max(0, on_hand - hard - allocated)
// 来源: 库存系统维护，引擎只读并排序
// ==========================================

use crate::domain::types::QualityStatus;
use crate::error::{PlannerError, PlannerResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 临期判定默认阈值（天）
pub const DEFAULT_CRITICAL_EXPIRATION_DAYS: i64 = 30;

// ==========================================
// LotLocation - 批次库位
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotLocation {
    pub warehouse_code: String,
    pub zone: String,
    pub rack: String,
    pub level: u32,
    pub position: String,
}

impl LotLocation {
    pub fn full_location(&self) -> String {
        format!(
            "{}-{}-{}-{}-{}",
            self.warehouse_code, self.zone, self.rack, self.level, self.position
        )
    }
}

// ==========================================
// InventoryLot - 库存批次
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryLot {
    // ===== 标识 =====
    pub lot_number: String,
    #[serde(default)]
    pub serial_number: Option<String>,
    pub item_id: String,

    // ===== 数量 =====
    pub quantity_received: f64,
    pub quantity_on_hand: f64,
    #[serde(default)]
    pub quantity_reserved_hard: f64, // 硬预留（已确认）
    #[serde(default)]
    pub quantity_reserved_soft: f64, // 软预留（意向）
    #[serde(default)]
    pub quantity_allocated: f64,     // 已分配出库

    // ===== 日期 =====
    pub receipt_date: NaiveDate,
    #[serde(default)]
    pub expiration_date: Option<NaiveDate>,

    // ===== 质量 =====
    #[serde(default = "default_quality_status")]
    pub quality_status: QualityStatus,

    // ===== 库位 =====
    #[serde(default)]
    pub locations: Vec<LotLocation>,

    // ===== 追溯 =====
    pub supplier_id: String,
    pub purchase_order: String,
    #[serde(default)]
    pub invoice_number: Option<String>,
}

fn default_quality_status() -> QualityStatus {
    QualityStatus::Inspecting
}

impl InventoryLot {
    /// 创建批次（校验数量口径）
    pub fn new(
        lot_number: &str,
        item_id: &str,
        quantity_received: f64,
        quantity_on_hand: f64,
        receipt_date: NaiveDate,
        supplier_id: &str,
        purchase_order: &str,
    ) -> PlannerResult<Self> {
        let lot = Self {
            lot_number: lot_number.to_string(),
            serial_number: None,
            item_id: item_id.to_string(),
            quantity_received,
            quantity_on_hand,
            quantity_reserved_hard: 0.0,
            quantity_reserved_soft: 0.0,
            quantity_allocated: 0.0,
            receipt_date,
            expiration_date: None,
            quality_status: QualityStatus::Inspecting,
            locations: Vec::new(),
            supplier_id: supplier_id.to_string(),
            purchase_order: purchase_order.to_string(),
            invoice_number: None,
        };
        lot.validate()?;
        Ok(lot)
    }

    /// 校验数量口径
    pub fn validate(&self) -> PlannerResult<()> {
        if self.lot_number.trim().is_empty() {
            return Err(PlannerError::MissingField("lot_number"));
        }
        let quantities = [
            self.quantity_received,
            self.quantity_on_hand,
            self.quantity_reserved_hard,
            self.quantity_reserved_soft,
            self.quantity_allocated,
        ];
        if quantities.iter().any(|q| !(*q >= 0.0)) {
            return Err(PlannerError::InvalidInput(format!(
                "批次数量不能为负: lot={}",
                self.lot_number
            )));
        }
        if self.quantity_on_hand > self.quantity_received {
            return Err(PlannerError::InvalidInput(format!(
                "在库数量不能超过收货数量: lot={}, on_hand={}, received={}",
                self.lot_number, self.quantity_on_hand, self.quantity_received
            )));
        }
        Ok(())
    }

    /// 真实可用量（扣除硬预留与已分配，不为负）
    pub fn quantity_available(&self) -> f64 {
        (self.quantity_on_hand - self.quantity_reserved_hard - self.quantity_allocated).max(0.0)
    }

    pub fn is_expired(&self, as_of: NaiveDate) -> bool {
        self.expiration_date.map(|exp| as_of > exp).unwrap_or(false)
    }

    /// 距到期天数（已过期返回 0，无效期返回 None）
    pub fn days_to_expiration(&self, as_of: NaiveDate) -> Option<i64> {
        self.expiration_date
            .map(|exp| (exp - as_of).num_days().max(0))
    }

    /// 是否临期
    pub fn is_critical_expiration(&self, as_of: NaiveDate, threshold_days: i64) -> bool {
        self.days_to_expiration(as_of)
            .map(|d| d <= threshold_days)
            .unwrap_or(false)
    }
}

// ==========================================
// InventorySnapshot - 库存快照
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub as_of: NaiveDate,
    pub warehouse_code: String,
    pub item_id: String,
    #[serde(default)]
    pub lots: Vec<InventoryLot>,
}

impl InventorySnapshot {
    pub fn new(as_of: NaiveDate, warehouse_code: &str, item_id: &str, lots: Vec<InventoryLot>) -> PlannerResult<Self> {
        for lot in &lots {
            lot.validate()?;
        }
        Ok(Self {
            as_of,
            warehouse_code: warehouse_code.to_string(),
            item_id: item_id.to_string(),
            lots,
        })
    }

    pub fn total_on_hand(&self) -> f64 {
        self.lots.iter().map(|l| l.quantity_on_hand).sum()
    }

    pub fn total_reserved_hard(&self) -> f64 {
        self.lots.iter().map(|l| l.quantity_reserved_hard).sum()
    }

    pub fn total_reserved_soft(&self) -> f64 {
        self.lots.iter().map(|l| l.quantity_reserved_soft).sum()
    }

    /// 过期批次在库量
    pub fn expired_quantity(&self) -> f64 {
        self.lots
            .iter()
            .filter(|l| l.is_expired(self.as_of))
            .map(|l| l.quantity_on_hand)
            .sum()
    }

    /// 质量冻结批次在库量
    pub fn quality_hold_quantity(&self) -> f64 {
        self.lots
            .iter()
            .filter(|l| l.quality_status.is_hold())
            .map(|l| l.quantity_on_hand)
            .sum()
    }

    /// 临期批次在库量（未过期）
    pub fn critical_expiration_quantity(&self, threshold_days: i64) -> f64 {
        self.lots
            .iter()
            .filter(|l| !l.is_expired(self.as_of) && l.is_critical_expiration(self.as_of, threshold_days))
            .map(|l| l.quantity_on_hand)
            .sum()
    }

    /// 可用量：仅计合格且未过期批次
    pub fn quantity_available(&self) -> f64 {
        self.allocation_sequence_fefo()
            .iter()
            .map(|l| l.quantity_available())
            .sum()
    }

    /// 按库位（仓库代码）汇总可用量
    pub fn available_by_warehouse(&self) -> BTreeMap<String, f64> {
        let mut result = BTreeMap::new();
        for lot in self.allocation_sequence_fefo() {
            let key = lot
                .locations
                .first()
                .map(|loc| loc.warehouse_code.clone())
                .unwrap_or_else(|| self.warehouse_code.clone());
            *result.entry(key).or_insert(0.0) += lot.quantity_available();
        }
        result
    }

    pub fn oldest_lot_receipt_date(&self) -> Option<NaiveDate> {
        self.lots.iter().map(|l| l.receipt_date).min()
    }

    pub fn find_lot(&self, lot_number: &str) -> Option<&InventoryLot> {
        self.lots.iter().find(|l| l.lot_number == lot_number)
    }

    /// FEFO 出库顺序
    ///
    /// # 规则
    /// - 仅 APPROVED 且未过期批次
    /// - 到期日升序（无效期排最后），再按收货日升序
    pub fn allocation_sequence_fefo(&self) -> Vec<&InventoryLot> {
        let mut lots: Vec<&InventoryLot> = self
            .lots
            .iter()
            .filter(|l| l.quality_status == QualityStatus::Approved && !l.is_expired(self.as_of))
            .collect();
        lots.sort_by_key(|l| (l.expiration_date.unwrap_or(NaiveDate::MAX), l.receipt_date));
        lots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn lot(lot_number: &str, exp: Option<NaiveDate>, receipt: NaiveDate, status: QualityStatus) -> InventoryLot {
        let mut lot = InventoryLot::new(lot_number, "ITEM-001", 100.0, 80.0, receipt, "SUP-1", "PO-1").unwrap();
        lot.expiration_date = exp;
        lot.quality_status = status;
        lot
    }

    #[test]
    fn test_available_never_negative() {
        let mut l = lot("L1", None, date(2026, 1, 1), QualityStatus::Approved);
        l.quantity_reserved_hard = 50.0;
        l.quantity_allocated = 20.0;
        assert_eq!(l.quantity_available(), 10.0);
        l.quantity_allocated = 60.0;
        assert_eq!(l.quantity_available(), 0.0);
    }

    #[test]
    fn test_on_hand_cannot_exceed_received() {
        let result = InventoryLot::new("L1", "ITEM-001", 10.0, 11.0, date(2026, 1, 1), "S", "PO");
        assert!(result.is_err());
    }

    #[test]
    fn test_expiration_derivations() {
        let as_of = date(2026, 3, 1);
        let l = lot("L1", Some(date(2026, 3, 20)), date(2026, 1, 1), QualityStatus::Approved);
        assert!(!l.is_expired(as_of));
        assert_eq!(l.days_to_expiration(as_of), Some(19));
        assert!(l.is_critical_expiration(as_of, DEFAULT_CRITICAL_EXPIRATION_DAYS));
        assert!(!l.is_critical_expiration(as_of, 7));
        assert!(l.is_expired(date(2026, 3, 21)));
        assert_eq!(l.days_to_expiration(date(2026, 4, 1)), Some(0));
    }

    #[test]
    fn test_fefo_sequence_filters_and_orders() {
        let as_of = date(2026, 3, 1);
        let lots = vec![
            lot("NO-EXP", None, date(2025, 12, 1), QualityStatus::Approved),
            lot("LATE", Some(date(2026, 6, 1)), date(2026, 1, 5), QualityStatus::Approved),
            lot("EARLY-B", Some(date(2026, 4, 1)), date(2026, 1, 10), QualityStatus::Approved),
            lot("EARLY-A", Some(date(2026, 4, 1)), date(2026, 1, 2), QualityStatus::Approved),
            lot("EXPIRED", Some(date(2026, 2, 1)), date(2025, 11, 1), QualityStatus::Approved),
            lot("HOLD", Some(date(2026, 3, 15)), date(2026, 1, 1), QualityStatus::Quarantine),
        ];
        let snapshot = InventorySnapshot::new(as_of, "WH-1", "ITEM-001", lots).unwrap();
        let order: Vec<&str> = snapshot
            .allocation_sequence_fefo()
            .iter()
            .map(|l| l.lot_number.as_str())
            .collect();
        assert_eq!(order, vec!["EARLY-A", "EARLY-B", "LATE", "NO-EXP"]);
        assert_eq!(snapshot.expired_quantity(), 80.0);
        assert_eq!(snapshot.quality_hold_quantity(), 80.0);
        assert_eq!(snapshot.quantity_available(), 320.0);
    }
}
