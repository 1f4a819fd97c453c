// ==========================================
// 供应链计划引擎 - 领域类型定义
// ==========================================
// 职责: 物料分类、关键度、质检状态、寻源路径等枚举
// 序列化格式: SCREAMING_SNAKE_CASE (与上游主数据一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 物料关键度 (Criticality)
// ==========================================
// 顺序: Critical > High > Medium > Low
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Criticality {
    Critical, // 停线级
    High,     // 高
    Medium,   // 中
    Low,      // 低
}

impl fmt::Display for Criticality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Criticality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Criticality::Critical => "CRITICAL",
            Criticality::High => "HIGH",
            Criticality::Medium => "MEDIUM",
            Criticality::Low => "LOW",
        }
    }

    /// 宽松解析：未知值按 MEDIUM 处理
    pub fn from_str_lenient(s: &str) -> Self {
        s.parse().unwrap_or(Criticality::Medium)
    }

    /// 关键度排序值（越小越优先）
    pub fn rank(&self) -> u8 {
        match self {
            Criticality::Critical => 0,
            Criticality::High => 1,
            Criticality::Medium => 2,
            Criticality::Low => 3,
        }
    }

    /// 关键度数值特征 (1.0 / 0.75 / 0.5 / 0.25)
    pub fn score(&self) -> f64 {
        match self {
            Criticality::Critical => 1.0,
            Criticality::High => 0.75,
            Criticality::Medium => 0.5,
            Criticality::Low => 0.25,
        }
    }

    /// CRITICAL / HIGH 视为关键物料
    pub fn is_critical(&self) -> bool {
        matches!(self, Criticality::Critical | Criticality::High)
    }
}

impl Default for Criticality {
    fn default() -> Self {
        Criticality::Medium
    }
}

impl std::str::FromStr for Criticality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CRITICAL" => Ok(Criticality::Critical),
            "HIGH" => Ok(Criticality::High),
            "MEDIUM" => Ok(Criticality::Medium),
            "LOW" => Ok(Criticality::Low),
            other => Err(format!("未知关键度: {}", other)),
        }
    }
}

// ==========================================
// ABC 分类
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AbcClass {
    A,
    B,
    C,
}

impl fmt::Display for AbcClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbcClass::A => write!(f, "A"),
            AbcClass::B => write!(f, "B"),
            AbcClass::C => write!(f, "C"),
        }
    }
}

impl AbcClass {
    /// ABC 数值特征 (A=1.0, B=0.5, C=0.2)
    pub fn value(&self) -> f64 {
        match self {
            AbcClass::A => 1.0,
            AbcClass::B => 0.5,
            AbcClass::C => 0.2,
        }
    }
}

// ==========================================
// 采购类型 (Procurement Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcurementType {
    Purchased,    // 外购
    Manufactured, // 自制
    Both,         // 外购或自制
}

impl fmt::Display for ProcurementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcurementType::Purchased => write!(f, "PURCHASED"),
            ProcurementType::Manufactured => write!(f, "MANUFACTURED"),
            ProcurementType::Both => write!(f, "BOTH"),
        }
    }
}

// ==========================================
// 批次质检状态 (Quality Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityStatus {
    Inspecting,  // 检验中
    Approved,    // 合格
    Conditional, // 让步接收
    Rejected,    // 拒收
    Quarantine,  // 隔离
}

impl fmt::Display for QualityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityStatus::Inspecting => write!(f, "INSPECTING"),
            QualityStatus::Approved => write!(f, "APPROVED"),
            QualityStatus::Conditional => write!(f, "CONDITIONAL"),
            QualityStatus::Rejected => write!(f, "REJECTED"),
            QualityStatus::Quarantine => write!(f, "QUARANTINE"),
        }
    }
}

impl QualityStatus {
    /// 质量冻结（拒收/隔离）
    pub fn is_hold(&self) -> bool {
        matches!(self, QualityStatus::Rejected | QualityStatus::Quarantine)
    }
}

// ==========================================
// 寻源路径类型 (Sourcing Path Type)
// ==========================================
// 13 种取得物料的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourcingPathType {
    StockLocal,      // 本地库存
    StockLiberation, // 释放他单预留
    Disassembly,     // 拆解回收
    Equivalent,      // 等效替代
    Recovery,        // 修复再用
    Manufacturing,   // 自制
    Transfer,        // 库间调拨
    Intercompany,    // 公司间调拨
    Vmi,             // 供应商管理库存
    Loan,            // 借用
    Expedite,        // 加急
    Purchase,        // 国内采购
    PurchaseImport,  // 进口采购
}

impl SourcingPathType {
    pub const ALL: [SourcingPathType; 13] = [
        SourcingPathType::StockLocal,
        SourcingPathType::StockLiberation,
        SourcingPathType::Disassembly,
        SourcingPathType::Equivalent,
        SourcingPathType::Recovery,
        SourcingPathType::Manufacturing,
        SourcingPathType::Transfer,
        SourcingPathType::Intercompany,
        SourcingPathType::Vmi,
        SourcingPathType::Loan,
        SourcingPathType::Expedite,
        SourcingPathType::Purchase,
        SourcingPathType::PurchaseImport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourcingPathType::StockLocal => "STOCK_LOCAL",
            SourcingPathType::StockLiberation => "STOCK_LIBERATION",
            SourcingPathType::Disassembly => "DISASSEMBLY",
            SourcingPathType::Equivalent => "EQUIVALENT",
            SourcingPathType::Recovery => "RECOVERY",
            SourcingPathType::Manufacturing => "MANUFACTURING",
            SourcingPathType::Transfer => "TRANSFER",
            SourcingPathType::Intercompany => "INTERCOMPANY",
            SourcingPathType::Vmi => "VMI",
            SourcingPathType::Loan => "LOAN",
            SourcingPathType::Expedite => "EXPEDITE",
            SourcingPathType::Purchase => "PURCHASE",
            SourcingPathType::PurchaseImport => "PURCHASE_IMPORT",
        }
    }

    /// 追溯链不可信的路径（要求追溯时一律拒绝）
    pub fn breaks_traceability(&self) -> bool {
        matches!(
            self,
            SourcingPathType::Equivalent | SourcingPathType::Disassembly | SourcingPathType::Recovery
        )
    }

    /// 是否为外部采购类路径
    pub fn is_purchase(&self) -> bool {
        matches!(
            self,
            SourcingPathType::Purchase | SourcingPathType::PurchaseImport | SourcingPathType::Expedite
        )
    }
}

impl fmt::Display for SourcingPathType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SourcingPathType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_uppercase().replace('-', "_");
        SourcingPathType::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == key)
            .ok_or_else(|| format!("未知寻源路径: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_criticality_lenient_parse() {
        assert_eq!(Criticality::from_str_lenient("critical"), Criticality::Critical);
        assert_eq!(Criticality::from_str_lenient("urgent"), Criticality::Medium);
        assert!(Criticality::High.is_critical());
        assert!(!Criticality::Low.is_critical());
    }

    #[test]
    fn test_path_type_round_trip_names() {
        for path in SourcingPathType::ALL {
            let parsed: SourcingPathType = path.as_str().parse().unwrap();
            assert_eq!(parsed, path);
        }
        assert_eq!(
            "purchase-import".parse::<SourcingPathType>().unwrap(),
            SourcingPathType::PurchaseImport
        );
    }

    #[test]
    fn test_path_type_serde_format() {
        let json = serde_json::to_string(&SourcingPathType::StockLocal).unwrap();
        assert_eq!(json, "\"STOCK_LOCAL\"");
    }
}
