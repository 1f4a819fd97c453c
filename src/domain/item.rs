// ==========================================
// 供应链计划引擎 - 物料主数据领域模型
// ==========================================
// 职责: 物料主数据、BOM、等效物料
// 来源: 外部主数据系统维护，引擎只读
// ==========================================

use crate::domain::money::Money;
use crate::domain::types::{AbcClass, Criticality, ProcurementType};
use crate::error::{PlannerError, PlannerResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// BomComponent - BOM 组件
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BomComponent {
    pub component_id: String,
    pub quantity: f64,         // 单台用量
    pub unit_of_measure: String,
    #[serde(default = "default_sequence")]
    pub sequence: u32,
    #[serde(default = "default_scrap_factor")]
    pub scrap_factor: f64,     // 损耗系数 (1.05 = 5%)，必须 ≥ 1
}

fn default_sequence() -> u32 {
    1
}

fn default_scrap_factor() -> f64 {
    1.0
}

impl BomComponent {
    pub fn new(component_id: &str, quantity: f64, unit_of_measure: &str) -> PlannerResult<Self> {
        let component = Self {
            component_id: component_id.to_string(),
            quantity,
            unit_of_measure: unit_of_measure.to_string(),
            sequence: 1,
            scrap_factor: 1.0,
        };
        component.validate()?;
        Ok(component)
    }

    pub fn validate(&self) -> PlannerResult<()> {
        if self.component_id.trim().is_empty() {
            return Err(PlannerError::MissingField("component_id"));
        }
        if !(self.quantity >= 0.0) {
            return Err(PlannerError::InvalidInput(format!(
                "BOM 用量必须 ≥ 0: component_id={}, quantity={}",
                self.component_id, self.quantity
            )));
        }
        if !(self.scrap_factor >= 1.0) {
            return Err(PlannerError::InvalidInput(format!(
                "损耗系数必须 ≥ 1: component_id={}, scrap_factor={}",
                self.component_id, self.scrap_factor
            )));
        }
        Ok(())
    }

    /// 含损耗的实际用量
    pub fn gross_quantity(&self) -> f64 {
        self.quantity * self.scrap_factor
    }
}

// ==========================================
// EquivalentItem - 等效/替代物料
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquivalentItem {
    pub equivalent_id: String,
    pub equivalent_code: String,
    #[serde(default = "default_one")]
    pub conversion_factor: f64,       // 替代数量 = 原数量 × factor
    #[serde(default = "default_spec_match")]
    pub technical_specs_match: f64,   // 技术匹配度 0-1
    #[serde(default)]
    pub cost_differential: f64,       // 成本差异 (0.05 = +5%)
    #[serde(default)]
    pub lead_time_delta_days: f64,    // 交期差异（天）
    #[serde(default = "default_reliability")]
    pub supplier_reliability: f64,    // 供应商可靠度 0-1
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_one() -> f64 {
    1.0
}

fn default_spec_match() -> f64 {
    0.9
}

fn default_reliability() -> f64 {
    0.95
}

impl EquivalentItem {
    pub fn new(equivalent_id: &str, technical_specs_match: f64) -> PlannerResult<Self> {
        let item = Self {
            equivalent_id: equivalent_id.to_string(),
            equivalent_code: equivalent_id.to_string(),
            conversion_factor: 1.0,
            technical_specs_match,
            cost_differential: 0.0,
            lead_time_delta_days: 0.0,
            supplier_reliability: 0.95,
            notes: None,
        };
        item.validate()?;
        Ok(item)
    }

    pub fn validate(&self) -> PlannerResult<()> {
        if self.equivalent_id.trim().is_empty() {
            return Err(PlannerError::MissingField("equivalent_id"));
        }
        if !(0.0..=1.0).contains(&self.technical_specs_match) {
            return Err(PlannerError::InvalidInput(format!(
                "技术匹配度超出 [0,1]: {}",
                self.technical_specs_match
            )));
        }
        if !(0.0..=1.0).contains(&self.supplier_reliability) {
            return Err(PlannerError::InvalidInput(format!(
                "供应商可靠度超出 [0,1]: {}",
                self.supplier_reliability
            )));
        }
        if !(self.conversion_factor >= 0.0) {
            return Err(PlannerError::InvalidInput(format!(
                "换算系数必须 ≥ 0: {}",
                self.conversion_factor
            )));
        }
        Ok(())
    }
}

// ==========================================
// ItemMaster - 物料主数据
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemMaster {
    // ===== 标识 =====
    pub item_id: String,
    pub external_code: String,
    #[serde(default)]
    pub description: String,

    // ===== 分类 =====
    #[serde(default = "default_abc")]
    pub abc_class: AbcClass,
    #[serde(default = "default_criticality")]
    pub criticality: Criticality,
    #[serde(default = "default_procurement")]
    pub procurement_type: ProcurementType,

    // ===== 计量单位 =====
    pub base_unit: String,
    #[serde(default)]
    pub alternative_units: BTreeMap<String, f64>, // 替代单位 → 折算到基本单位的系数

    // ===== 技术规格 =====
    #[serde(default)]
    pub specifications: BTreeMap<String, serde_json::Value>,

    // ===== 合规 =====
    #[serde(default)]
    pub requires_traceability: bool,
    #[serde(default)]
    pub compliance_standards: Vec<String>,
    #[serde(default)]
    pub shelf_life_days: Option<i64>, // None = 无保质期
    #[serde(default)]
    pub requires_cold_chain: bool,

    // ===== 产品结构 =====
    #[serde(default)]
    pub is_assembly: bool,
    #[serde(default)]
    pub bom: Vec<BomComponent>,
    #[serde(default)]
    pub equivalent_items: Vec<EquivalentItem>,

    // ===== 成本 =====
    #[serde(default)]
    pub standard_cost: Money,
    #[serde(default)]
    pub list_price: Money,
    #[serde(default)]
    pub annual_consumption_units: f64,

    // ===== 订货参数 =====
    #[serde(default = "default_one")]
    pub minimum_order_quantity: f64,
    #[serde(default = "default_one")]
    pub order_multiple: f64,
    #[serde(default)]
    pub safety_stock_days: f64,

    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_abc() -> AbcClass {
    AbcClass::C
}

fn default_criticality() -> Criticality {
    Criticality::Low
}

fn default_procurement() -> ProcurementType {
    ProcurementType::Purchased
}

fn default_active() -> bool {
    true
}

impl ItemMaster {
    /// 创建物料主数据（其余字段取默认值）
    pub fn new(item_id: &str, external_code: &str, base_unit: &str) -> PlannerResult<Self> {
        let item = Self {
            item_id: item_id.to_string(),
            external_code: external_code.to_string(),
            description: String::new(),
            abc_class: AbcClass::C,
            criticality: Criticality::Low,
            procurement_type: ProcurementType::Purchased,
            base_unit: base_unit.to_string(),
            alternative_units: BTreeMap::new(),
            specifications: BTreeMap::new(),
            requires_traceability: false,
            compliance_standards: Vec::new(),
            shelf_life_days: None,
            requires_cold_chain: false,
            is_assembly: false,
            bom: Vec::new(),
            equivalent_items: Vec::new(),
            standard_cost: Decimal::ZERO,
            list_price: Decimal::ZERO,
            annual_consumption_units: 0.0,
            minimum_order_quantity: 1.0,
            order_multiple: 1.0,
            safety_stock_days: 0.0,
            active: true,
        };
        item.validate()?;
        Ok(item)
    }

    /// 校验主数据（反序列化后由调用方显式调用）
    pub fn validate(&self) -> PlannerResult<()> {
        if self.item_id.trim().is_empty() {
            return Err(PlannerError::MissingField("item_id"));
        }
        if self.base_unit.trim().is_empty() {
            return Err(PlannerError::MissingField("base_unit"));
        }
        for (unit, factor) in &self.alternative_units {
            if !(*factor > 0.0) {
                return Err(PlannerError::InvalidInput(format!(
                    "单位 {} 的换算系数必须 > 0: {}",
                    unit, factor
                )));
            }
        }
        if self.standard_cost.is_sign_negative() || self.list_price.is_sign_negative() {
            return Err(PlannerError::InvalidInput(format!(
                "成本不能为负: item_id={}",
                self.item_id
            )));
        }
        if !(self.minimum_order_quantity >= 0.0) || !(self.order_multiple >= 1.0) {
            return Err(PlannerError::InvalidInput(format!(
                "订货参数无效: moq={}, multiple={}",
                self.minimum_order_quantity, self.order_multiple
            )));
        }
        for component in &self.bom {
            component.validate()?;
        }
        for equivalent in &self.equivalent_items {
            equivalent.validate()?;
        }
        Ok(())
    }

    /// 数量换算到基本单位
    ///
    /// # 返回
    /// - Ok(qty): 基本单位数量
    /// - Err(UnknownUnit): 未登记的单位
    pub fn quantity_in_base_unit(&self, quantity: f64, from_unit: &str) -> PlannerResult<f64> {
        if from_unit == self.base_unit {
            return Ok(quantity);
        }
        self.alternative_units
            .get(from_unit)
            .map(|factor| quantity * factor)
            .ok_or_else(|| PlannerError::UnknownUnit {
                item_id: self.item_id.clone(),
                uom: from_unit.to_string(),
            })
    }

    /// 技术匹配度最高的等效物料
    pub fn best_equivalent(&self) -> Option<&EquivalentItem> {
        self.equivalent_items
            .iter()
            .max_by(|a, b| a.technical_specs_match.total_cmp(&b.technical_specs_match))
    }

    /// 按订货参数规整数量（满足 MOQ 并向上取整到订货倍数）
    pub fn round_order_quantity(&self, quantity: f64) -> f64 {
        if quantity <= 0.0 {
            return 0.0;
        }
        let qty = quantity.max(self.minimum_order_quantity);
        let multiple = self.order_multiple.max(1.0);
        (qty / multiple).ceil() * multiple
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bearing() -> ItemMaster {
        let mut item = ItemMaster::new("MAT-001", "100001", "EA").unwrap();
        item.alternative_units.insert("BOX".to_string(), 12.0);
        item.order_multiple = 50.0;
        item.minimum_order_quantity = 20.0;
        item
    }

    #[test]
    fn test_quantity_conversion() {
        let item = bearing();
        assert_eq!(item.quantity_in_base_unit(3.0, "EA").unwrap(), 3.0);
        assert_eq!(item.quantity_in_base_unit(2.0, "BOX").unwrap(), 24.0);
        assert!(matches!(
            item.quantity_in_base_unit(1.0, "KG"),
            Err(PlannerError::UnknownUnit { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_non_positive_factor() {
        let mut item = bearing();
        item.alternative_units.insert("PAL".to_string(), 0.0);
        assert!(item.validate().is_err());
    }

    #[test]
    fn test_round_order_quantity() {
        let item = bearing();
        assert_eq!(item.round_order_quantity(0.0), 0.0);
        assert_eq!(item.round_order_quantity(10.0), 50.0);
        assert_eq!(item.round_order_quantity(51.0), 100.0);
    }

    #[test]
    fn test_bom_scrap_factor_validation() {
        assert!(BomComponent::new("C-1", 2.0, "EA").is_ok());
        let mut component = BomComponent::new("C-1", 2.0, "EA").unwrap();
        component.scrap_factor = 0.9;
        assert!(component.validate().is_err());
        component.scrap_factor = 1.05;
        assert!((component.gross_quantity() - 2.1).abs() < 1e-9);
    }

    #[test]
    fn test_best_equivalent() {
        let mut item = bearing();
        item.equivalent_items.push(EquivalentItem::new("ALT-1", 0.8).unwrap());
        item.equivalent_items.push(EquivalentItem::new("ALT-2", 0.95).unwrap());
        assert_eq!(item.best_equivalent().unwrap().equivalent_id, "ALT-2");
        assert!(EquivalentItem::new("ALT-3", 1.2).is_err());
    }
}
