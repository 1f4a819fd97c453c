// ==========================================
// 供应链计划引擎 - 寻源选项与寻源路径
// ==========================================
// 职责: 单个寻源选项（成本/交期/可靠性/订货约束）
//       与 (需求单, 物料) 维度的候选集合及选定结果
// 约定: 选项的 feasible/feasibility_notes 由过滤器原地回写
// ==========================================

use crate::domain::money::{extend, Money};
use crate::domain::types::SourcingPathType;
use crate::error::{PlannerError, PlannerResult};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ==========================================
// SourcingOption - 寻源选项
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcingOption {
    // ===== 标识 =====
    pub option_id: String, // 约定: item_id:path_type:source
    pub item_id: String,
    pub sourcing_path: SourcingPathType,

    // ===== 来源 =====
    #[serde(default)]
    pub supplier_id: Option<String>,
    #[serde(default)]
    pub supplier_name: Option<String>,
    #[serde(default)]
    pub location_id: Option<String>, // 交付/存放地点（能力约束按此分组）
    #[serde(default)]
    pub lot_number: Option<String>,  // 本地库存选项的批次号
    #[serde(default)]
    pub equivalent_item_id: Option<String>, // EQUIVALENT 路径的替代物料

    // ===== 数量 =====
    pub quantity_available: f64,
    pub unit_of_measure: String,

    // ===== 成本（单位成本） =====
    pub unit_cost: Money,
    #[serde(default)]
    pub transportation_cost: Money,
    #[serde(default)]
    pub customs_duty: Money,
    #[serde(default)]
    pub handling_cost: Money,

    // ===== 交期 =====
    pub lead_time_days_mean: f64,
    #[serde(default)]
    pub lead_time_days_std: f64,
    #[serde(default)]
    pub lead_time_days_p95: Option<f64>,

    // ===== 可靠性 =====
    #[serde(default = "default_on_time")]
    pub on_time_percentage: f64,
    #[serde(default = "default_quality")]
    pub quality_acceptance_rate: f64,
    #[serde(default = "default_availability")]
    pub availability_percentage: f64,
    #[serde(default = "default_success_rate")]
    pub success_rate: f64,

    // ===== 订货约束 =====
    #[serde(default)]
    pub minimum_order_quantity: f64,
    #[serde(default = "default_multiple")]
    pub order_multiple: f64,
    #[serde(default)]
    pub maximum_order_quantity: Option<f64>,

    // ===== 时间窗 =====
    #[serde(default)]
    pub order_deadline: Option<NaiveDate>,
    #[serde(default)]
    pub delivery_window_start: Option<NaiveDate>,
    #[serde(default)]
    pub delivery_window_end: Option<NaiveDate>,

    // ===== 过滤结果（可变） =====
    #[serde(default = "default_feasible")]
    pub feasible: bool,
    #[serde(default)]
    pub feasibility_notes: Option<String>,
}

fn default_on_time() -> f64 {
    0.95
}

fn default_quality() -> f64 {
    0.99
}

fn default_availability() -> f64 {
    0.95
}

fn default_success_rate() -> f64 {
    0.95
}

fn default_multiple() -> f64 {
    1.0
}

fn default_feasible() -> bool {
    true
}

impl SourcingOption {
    /// 创建寻源选项（可靠性字段取默认值）
    pub fn new(
        option_id: &str,
        item_id: &str,
        sourcing_path: SourcingPathType,
        quantity_available: f64,
        unit_cost: Money,
        lead_time_days_mean: f64,
    ) -> PlannerResult<Self> {
        let option = Self {
            option_id: option_id.to_string(),
            item_id: item_id.to_string(),
            sourcing_path,
            supplier_id: None,
            supplier_name: None,
            location_id: None,
            lot_number: None,
            equivalent_item_id: None,
            quantity_available,
            unit_of_measure: "EA".to_string(),
            unit_cost,
            transportation_cost: Decimal::ZERO,
            customs_duty: Decimal::ZERO,
            handling_cost: Decimal::ZERO,
            lead_time_days_mean,
            lead_time_days_std: 0.0,
            lead_time_days_p95: None,
            on_time_percentage: 0.95,
            quality_acceptance_rate: 0.99,
            availability_percentage: 0.95,
            success_rate: 0.95,
            minimum_order_quantity: 0.0,
            order_multiple: 1.0,
            maximum_order_quantity: None,
            order_deadline: None,
            delivery_window_start: None,
            delivery_window_end: None,
            feasible: true,
            feasibility_notes: None,
        };
        option.validate()?;
        Ok(option)
    }

    pub fn validate(&self) -> PlannerResult<()> {
        if self.option_id.trim().is_empty() {
            return Err(PlannerError::MissingField("option_id"));
        }
        if self.item_id.trim().is_empty() {
            return Err(PlannerError::MissingField("item_id"));
        }
        if !(self.quantity_available >= 0.0) || !(self.lead_time_days_mean >= 0.0) || !(self.lead_time_days_std >= 0.0) {
            return Err(PlannerError::InvalidInput(format!(
                "数量/交期不能为负: option_id={}",
                self.option_id
            )));
        }
        let costs = [self.unit_cost, self.transportation_cost, self.customs_duty, self.handling_cost];
        if costs.iter().any(|c| c.is_sign_negative() && !c.is_zero()) {
            return Err(PlannerError::InvalidInput(format!(
                "成本不能为负: option_id={}",
                self.option_id
            )));
        }
        let rates = [
            self.on_time_percentage,
            self.quality_acceptance_rate,
            self.availability_percentage,
            self.success_rate,
        ];
        if rates.iter().any(|r| !(0.0..=1.0).contains(r)) {
            return Err(PlannerError::InvalidInput(format!(
                "可靠性指标超出 [0,1]: option_id={}",
                self.option_id
            )));
        }
        if !(self.order_multiple >= 1.0) || !(self.minimum_order_quantity >= 0.0) {
            return Err(PlannerError::InvalidInput(format!(
                "订货约束无效: option_id={}, moq={}, multiple={}",
                self.option_id, self.minimum_order_quantity, self.order_multiple
            )));
        }
        Ok(())
    }

    /// 单位总成本 = 单价 + 运费 + 关税 + 搬运
    pub fn total_cost_per_unit(&self) -> Money {
        self.unit_cost + self.transportation_cost + self.customs_duty + self.handling_cost
    }

    /// 物流成本（运费+关税+搬运）
    pub fn logistics_cost_per_unit(&self) -> Money {
        self.transportation_cost + self.customs_duty + self.handling_cost
    }

    /// 可供数量上限（受最大订货量约束）
    pub fn max_quantity(&self) -> f64 {
        match self.maximum_order_quantity {
            Some(max) => self.quantity_available.min(max),
            None => self.quantity_available,
        }
    }

    /// 设置过滤结论
    pub fn mark_feasibility(&mut self, feasible: bool, notes: Option<String>) {
        self.feasible = feasible;
        self.feasibility_notes = notes;
    }
}

// ==========================================
// SelectedAllocation - 选定组合中的一条
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedAllocation {
    pub option_id: String,
    pub quantity: f64,
    pub cost: Money,
}

// ==========================================
// SourcingPath - 寻源路径（候选集合）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcingPath {
    pub path_id: String, // requisition_id:item_id
    pub requisition_id: String,
    pub item_id: String,
    pub required_quantity: f64,
    pub required_date: NaiveDate,

    // 按偏好排序: 库存 → 释放 → ... → 采购
    #[serde(default)]
    pub options: Vec<SourcingOption>,

    // ===== 计划结果 =====
    #[serde(default)]
    pub selected_option_id: Option<String>,
    #[serde(default)]
    pub selected_quantity: Option<f64>,
    #[serde(default)]
    pub selected_cost: Option<Money>,
    #[serde(default)]
    pub allocations: Vec<SelectedAllocation>,

    // ===== 可行性汇总 =====
    #[serde(default)]
    pub total_feasible_quantity: f64,
    #[serde(default)]
    pub total_feasible_cost: Money,
    #[serde(default)]
    pub has_feasible_solution: bool,
}

impl SourcingPath {
    pub fn new(requisition_id: &str, item_id: &str, required_quantity: f64, required_date: NaiveDate) -> PlannerResult<Self> {
        if requisition_id.trim().is_empty() {
            return Err(PlannerError::MissingField("requisition_id"));
        }
        if item_id.trim().is_empty() {
            return Err(PlannerError::MissingField("item_id"));
        }
        if !(required_quantity > 0.0) {
            return Err(PlannerError::InvalidInput(format!(
                "需求数量必须 > 0: {}",
                required_quantity
            )));
        }
        Ok(Self {
            path_id: format!("{}:{}", requisition_id, item_id),
            requisition_id: requisition_id.to_string(),
            item_id: item_id.to_string(),
            required_quantity,
            required_date,
            options: Vec::new(),
            selected_option_id: None,
            selected_quantity: None,
            selected_cost: None,
            allocations: Vec::new(),
            total_feasible_quantity: 0.0,
            total_feasible_cost: Decimal::ZERO,
            has_feasible_solution: false,
        })
    }

    /// 添加选项；rank 指定插入位置（越界则追加）
    pub fn add_option(&mut self, option: SourcingOption, rank: Option<usize>) {
        match rank {
            Some(idx) if idx <= self.options.len() => self.options.insert(idx, option),
            _ => self.options.push(option),
        }
    }

    /// 按偏好顺序取下一个可独立满足需求的可行选项
    pub fn next_viable_option(&self, skip_ids: &[&str]) -> Option<&SourcingOption> {
        self.options.iter().find(|o| {
            o.feasible
                && !skip_ids.contains(&o.option_id.as_str())
                && o.quantity_available >= self.required_quantity
        })
    }

    /// 重算可行数量与成本（成本为各可行选项 数量×单位总成本 之和）
    pub fn calculate_total_feasible(&mut self) {
        let feasible: Vec<&SourcingOption> = self.options.iter().filter(|o| o.feasible).collect();
        self.total_feasible_quantity = feasible.iter().map(|o| o.quantity_available).sum();
        self.total_feasible_cost = feasible
            .iter()
            .map(|o| extend(o.total_cost_per_unit(), o.quantity_available))
            .sum();
        self.has_feasible_solution = self.total_feasible_quantity >= self.required_quantity;
    }

    /// 写入计划结果
    ///
    /// 主选项取数量最大的一条；selected_quantity/selected_cost 为组合合计
    pub fn apply_selection(&mut self, allocations: Vec<SelectedAllocation>, demand_met: bool) {
        let primary = allocations
            .iter()
            .max_by(|a, b| a.quantity.total_cmp(&b.quantity))
            .map(|a| a.option_id.clone());
        let total_qty: f64 = allocations.iter().map(|a| a.quantity).sum();
        let total_cost: Money = allocations.iter().map(|a| a.cost).sum();

        self.selected_option_id = primary;
        self.selected_quantity = if allocations.is_empty() { None } else { Some(total_qty) };
        self.selected_cost = if allocations.is_empty() { None } else { Some(total_cost) };
        self.allocations = allocations;
        self.has_feasible_solution = demand_met;
    }

    pub fn find_option(&self, option_id: &str) -> Option<&SourcingOption> {
        self.options.iter().find(|o| o.option_id == option_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(id: &str, qty: f64, cost: i64) -> SourcingOption {
        SourcingOption::new(id, "ITEM-001", SourcingPathType::Purchase, qty, Decimal::from(cost), 10.0).unwrap()
    }

    fn path() -> SourcingPath {
        SourcingPath::new("REQ-1", "ITEM-001", 100.0, NaiveDate::from_ymd_opt(2026, 5, 1).unwrap()).unwrap()
    }

    #[test]
    fn test_total_cost_per_unit_sums_components() {
        let mut o = option("O1", 10.0, 10);
        o.transportation_cost = Decimal::new(15, 1);
        o.customs_duty = Decimal::new(5, 1);
        o.handling_cost = Decimal::ONE;
        assert_eq!(o.total_cost_per_unit(), Decimal::from(13));
        assert_eq!(o.logistics_cost_per_unit(), Decimal::from(3));
    }

    #[test]
    fn test_option_validation() {
        assert!(SourcingOption::new("", "ITEM", SourcingPathType::Purchase, 1.0, Decimal::ONE, 1.0).is_err());
        assert!(SourcingOption::new("O", "ITEM", SourcingPathType::Purchase, -1.0, Decimal::ONE, 1.0).is_err());
        let mut o = option("O1", 1.0, 1);
        o.quality_acceptance_rate = 1.5;
        assert!(o.validate().is_err());
    }

    #[test]
    fn test_path_totals_and_next_viable() {
        let mut p = path();
        p.add_option(option("SMALL", 40.0, 10), None);
        p.add_option(option("BIG", 120.0, 20), None);
        let mut rejected = option("REJECTED", 500.0, 1);
        rejected.mark_feasibility(false, Some("EXPIRED".to_string()));
        p.add_option(rejected, Some(0));

        p.calculate_total_feasible();
        assert_eq!(p.total_feasible_quantity, 160.0);
        assert_eq!(p.total_feasible_cost, Decimal::from(40 * 10 + 120 * 20));
        assert!(p.has_feasible_solution);

        assert_eq!(p.next_viable_option(&[]).unwrap().option_id, "BIG");
        assert!(p.next_viable_option(&["BIG"]).is_none());
    }

    #[test]
    fn test_apply_selection() {
        let mut p = path();
        p.apply_selection(
            vec![
                SelectedAllocation { option_id: "A".to_string(), quantity: 30.0, cost: Decimal::from(300) },
                SelectedAllocation { option_id: "B".to_string(), quantity: 70.0, cost: Decimal::from(1400) },
            ],
            true,
        );
        assert_eq!(p.selected_option_id.as_deref(), Some("B"));
        assert_eq!(p.selected_quantity, Some(100.0));
        assert_eq!(p.selected_cost, Some(Decimal::from(1700)));
        assert!(p.has_feasible_solution);
    }

    #[test]
    fn test_path_requires_positive_demand() {
        let date = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        assert!(SourcingPath::new("REQ", "ITEM", 0.0, date).is_err());
        assert!(SourcingPath::new("REQ", "", 1.0, date).is_err());
    }
}
