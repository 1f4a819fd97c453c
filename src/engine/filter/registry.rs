// ==========================================
// 供应链计划引擎 - 合规登记表
// ==========================================
// 职责: 供应商黑名单/停用、环保路径限制、法规标准要求、自定义规则
// 约定: 计划运行期间只读，由 PlanningContext 持有
// ==========================================

use crate::domain::item::ItemMaster;
use crate::domain::sourcing::SourcingOption;
use crate::domain::types::SourcingPathType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

// ==========================================
// Trait: CustomFilterRule
// ==========================================
// 用途: 业务方追加的过滤规则（原因码 CUSTOM_RULE）
pub trait CustomFilterRule: Send + Sync {
    fn name(&self) -> &str;

    /// 返回 Some(说明) 表示拒绝
    fn evaluate(&self, option: &SourcingOption, item: &ItemMaster) -> Option<String>;
}

// ==========================================
// ComplianceRegistry - 合规登记表
// ==========================================
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ComplianceRegistry {
    #[serde(default)]
    supplier_blacklist: BTreeSet<String>,
    #[serde(default)]
    suspended_suppliers: BTreeSet<String>,
    #[serde(default)]
    environmental_restrictions: BTreeMap<String, Vec<SourcingPathType>>, // item_id → 禁用路径
    #[serde(default)]
    regulatory_requirements: BTreeMap<String, Vec<String>>,              // item_id → 必备标准
    #[serde(default)]
    regulatory_holds: BTreeSet<String>,                                  // 被监管冻结的 item_id

    #[serde(skip)]
    custom_rules: Vec<Arc<dyn CustomFilterRule>>,
}

impl fmt::Debug for ComplianceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComplianceRegistry")
            .field("supplier_blacklist", &self.supplier_blacklist)
            .field("suspended_suppliers", &self.suspended_suppliers)
            .field("environmental_restrictions", &self.environmental_restrictions)
            .field("regulatory_requirements", &self.regulatory_requirements)
            .field("regulatory_holds", &self.regulatory_holds)
            .field("custom_rules", &self.custom_rules.len())
            .finish()
    }
}

impl ComplianceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== 登记 =====

    pub fn register_supplier_blacklist(&mut self, supplier_id: &str) {
        self.supplier_blacklist.insert(supplier_id.to_string());
    }

    pub fn register_supplier_as_suspended(&mut self, supplier_id: &str) {
        self.suspended_suppliers.insert(supplier_id.to_string());
    }

    /// 设置物料的禁用路径（覆盖旧值）
    pub fn set_environmental_restriction(&mut self, item_id: &str, paths: Vec<SourcingPathType>) {
        self.environmental_restrictions.insert(item_id.to_string(), paths);
    }

    /// 设置物料必须具备的法规标准（覆盖旧值）
    pub fn set_regulatory_requirements(&mut self, item_id: &str, standards: Vec<String>) {
        self.regulatory_requirements.insert(item_id.to_string(), standards);
    }

    pub fn place_regulatory_hold(&mut self, item_id: &str) {
        self.regulatory_holds.insert(item_id.to_string());
    }

    pub fn add_custom_rule(&mut self, rule: Arc<dyn CustomFilterRule>) {
        self.custom_rules.push(rule);
    }

    // ===== 查询 =====

    pub fn is_blacklisted(&self, supplier_id: &str) -> bool {
        self.supplier_blacklist.contains(supplier_id)
    }

    pub fn is_suspended(&self, supplier_id: &str) -> bool {
        self.suspended_suppliers.contains(supplier_id)
    }

    pub fn is_path_restricted(&self, item_id: &str, path: SourcingPathType) -> bool {
        self.environmental_restrictions
            .get(item_id)
            .map(|paths| paths.contains(&path))
            .unwrap_or(false)
    }

    /// 物料缺失的法规标准（按登记顺序）
    pub fn missing_standards(&self, item: &ItemMaster) -> Vec<String> {
        self.regulatory_requirements
            .get(&item.item_id)
            .map(|required| {
                required
                    .iter()
                    .filter(|std| !item.compliance_standards.contains(std))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_under_regulatory_hold(&self, item_id: &str) -> bool {
        self.regulatory_holds.contains(item_id)
    }

    pub fn custom_rules(&self) -> &[Arc<dyn CustomFilterRule>] {
        &self.custom_rules
    }
}
