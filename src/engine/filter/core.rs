// ==========================================
// 供应链计划引擎 - 技术/法规过滤器核心
// ==========================================
// 检查顺序（首个失败即返回）:
// 1) 供应商黑名单/停用
// 2) 批次: 过期 → 质量冻结 → 临期（物料有保质期时）
// 3) 保质期 ≥ 最短存放缓冲
// 4) 追溯性
// 5) 法规标准 / 监管冻结
// 6) 环保路径限制
// 7) 交期: as_of + 平均交期 ≤ 需求日
// 8) 等效路径的技术匹配
// 9) 物料有效（非停用）
// 10) 自定义规则
// ==========================================

use crate::config::FilterConfig;
use crate::domain::inventory::InventoryLot;
use crate::domain::item::ItemMaster;
use crate::domain::sourcing::{SourcingOption, SourcingPath};
use crate::domain::types::SourcingPathType;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, instrument};

use super::registry::ComplianceRegistry;
use super::report::FilterReport;

// ==========================================
// FilterReason - 拒绝原因码
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterReason {
    SpecMismatch,             // 规格不匹配
    ComplianceViolation,      // 缺少法规标准
    LicenseIssue,             // 供应商黑名单/资质问题
    ShelfLifeInsufficient,    // 保质期不足/批次临期
    TraceabilityRequired,     // 无法满足追溯要求
    QualityHold,              // 批次拒收/隔离
    Expired,                  // 批次过期
    RegulatoryHold,           // 监管冻结
    SupplierSuspended,        // 供应商停用
    EnvironmentalRestriction, // 环保限制路径
    LeadTimeViolation,        // 交期晚于需求日
    Obsolete,                 // 物料停用
    CustomRule,               // 自定义规则
}

impl FilterReason {
    pub const ALL: [FilterReason; 13] = [
        FilterReason::SpecMismatch,
        FilterReason::ComplianceViolation,
        FilterReason::LicenseIssue,
        FilterReason::ShelfLifeInsufficient,
        FilterReason::TraceabilityRequired,
        FilterReason::QualityHold,
        FilterReason::Expired,
        FilterReason::RegulatoryHold,
        FilterReason::SupplierSuspended,
        FilterReason::EnvironmentalRestriction,
        FilterReason::LeadTimeViolation,
        FilterReason::Obsolete,
        FilterReason::CustomRule,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterReason::SpecMismatch => "SPEC_MISMATCH",
            FilterReason::ComplianceViolation => "COMPLIANCE_VIOLATION",
            FilterReason::LicenseIssue => "LICENSE_ISSUE",
            FilterReason::ShelfLifeInsufficient => "SHELF_LIFE_INSUFFICIENT",
            FilterReason::TraceabilityRequired => "TRACEABILITY_REQUIRED",
            FilterReason::QualityHold => "QUALITY_HOLD",
            FilterReason::Expired => "EXPIRED",
            FilterReason::RegulatoryHold => "REGULATORY_HOLD",
            FilterReason::SupplierSuspended => "SUPPLIER_SUSPENDED",
            FilterReason::EnvironmentalRestriction => "ENVIRONMENTAL_RESTRICTION",
            FilterReason::LeadTimeViolation => "LEAD_TIME_VIOLATION",
            FilterReason::Obsolete => "OBSOLETE",
            FilterReason::CustomRule => "CUSTOM_RULE",
        }
    }

    /// 从 "CODE: 说明" 格式的备注中解析原因码
    pub fn from_note(note: &str) -> Option<Self> {
        let code = note.split(':').next()?.trim();
        FilterReason::ALL.iter().copied().find(|r| r.as_str() == code)
    }
}

impl fmt::Display for FilterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// FilterResult - 单选项过滤结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterResult {
    pub option_id: String,
    pub feasible: bool,
    pub reasons: Vec<FilterReason>,
    pub notes: String,
    pub confidence_level: f64,
}

impl FilterResult {
    fn pass(option_id: &str) -> Self {
        Self {
            option_id: option_id.to_string(),
            feasible: true,
            reasons: Vec::new(),
            notes: String::new(),
            confidence_level: 1.0,
        }
    }

    fn reject(option_id: &str, reason: FilterReason, notes: String) -> Self {
        Self {
            option_id: option_id.to_string(),
            feasible: false,
            reasons: vec![reason],
            notes,
            confidence_level: 1.0,
        }
    }

    /// 机器可读备注 "CODE: 说明"（可行时为 None）
    pub fn feasibility_note(&self) -> Option<String> {
        self.reasons
            .first()
            .map(|reason| format!("{}: {}", reason, self.notes))
    }
}

// ==========================================
// TechnicalLegalFilter - 技术/法规过滤器
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct TechnicalLegalFilter {
    registry: ComplianceRegistry,
    config: FilterConfig,
}

impl TechnicalLegalFilter {
    pub fn new(registry: ComplianceRegistry, config: FilterConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &ComplianceRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ComplianceRegistry {
        &mut self.registry
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 过滤单个选项
    ///
    /// # 参数
    /// - `option`: 候选选项
    /// - `item`: 物料主数据
    /// - `required_date`: 需求日期（None 时跳过交期检查）
    /// - `as_of`: 计划基准日
    /// - `lot`: 本地库存选项对应的批次
    ///
    /// # 返回
    /// FilterResult；不可行时 reasons 恰含一个原因码
    pub fn filter_option(
        &self,
        option: &SourcingOption,
        item: &ItemMaster,
        required_date: Option<NaiveDate>,
        as_of: NaiveDate,
        lot: Option<&InventoryLot>,
    ) -> FilterResult {
        let id = option.option_id.as_str();

        // 1. 供应商
        if let Some(supplier_id) = option.supplier_id.as_deref() {
            if self.registry.is_blacklisted(supplier_id) {
                return FilterResult::reject(id, FilterReason::LicenseIssue, format!("供应商在黑名单: {}", supplier_id));
            }
            if self.registry.is_suspended(supplier_id) {
                return FilterResult::reject(id, FilterReason::SupplierSuspended, format!("供应商已停用: {}", supplier_id));
            }
        }

        // 2. 批次质量/效期
        if let Some(lot) = lot {
            if lot.is_expired(as_of) {
                let exp = lot.expiration_date.map(|d| d.to_string()).unwrap_or_default();
                return FilterResult::reject(id, FilterReason::Expired, format!("批次已过期: lot={}, exp={}", lot.lot_number, exp));
            }
            if lot.quality_status.is_hold() {
                return FilterResult::reject(
                    id,
                    FilterReason::QualityHold,
                    format!("批次质量冻结: lot={}, status={}", lot.lot_number, lot.quality_status),
                );
            }
            if item.shelf_life_days.is_some() && lot.is_critical_expiration(as_of, self.config.critical_expiration_days) {
                let days = lot.days_to_expiration(as_of).unwrap_or(0);
                return FilterResult::reject(
                    id,
                    FilterReason::ShelfLifeInsufficient,
                    format!("批次临期: lot={}, 剩余 {} 天", lot.lot_number, days),
                );
            }
        }

        // 3. 保质期
        if let Some(shelf_life) = item.shelf_life_days {
            if shelf_life < self.config.min_storage_buffer_days {
                return FilterResult::reject(
                    id,
                    FilterReason::ShelfLifeInsufficient,
                    format!("保质期 {}d < 最短存放 {}d", shelf_life, self.config.min_storage_buffer_days),
                );
            }
        }

        // 4. 追溯性
        if item.requires_traceability {
            if option.sourcing_path == SourcingPathType::StockLocal {
                let lot_number = lot
                    .map(|l| l.lot_number.as_str())
                    .or(option.lot_number.as_deref())
                    .unwrap_or("");
                if lot_number.trim().is_empty() {
                    return FilterResult::reject(id, FilterReason::TraceabilityRequired, "本地库存缺少批次号".to_string());
                }
            } else if option.sourcing_path.breaks_traceability() {
                return FilterResult::reject(
                    id,
                    FilterReason::TraceabilityRequired,
                    format!("路径 {} 无法保证追溯", option.sourcing_path),
                );
            }
        }

        // 5. 法规
        if self.registry.is_under_regulatory_hold(&item.item_id) {
            return FilterResult::reject(id, FilterReason::RegulatoryHold, format!("物料被监管冻结: {}", item.item_id));
        }
        let missing = self.registry.missing_standards(item);
        if !missing.is_empty() {
            return FilterResult::reject(id, FilterReason::ComplianceViolation, format!("缺少标准: {}", missing.join(", ")));
        }

        // 6. 环保路径限制
        if self.registry.is_path_restricted(&item.item_id, option.sourcing_path) {
            return FilterResult::reject(
                id,
                FilterReason::EnvironmentalRestriction,
                format!("路径 {} 被环保规定禁止", option.sourcing_path),
            );
        }

        // 7. 交期
        if let Some(required) = required_date {
            let days_available = (required - as_of).num_days() as f64;
            if option.lead_time_days_mean > days_available {
                return FilterResult::reject(
                    id,
                    FilterReason::LeadTimeViolation,
                    format!("交期 {:.1}d 超过可用 {:.0}d", option.lead_time_days_mean, days_available),
                );
            }
        }

        // 8. 等效匹配
        if option.sourcing_path == SourcingPathType::Equivalent {
            if item.equivalent_items.is_empty() {
                return FilterResult::reject(id, FilterReason::SpecMismatch, "物料未登记等效物料".to_string());
            }
            let matched = item.equivalent_items.iter().any(|eq| {
                let refers_to = match option.equivalent_item_id.as_deref() {
                    Some(eq_id) => eq_id == eq.equivalent_id,
                    None => option.option_id.contains(&eq.equivalent_id),
                };
                refers_to && eq.technical_specs_match >= self.config.min_equivalent_match
            });
            if !matched {
                return FilterResult::reject(
                    id,
                    FilterReason::SpecMismatch,
                    format!("等效物料技术匹配度不足 {:.0}%", self.config.min_equivalent_match * 100.0),
                );
            }
        }

        // 9. 物料停用
        if !item.active {
            return FilterResult::reject(id, FilterReason::Obsolete, format!("物料已停用: {}", item.item_id));
        }

        // 10. 自定义规则
        for rule in self.registry.custom_rules() {
            if let Some(note) = rule.evaluate(option, item) {
                return FilterResult::reject(id, FilterReason::CustomRule, format!("{}: {}", rule.name(), note));
            }
        }

        FilterResult::pass(id)
    }

    /// 过滤路径下全部选项，原地回写可行性并重算汇总
    ///
    /// # 参数
    /// - `lots`: 批次号 → 批次（本地库存选项按 lot_number，缺省按 option_id 查找）
    #[instrument(skip(self, path, item, lots), fields(path_id = %path.path_id, options = path.options.len()))]
    pub fn filter_path(
        &self,
        path: &mut SourcingPath,
        item: &ItemMaster,
        as_of: NaiveDate,
        lots: &HashMap<String, InventoryLot>,
    ) -> Vec<FilterResult> {
        let required_date = Some(path.required_date);
        let mut results = Vec::with_capacity(path.options.len());

        for option in path.options.iter_mut() {
            let lot = if option.sourcing_path == SourcingPathType::StockLocal {
                option
                    .lot_number
                    .as_deref()
                    .and_then(|n| lots.get(n))
                    .or_else(|| lots.get(&option.option_id))
            } else {
                None
            };

            let result = self.filter_option(option, item, required_date, as_of, lot);
            if !result.feasible {
                debug!(option_id = %option.option_id, reason = ?result.reasons, notes = %result.notes, "选项被过滤");
            }
            option.mark_feasibility(result.feasible, result.feasibility_note());
            results.push(result);
        }

        path.calculate_total_feasible();

        let feasible = results.iter().filter(|r| r.feasible).count();
        info!(
            feasible,
            rejected = results.len() - feasible,
            total_feasible_qty = path.total_feasible_quantity,
            has_solution = path.has_feasible_solution,
            "过滤完成"
        );
        results
    }

    /// 可行选项
    pub fn feasible_options<'a>(&self, path: &'a SourcingPath) -> Vec<&'a SourcingOption> {
        path.options.iter().filter(|o| o.feasible).collect()
    }

    /// 过滤报告
    pub fn generate_report(&self, path: &SourcingPath) -> FilterReport {
        FilterReport::from_path(path)
    }
}
