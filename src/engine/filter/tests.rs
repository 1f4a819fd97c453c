use super::*;
use crate::config::FilterConfig;
use crate::domain::inventory::InventoryLot;
use crate::domain::item::{EquivalentItem, ItemMaster};
use crate::domain::sourcing::{SourcingOption, SourcingPath};
use crate::domain::types::{QualityStatus, SourcingPathType};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

// ==========================================
// 测试辅助函数
// ==========================================

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
}

fn create_test_item() -> ItemMaster {
    ItemMaster::new("ITEM-001", "EXT-001", "EA").unwrap()
}

fn create_test_option(id: &str, path: SourcingPathType, lead_time: f64) -> SourcingOption {
    let mut option = SourcingOption::new(id, "ITEM-001", path, 100.0, Decimal::from(10), lead_time).unwrap();
    option.supplier_id = Some("SUP-1".to_string());
    option
}

fn create_test_lot(lot_number: &str, expiration: Option<NaiveDate>, status: QualityStatus) -> InventoryLot {
    let mut lot = InventoryLot::new(
        lot_number,
        "ITEM-001",
        100.0,
        100.0,
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        "SUP-1",
        "PO-1",
    )
    .unwrap();
    lot.expiration_date = expiration;
    lot.quality_status = status;
    lot
}

fn reason_of(result: &FilterResult) -> FilterReason {
    assert!(!result.feasible);
    assert_eq!(result.reasons.len(), 1);
    result.reasons[0]
}

// ==========================================
// 单项检查
// ==========================================

#[test]
fn test_clean_option_passes() {
    let filter = TechnicalLegalFilter::default();
    let option = create_test_option("O1", SourcingPathType::Purchase, 5.0);
    let required = Some(NaiveDate::from_ymd_opt(2026, 3, 20).unwrap());

    let result = filter.filter_option(&option, &create_test_item(), required, as_of(), None);
    assert!(result.feasible);
    assert!(result.reasons.is_empty());
    assert!(result.feasibility_note().is_none());
}

#[test]
fn test_blacklist_is_checked_before_other_failures() {
    let mut registry = ComplianceRegistry::new();
    registry.register_supplier_blacklist("SUP-1");
    registry.register_supplier_as_suspended("SUP-1");
    let filter = TechnicalLegalFilter::new(registry, FilterConfig::default());

    let mut item = create_test_item();
    item.active = false;
    let option = create_test_option("O1", SourcingPathType::Purchase, 99.0);
    let required = Some(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());

    let result = filter.filter_option(&option, &item, required, as_of(), None);
    assert_eq!(reason_of(&result), FilterReason::LicenseIssue);
}

#[test]
fn test_suspended_supplier() {
    let mut registry = ComplianceRegistry::new();
    registry.register_supplier_as_suspended("SUP-1");
    let filter = TechnicalLegalFilter::new(registry, FilterConfig::default());

    let option = create_test_option("O1", SourcingPathType::Purchase, 1.0);
    let result = filter.filter_option(&option, &create_test_item(), None, as_of(), None);
    assert_eq!(reason_of(&result), FilterReason::SupplierSuspended);
}

#[test]
fn test_expired_lot_is_rejected() {
    let filter = TechnicalLegalFilter::default();
    let lot = create_test_lot("LOT-1", NaiveDate::from_ymd_opt(2026, 2, 1), QualityStatus::Approved);
    let option = create_test_option("O1", SourcingPathType::StockLocal, 0.0);

    let result = filter.filter_option(&option, &create_test_item(), None, as_of(), Some(&lot));
    assert_eq!(reason_of(&result), FilterReason::Expired);
}

#[test]
fn test_quarantined_lot_is_quality_hold() {
    let filter = TechnicalLegalFilter::default();
    let lot = create_test_lot("LOT-1", None, QualityStatus::Quarantine);
    let option = create_test_option("O1", SourcingPathType::StockLocal, 0.0);

    let result = filter.filter_option(&option, &create_test_item(), None, as_of(), Some(&lot));
    assert_eq!(reason_of(&result), FilterReason::QualityHold);
}

#[test]
fn test_near_expiry_only_matters_for_shelf_life_items() {
    let filter = TechnicalLegalFilter::default();
    let lot = create_test_lot("LOT-1", NaiveDate::from_ymd_opt(2026, 3, 5), QualityStatus::Approved);
    let option = create_test_option("O1", SourcingPathType::StockLocal, 0.0);

    let plain = create_test_item();
    assert!(filter.filter_option(&option, &plain, None, as_of(), Some(&lot)).feasible);

    let mut perishable = create_test_item();
    perishable.shelf_life_days = Some(180);
    let result = filter.filter_option(&option, &perishable, None, as_of(), Some(&lot));
    assert_eq!(reason_of(&result), FilterReason::ShelfLifeInsufficient);
}

#[test]
fn test_short_shelf_life_item() {
    let filter = TechnicalLegalFilter::default();
    let mut item = create_test_item();
    item.shelf_life_days = Some(10);
    let option = create_test_option("O1", SourcingPathType::Purchase, 1.0);

    let result = filter.filter_option(&option, &item, None, as_of(), None);
    assert_eq!(reason_of(&result), FilterReason::ShelfLifeInsufficient);
}

#[test]
fn test_traceability_rejects_equivalent_path() {
    let filter = TechnicalLegalFilter::default();
    let mut item = create_test_item();
    item.requires_traceability = true;
    item.equivalent_items.push(EquivalentItem::new("ITEM-ALT", 0.95).unwrap());
    let option = create_test_option("O1", SourcingPathType::Equivalent, 1.0);

    let result = filter.filter_option(&option, &item, None, as_of(), None);
    assert_eq!(reason_of(&result), FilterReason::TraceabilityRequired);
}

#[test]
fn test_traceability_stock_local_needs_lot_number() {
    let filter = TechnicalLegalFilter::default();
    let mut item = create_test_item();
    item.requires_traceability = true;

    let mut option = create_test_option("O1", SourcingPathType::StockLocal, 0.0);
    let result = filter.filter_option(&option, &item, None, as_of(), None);
    assert_eq!(reason_of(&result), FilterReason::TraceabilityRequired);

    option.lot_number = Some("LOT-9".to_string());
    assert!(filter.filter_option(&option, &item, None, as_of(), None).feasible);
}

#[test]
fn test_missing_standard_and_regulatory_hold() {
    let mut registry = ComplianceRegistry::new();
    registry.set_regulatory_requirements("ITEM-001", vec!["ISO-13485".to_string(), "CE".to_string()]);
    let filter = TechnicalLegalFilter::new(registry.clone(), FilterConfig::default());

    let mut item = create_test_item();
    item.compliance_standards = vec!["CE".to_string()];
    let option = create_test_option("O1", SourcingPathType::Purchase, 1.0);

    let result = filter.filter_option(&option, &item, None, as_of(), None);
    assert_eq!(reason_of(&result), FilterReason::ComplianceViolation);
    assert!(result.notes.contains("ISO-13485"));

    registry.place_regulatory_hold("ITEM-001");
    let filter = TechnicalLegalFilter::new(registry, FilterConfig::default());
    let result = filter.filter_option(&option, &item, None, as_of(), None);
    assert_eq!(reason_of(&result), FilterReason::RegulatoryHold);
}

#[test]
fn test_environmental_restriction() {
    let mut registry = ComplianceRegistry::new();
    registry.set_environmental_restriction("ITEM-001", vec![SourcingPathType::PurchaseImport]);
    let filter = TechnicalLegalFilter::new(registry, FilterConfig::default());

    let option = create_test_option("O1", SourcingPathType::PurchaseImport, 1.0);
    let result = filter.filter_option(&option, &create_test_item(), None, as_of(), None);
    assert_eq!(reason_of(&result), FilterReason::EnvironmentalRestriction);
}

#[test]
fn test_lead_time_window() {
    let filter = TechnicalLegalFilter::default();
    let required = Some(NaiveDate::from_ymd_opt(2026, 3, 11).unwrap());

    let on_time = create_test_option("O1", SourcingPathType::Purchase, 10.0);
    assert!(filter.filter_option(&on_time, &create_test_item(), required, as_of(), None).feasible);

    let late = create_test_option("O2", SourcingPathType::Purchase, 10.5);
    let result = filter.filter_option(&late, &create_test_item(), required, as_of(), None);
    assert_eq!(reason_of(&result), FilterReason::LeadTimeViolation);
}

#[test]
fn test_equivalent_requires_declared_match() {
    let filter = TechnicalLegalFilter::default();
    let mut option = create_test_option("O1", SourcingPathType::Equivalent, 1.0);
    option.equivalent_item_id = Some("ITEM-ALT".to_string());

    let mut item = create_test_item();
    let result = filter.filter_option(&option, &item, None, as_of(), None);
    assert_eq!(reason_of(&result), FilterReason::SpecMismatch);

    item.equivalent_items.push(EquivalentItem::new("ITEM-ALT", 0.80).unwrap());
    let result = filter.filter_option(&option, &item, None, as_of(), None);
    assert_eq!(reason_of(&result), FilterReason::SpecMismatch);

    item.equivalent_items[0].technical_specs_match = 0.90;
    assert!(filter.filter_option(&option, &item, None, as_of(), None).feasible);
}

#[test]
fn test_inactive_item_is_obsolete() {
    let filter = TechnicalLegalFilter::default();
    let mut item = create_test_item();
    item.active = false;
    let option = create_test_option("O1", SourcingPathType::Purchase, 1.0);

    let result = filter.filter_option(&option, &item, None, as_of(), None);
    assert_eq!(reason_of(&result), FilterReason::Obsolete);
}

struct MaxUnitCostRule;

impl CustomFilterRule for MaxUnitCostRule {
    fn name(&self) -> &str {
        "max_unit_cost"
    }

    fn evaluate(&self, option: &SourcingOption, _item: &ItemMaster) -> Option<String> {
        (option.unit_cost > Decimal::from(5)).then(|| format!("单价 {} 超限", option.unit_cost))
    }
}

#[test]
fn test_custom_rule_runs_last() {
    let mut registry = ComplianceRegistry::new();
    registry.add_custom_rule(Arc::new(MaxUnitCostRule));
    let filter = TechnicalLegalFilter::new(registry, FilterConfig::default());

    let option = create_test_option("O1", SourcingPathType::Purchase, 1.0);
    let result = filter.filter_option(&option, &create_test_item(), None, as_of(), None);
    assert_eq!(reason_of(&result), FilterReason::CustomRule);
    assert!(result.notes.starts_with("max_unit_cost"));
}

// ==========================================
// 路径级过滤与报告
// ==========================================

fn create_test_path() -> (SourcingPath, HashMap<String, InventoryLot>) {
    let mut path = SourcingPath::new("REQ-1", "ITEM-001", 120.0, NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()).unwrap();

    let mut stock = create_test_option("ITEM-001:STOCK_LOCAL:LOT-OLD", SourcingPathType::StockLocal, 0.0);
    stock.lot_number = Some("LOT-OLD".to_string());
    path.add_option(stock, None);
    path.add_option(create_test_option("ITEM-001:PURCHASE:SUP-1", SourcingPathType::Purchase, 7.0), None);
    path.add_option(create_test_option("ITEM-001:PURCHASE_IMPORT:SUP-1", SourcingPathType::PurchaseImport, 30.0), None);

    let mut lots = HashMap::new();
    lots.insert(
        "LOT-OLD".to_string(),
        create_test_lot("LOT-OLD", NaiveDate::from_ymd_opt(2026, 2, 20), QualityStatus::Approved),
    );
    (path, lots)
}

#[test]
fn test_filter_path_updates_options_and_totals() {
    let filter = TechnicalLegalFilter::default();
    let (mut path, lots) = create_test_path();

    let results = filter.filter_path(&mut path, &create_test_item(), as_of(), &lots);
    assert_eq!(results.len(), 3);
    assert!(!path.options[0].feasible);
    assert!(path.options[0].feasibility_notes.as_deref().unwrap().starts_with("EXPIRED:"));
    assert!(path.options[1].feasible);
    assert!(!path.options[2].feasible);

    assert_eq!(path.total_feasible_quantity, 100.0);
    assert!(!path.has_feasible_solution);
    assert_eq!(filter.feasible_options(&path).len(), 1);
}

#[test]
fn test_filter_path_is_idempotent() {
    let filter = TechnicalLegalFilter::default();
    let (mut path, lots) = create_test_path();
    let item = create_test_item();

    let first = filter.filter_path(&mut path, &item, as_of(), &lots);
    let snapshot: Vec<(bool, Option<String>)> = path
        .options
        .iter()
        .map(|o| (o.feasible, o.feasibility_notes.clone()))
        .collect();

    let second = filter.filter_path(&mut path, &item, as_of(), &lots);
    let again: Vec<(bool, Option<String>)> = path
        .options
        .iter()
        .map(|o| (o.feasible, o.feasibility_notes.clone()))
        .collect();

    assert_eq!(first, second);
    assert_eq!(snapshot, again);
}

#[test]
fn test_report_counts_reasons() {
    let filter = TechnicalLegalFilter::default();
    let (mut path, lots) = create_test_path();
    filter.filter_path(&mut path, &create_test_item(), as_of(), &lots);

    let report = filter.generate_report(&path);
    assert_eq!(report.total_options, 3);
    assert_eq!(report.feasible_count, 1);
    assert_eq!(report.infeasible_count, 2);
    assert!((report.rejection_rate - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(report.reason_counts.get(&FilterReason::Expired), Some(&1));
    assert_eq!(report.reason_counts.get(&FilterReason::LeadTimeViolation), Some(&1));
    assert!(report.dominant_reason().is_some());
}

#[test]
fn test_reason_parsed_from_note() {
    assert_eq!(FilterReason::from_note("QUALITY_HOLD: lot=1"), Some(FilterReason::QualityHold));
    assert_eq!(FilterReason::from_note("whatever"), None);
    let json = serde_json::to_string(&FilterReason::LeadTimeViolation).unwrap();
    assert_eq!(json, "\"LEAD_TIME_VIOLATION\"");
}
