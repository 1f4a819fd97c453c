// ==========================================
// 供应链计划引擎 - 过滤报告
// ==========================================

use crate::domain::money::Money;
use crate::domain::sourcing::SourcingPath;
use crate::domain::types::SourcingPathType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::core::FilterReason;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeasibleOptionSummary {
    pub option_id: String,
    pub sourcing_path: SourcingPathType,
    pub quantity_available: f64,
    pub total_cost_per_unit: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedOptionSummary {
    pub option_id: String,
    pub sourcing_path: SourcingPathType,
    pub reason: Option<FilterReason>,
    pub notes: String,
}

// ==========================================
// FilterReport - 过滤报告
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterReport {
    pub path_id: String,
    pub total_options: usize,
    pub feasible_count: usize,
    pub infeasible_count: usize,
    pub feasibility_rate: f64,
    pub rejection_rate: f64,
    pub has_solution: bool,
    pub reason_counts: BTreeMap<FilterReason, usize>,
    pub feasible_options: Vec<FeasibleOptionSummary>,
    pub rejected_options: Vec<RejectedOptionSummary>,
}

impl FilterReport {
    /// 由已过滤的路径生成报告
    pub fn from_path(path: &SourcingPath) -> Self {
        let mut feasible_options = Vec::new();
        let mut rejected_options = Vec::new();
        let mut reason_counts: BTreeMap<FilterReason, usize> = BTreeMap::new();

        for option in &path.options {
            if option.feasible {
                feasible_options.push(FeasibleOptionSummary {
                    option_id: option.option_id.clone(),
                    sourcing_path: option.sourcing_path,
                    quantity_available: option.quantity_available,
                    total_cost_per_unit: option.total_cost_per_unit(),
                });
                continue;
            }

            let notes = option.feasibility_notes.clone().unwrap_or_default();
            let reason = FilterReason::from_note(&notes);
            if let Some(r) = reason {
                *reason_counts.entry(r).or_insert(0) += 1;
            }
            rejected_options.push(RejectedOptionSummary {
                option_id: option.option_id.clone(),
                sourcing_path: option.sourcing_path,
                reason,
                notes,
            });
        }

        let total = path.options.len();
        let denom = total.max(1) as f64;
        Self {
            path_id: path.path_id.clone(),
            total_options: total,
            feasible_count: feasible_options.len(),
            infeasible_count: rejected_options.len(),
            feasibility_rate: feasible_options.len() as f64 / denom,
            rejection_rate: rejected_options.len() as f64 / denom,
            has_solution: path.has_feasible_solution,
            reason_counts,
            feasible_options,
            rejected_options,
        }
    }

    /// 出现最多的拒绝原因
    pub fn dominant_reason(&self) -> Option<FilterReason> {
        self.reason_counts
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(reason, _)| *reason)
    }
}
