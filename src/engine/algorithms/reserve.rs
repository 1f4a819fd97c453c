// ==========================================
// 供应链计划引擎 - 本地库存动态预留
// ==========================================
// 职责: 在竞争需求之间按优先级分配本地可用量
// 优先级: 关键度 → 需求日期（同级时已有需求优先）
// ==========================================

use crate::domain::types::Criticality;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::base::{
    AlgorithmError, AlgorithmInput, AlgorithmOutput, AlgorithmType, AlternativeConsidered,
    SourcingAlgorithm,
};

const OWN_REQUEST: &str = "__CURRENT__";

#[derive(Debug, Clone, Default)]
pub struct ReserveDynamicAlgorithm;

impl ReserveDynamicAlgorithm {
    pub fn new() -> Self {
        Self
    }

    /// 按优先级分配可用量，返回 (request_id, 分配量)
    pub fn allocate(
        available: f64,
        requests: &[(String, f64, Criticality, NaiveDate)],
    ) -> Vec<(String, f64)> {
        let mut ordered: Vec<(usize, &(String, f64, Criticality, NaiveDate))> =
            requests.iter().enumerate().collect();
        ordered.sort_by(|(ia, a), (ib, b)| {
            a.2.rank()
                .cmp(&b.2.rank())
                .then(a.3.cmp(&b.3))
                .then(ia.cmp(ib))
        });

        let mut remaining = available.max(0.0);
        ordered
            .into_iter()
            .map(|(_, (id, qty, _, _))| {
                let granted = qty.max(0.0).min(remaining);
                remaining -= granted;
                (id.clone(), granted)
            })
            .collect()
    }
}

impl SourcingAlgorithm for ReserveDynamicAlgorithm {
    fn algorithm_type(&self) -> AlgorithmType {
        AlgorithmType::ReserveDynamic
    }

    fn strategy(&self) -> &'static str {
        "按关键度与需求日期的优先级分配"
    }

    fn validate_input(&self, input: &AlgorithmInput) -> Result<(), AlgorithmError> {
        input.check_common()?;
        if input.total_local_stock() <= 0.0 {
            return Err(AlgorithmError::InvalidInput(format!(
                "物料 {} 无本地可用库存",
                input.item_id
            )));
        }
        Ok(())
    }

    fn execute(&self, input: &AlgorithmInput) -> Result<AlgorithmOutput, AlgorithmError> {
        let available = input.total_local_stock();

        // 已有竞争需求在前，当前需求在后（同优先级时让位）
        let mut requests: Vec<(String, f64, Criticality, NaiveDate)> = input
            .context
            .competing_requests
            .iter()
            .map(|r| (r.request_id.clone(), r.quantity, r.criticality, r.required_date))
            .collect();
        requests.push((
            OWN_REQUEST.to_string(),
            input.demand_quantity,
            input.criticality,
            input.required_date,
        ));

        let allocation = Self::allocate(available, &requests);
        let granted = allocation
            .iter()
            .find(|(id, _)| id == OWN_REQUEST)
            .map(|(_, qty)| *qty)
            .unwrap_or(0.0);

        let coverage = (granted / input.demand_quantity).min(1.0);
        let label = if coverage >= 0.999 {
            "RESERVE_FULL"
        } else if granted > 0.0 {
            "RESERVE_PARTIAL"
        } else {
            "RESERVE_NONE"
        };

        let days = input.days_to_deadline().max(0.0);
        let confidence = 0.5 * coverage
            + 0.3 * (days / 5.0).min(1.0)
            + 0.2 * (available / input.demand_quantity).min(1.0);

        let mut output = AlgorithmOutput::completed(self.algorithm_type(), &input.item_id, label);
        output.proposed_quantity = granted;
        output.estimated_cost = Decimal::ZERO;
        output.estimated_lead_time_days = 0.0;
        output.confidence = confidence;
        output.reasoning = format!(
            "本地可用 {:.2}，竞争需求 {} 个，当前需求获配 {:.2}/{:.2}",
            available,
            input.context.competing_requests.len(),
            granted,
            input.demand_quantity
        );
        output.alternatives_considered = allocation
            .into_iter()
            .filter(|(id, _)| id != OWN_REQUEST)
            .map(|(id, qty)| AlternativeConsidered {
                label: format!("ALLOC:{}", id),
                quantity: qty,
                score: 0.0,
            })
            .collect();
        Ok(output)
    }
}
