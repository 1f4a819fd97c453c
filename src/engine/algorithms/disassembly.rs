// ==========================================
// 供应链计划引擎 - 拆解回收（0/1 背包）
// ==========================================
// 职责: 在拆解预算内选择净收益最大的部件组合
// 算法: 成本离散化动态规划 + 回溯
// ==========================================

use crate::config::AlgorithmsConfig;
use crate::domain::money::{money_from_f64, money_to_f64};
use crate::domain::types::Criticality;
use tracing::debug;

use super::base::{
    AlgorithmError, AlgorithmInput, AlgorithmOutput, AlgorithmType, AlternativeConsidered,
    ComponentValue, SourcingAlgorithm,
};

/// 成本离散化精度（每单位成本的格数）
const COST_RESOLUTION: f64 = 10.0;
/// DP 表宽度上限
const MAX_DP_CELLS: usize = 100_000;
/// 拆解作业周期（天）
const DISASSEMBLY_LEAD_DAYS: f64 = 2.0;

/// 背包求解结果
#[derive(Debug, Clone, PartialEq)]
pub struct KnapsackSelection {
    pub selected: Vec<usize>,
    pub total_cost: f64,
    pub total_value: f64,
    pub net_profit: f64,
}

impl KnapsackSelection {
    /// 净收益 / 拆解成本
    pub fn efficiency(&self) -> f64 {
        if self.total_cost <= 0.0 {
            return 0.0;
        }
        self.net_profit / self.total_cost
    }
}

#[derive(Debug, Clone)]
pub struct DisassemblyKnapsackAlgorithm {
    budget_share: f64,
    full_efficiency: f64,
    partial_efficiency: f64,
}

impl Default for DisassemblyKnapsackAlgorithm {
    fn default() -> Self {
        Self::new(&AlgorithmsConfig::default())
    }
}

impl DisassemblyKnapsackAlgorithm {
    pub fn new(config: &AlgorithmsConfig) -> Self {
        Self {
            budget_share: config.disassembly_budget_share,
            full_efficiency: config.disassembly_full_efficiency,
            partial_efficiency: config.disassembly_partial_efficiency,
        }
    }

    /// 关键度对拆解容量的修正
    fn capacity_modifier(criticality: Criticality) -> f64 {
        match criticality {
            Criticality::Critical => 0.5,
            Criticality::Low => 1.5,
            _ => 1.0,
        }
    }

    fn criticality_confidence(criticality: Criticality) -> f64 {
        match criticality {
            Criticality::Critical => 0.6,
            Criticality::High => 0.8,
            Criticality::Medium => 0.9,
            Criticality::Low => 0.85,
        }
    }

    /// 拆解预算容量
    ///
    /// # 规则
    /// - 有预算: 直接使用
    /// - 无预算: 物料价值 × budget_share × 关键度修正
    /// - 物料价值未知: 不设上限（全部部件成本之和）
    pub fn capacity(&self, input: &AlgorithmInput) -> f64 {
        if let Some(budget) = input.budget {
            return money_to_f64(budget).max(0.0);
        }
        let item_value = money_to_f64(input.reference_unit_cost) * input.demand_quantity;
        if item_value > 0.0 {
            item_value * self.budget_share * Self::capacity_modifier(input.criticality)
        } else {
            input
                .context
                .component_values
                .iter()
                .map(|c| c.disassembly_cost * c.quantity)
                .sum()
        }
    }

    /// 0/1 背包: 成本为重量，净收益为价值（净收益 ≤ 0 的部件不入选）
    pub fn solve(components: &[ComponentValue], capacity: f64) -> KnapsackSelection {
        let empty = KnapsackSelection {
            selected: Vec::new(),
            total_cost: 0.0,
            total_value: 0.0,
            net_profit: 0.0,
        };
        if components.is_empty() || capacity <= 0.0 {
            return empty;
        }

        let scale = if capacity * COST_RESOLUTION > MAX_DP_CELLS as f64 {
            MAX_DP_CELLS as f64 / capacity
        } else {
            COST_RESOLUTION
        };
        let width = (capacity * scale).floor() as usize;

        let weights: Vec<usize> = components
            .iter()
            .map(|c| ((c.disassembly_cost * c.quantity).max(0.0) * scale).ceil() as usize)
            .collect();
        let profits: Vec<f64> = components
            .iter()
            .map(|c| (c.market_value - c.disassembly_cost) * c.quantity)
            .collect();

        let n = components.len();
        let mut dp = vec![vec![0.0_f64; width + 1]; n + 1];
        for i in 1..=n {
            let (w, p) = (weights[i - 1], profits[i - 1]);
            for cap in 0..=width {
                dp[i][cap] = dp[i - 1][cap];
                if p > 0.0 && w <= cap {
                    let candidate = dp[i - 1][cap - w] + p;
                    if candidate > dp[i][cap] {
                        dp[i][cap] = candidate;
                    }
                }
            }
        }

        // 回溯
        let mut selected = Vec::new();
        let mut cap = width;
        for i in (1..=n).rev() {
            if (dp[i][cap] - dp[i - 1][cap]).abs() > f64::EPSILON {
                selected.push(i - 1);
                cap -= weights[i - 1];
            }
        }
        selected.reverse();

        let total_cost: f64 = selected
            .iter()
            .map(|&i| components[i].disassembly_cost * components[i].quantity)
            .sum();
        let total_value: f64 = selected
            .iter()
            .map(|&i| components[i].market_value * components[i].quantity)
            .sum();

        KnapsackSelection {
            selected,
            total_cost,
            total_value,
            net_profit: total_value - total_cost,
        }
    }
}

impl SourcingAlgorithm for DisassemblyKnapsackAlgorithm {
    fn algorithm_type(&self) -> AlgorithmType {
        AlgorithmType::DisassemblyKnapsack
    }

    fn strategy(&self) -> &'static str {
        "0/1 背包动态规划"
    }

    fn validate_input(&self, input: &AlgorithmInput) -> Result<(), AlgorithmError> {
        input.check_common()?;
        if input.context.component_values.is_empty() {
            return Err(AlgorithmError::InvalidInput(format!(
                "物料 {} 无可拆解部件数据",
                input.item_id
            )));
        }
        if let Some(budget) = input.budget {
            if money_to_f64(budget) < 0.0 {
                return Err(AlgorithmError::InvalidInput("拆解预算不能为负".to_string()));
            }
        }
        Ok(())
    }

    fn execute(&self, input: &AlgorithmInput) -> Result<AlgorithmOutput, AlgorithmError> {
        let components = &input.context.component_values;
        let capacity = self.capacity(input);
        let selection = Self::solve(components, capacity);
        let efficiency = selection.efficiency();
        let utilization = if capacity > 0.0 {
            (selection.total_cost / capacity).min(1.0)
        } else {
            0.0
        };
        debug!(
            item_id = %input.item_id,
            capacity,
            selected = selection.selected.len(),
            efficiency,
            "拆解背包求解完成"
        );

        let (label, mut quantity) = if selection.selected.is_empty() {
            ("DISASSEMBLY_NONE", 0.0)
        } else if efficiency >= self.full_efficiency {
            ("DISASSEMBLY_FULL", input.demand_quantity)
        } else if efficiency >= self.partial_efficiency {
            ("DISASSEMBLY_PARTIAL", input.demand_quantity * 0.5)
        } else {
            ("DISASSEMBLY_NONE", 0.0)
        };
        // 可回收量受可拆解资产数量限制
        if !input.local_assets.is_empty() {
            quantity = quantity.min(input.local_assets.values().sum::<f64>());
        }

        let confidence = (efficiency * 100.0 / 50.0).min(1.0) * 0.4
            + utilization * 0.3
            + 0.16
            + Self::criticality_confidence(input.criticality) * 0.1;

        let mut output = AlgorithmOutput::completed(self.algorithm_type(), &input.item_id, label);
        output.proposed_quantity = quantity;
        output.estimated_cost = money_from_f64(selection.total_cost);
        output.estimated_lead_time_days = if quantity > 0.0 { DISASSEMBLY_LEAD_DAYS } else { 0.0 };
        output.confidence = if quantity > 0.0 { confidence } else { 0.0 };
        output.reasoning = format!(
            "容量 {:.2}，选中 {}/{} 个部件，净收益 {:.2}，效率 {:.1}%，利用率 {:.1}%",
            capacity,
            selection.selected.len(),
            components.len(),
            selection.net_profit,
            efficiency * 100.0,
            utilization * 100.0
        );
        output.alternatives_considered = selection
            .selected
            .iter()
            .map(|&i| {
                let c = &components[i];
                AlternativeConsidered {
                    label: format!("COMPONENT:{}", c.component_id),
                    quantity: c.quantity,
                    score: (c.market_value - c.disassembly_cost) * c.quantity,
                }
            })
            .collect();
        Ok(output)
    }
}
