// ==========================================
// 供应链计划引擎 - 算法执行器
// ==========================================
// 职责: 单算法执行 + 失败回退；多算法并行执行并按 (成功, 置信度) 排序
// ==========================================

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{info, instrument, warn};

use super::base::{AlgorithmInput, AlgorithmOutput, AlgorithmType};
use super::registry::AlgorithmRegistry;

// ==========================================
// ExecutionPolicy - 回退策略
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPolicy {
    pub fallbacks: HashMap<AlgorithmType, AlgorithmType>,
    pub parallel: bool,
}

impl Default for ExecutionPolicy {
    /// 默认: 非采购类算法失败时回退到多准则采购
    fn default() -> Self {
        let fallbacks = AlgorithmType::ALL
            .iter()
            .copied()
            .filter(|t| *t != AlgorithmType::PurchaseMulticriterion)
            .map(|t| (t, AlgorithmType::PurchaseMulticriterion))
            .collect();
        Self {
            fallbacks,
            parallel: true,
        }
    }
}

impl ExecutionPolicy {
    pub fn without_fallbacks() -> Self {
        Self {
            fallbacks: HashMap::new(),
            parallel: true,
        }
    }
}

// ==========================================
// AlgorithmExecutor
// ==========================================
#[derive(Debug)]
pub struct AlgorithmExecutor<'a> {
    registry: &'a AlgorithmRegistry,
    policy: ExecutionPolicy,
}

impl<'a> AlgorithmExecutor<'a> {
    pub fn new(registry: &'a AlgorithmRegistry) -> Self {
        Self::with_policy(registry, ExecutionPolicy::default())
    }

    pub fn with_policy(registry: &'a AlgorithmRegistry, policy: ExecutionPolicy) -> Self {
        Self { registry, policy }
    }

    pub fn policy(&self) -> &ExecutionPolicy {
        &self.policy
    }

    /// 执行单个算法；失败时尝试回退
    ///
    /// # 参数
    /// - fallback: 显式回退算法（None 时按策略表）
    ///
    /// # 返回
    /// - 未注册且无回退: None
    #[instrument(skip(self, input), fields(item_id = %input.item_id))]
    pub fn execute(
        &self,
        algorithm_type: AlgorithmType,
        input: &AlgorithmInput,
        fallback: Option<AlgorithmType>,
    ) -> Option<AlgorithmOutput> {
        let primary = self.registry.run(algorithm_type, input);
        if matches!(&primary, Some(output) if output.success) {
            return primary;
        }

        let fallback = fallback.or_else(|| self.policy.fallbacks.get(&algorithm_type).copied());
        match fallback {
            Some(fb) if fb != algorithm_type => {
                warn!(primary = %algorithm_type, fallback = %fb, "主算法失败，执行回退");
                self.registry.run(fb, input).or(primary)
            }
            _ => primary,
        }
    }

    /// 执行多个算法，结果按 (成功, 置信度) 降序
    pub fn execute_many(&self, types: &[AlgorithmType], input: &AlgorithmInput) -> Vec<AlgorithmOutput> {
        let mut outputs: Vec<AlgorithmOutput> = if self.policy.parallel && types.len() > 1 {
            std::thread::scope(|scope| {
                let handles: Vec<_> = types
                    .iter()
                    .map(|t| scope.spawn(move || self.registry.run(*t, input)))
                    .collect();
                handles
                    .into_iter()
                    .filter_map(|h| h.join().ok().flatten())
                    .collect()
            })
        } else {
            types
                .iter()
                .filter_map(|t| self.registry.run(*t, input))
                .collect()
        };

        outputs.sort_by(compare_outputs);
        info!(
            item_id = %input.item_id,
            executed = outputs.len(),
            succeeded = outputs.iter().filter(|o| o.success).count(),
            "多算法执行完成"
        );
        outputs
    }

    /// 多算法中的最优输出
    ///
    /// # 返回
    /// - 按 (成功, 置信度) 排第一的输出；全部失败时返回置信度最高的失败输出（保留诊断信息）
    /// - None: 没有任何已注册算法执行
    pub fn best(&self, types: &[AlgorithmType], input: &AlgorithmInput) -> Option<AlgorithmOutput> {
        self.execute_many(types, input).into_iter().next()
    }
}

/// 成功优先，其次置信度高者优先
fn compare_outputs(a: &AlgorithmOutput, b: &AlgorithmOutput) -> Ordering {
    b.success
        .cmp(&a.success)
        .then(b.confidence.total_cmp(&a.confidence))
}
