// ==========================================
// 供应链计划引擎 - 算法注册表
// ==========================================
// 职责: 类型 → 实现 的映射 + 执行遥测
// 约定: 计划运行前构建一次，运行期间只读共享
// ==========================================

use crate::config::AlgorithmsConfig;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

use super::base::{AlgorithmInput, AlgorithmOutput, AlgorithmStatus, AlgorithmType, SourcingAlgorithm};
use super::{
    CtpJohnsonAlgorithm, DisassemblyKnapsackAlgorithm, ExpediteProbabilityAlgorithm,
    PurchaseMulticriterionAlgorithm, ReleaseMarginalCostAlgorithm, ReserveDynamicAlgorithm,
    SubstitutesGraphAlgorithm, TransferTdabcAlgorithm,
};

// ==========================================
// AlgorithmMetadata - 元数据
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlgorithmMetadata {
    pub algorithm_type: AlgorithmType,
    pub strategy: &'static str,
    pub execution_count: u64,
    pub total_execution_time_ms: f64,
    pub avg_execution_time_ms: f64,
}

#[derive(Debug, Default)]
struct Telemetry {
    executions: AtomicU64,
    total_micros: AtomicU64,
}

impl Telemetry {
    fn record(&self, elapsed_ms: f64) {
        self.executions.fetch_add(1, Ordering::Relaxed);
        self.total_micros
            .fetch_add((elapsed_ms * 1000.0).max(0.0) as u64, Ordering::Relaxed);
    }
}

struct RegisteredAlgorithm {
    algorithm: Arc<dyn SourcingAlgorithm>,
    telemetry: Telemetry,
}

// ==========================================
// AlgorithmRegistry
// ==========================================
#[derive(Default)]
pub struct AlgorithmRegistry {
    algorithms: HashMap<AlgorithmType, RegisteredAlgorithm>,
}

impl std::fmt::Debug for AlgorithmRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&AlgorithmType> = self.algorithms.keys().collect();
        types.sort();
        f.debug_struct("AlgorithmRegistry").field("algorithms", &types).finish()
    }
}

impl AlgorithmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册全部八种路径算法
    pub fn with_defaults(config: &AlgorithmsConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ReserveDynamicAlgorithm::new()));
        registry.register(Arc::new(ReleaseMarginalCostAlgorithm::new(config)));
        registry.register(Arc::new(DisassemblyKnapsackAlgorithm::new(config)));
        registry.register(Arc::new(SubstitutesGraphAlgorithm::new(config)));
        registry.register(Arc::new(CtpJohnsonAlgorithm::new(config)));
        registry.register(Arc::new(TransferTdabcAlgorithm::new(config)));
        registry.register(Arc::new(ExpediteProbabilityAlgorithm::new(config)));
        registry.register(Arc::new(PurchaseMulticriterionAlgorithm::new()));
        info!(count = registry.len(), "路径算法注册完成");
        registry
    }

    /// 注册（同类型覆盖，遥测清零）
    pub fn register(&mut self, algorithm: Arc<dyn SourcingAlgorithm>) {
        let algorithm_type = algorithm.algorithm_type();
        self.algorithms.insert(
            algorithm_type,
            RegisteredAlgorithm {
                algorithm,
                telemetry: Telemetry::default(),
            },
        );
    }

    pub fn unregister(&mut self, algorithm_type: AlgorithmType) -> bool {
        self.algorithms.remove(&algorithm_type).is_some()
    }

    pub fn get(&self, algorithm_type: AlgorithmType) -> Option<Arc<dyn SourcingAlgorithm>> {
        self.algorithms
            .get(&algorithm_type)
            .map(|entry| Arc::clone(&entry.algorithm))
    }

    pub fn is_registered(&self, algorithm_type: AlgorithmType) -> bool {
        self.algorithms.contains_key(&algorithm_type)
    }

    pub fn len(&self) -> usize {
        self.algorithms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.algorithms.is_empty()
    }

    /// 执行并记录遥测（未注册返回 None）
    pub fn run(&self, algorithm_type: AlgorithmType, input: &AlgorithmInput) -> Option<AlgorithmOutput> {
        let entry = self.algorithms.get(&algorithm_type)?;
        let output = entry.algorithm.run(input);
        if output.status == AlgorithmStatus::Completed {
            entry.telemetry.record(output.execution_time_ms);
        }
        Some(output)
    }

    pub fn metadata(&self, algorithm_type: AlgorithmType) -> Option<AlgorithmMetadata> {
        self.algorithms.get(&algorithm_type).map(|entry| {
            let count = entry.telemetry.executions.load(Ordering::Relaxed);
            let total_ms = entry.telemetry.total_micros.load(Ordering::Relaxed) as f64 / 1000.0;
            AlgorithmMetadata {
                algorithm_type,
                strategy: entry.algorithm.strategy(),
                execution_count: count,
                total_execution_time_ms: total_ms,
                avg_execution_time_ms: if count > 0 { total_ms / count as f64 } else { 0.0 },
            }
        })
    }

    /// 已注册算法列表（按类型排序）
    pub fn list(&self) -> Vec<AlgorithmMetadata> {
        let mut types: Vec<AlgorithmType> = self.algorithms.keys().copied().collect();
        types.sort();
        types.into_iter().filter_map(|t| self.metadata(t)).collect()
    }
}
