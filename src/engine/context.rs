// ==========================================
// 供应链计划引擎 - 计划上下文
// ==========================================
// 职责: 一次构建、按引用传递的引擎组件集合
// 红线: 不使用全局单例；注册表/过滤器/求解器均挂在上下文上
// ==========================================

use crate::config::{ConfigManager, PlannerConfig};
use crate::domain::types::SourcingPathType;
use crate::engine::algorithms::{AlgorithmExecutor, AlgorithmRegistry, ExecutionPolicy};
use crate::engine::decision::{DecisionEngine, GateRule, GateSeverity};
use crate::engine::filter::{ComplianceRegistry, TechnicalLegalFilter};
use crate::engine::optimization::{ExactSolver, ModelAnalyzer, SolverManager};
use crate::engine::scoring::{CriticalityAwareScorer, CteScorer};
use crate::error::PlannerResult;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// 挂到某条路径上的自定义门
#[derive(Clone)]
pub struct CustomGate {
    pub route: SourcingPathType,
    pub severity: GateSeverity,
    pub rule: Arc<dyn GateRule>,
}

impl fmt::Debug for CustomGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomGate")
            .field("route", &self.route)
            .field("severity", &self.severity)
            .field("rule", &self.rule.name())
            .finish()
    }
}

// ==========================================
// PlanningContext
// ==========================================
#[derive(Debug)]
pub struct PlanningContext {
    config: PlannerConfig,
    algorithms: AlgorithmRegistry,
    execution_policy: ExecutionPolicy,
    filter: TechnicalLegalFilter,
    solver: SolverManager,
    analyzer: ModelAnalyzer,
    custom_gates: Vec<CustomGate>,
}

impl PlanningContext {
    /// 按配置构建上下文（合规登记表为空）
    ///
    /// # 返回
    /// - Err(Config/InvalidWeights): 配置校验失败
    pub fn new(config: PlannerConfig) -> PlannerResult<Self> {
        Self::with_compliance(config, ComplianceRegistry::new())
    }

    /// 按配置 + 合规登记表构建上下文
    pub fn with_compliance(config: PlannerConfig, compliance: ComplianceRegistry) -> PlannerResult<Self> {
        config.validate()?;

        let algorithms = AlgorithmRegistry::with_defaults(&config.algorithms);
        let filter = TechnicalLegalFilter::new(compliance, config.filter.clone());
        let solver = SolverManager::new(config.solver.clone());

        info!(
            algorithms = algorithms.len(),
            strategy = %config.solver.strategy,
            criticality_cut = config.planner.apply_criticality_cut,
            run_algorithms = config.planner.run_algorithms,
            "计划上下文已构建"
        );

        Ok(Self {
            config,
            algorithms,
            execution_policy: ExecutionPolicy::default(),
            filter,
            solver,
            analyzer: ModelAnalyzer::new(),
            custom_gates: Vec::new(),
        })
    }

    /// 由分层配置构建
    pub fn from_manager(manager: &ConfigManager) -> PlannerResult<Self> {
        Self::new(manager.config().clone())
    }

    // ==========================================
    // 组件替换（测试与集成用）
    // ==========================================

    pub fn with_exact_solver(mut self, exact: Arc<dyn ExactSolver>) -> Self {
        self.solver = SolverManager::with_exact_solver(self.config.solver.clone(), exact);
        self
    }

    pub fn with_algorithms(mut self, algorithms: AlgorithmRegistry) -> Self {
        self.algorithms = algorithms;
        self
    }

    pub fn with_execution_policy(mut self, policy: ExecutionPolicy) -> Self {
        self.execution_policy = policy;
        self
    }

    /// 追加自定义决策门（每次计划新建的决策引擎都会挂上）
    pub fn with_gate_rule(mut self, route: SourcingPathType, rule: Arc<dyn GateRule>, severity: GateSeverity) -> Self {
        self.custom_gates.push(CustomGate { route, severity, rule });
        self
    }

    // ==========================================
    // 访问器
    // ==========================================

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn algorithms(&self) -> &AlgorithmRegistry {
        &self.algorithms
    }

    pub fn filter(&self) -> &TechnicalLegalFilter {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut TechnicalLegalFilter {
        &mut self.filter
    }

    pub fn solver(&self) -> &SolverManager {
        &self.solver
    }

    pub fn analyzer(&self) -> &ModelAnalyzer {
        &self.analyzer
    }

    pub fn executor(&self) -> AlgorithmExecutor<'_> {
        AlgorithmExecutor::with_policy(&self.algorithms, self.execution_policy.clone())
    }

    /// 每次计划新建评分器（评分器持有本轮成本观测，不可跨请求共享）
    pub fn criticality_scorer(&self) -> CriticalityAwareScorer {
        CriticalityAwareScorer::new(self.config.scoring.clone(), self.config.criticality_rules.clone())
    }

    pub fn cte_scorer(&self) -> CteScorer {
        CteScorer::new(self.config.scoring.clone())
    }

    /// 每次计划新建决策引擎（门缓存与审计按计划隔离）
    pub fn decision_engine(&self) -> PlannerResult<DecisionEngine> {
        let mut engine = DecisionEngine::standard(&self.config.decision)?;
        for gate in &self.custom_gates {
            engine.add_custom_gate(gate.route, gate.rule.clone(), gate.severity)?;
        }
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::algorithms::AlgorithmType;

    #[test]
    fn test_context_registers_all_algorithms() {
        let ctx = PlanningContext::new(PlannerConfig::default()).unwrap();
        for t in AlgorithmType::ALL {
            assert!(ctx.algorithms().is_registered(t), "{} 未注册", t);
        }
        assert_eq!(ctx.solver().config().strategy, ctx.config().solver.strategy);
    }

    #[test]
    fn test_decision_engine_carries_custom_gates() {
        struct AlwaysOpen;
        impl GateRule for AlwaysOpen {
            fn name(&self) -> &str {
                "always_open"
            }
            fn evaluate(
                &self,
                _facts: &crate::engine::decision::RouteFacts,
                _input: &crate::engine::decision::DecisionInput,
            ) -> Result<bool, String> {
                Ok(true)
            }
        }

        let ctx = PlanningContext::new(PlannerConfig::default())
            .unwrap()
            .with_gate_rule(SourcingPathType::Vmi, Arc::new(AlwaysOpen), GateSeverity::Warning);
        let engine = ctx.decision_engine().unwrap();
        assert!(engine.gates().is_registered("vmi.always_open"));
        let node = engine.cascade().node_for(SourcingPathType::Vmi).unwrap();
        assert!(node.gates.contains(&"vmi.always_open".to_string()));
    }

    #[test]
    fn test_context_rejects_invalid_config() {
        let mut config = PlannerConfig::default();
        config.scoring.weight_time = 0.9;
        assert!(PlanningContext::new(config).is_err());
    }

    #[test]
    fn test_unregistering_leaves_other_algorithms() {
        let mut registry = AlgorithmRegistry::with_defaults(&Default::default());
        assert!(registry.unregister(AlgorithmType::CtpJohnson));
        let ctx = PlanningContext::new(PlannerConfig::default())
            .unwrap()
            .with_algorithms(registry);
        assert!(!ctx.algorithms().is_registered(AlgorithmType::CtpJohnson));
        assert_eq!(ctx.algorithms().len(), AlgorithmType::ALL.len() - 1);
    }
}
