// ==========================================
// 供应链计划引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、环境变量覆写、快照
// 层级: 默认值 → JSON 文件 → SCPE_* 环境变量
// ==========================================

use crate::config::planner_config::PlannerConfig;
use crate::error::{PlannerError, PlannerResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

// ==========================================
// ConfigSource - 配置来源
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    Defaults,
    File(PathBuf),
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: PlannerConfig,
    source: ConfigSource,
    overrides_applied: Vec<String>,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ConfigManager {
    /// 仅使用默认值
    pub fn with_defaults() -> Self {
        Self {
            config: PlannerConfig::default(),
            source: ConfigSource::Defaults,
            overrides_applied: Vec::new(),
        }
    }

    /// 由已有配置创建（测试/嵌入场景）
    pub fn from_config(config: PlannerConfig) -> PlannerResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            source: ConfigSource::Defaults,
            overrides_applied: Vec::new(),
        })
    }

    /// 完整加载：默认值 → 文件 → 环境变量
    ///
    /// # 参数
    /// - `explicit_path`: 显式配置文件；None 时尝试用户配置目录下的 scpe/planner.json
    ///
    /// # 返回
    /// - Err: 显式文件不存在/无法解析，或最终配置校验失败
    pub fn load(explicit_path: Option<&Path>) -> PlannerResult<Self> {
        let mut manager = match explicit_path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::with_defaults(),
            },
        };

        manager.apply_overrides(std::env::vars());
        manager.config.validate()?;

        info!(
            source = ?manager.source,
            overrides = manager.overrides_applied.len(),
            strategy = %manager.config.solver.strategy,
            "配置加载完成"
        );
        Ok(manager)
    }

    /// 从 JSON 文件加载（不读环境变量）
    pub fn from_file(path: &Path) -> PlannerResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PlannerError::Config(format!("读取配置文件失败: {}: {}", path.display(), e))
        })?;
        let config: PlannerConfig = serde_json::from_str(&raw).map_err(|e| {
            PlannerError::Config(format!("配置文件格式错误: {}: {}", path.display(), e))
        })?;
        config.validate()?;

        debug!(path = %path.display(), "配置文件已读取");
        Ok(Self {
            config,
            source: ConfigSource::File(path.to_path_buf()),
            overrides_applied: Vec::new(),
        })
    }

    /// 默认配置文件位置: <config_dir>/scpe/planner.json
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("scpe").join("planner.json"))
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn into_config(self) -> PlannerConfig {
        self.config
    }

    pub fn source(&self) -> &ConfigSource {
        &self.source
    }

    /// 已生效的覆写键
    pub fn overrides_applied(&self) -> &[String] {
        &self.overrides_applied
    }

    // ==========================================
    // 覆写
    // ==========================================

    /// 应用键值覆写（只识别 config_keys 中的键）
    ///
    /// 无法解析的值记录 warn 并保留原值
    pub fn apply_overrides<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let key = key.as_ref();
            if !key.starts_with(config_keys::PREFIX) {
                continue;
            }
            if self.apply_one(key, value.as_ref().trim()) {
                self.overrides_applied.push(key.to_string());
            }
        }
    }

    fn apply_one(&mut self, key: &str, value: &str) -> bool {
        let c = &mut self.config;
        match key {
            config_keys::SOLVER_STRATEGY => set_parsed(&mut c.solver.strategy, key, value),
            config_keys::SOLVER_TIME_LIMIT_SECONDS => set_parsed(&mut c.solver.time_limit_seconds, key, value),
            config_keys::SOLVER_GAP_TOLERANCE => set_parsed(&mut c.solver.gap_tolerance, key, value),
            config_keys::SOLVER_MAX_NODES => set_parsed(&mut c.solver.max_nodes, key, value),
            config_keys::SCORING_WEIGHT_COST => set_parsed(&mut c.scoring.weight_cost, key, value),
            config_keys::SCORING_WEIGHT_TIME => set_parsed(&mut c.scoring.weight_time, key, value),
            config_keys::SCORING_WEIGHT_RISK => set_parsed(&mut c.scoring.weight_risk, key, value),
            config_keys::SCORING_URGENT_DAYS => set_parsed(&mut c.scoring.urgent_threshold_days, key, value),
            config_keys::FILTER_CRITICAL_EXPIRATION_DAYS => {
                set_parsed(&mut c.filter.critical_expiration_days, key, value)
            }
            config_keys::FILTER_MIN_STORAGE_DAYS => set_parsed(&mut c.filter.min_storage_buffer_days, key, value),
            config_keys::FILTER_MIN_EQUIVALENT_MATCH => set_parsed(&mut c.filter.min_equivalent_match, key, value),
            config_keys::PLANNER_RUN_ALGORITHMS => set_parsed(&mut c.planner.run_algorithms, key, value),
            config_keys::PLANNER_SERVICE_LEVEL => set_parsed(&mut c.planner.target_service_level, key, value),
            config_keys::PLANNER_BUDGET_CONTINGENCY_PCT => {
                set_parsed(&mut c.planner.budget_contingency_pct, key, value)
            }
            config_keys::DECISION_ENABLED => set_parsed(&mut c.decision.enabled, key, value),
            config_keys::DECISION_MIN_RELIABILITY => set_parsed(&mut c.decision.min_reliability, key, value),
            config_keys::DECISION_MAX_COST_MULTIPLIER => {
                set_parsed(&mut c.decision.max_cost_multiplier, key, value)
            }
            _ => {
                debug!(config_key = key, "未识别的配置键，忽略");
                false
            }
        }
    }

    // ==========================================
    // 快照
    // ==========================================

    /// 生效配置快照（JSON），用于审计与结果复现
    pub fn snapshot_json(&self) -> PlannerResult<String> {
        Ok(serde_json::to_string_pretty(&self.config)?)
    }

    /// 扁平化快照: 键 → 值字符串
    pub fn snapshot_flat(&self) -> PlannerResult<BTreeMap<String, String>> {
        let value = serde_json::to_value(&self.config)?;
        let mut out = BTreeMap::new();
        flatten("", &value, &mut out);
        Ok(out)
    }
}

fn set_parsed<T: FromStr>(target: &mut T, key: &str, raw: &str) -> bool {
    match raw.parse::<T>() {
        Ok(v) => {
            *target = v;
            true
        }
        Err(_) => {
            warn!(config_key = key, raw_value = %raw, "配置覆写值无法解析，保留原值");
            false
        }
    }
}

fn flatten(prefix: &str, value: &serde_json::Value, out: &mut BTreeMap<String, String>) {
    match value {
        serde_json::Value::Object(map) => {
            for (k, v) in map {
                let key = if prefix.is_empty() { k.clone() } else { format!("{}.{}", prefix, k) };
                flatten(&key, v, out);
            }
        }
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}

// ==========================================
// 配置键常量（环境变量）
// ==========================================
pub mod config_keys {
    pub const PREFIX: &str = "SCPE_";

    // 求解器
    pub const SOLVER_STRATEGY: &str = "SCPE_SOLVER_STRATEGY";
    pub const SOLVER_TIME_LIMIT_SECONDS: &str = "SCPE_SOLVER_TIME_LIMIT_SECONDS";
    pub const SOLVER_GAP_TOLERANCE: &str = "SCPE_SOLVER_GAP_TOLERANCE";
    pub const SOLVER_MAX_NODES: &str = "SCPE_SOLVER_MAX_NODES";

    // 评分
    pub const SCORING_WEIGHT_COST: &str = "SCPE_SCORING_WEIGHT_COST";
    pub const SCORING_WEIGHT_TIME: &str = "SCPE_SCORING_WEIGHT_TIME";
    pub const SCORING_WEIGHT_RISK: &str = "SCPE_SCORING_WEIGHT_RISK";
    pub const SCORING_URGENT_DAYS: &str = "SCPE_SCORING_URGENT_DAYS";

    // 过滤
    pub const FILTER_CRITICAL_EXPIRATION_DAYS: &str = "SCPE_FILTER_CRITICAL_EXPIRATION_DAYS";
    pub const FILTER_MIN_STORAGE_DAYS: &str = "SCPE_FILTER_MIN_STORAGE_DAYS";
    pub const FILTER_MIN_EQUIVALENT_MATCH: &str = "SCPE_FILTER_MIN_EQUIVALENT_MATCH";

    // 计划流程
    pub const PLANNER_RUN_ALGORITHMS: &str = "SCPE_PLANNER_RUN_ALGORITHMS";
    pub const PLANNER_SERVICE_LEVEL: &str = "SCPE_PLANNER_SERVICE_LEVEL";
    pub const PLANNER_BUDGET_CONTINGENCY_PCT: &str = "SCPE_PLANNER_BUDGET_CONTINGENCY_PCT";

    // 路径决策
    pub const DECISION_ENABLED: &str = "SCPE_DECISION_ENABLED";
    pub const DECISION_MIN_RELIABILITY: &str = "SCPE_DECISION_MIN_RELIABILITY";
    pub const DECISION_MAX_COST_MULTIPLIER: &str = "SCPE_DECISION_MAX_COST_MULTIPLIER";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::optimization::SolverStrategy;
    use std::io::Write;

    #[test]
    fn test_overrides_apply_and_bad_values_are_kept() {
        let mut manager = ConfigManager::with_defaults();
        manager.apply_overrides(vec![
            (config_keys::SOLVER_STRATEGY, "greedy-with-reopt"),
            (config_keys::SOLVER_GAP_TOLERANCE, "not-a-number"),
            (config_keys::FILTER_MIN_STORAGE_DAYS, "21"),
            ("PATH", "/usr/bin"),
        ]);
        assert_eq!(manager.config().solver.strategy, SolverStrategy::GreedyWithReopt);
        assert_eq!(manager.config().solver.gap_tolerance, 0.05);
        assert_eq!(manager.config().filter.min_storage_buffer_days, 21);
        assert_eq!(manager.overrides_applied().len(), 2);
    }

    #[test]
    fn test_decision_overrides() {
        let mut manager = ConfigManager::with_defaults();
        manager.apply_overrides(vec![
            (config_keys::DECISION_ENABLED, "false"),
            (config_keys::DECISION_MAX_COST_MULTIPLIER, "2.5"),
        ]);
        assert!(!manager.config().decision.enabled);
        assert_eq!(manager.config().decision.max_cost_multiplier, 2.5);
    }

    #[test]
    fn test_from_file_and_snapshot() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"planner": {{"budget_contingency_pct": 10.0}}}}"#).unwrap();

        let manager = ConfigManager::from_file(file.path()).unwrap();
        assert_eq!(manager.config().planner.budget_contingency_pct, 10.0);
        assert_eq!(manager.source(), &ConfigSource::File(file.path().to_path_buf()));

        let flat = manager.snapshot_flat().unwrap();
        assert_eq!(flat.get("planner.budget_contingency_pct").map(String::as_str), Some("10.0"));
        assert!(manager.snapshot_json().unwrap().contains("\"solver\""));
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        assert!(matches!(ConfigManager::from_file(file.path()), Err(PlannerError::Config(_))));
    }
}
