// ==========================================
// 供应链计划引擎 - 替代物料图搜索
// ==========================================
// 职责: 沿替代关系图寻找满足兼容度下限的替代物料
// 策略: 关键/高 → DFS 全量比较；中/低 → BFS 取最浅层最优
// ==========================================

use crate::config::AlgorithmsConfig;
use crate::domain::money::{extend, money_from_f64};
use crate::domain::types::Criticality;
use std::collections::{HashMap, HashSet, VecDeque};

use super::base::{
    AlgorithmError, AlgorithmInput, AlgorithmOutput, AlgorithmType, AlternativeConsidered,
    SourcingAlgorithm, SubstituteEdge,
};

/// 替代链（起点物料不计入 items）
#[derive(Debug, Clone, PartialEq)]
pub struct SubstitutePath {
    pub items: Vec<String>,
    pub technical_match: f64,   // 沿链连乘
    pub reliability: f64,       // 沿链取最小
    pub cost_differential: f64, // 沿链累加
    pub conversion_factor: f64, // 沿链连乘
    pub lead_time_delta_days: f64,
}

impl SubstitutePath {
    pub fn target(&self) -> Option<&str> {
        self.items.last().map(String::as_str)
    }

    pub fn depth(&self) -> usize {
        self.items.len()
    }

    /// 0.5·技术 + 0.3·可靠性 + 0.2·(1 − |成本差|)
    pub fn overall_score(&self) -> f64 {
        0.5 * self.technical_match
            + 0.3 * self.reliability
            + 0.2 * (1.0 - self.cost_differential.abs()).max(0.0)
    }

    /// 按关键度重新加权
    pub fn weighted_score(&self, criticality: Criticality) -> f64 {
        let overall = self.overall_score();
        match criticality {
            Criticality::Critical | Criticality::High => 0.7 * self.technical_match + 0.3 * overall,
            Criticality::Medium => overall,
            Criticality::Low => 0.5 * (1.0 - self.cost_differential.abs()).max(0.0) + 0.5 * overall,
        }
    }

    fn append(&self, edge: &SubstituteEdge) -> Self {
        let mut items = self.items.clone();
        items.push(edge.to_item.clone());
        Self {
            items,
            technical_match: self.technical_match * edge.technical_match,
            reliability: self.reliability.min(edge.reliability),
            cost_differential: self.cost_differential + edge.cost_differential,
            conversion_factor: self.conversion_factor * edge.conversion_factor,
            lead_time_delta_days: self.lead_time_delta_days + edge.lead_time_delta_days,
        }
    }

    fn root() -> Self {
        Self {
            items: Vec::new(),
            technical_match: 1.0,
            reliability: 1.0,
            cost_differential: 0.0,
            conversion_factor: 1.0,
            lead_time_delta_days: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubstitutesGraphAlgorithm {
    max_depth: usize,
    min_compatibility: f64,
}

impl Default for SubstitutesGraphAlgorithm {
    fn default() -> Self {
        Self::new(&AlgorithmsConfig::default())
    }
}

impl SubstitutesGraphAlgorithm {
    pub fn new(config: &AlgorithmsConfig) -> Self {
        Self {
            max_depth: config.substitutes_max_depth,
            min_compatibility: config.substitutes_min_compatibility,
        }
    }

    fn adjacency(edges: &[SubstituteEdge]) -> HashMap<&str, Vec<&SubstituteEdge>> {
        let mut adjacency: HashMap<&str, Vec<&SubstituteEdge>> = HashMap::new();
        for edge in edges {
            adjacency.entry(edge.from_item.as_str()).or_default().push(edge);
        }
        adjacency
    }

    /// DFS: 枚举深度内全部合格链（链内不重复访问）
    pub fn search_dfs(&self, start: &str, edges: &[SubstituteEdge]) -> Vec<SubstitutePath> {
        let adjacency = Self::adjacency(edges);
        let mut found = Vec::new();
        let mut on_path: HashSet<String> = HashSet::new();
        on_path.insert(start.to_string());
        self.dfs(start, &SubstitutePath::root(), &adjacency, &mut on_path, &mut found);
        found
    }

    fn dfs(
        &self,
        node: &str,
        path: &SubstitutePath,
        adjacency: &HashMap<&str, Vec<&SubstituteEdge>>,
        on_path: &mut HashSet<String>,
        found: &mut Vec<SubstitutePath>,
    ) {
        if path.depth() >= self.max_depth {
            return;
        }
        let Some(edges) = adjacency.get(node) else {
            return;
        };
        for edge in edges {
            if on_path.contains(&edge.to_item) {
                continue;
            }
            let next = path.append(edge);
            if next.technical_match < self.min_compatibility {
                continue;
            }
            on_path.insert(edge.to_item.clone());
            self.dfs(&edge.to_item, &next, adjacency, on_path, found);
            on_path.remove(&edge.to_item);
            found.push(next);
        }
    }

    /// BFS: 逐层展开，返回第一个出现合格链的层
    pub fn search_bfs(&self, start: &str, edges: &[SubstituteEdge]) -> Vec<SubstitutePath> {
        let adjacency = Self::adjacency(edges);
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(start.to_string());
        let mut frontier: VecDeque<(String, SubstitutePath)> = VecDeque::new();
        frontier.push_back((start.to_string(), SubstitutePath::root()));

        for _ in 0..self.max_depth {
            let mut level = Vec::new();
            let mut next_frontier = VecDeque::new();
            while let Some((node, path)) = frontier.pop_front() {
                for edge in adjacency.get(node.as_str()).into_iter().flatten() {
                    if visited.contains(&edge.to_item) {
                        continue;
                    }
                    let next = path.append(edge);
                    if next.technical_match < self.min_compatibility {
                        continue;
                    }
                    visited.insert(edge.to_item.clone());
                    next_frontier.push_back((edge.to_item.clone(), next.clone()));
                    level.push(next);
                }
            }
            if !level.is_empty() {
                return level;
            }
            if next_frontier.is_empty() {
                break;
            }
            frontier = next_frontier;
        }
        Vec::new()
    }

    /// 按关键度选择搜索方式并取加权分最高的链
    pub fn best_substitute(&self, input: &AlgorithmInput) -> (Option<SubstitutePath>, Vec<SubstitutePath>) {
        let edges = &input.context.substitution_graph;
        let candidates = match input.criticality {
            Criticality::Critical | Criticality::High => self.search_dfs(&input.item_id, edges),
            Criticality::Medium | Criticality::Low => self.search_bfs(&input.item_id, edges),
        };
        let best = candidates
            .iter()
            .max_by(|a, b| {
                a.weighted_score(input.criticality)
                    .total_cmp(&b.weighted_score(input.criticality))
                    .then(b.depth().cmp(&a.depth()))
            })
            .cloned();
        (best, candidates)
    }
}

impl SourcingAlgorithm for SubstitutesGraphAlgorithm {
    fn algorithm_type(&self) -> AlgorithmType {
        AlgorithmType::SubstitutesGraph
    }

    fn strategy(&self) -> &'static str {
        "替代关系图 DFS/BFS 搜索"
    }

    fn validate_input(&self, input: &AlgorithmInput) -> Result<(), AlgorithmError> {
        input.check_common()?;
        if input.context.substitution_graph.is_empty() {
            return Err(AlgorithmError::InvalidInput(format!(
                "物料 {} 无替代关系数据",
                input.item_id
            )));
        }
        Ok(())
    }

    fn execute(&self, input: &AlgorithmInput) -> Result<AlgorithmOutput, AlgorithmError> {
        let (best, candidates) = self.best_substitute(input);

        let Some(best) = best else {
            let mut output =
                AlgorithmOutput::completed(self.algorithm_type(), &input.item_id, "SUBSTITUTE_NONE");
            output.reasoning = format!(
                "深度 {} 内无兼容度 ≥ {:.2} 的替代物料",
                self.max_depth, self.min_compatibility
            );
            return Ok(output);
        };

        let target = best.target().unwrap_or_default().to_string();
        let quantity = input.demand_quantity * best.conversion_factor;
        let unit_cost = input.reference_unit_cost * money_from_f64(1.0 + best.cost_differential);
        let confidence = 0.5 * best.technical_match
            + 0.3 * (1.0 - (best.depth() as f64 / 5.0).min(1.0))
            + 0.2 * best.overall_score();

        let mut output = AlgorithmOutput::completed(
            self.algorithm_type(),
            &input.item_id,
            format!("SUBSTITUTE:{}", target),
        );
        output.proposed_quantity = quantity;
        output.estimated_cost = extend(unit_cost, quantity);
        output.estimated_lead_time_days = best.lead_time_delta_days.max(0.0);
        output.confidence = confidence;
        output.reasoning = format!(
            "替代链 {} (深度 {})，技术匹配 {:.2}，可靠性 {:.2}，成本差 {:+.1}%",
            best.items.join(" → "),
            best.depth(),
            best.technical_match,
            best.reliability,
            best.cost_differential * 100.0
        );
        output.alternatives_considered = candidates
            .iter()
            .map(|p| AlternativeConsidered {
                label: format!("SUBSTITUTE:{}", p.target().unwrap_or_default()),
                quantity: input.demand_quantity * p.conversion_factor,
                score: p.weighted_score(input.criticality),
            })
            .collect();
        Ok(output)
    }
}
