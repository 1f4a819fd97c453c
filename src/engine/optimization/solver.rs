// ==========================================
// 供应链计划引擎 - 精确求解器 (分支定界)
// ==========================================
// 职责: 混合整数规划求解；LP 松弛由两阶段单纯形提供
// 规则: 深度优先 + 最大分数变量分支；相对间隙剪枝；时间/节点上限
// ==========================================

use super::simplex::{solve_lp, LinearProgram, LpStatus};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, instrument};

const INTEGRALITY_TOL: f64 = 1e-6;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("问题定义无效: {0}")]
    InvalidProblem(String),

    #[error("问题不可行")]
    Infeasible,

    #[error("问题无界")]
    Unbounded,

    #[error("超过时间上限且无可行解 (已探索 {nodes} 个节点)")]
    TimeLimit { nodes: u64 },

    #[error("单纯形迭代超限: {0}")]
    IterationLimit(u64),

    #[error("数值问题: {0}")]
    Numerical(String),
}

/// 混合整数规划问题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MipProblem {
    pub lp: LinearProgram,
    pub integer: Vec<bool>,
}

impl MipProblem {
    pub fn new(lp: LinearProgram) -> Self {
        let n = lp.num_vars();
        Self {
            lp,
            integer: vec![false; n],
        }
    }

    pub fn set_integer(&mut self, var: usize) {
        if let Some(flag) = self.integer.get_mut(var) {
            *flag = true;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolveLimits {
    pub time_limit: Duration,
    pub gap_tolerance: f64,
    pub max_nodes: u64,
    pub max_simplex_iterations: u64,
}

impl Default for SolveLimits {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(300),
            gap_tolerance: 0.05,
            max_nodes: 100_000,
            max_simplex_iterations: 50_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MipStatus {
    /// 间隙在容差内（gap 给出实际间隙）
    Optimal,
    /// 触发上限时的在位解
    Feasible,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MipSolution {
    pub status: MipStatus,
    pub values: Vec<f64>,
    pub objective: f64,
    pub nodes_explored: u64,
    pub simplex_iterations: u64,
    pub gap: f64,
}

/// 精确求解器接口
pub trait ExactSolver: Send + Sync {
    fn name(&self) -> &'static str;

    fn solve(&self, problem: &MipProblem, limits: &SolveLimits) -> Result<MipSolution, SolverError>;
}

// ==========================================
// BranchAndBoundSolver
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct BranchAndBoundSolver;

impl BranchAndBoundSolver {
    pub fn new() -> Self {
        Self
    }
}

struct Node {
    lower: Vec<f64>,
    upper: Vec<Option<f64>>,
}

fn relative_gap(incumbent: f64, bound: f64) -> f64 {
    if !incumbent.is_finite() {
        return f64::INFINITY;
    }
    ((incumbent - bound) / incumbent.abs().max(1e-9)).max(0.0)
}

/// 分数部分最接近 0.5 的整数变量
fn most_fractional(values: &[f64], integer: &[bool]) -> Option<usize> {
    values
        .iter()
        .zip(integer)
        .enumerate()
        .filter(|(_, (_, is_int))| **is_int)
        .map(|(j, (v, _))| (j, (v - v.floor()).min(v.ceil() - v)))
        .filter(|(_, frac)| *frac > INTEGRALITY_TOL)
        .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(j, _)| j)
}

impl ExactSolver for BranchAndBoundSolver {
    fn name(&self) -> &'static str {
        "BRANCH_AND_BOUND"
    }

    #[instrument(skip(self, problem, limits), fields(vars = problem.lp.num_vars(), rows = problem.lp.rows.len()))]
    fn solve(&self, problem: &MipProblem, limits: &SolveLimits) -> Result<MipSolution, SolverError> {
        problem.lp.check().map_err(SolverError::InvalidProblem)?;
        if problem.integer.len() != problem.lp.num_vars() {
            return Err(SolverError::InvalidProblem("整数标记长度与变量数不一致".to_string()));
        }

        let started = Instant::now();
        let mut nodes_explored = 0_u64;
        let mut simplex_iterations = 0_u64;
        let mut incumbent: Option<(Vec<f64>, f64)> = None;
        let mut root_bound = f64::NEG_INFINITY;
        // 按间隙容差剪掉的节点中最小的松弛下界
        let mut pruned_bound = f64::INFINITY;
        let mut limit_hit = false;

        let mut stack = vec![Node {
            lower: problem.lp.lower_bounds.clone(),
            upper: problem.lp.upper_bounds.clone(),
        }];

        while let Some(node) = stack.pop() {
            if started.elapsed() >= limits.time_limit || nodes_explored >= limits.max_nodes {
                limit_hit = true;
                break;
            }
            nodes_explored += 1;

            let mut relaxation = problem.lp.clone();
            relaxation.lower_bounds = node.lower.clone();
            relaxation.upper_bounds = node.upper.clone();
            let remaining = limits.max_simplex_iterations.saturating_sub(simplex_iterations);
            let lp = solve_lp(&relaxation, remaining);
            simplex_iterations += lp.iterations;

            match lp.status {
                LpStatus::Infeasible => continue,
                LpStatus::Unbounded => {
                    if nodes_explored == 1 {
                        return Err(SolverError::Unbounded);
                    }
                    continue;
                }
                LpStatus::IterationLimit => {
                    if incumbent.is_none() {
                        return Err(SolverError::IterationLimit(simplex_iterations));
                    }
                    limit_hit = true;
                    break;
                }
                LpStatus::Optimal => {}
            }
            if !lp.objective.is_finite() {
                return Err(SolverError::Numerical(format!("松弛目标非有限: {}", lp.objective)));
            }
            if nodes_explored == 1 {
                root_bound = lp.objective;
            }

            // 剪枝: 松弛下界不优于在位解 (按间隙容差)
            if let Some((_, best)) = &incumbent {
                if lp.objective >= *best - 1e-9 {
                    continue;
                }
                if relative_gap(*best, lp.objective) <= limits.gap_tolerance {
                    pruned_bound = pruned_bound.min(lp.objective);
                    continue;
                }
            }

            match most_fractional(&lp.values, &problem.integer) {
                None => {
                    let improves = incumbent
                        .as_ref()
                        .map_or(true, |(_, best)| lp.objective < *best - 1e-9);
                    if improves {
                        debug!(objective = lp.objective, nodes_explored, "更新在位解");
                        let mut values = lp.values;
                        for (v, is_int) in values.iter_mut().zip(&problem.integer) {
                            if *is_int {
                                *v = v.round();
                            }
                        }
                        incumbent = Some((values, lp.objective));
                    }
                }
                Some(j) => {
                    let v = lp.values[j];
                    // 下分支先压栈，上分支先探索
                    let mut down = Node {
                        lower: node.lower.clone(),
                        upper: node.upper.clone(),
                    };
                    down.upper[j] = Some(v.floor());
                    let mut up = node;
                    up.lower[j] = v.ceil();
                    stack.push(down);
                    stack.push(up);
                }
            }
        }

        let Some((values, objective)) = incumbent else {
            if limit_hit {
                return Err(SolverError::TimeLimit { nodes: nodes_explored });
            }
            return Err(SolverError::Infeasible);
        };

        let bound = if limit_hit {
            root_bound
        } else {
            objective.min(pruned_bound)
        };
        let gap = relative_gap(objective, bound);
        let status = if !limit_hit || gap <= limits.gap_tolerance {
            MipStatus::Optimal
        } else {
            MipStatus::Feasible
        };

        debug!(objective, nodes_explored, simplex_iterations, gap, "分支定界完成");
        Ok(MipSolution {
            status,
            values,
            objective,
            nodes_explored,
            simplex_iterations,
            gap,
        })
    }
}
