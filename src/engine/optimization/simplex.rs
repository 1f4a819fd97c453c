// ==========================================
// 供应链计划引擎 - 线性规划 (两阶段单纯形)
// ==========================================
// 职责: 求解 min c·x, s.t. 行约束, lb ≤ x ≤ ub
// 算法: 稠密表格两阶段单纯形 + Bland 规则防循环
// ==========================================

use serde::{Deserialize, Serialize};

const EPS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowSense {
    Le,
    Ge,
    Eq,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRow {
    pub name: String,
    pub coefficients: Vec<f64>,
    pub sense: RowSense,
    pub rhs: f64,
}

impl LinearRow {
    pub fn new(name: impl Into<String>, coefficients: Vec<f64>, sense: RowSense, rhs: f64) -> Self {
        Self {
            name: name.into(),
            coefficients,
            sense,
            rhs,
        }
    }

    pub fn activity(&self, values: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .zip(values)
            .map(|(a, x)| a * x)
            .sum()
    }

    /// 松弛量（≥ 0 表示满足）
    pub fn slack(&self, values: &[f64]) -> f64 {
        let activity = self.activity(values);
        match self.sense {
            RowSense::Le => self.rhs - activity,
            RowSense::Ge => activity - self.rhs,
            RowSense::Eq => -(activity - self.rhs).abs(),
        }
    }
}

/// 最小化线性规划
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearProgram {
    pub objective: Vec<f64>,
    pub rows: Vec<LinearRow>,
    pub lower_bounds: Vec<f64>,
    pub upper_bounds: Vec<Option<f64>>,
}

impl LinearProgram {
    pub fn new(objective: Vec<f64>) -> Self {
        let n = objective.len();
        Self {
            objective,
            rows: Vec::new(),
            lower_bounds: vec![0.0; n],
            upper_bounds: vec![None; n],
        }
    }

    pub fn num_vars(&self) -> usize {
        self.objective.len()
    }

    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.objective.iter().zip(values).map(|(c, x)| c * x).sum()
    }

    /// 维度与数值合法性
    pub fn check(&self) -> Result<(), String> {
        let n = self.num_vars();
        if self.lower_bounds.len() != n || self.upper_bounds.len() != n {
            return Err(format!("变量界长度与目标维度 {} 不一致", n));
        }
        if self.objective.iter().any(|c| !c.is_finite()) {
            return Err("目标系数含非有限值".to_string());
        }
        for row in &self.rows {
            if row.coefficients.len() != n {
                return Err(format!("约束 {} 维度 {} ≠ {}", row.name, row.coefficients.len(), n));
            }
            if !row.rhs.is_finite() || row.coefficients.iter().any(|a| !a.is_finite()) {
                return Err(format!("约束 {} 含非有限值", row.name));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LpStatus {
    Optimal,
    Infeasible,
    Unbounded,
    IterationLimit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LpSolution {
    pub status: LpStatus,
    pub values: Vec<f64>,
    pub objective: f64,
    pub iterations: u64,
}

impl LpSolution {
    fn without_values(status: LpStatus, n: usize, iterations: u64) -> Self {
        Self {
            status,
            values: vec![0.0; n],
            objective: f64::INFINITY,
            iterations,
        }
    }
}

// ==========================================
// 表格
// ==========================================
struct Tableau {
    rows: Vec<Vec<f64>>, // 末列为右端项
    basis: Vec<usize>,
    width: usize,
}

enum Outcome {
    Optimal,
    Unbounded,
    IterationLimit,
}

impl Tableau {
    fn rhs(&self, i: usize) -> f64 {
        self.rows[i][self.width]
    }

    fn pivot(&mut self, r: usize, c: usize) {
        let p = self.rows[r][c];
        for v in self.rows[r].iter_mut() {
            *v /= p;
        }
        let pivot_row = self.rows[r].clone();
        for (i, row) in self.rows.iter_mut().enumerate() {
            if i == r {
                continue;
            }
            let factor = row[c];
            if factor.abs() > EPS {
                for (v, pv) in row.iter_mut().zip(&pivot_row) {
                    *v -= factor * pv;
                }
            }
        }
        self.basis[r] = c;
    }

    fn objective(&self, cost: &[f64]) -> f64 {
        self.basis
            .iter()
            .enumerate()
            .map(|(i, &b)| cost[b] * self.rhs(i))
            .sum()
    }

    /// 单纯形迭代（Bland: 最小下标入基，比值并列时最小基下标出基）
    fn optimize(&mut self, cost: &[f64], allowed: &[bool], max_iterations: u64, iterations: &mut u64) -> Outcome {
        loop {
            if *iterations >= max_iterations {
                return Outcome::IterationLimit;
            }

            let entering = (0..self.width).find(|&j| {
                if !allowed[j] || self.basis.contains(&j) {
                    return false;
                }
                let reduced = cost[j]
                    - self
                        .basis
                        .iter()
                        .enumerate()
                        .map(|(i, &b)| cost[b] * self.rows[i][j])
                        .sum::<f64>();
                reduced < -EPS
            });
            let Some(c) = entering else {
                return Outcome::Optimal;
            };

            let mut leaving: Option<(usize, f64)> = None;
            for i in 0..self.rows.len() {
                let a = self.rows[i][c];
                if a > EPS {
                    let ratio = self.rhs(i) / a;
                    leaving = match leaving {
                        None => Some((i, ratio)),
                        Some((li, lr)) => {
                            if ratio < lr - EPS || ((ratio - lr).abs() <= EPS && self.basis[i] < self.basis[li]) {
                                Some((i, ratio))
                            } else {
                                Some((li, lr))
                            }
                        }
                    };
                }
            }
            let Some((r, _)) = leaving else {
                return Outcome::Unbounded;
            };

            self.pivot(r, c);
            *iterations += 1;
        }
    }
}

/// 两阶段单纯形求解
pub fn solve_lp(lp: &LinearProgram, max_iterations: u64) -> LpSolution {
    let n = lp.num_vars();

    // 平移下界: x = lb + x'
    for j in 0..n {
        if let Some(ub) = lp.upper_bounds[j] {
            if ub < lp.lower_bounds[j] - EPS {
                return LpSolution::without_values(LpStatus::Infeasible, n, 0);
            }
        }
    }
    let lb = &lp.lower_bounds;

    // 行: 原约束 + 上界行；右端项非负化
    let mut rows: Vec<(Vec<f64>, RowSense, f64)> = lp
        .rows
        .iter()
        .map(|row| {
            let shift: f64 = row.coefficients.iter().zip(lb).map(|(a, l)| a * l).sum();
            (row.coefficients.clone(), row.sense, row.rhs - shift)
        })
        .collect();
    for j in 0..n {
        if let Some(ub) = lp.upper_bounds[j] {
            let mut coefficients = vec![0.0; n];
            coefficients[j] = 1.0;
            rows.push((coefficients, RowSense::Le, ub - lb[j]));
        }
    }
    for (coefficients, sense, rhs) in rows.iter_mut() {
        if *rhs < 0.0 {
            for a in coefficients.iter_mut() {
                *a = -*a;
            }
            *rhs = -*rhs;
            *sense = match *sense {
                RowSense::Le => RowSense::Ge,
                RowSense::Ge => RowSense::Le,
                RowSense::Eq => RowSense::Eq,
            };
        }
    }

    let m = rows.len();
    let slack_count = rows.iter().filter(|(_, s, _)| *s != RowSense::Eq).count();
    let artificial_count = rows.iter().filter(|(_, s, _)| *s != RowSense::Le).count();
    let width = n + slack_count + artificial_count;
    let artificial_start = n + slack_count;

    let mut table = Tableau {
        rows: vec![vec![0.0; width + 1]; m],
        basis: vec![0; m],
        width,
    };
    let (mut next_slack, mut next_artificial) = (n, artificial_start);
    for (i, (coefficients, sense, rhs)) in rows.iter().enumerate() {
        table.rows[i][..n].copy_from_slice(coefficients);
        table.rows[i][width] = *rhs;
        match sense {
            RowSense::Le => {
                table.rows[i][next_slack] = 1.0;
                table.basis[i] = next_slack;
                next_slack += 1;
            }
            RowSense::Ge => {
                table.rows[i][next_slack] = -1.0;
                next_slack += 1;
                table.rows[i][next_artificial] = 1.0;
                table.basis[i] = next_artificial;
                next_artificial += 1;
            }
            RowSense::Eq => {
                table.rows[i][next_artificial] = 1.0;
                table.basis[i] = next_artificial;
                next_artificial += 1;
            }
        }
    }

    let mut iterations = 0_u64;

    // 第一阶段: 最小化人工变量和
    if artificial_count > 0 {
        let mut phase1_cost = vec![0.0; width];
        for c in phase1_cost.iter_mut().skip(artificial_start) {
            *c = 1.0;
        }
        let allowed = vec![true; width];
        match table.optimize(&phase1_cost, &allowed, max_iterations, &mut iterations) {
            Outcome::IterationLimit => {
                return LpSolution::without_values(LpStatus::IterationLimit, n, iterations)
            }
            Outcome::Unbounded | Outcome::Optimal => {}
        }
        if table.objective(&phase1_cost) > 1e-7 {
            return LpSolution::without_values(LpStatus::Infeasible, n, iterations);
        }
        // 人工变量出基
        for i in 0..m {
            if table.basis[i] >= artificial_start {
                if let Some(c) = (0..artificial_start).find(|&j| table.rows[i][j].abs() > EPS) {
                    table.pivot(i, c);
                }
            }
        }
    }

    // 第二阶段: 原目标，禁止人工变量入基
    let mut cost = vec![0.0; width];
    cost[..n].copy_from_slice(&lp.objective);
    let allowed: Vec<bool> = (0..width).map(|j| j < artificial_start).collect();
    match table.optimize(&cost, &allowed, max_iterations, &mut iterations) {
        Outcome::IterationLimit => return LpSolution::without_values(LpStatus::IterationLimit, n, iterations),
        Outcome::Unbounded => return LpSolution::without_values(LpStatus::Unbounded, n, iterations),
        Outcome::Optimal => {}
    }

    let mut values = lb.clone();
    for (i, &b) in table.basis.iter().enumerate() {
        if b < n {
            values[b] += table.rhs(i);
        }
    }
    // 消除数值噪声
    for v in values.iter_mut() {
        if v.abs() < 1e-9 {
            *v = 0.0;
        }
    }

    LpSolution {
        status: LpStatus::Optimal,
        objective: lp.objective_value(&values),
        values,
        iterations,
    }
}
