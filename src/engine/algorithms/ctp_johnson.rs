// ==========================================
// 供应链计划引擎 - CTP (Johnson 两阶段排程)
// ==========================================
// 职责: 把当前需求插入两阶段流水车间，评估可承诺交期
// 算法: Johnson 规则 (s1 ≤ s2 按 s1 升序在前，其余按 s2 降序在后)
// ==========================================

use crate::config::AlgorithmsConfig;
use crate::domain::money::extend;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::base::{
    AlgorithmError, AlgorithmInput, AlgorithmOutput, AlgorithmType, AlternativeConsidered,
    FlowShopJob, SourcingAlgorithm,
};

const CURRENT_JOB: &str = "__CURRENT__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStatus {
    Optimal,  // 无延误且利用率在上限内
    Feasible, // 无延误
    Risky,    // 存在延误
}

impl ScheduleStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ScheduleStatus::Optimal => "SCHEDULE_OPTIMAL",
            ScheduleStatus::Feasible => "SCHEDULE_FEASIBLE",
            ScheduleStatus::Risky => "SCHEDULE_RISKY",
        }
    }
}

/// 单作业排程结果（小时）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub job_id: String,
    pub stage1_end: f64,
    pub stage2_end: f64,
    pub lateness: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowShopSchedule {
    pub jobs: Vec<ScheduledJob>,
    pub makespan: f64,
    pub total_lateness: f64,
}

impl FlowShopSchedule {
    pub fn find(&self, job_id: &str) -> Option<&ScheduledJob> {
        self.jobs.iter().find(|j| j.job_id == job_id)
    }

    pub fn sequence(&self) -> Vec<&str> {
        self.jobs.iter().map(|j| j.job_id.as_str()).collect()
    }
}

/// Johnson 规则排序
pub fn johnson_sequence(jobs: &[FlowShopJob]) -> Vec<FlowShopJob> {
    let (mut front, mut back): (Vec<FlowShopJob>, Vec<FlowShopJob>) = jobs
        .iter()
        .cloned()
        .partition(|j| j.stage1_hours <= j.stage2_hours);
    front.sort_by(|a, b| a.stage1_hours.partial_cmp(&b.stage1_hours).unwrap_or(Ordering::Equal));
    back.sort_by(|a, b| b.stage2_hours.partial_cmp(&a.stage2_hours).unwrap_or(Ordering::Equal));
    front.extend(back);
    front
}

/// 按给定顺序计算两阶段完工时间
pub fn simulate(sequence: &[FlowShopJob]) -> FlowShopSchedule {
    let mut stage1_clock = 0.0_f64;
    let mut stage2_clock = 0.0_f64;
    let mut jobs = Vec::with_capacity(sequence.len());
    for job in sequence {
        stage1_clock += job.stage1_hours.max(0.0);
        stage2_clock = stage2_clock.max(stage1_clock) + job.stage2_hours.max(0.0);
        let lateness = job
            .due_hours
            .map(|due| (stage2_clock - due).max(0.0))
            .unwrap_or(0.0);
        jobs.push(ScheduledJob {
            job_id: job.job_id.clone(),
            stage1_end: stage1_clock,
            stage2_end: stage2_clock,
            lateness,
        });
    }
    let total_lateness = jobs.iter().map(|j| j.lateness).sum();
    FlowShopSchedule {
        jobs,
        makespan: stage2_clock,
        total_lateness,
    }
}

#[derive(Debug, Clone)]
pub struct CtpJohnsonAlgorithm {
    stage1_hours_per_unit: f64,
    stage2_hours_per_unit: f64,
    hours_per_day: f64,
    optimal_max_utilization: f64,
}

impl Default for CtpJohnsonAlgorithm {
    fn default() -> Self {
        Self::new(&AlgorithmsConfig::default())
    }
}

impl CtpJohnsonAlgorithm {
    pub fn new(config: &AlgorithmsConfig) -> Self {
        Self {
            stage1_hours_per_unit: config.ctp_stage1_hours_per_unit,
            stage2_hours_per_unit: config.ctp_stage2_hours_per_unit,
            hours_per_day: config.ctp_hours_per_day,
            optimal_max_utilization: config.ctp_optimal_max_utilization,
        }
    }

    /// 当前需求对应的作业（交期 = 剩余天数 × 日工时）
    pub fn current_job(&self, input: &AlgorithmInput) -> FlowShopJob {
        FlowShopJob {
            job_id: CURRENT_JOB.to_string(),
            stage1_hours: input.demand_quantity * self.stage1_hours_per_unit,
            stage2_hours: input.demand_quantity * self.stage2_hours_per_unit,
            due_hours: Some(input.days_to_deadline().max(0.0) * self.hours_per_day),
        }
    }
}

impl SourcingAlgorithm for CtpJohnsonAlgorithm {
    fn algorithm_type(&self) -> AlgorithmType {
        AlgorithmType::CtpJohnson
    }

    fn strategy(&self) -> &'static str {
        "Johnson 两阶段流水车间排程"
    }

    fn validate_input(&self, input: &AlgorithmInput) -> Result<(), AlgorithmError> {
        input.check_common()?;
        if input
            .context
            .flow_shop_jobs
            .iter()
            .any(|j| j.stage1_hours < 0.0 || j.stage2_hours < 0.0)
        {
            return Err(AlgorithmError::InvalidInput("作业工时不能为负".to_string()));
        }
        Ok(())
    }

    fn execute(&self, input: &AlgorithmInput) -> Result<AlgorithmOutput, AlgorithmError> {
        let mut jobs = input.context.flow_shop_jobs.clone();
        jobs.push(self.current_job(input));

        let sequence = johnson_sequence(&jobs);
        let schedule = simulate(&sequence);
        let current = schedule
            .find(CURRENT_JOB)
            .cloned()
            .ok_or_else(|| AlgorithmError::Computation("排程结果缺少当前作业".to_string()))?;

        let horizon = input.days_to_deadline().max(0.0) * self.hours_per_day;
        let utilization = if horizon > 0.0 {
            schedule.makespan / horizon
        } else {
            f64::INFINITY
        };

        let status = if schedule.total_lateness > 0.0 {
            ScheduleStatus::Risky
        } else if utilization <= self.optimal_max_utilization {
            ScheduleStatus::Optimal
        } else {
            ScheduleStatus::Feasible
        };

        let lateness_ratio = if current.stage2_end > 0.0 {
            (current.lateness / current.stage2_end).min(1.0)
        } else {
            0.0
        };
        let confidence = match status {
            ScheduleStatus::Optimal => 0.9,
            ScheduleStatus::Feasible => 0.75,
            ScheduleStatus::Risky => 0.4 * (1.0 - lateness_ratio),
        };

        let mut output = AlgorithmOutput::completed(self.algorithm_type(), &input.item_id, status.label());
        output.proposed_quantity = input.demand_quantity;
        output.estimated_cost = extend(input.reference_unit_cost, input.demand_quantity);
        output.estimated_lead_time_days = (current.stage2_end / self.hours_per_day).ceil();
        output.confidence = confidence;
        output.reasoning = format!(
            "排程 {} 个作业，makespan {:.1}h，当前作业完工 {:.1}h，延误合计 {:.1}h，利用率 {:.0}%",
            schedule.jobs.len(),
            schedule.makespan,
            current.stage2_end,
            schedule.total_lateness,
            if utilization.is_finite() { utilization * 100.0 } else { 100.0 }
        );
        output.alternatives_considered = schedule
            .jobs
            .iter()
            .map(|j| AlternativeConsidered {
                label: format!("JOB:{}", j.job_id),
                quantity: j.stage2_end,
                score: j.lateness,
            })
            .collect();
        Ok(output)
    }
}
