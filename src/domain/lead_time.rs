// ==========================================
// 供应链计划引擎 - 交期分布领域模型
// ==========================================
// 职责: 交期正态分布、服务水平交期、历史观测更新
// 模型: LT ~ N(μ, σ²)，单位为天
// ==========================================

use crate::error::{PlannerError, PlannerResult};
use crate::stats::inverse_normal_cdf;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 交期均值下限（天）
pub const MIN_LEAD_TIME_DAYS: f64 = 0.1;

// ==========================================
// LeadTimeDistribution - 交期分布
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadTimeDistribution {
    // ===== 分布参数 =====
    pub mean_days: f64,
    #[serde(default)]
    pub std_dev_days: f64,
    #[serde(default = "default_min_days")]
    pub min_days: f64,
    #[serde(default = "default_max_days")]
    pub max_days: f64,

    // ===== 分位点 =====
    #[serde(default)]
    pub p50_days: Option<f64>,
    #[serde(default)]
    pub p95_days: Option<f64>,
    #[serde(default)]
    pub p99_days: Option<f64>,

    // ===== 估计质量 =====
    #[serde(default = "default_confidence")]
    pub confidence_level: f64,
    #[serde(default)]
    pub sample_size: u32,
}

fn default_min_days() -> f64 {
    MIN_LEAD_TIME_DAYS
}

fn default_max_days() -> f64 {
    365.0
}

fn default_confidence() -> f64 {
    0.75
}

impl LeadTimeDistribution {
    /// 创建交期分布
    ///
    /// # 规则
    /// - mean ≥ 0.1 天，std ≥ 0
    pub fn new(mean_days: f64, std_dev_days: f64) -> PlannerResult<Self> {
        let dist = Self {
            mean_days,
            std_dev_days,
            min_days: MIN_LEAD_TIME_DAYS,
            max_days: 365.0,
            p50_days: None,
            p95_days: None,
            p99_days: None,
            confidence_level: 0.75,
            sample_size: 0,
        };
        dist.validate()?;
        Ok(dist)
    }

    pub fn validate(&self) -> PlannerResult<()> {
        if !(self.mean_days >= MIN_LEAD_TIME_DAYS) {
            return Err(PlannerError::InvalidInput(format!(
                "交期均值必须 ≥ {}: {}",
                MIN_LEAD_TIME_DAYS, self.mean_days
            )));
        }
        if !(self.std_dev_days >= 0.0) {
            return Err(PlannerError::InvalidInput(format!(
                "交期标准差必须 ≥ 0: {}",
                self.std_dev_days
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence_level) {
            return Err(PlannerError::InvalidInput(format!(
                "置信度超出 [0,1]: {}",
                self.confidence_level
            )));
        }
        Ok(())
    }

    /// 目标服务水平下的交期：μ + z(SL)·σ
    pub fn service_level_lead_time(&self, service_level: f64) -> f64 {
        if self.std_dev_days <= 0.0 {
            return self.mean_days;
        }
        self.mean_days + inverse_normal_cdf(service_level) * self.std_dev_days
    }

    /// 用一次实际观测更新均值（加权移动平均）
    ///
    /// alpha = w / (w + n + 1)，样本越多单次观测影响越小
    pub fn update_with_observation(&mut self, actual_lead_time_days: f64, weight: f64) {
        let alpha = weight / (weight + self.sample_size as f64 + 1.0);
        self.mean_days = ((1.0 - alpha) * self.mean_days + alpha * actual_lead_time_days)
            .max(MIN_LEAD_TIME_DAYS);
        self.sample_size += 1;
    }
}

// ==========================================
// LeadTimeObservation - 历史交付观测
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadTimeObservation {
    pub purchase_order: String,
    pub order_date: NaiveDate,
    #[serde(default)]
    pub promised_date: Option<NaiveDate>,
    pub actual_delivery_date: NaiveDate,
    #[serde(default)]
    pub quantity_delivered: f64,
    #[serde(default)]
    pub quantity_short: f64,
}

impl LeadTimeObservation {
    pub fn actual_lead_time_days(&self) -> i64 {
        (self.actual_delivery_date - self.order_date).num_days()
    }

    /// 相对承诺日期的偏差（正数 = 延迟）
    pub fn variance_days(&self) -> Option<i64> {
        self.promised_date
            .map(|p| (self.actual_delivery_date - p).num_days())
    }

    /// 无承诺日期视为准时
    pub fn on_time(&self) -> bool {
        self.promised_date
            .map(|p| self.actual_delivery_date <= p)
            .unwrap_or(true)
    }
}

// ==========================================
// LeadTimeEstimate - 路径/供应商交期估计
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadTimeEstimate {
    pub item_id: String,
    pub supplier_id: String,
    pub sourcing_path: String,
    pub distribution: LeadTimeDistribution,
    #[serde(default)]
    pub history: Vec<LeadTimeObservation>,
    #[serde(default = "default_on_time")]
    pub on_time_percentage: f64,
}

fn default_on_time() -> f64 {
    0.95
}

impl LeadTimeEstimate {
    pub fn new(item_id: &str, supplier_id: &str, sourcing_path: &str, distribution: LeadTimeDistribution) -> Self {
        Self {
            item_id: item_id.to_string(),
            supplier_id: supplier_id.to_string(),
            sourcing_path: sourcing_path.to_string(),
            distribution,
            history: Vec::new(),
            on_time_percentage: 0.95,
        }
    }

    pub fn recommended_lead_time(&self, service_level: f64) -> f64 {
        self.distribution.service_level_lead_time(service_level)
    }

    /// 追加观测：更新分布均值并重算准时率
    pub fn add_observation(&mut self, observation: LeadTimeObservation) {
        let actual = observation.actual_lead_time_days();
        if actual > 0 {
            self.distribution.update_with_observation(actual as f64, 1.0);
        }
        self.history.push(observation);

        let on_time = self.history.iter().filter(|h| h.on_time()).count();
        self.on_time_percentage = on_time as f64 / self.history.len() as f64;
    }
}
