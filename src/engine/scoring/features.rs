// ==========================================
// 供应链计划引擎 - 特征提取
// ==========================================
// 职责: 把寻源选项展开为扁平数值特征，供分析与离线建模
// 输出: FeatureVector / 总体统计 / CSV 导出
// ==========================================

use crate::domain::money::money_to_f64;
use crate::domain::sourcing::SourcingOption;
use crate::error::PlannerResult;
use crate::stats;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;
use tracing::debug;

use super::model::{QualityRiskAssessment, ScoringContext};

/// 紧急标记阈值（天）
const URGENCY_DAYS: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureCategory {
    Economic,
    Temporal,
    Reliability,
    Operational,
    Contextual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub category: FeatureCategory,
    pub value: f64,
    pub unit: String,
}

impl Feature {
    fn new(name: &str, category: FeatureCategory, value: f64, unit: &str) -> Self {
        Self {
            name: name.to_string(),
            category,
            value,
            unit: unit.to_string(),
        }
    }
}

// ==========================================
// FeatureVector - 单选项特征向量
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub option_id: String,
    pub item_id: String,
    pub features: Vec<Feature>,
}

impl FeatureVector {
    pub fn get(&self, name: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.name == name)
    }

    pub fn by_category(&self, category: FeatureCategory) -> Vec<&Feature> {
        self.features.iter().filter(|f| f.category == category).collect()
    }

    /// 按名称排序的 (名称, 值) 向量
    pub fn to_ml_vector(&self) -> (Vec<String>, Vec<f64>) {
        let mut sorted: Vec<&Feature> = self.features.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));
        (
            sorted.iter().map(|f| f.name.clone()).collect(),
            sorted.iter().map(|f| f.value).collect(),
        )
    }
}

// ==========================================
// FeatureStatistics - 总体统计
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureStatistics {
    pub feature_name: String,
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub p25: f64,
    pub p75: f64,
    pub p95: f64,
}

impl FeatureStatistics {
    pub fn from_values(feature_name: &str, values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self {
            feature_name: feature_name.to_string(),
            count: values.len(),
            mean: stats::mean(values),
            median: stats::median(values),
            std_dev: stats::sample_std_dev(values),
            min,
            max,
            p25: stats::percentile(values, 0.25),
            p75: stats::percentile(values, 0.75),
            p95: stats::percentile(values, 0.95),
        })
    }

    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    /// CV = σ / max(μ, 0.01)
    pub fn coefficient_of_variation(&self) -> f64 {
        self.std_dev / self.mean.max(0.01)
    }

    /// 启发式: CV > 0.5
    pub fn is_bimodal(&self) -> bool {
        self.coefficient_of_variation() > 0.5
    }
}

// ==========================================
// FeatureExtractor
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    vectors: Vec<FeatureVector>,
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 提取特征（context 为 None 时不生成运营类特征）
    pub fn extract(&mut self, option: &SourcingOption, context: Option<&ScoringContext>) -> FeatureVector {
        let mut features = Vec::with_capacity(13);

        // 经济
        let total = money_to_f64(option.total_cost_per_unit());
        let logistics = money_to_f64(option.transportation_cost + option.customs_duty);
        features.push(Feature::new("total_cost_per_unit", FeatureCategory::Economic, total, "currency"));
        features.push(Feature::new(
            "logistics_cost_ratio",
            FeatureCategory::Economic,
            logistics / total.max(0.01),
            "ratio",
        ));

        // 时间
        let lt_mean = option.lead_time_days_mean;
        features.push(Feature::new("lead_time_mean", FeatureCategory::Temporal, lt_mean, "days"));
        features.push(Feature::new(
            "lead_time_variability",
            FeatureCategory::Temporal,
            option.lead_time_days_std / lt_mean.max(1.0),
            "ratio",
        ));
        features.push(Feature::new(
            "on_time_percentage",
            FeatureCategory::Temporal,
            option.on_time_percentage,
            "ratio",
        ));

        // 可靠性
        let quality = QualityRiskAssessment::from_option(option);
        features.push(Feature::new(
            "quality_acceptance_rate",
            FeatureCategory::Reliability,
            quality.quality_acceptance_rate,
            "ratio",
        ));
        features.push(Feature::new(
            "availability_percentage",
            FeatureCategory::Reliability,
            quality.availability_percentage,
            "ratio",
        ));
        features.push(Feature::new(
            "integrated_reliability",
            FeatureCategory::Reliability,
            quality.integrated_reliability(),
            "ratio",
        ));

        // 运营
        if let Some(ctx) = context {
            let urgent = if ctx.days_to_deadline() <= URGENCY_DAYS { 1.0 } else { 0.0 };
            features.push(Feature::new("urgency_flag", FeatureCategory::Operational, urgent, "binary"));
            features.push(Feature::new(
                "criticality_score",
                FeatureCategory::Operational,
                ctx.criticality.score(),
                "ratio",
            ));
            features.push(Feature::new("demand_volume", FeatureCategory::Operational, ctx.demand_quantity, "units"));
            features.push(Feature::new(
                "abc_classification_value",
                FeatureCategory::Operational,
                ctx.abc_class.value(),
                "ratio",
            ));
        }

        let dimension = features.len() as f64;
        features.push(Feature::new("feature_vector_dimension", FeatureCategory::Contextual, dimension, "count"));

        let vector = FeatureVector {
            option_id: option.option_id.clone(),
            item_id: option.item_id.clone(),
            features,
        };
        debug!(option_id = %vector.option_id, dimension = vector.features.len(), "特征提取完成");
        self.vectors.push(vector.clone());
        vector
    }

    pub fn vectors(&self) -> &[FeatureVector] {
        &self.vectors
    }

    pub fn statistics(&self, feature_name: &str) -> Option<FeatureStatistics> {
        let values: Vec<f64> = self
            .vectors
            .iter()
            .filter_map(|v| v.get(feature_name).map(|f| f.value))
            .collect();
        FeatureStatistics::from_values(feature_name, &values)
    }

    /// 全部特征名（字典序）
    pub fn feature_names(&self) -> Vec<String> {
        let names: BTreeSet<&str> = self
            .vectors
            .iter()
            .flat_map(|v| v.features.iter().map(|f| f.name.as_str()))
            .collect();
        names.into_iter().map(str::to_string).collect()
    }

    /// 归一化到 [0,1]
    ///
    /// # 规则
    /// - 有总体统计: (v − min)/range，range 为 0 时返回 0.5
    /// - 无统计: 时间类 /100，经济类 /1000，其余原值
    pub fn normalize_feature(&self, feature: &Feature, stats: Option<&FeatureStatistics>) -> f64 {
        if let Some(s) = stats {
            if s.range() == 0.0 {
                return 0.5;
            }
            return (feature.value - s.min) / s.range();
        }
        match feature.category {
            FeatureCategory::Temporal => (feature.value / 100.0).clamp(0.0, 1.0),
            FeatureCategory::Economic => (feature.value / 1000.0).clamp(0.0, 1.0),
            _ => feature.value,
        }
    }

    // ==========================================
    // CSV 导出
    // ==========================================

    /// 导出为宽表: option_id,item_id,<特征...>（缺失特征留空）
    pub fn write_csv<W: Write>(&self, writer: W) -> PlannerResult<()> {
        let names = self.feature_names();
        let mut wtr = csv::Writer::from_writer(writer);

        let mut header = vec!["option_id".to_string(), "item_id".to_string()];
        header.extend(names.iter().cloned());
        wtr.write_record(&header)?;

        for vector in &self.vectors {
            let mut row = vec![vector.option_id.clone(), vector.item_id.clone()];
            for name in &names {
                row.push(vector.get(name).map(|f| f.value.to_string()).unwrap_or_default());
            }
            wtr.write_record(&row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn export_csv(&self, path: &Path) -> PlannerResult<()> {
        let file = std::fs::File::create(path)?;
        self.write_csv(file)
    }
}
