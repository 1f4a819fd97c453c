// ==========================================
// 供应链计划引擎 - 评分引擎 (Level 2)
// ==========================================
// 职责: 为可行选项计算 CTE (成本/交期/风险) 综合分
// 红线: 分数与权重均在 [0,1]，权重和为 1
// ==========================================

mod core;
mod criticality;
mod features;
mod model;


pub use self::core::{CteScorer, ScoringReport};
pub use criticality::{CriticalityAwareScorer, CutDimension, CutReport, ScoringCutResult};
pub use features::{Feature, FeatureCategory, FeatureExtractor, FeatureStatistics, FeatureVector};
pub use model::{
    CostBreakdown, CteScore, NormalizedScore, QualityRiskAssessment, ScoreBand, ScoreWeights,
    ScoringContext, ScoringDimension, TimeRiskAssessment,
};
