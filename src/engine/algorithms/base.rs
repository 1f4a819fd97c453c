// ==========================================
// 供应链计划引擎 - 路径算法公共契约
// ==========================================
// 职责: 算法类型、输入/输出结构、SourcingAlgorithm trait
// 约定: run() 负责校验/计时/错误捕获，失败以 FAILED 输出表达
// ==========================================

use crate::domain::money::Money;
use crate::domain::types::{Criticality, SourcingPathType};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

// ==========================================
// AlgorithmType - 算法类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlgorithmType {
    ReserveDynamic,         // 本地库存动态预留
    ReleaseMarginal,        // 边际成本释放预留
    DisassemblyKnapsack,    // 拆解 0/1 背包
    SubstitutesGraph,       // 替代物料图搜索
    CtpJohnson,             // 两阶段流水车间 CTP
    TransferTdabc,          // 时间驱动作业成本调拨
    ExpediteProbability,    // 概率加急
    PurchaseMulticriterion, // 多准则采购
}

impl AlgorithmType {
    pub const ALL: [AlgorithmType; 8] = [
        AlgorithmType::ReserveDynamic,
        AlgorithmType::ReleaseMarginal,
        AlgorithmType::DisassemblyKnapsack,
        AlgorithmType::SubstitutesGraph,
        AlgorithmType::CtpJohnson,
        AlgorithmType::TransferTdabc,
        AlgorithmType::ExpediteProbability,
        AlgorithmType::PurchaseMulticriterion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlgorithmType::ReserveDynamic => "RESERVE_DYNAMIC",
            AlgorithmType::ReleaseMarginal => "RELEASE_MARGINAL",
            AlgorithmType::DisassemblyKnapsack => "DISASSEMBLY_KNAPSACK",
            AlgorithmType::SubstitutesGraph => "SUBSTITUTES_GRAPH",
            AlgorithmType::CtpJohnson => "CTP_JOHNSON",
            AlgorithmType::TransferTdabc => "TRANSFER_TDABC",
            AlgorithmType::ExpediteProbability => "EXPEDITE_PROBABILITY",
            AlgorithmType::PurchaseMulticriterion => "PURCHASE_MULTICRITERION",
        }
    }

    /// 寻源路径对应的算法（无对应算法的路径返回 None）
    pub fn for_path(path: SourcingPathType) -> Option<Self> {
        match path {
            SourcingPathType::StockLocal => Some(AlgorithmType::ReserveDynamic),
            SourcingPathType::StockLiberation => Some(AlgorithmType::ReleaseMarginal),
            SourcingPathType::Disassembly => Some(AlgorithmType::DisassemblyKnapsack),
            SourcingPathType::Equivalent => Some(AlgorithmType::SubstitutesGraph),
            SourcingPathType::Manufacturing => Some(AlgorithmType::CtpJohnson),
            SourcingPathType::Transfer | SourcingPathType::Intercompany => Some(AlgorithmType::TransferTdabc),
            SourcingPathType::Expedite => Some(AlgorithmType::ExpediteProbability),
            SourcingPathType::Purchase | SourcingPathType::PurchaseImport => {
                Some(AlgorithmType::PurchaseMulticriterion)
            }
            SourcingPathType::Recovery | SourcingPathType::Vmi | SourcingPathType::Loan => None,
        }
    }
}

impl fmt::Display for AlgorithmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AlgorithmType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_uppercase().replace('-', "_");
        AlgorithmType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == key)
            .ok_or_else(|| format!("未知算法类型: {}", s))
    }
}

// ==========================================
// AlgorithmStatus - 执行状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlgorithmStatus {
    Initialized,
    Running,
    Completed,
    Failed,
    Timeout,
}

// ==========================================
// AlgorithmError
// ==========================================
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlgorithmError {
    #[error("输入校验失败: {0}")]
    InvalidInput(String),

    #[error("计算失败: {0}")]
    Computation(String),
}

// ==========================================
// 上下文数据（各算法按需读取）
// ==========================================

/// 竞争同一库存的其他需求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetingRequest {
    pub request_id: String,
    pub quantity: f64,
    pub criticality: Criticality,
    pub required_date: NaiveDate,
}

/// 他单对本物料的预留
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub reservation_id: String,
    pub holder_id: String,
    pub holder_criticality: Criticality,
    pub quantity: f64,
}

/// 可拆解资产中的可回收部件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentValue {
    pub component_id: String,
    pub quantity: f64,
    pub disassembly_cost: f64, // 单件拆解成本
    pub market_value: f64,     // 单件回收价值
}

/// 替代关系边 from → to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstituteEdge {
    pub from_item: String,
    pub to_item: String,
    pub technical_match: f64,
    #[serde(default = "default_reliability")]
    pub reliability: f64,
    #[serde(default)]
    pub cost_differential: f64, // 0.05 = +5%
    #[serde(default = "default_one")]
    pub conversion_factor: f64,
    #[serde(default)]
    pub lead_time_delta_days: f64,
}

/// 流水车间中已排程的作业（小时）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowShopJob {
    pub job_id: String,
    pub stage1_hours: f64,
    pub stage2_hours: f64,
    #[serde(default)]
    pub due_hours: Option<f64>,
}

impl FlowShopJob {
    pub fn new(job_id: &str, stage1_hours: f64, stage2_hours: f64) -> Self {
        Self {
            job_id: job_id.to_string(),
            stage1_hours,
            stage2_hours,
            due_hours: None,
        }
    }
}

/// 调拨来源库位
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferSource {
    pub location_id: String,
    pub available_qty: f64,
    pub transport_hours: f64,
    pub lead_time_days: f64,
    #[serde(default = "default_reliability")]
    pub reliability: f64,
    #[serde(default = "default_handling_minutes")]
    pub handling_minutes_per_unit: f64, // 拣货+包装+收货
    #[serde(default = "default_fixed_minutes")]
    pub fixed_minutes: f64,             // 单据与协调
}

/// 供应商报价
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierQuote {
    pub supplier_id: String,
    pub unit_price: f64,
    pub lead_time_days: f64,
    #[serde(default = "default_reliability")]
    pub quality_rating: f64,
    #[serde(default)]
    pub minimum_order_quantity: f64,
}

fn default_reliability() -> f64 {
    0.95
}

fn default_one() -> f64 {
    1.0
}

fn default_handling_minutes() -> f64 {
    2.0
}

fn default_fixed_minutes() -> f64 {
    30.0
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlgorithmContext {
    pub competing_requests: Vec<CompetingRequest>,
    pub reservations: Vec<Reservation>,
    pub component_values: Vec<ComponentValue>,
    pub substitution_graph: Vec<SubstituteEdge>,
    pub flow_shop_jobs: Vec<FlowShopJob>,
    pub transfer_sources: Vec<TransferSource>,
    pub supplier_quotes: Vec<SupplierQuote>,
    /// 当前需求走其他路径（调拨/加急/替代）的最优单价
    pub alternative_unit_cost: Option<Money>,
}

// ==========================================
// AlgorithmInput - 算法输入
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmInput {
    pub item_id: String,
    pub demand_quantity: f64,
    pub required_date: NaiveDate,
    pub as_of: NaiveDate,

    // ===== 本地数据 =====
    #[serde(default)]
    pub local_stock: BTreeMap<String, f64>,    // 库位 → 可用量
    #[serde(default)]
    pub local_assets: BTreeMap<String, f64>,   // 可拆解资产 → 数量
    #[serde(default)]
    pub bom_components: BTreeMap<String, f64>, // 组件 → 单耗

    // ===== 业务属性 =====
    pub criticality: Criticality,
    #[serde(default)]
    pub budget: Option<Money>,
    #[serde(default)]
    pub reference_unit_cost: Money,

    #[serde(default)]
    pub context: AlgorithmContext,
}

impl AlgorithmInput {
    pub fn new(item_id: &str, demand_quantity: f64, required_date: NaiveDate, as_of: NaiveDate) -> Self {
        Self {
            item_id: item_id.to_string(),
            demand_quantity,
            required_date,
            as_of,
            local_stock: BTreeMap::new(),
            local_assets: BTreeMap::new(),
            bom_components: BTreeMap::new(),
            criticality: Criticality::Medium,
            budget: None,
            reference_unit_cost: Decimal::ZERO,
            context: AlgorithmContext::default(),
        }
    }

    pub fn days_to_deadline(&self) -> f64 {
        (self.required_date - self.as_of).num_days() as f64
    }

    pub fn total_local_stock(&self) -> f64 {
        self.local_stock.values().sum()
    }

    /// 公共校验: item_id 非空且需求 > 0
    pub fn check_common(&self) -> Result<(), AlgorithmError> {
        if self.item_id.trim().is_empty() {
            return Err(AlgorithmError::InvalidInput("item_id 不能为空".to_string()));
        }
        if !(self.demand_quantity > 0.0) {
            return Err(AlgorithmError::InvalidInput(format!(
                "需求数量必须 > 0: {}",
                self.demand_quantity
            )));
        }
        Ok(())
    }
}

// ==========================================
// AlgorithmOutput - 算法输出
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativeConsidered {
    pub label: String,
    pub quantity: f64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmOutput {
    pub algorithm_type: AlgorithmType,
    pub item_id: String,
    pub success: bool,
    pub status: AlgorithmStatus,

    // ===== 建议 =====
    pub selected_option: Option<String>,
    pub proposed_quantity: f64,
    pub estimated_cost: Money,
    pub estimated_lead_time_days: f64,
    pub confidence: f64, // [0,1]
    pub reasoning: String,
    #[serde(default)]
    pub alternatives_considered: Vec<AlternativeConsidered>,

    // ===== 遥测 =====
    pub execution_time_ms: f64,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl AlgorithmOutput {
    /// 成功输出骨架（各算法填充建议字段）
    pub fn completed(algorithm_type: AlgorithmType, item_id: &str, label: impl Into<String>) -> Self {
        Self {
            algorithm_type,
            item_id: item_id.to_string(),
            success: true,
            status: AlgorithmStatus::Completed,
            selected_option: Some(label.into()),
            proposed_quantity: 0.0,
            estimated_cost: Decimal::ZERO,
            estimated_lead_time_days: 0.0,
            confidence: 0.0,
            reasoning: String::new(),
            alternatives_considered: Vec::new(),
            execution_time_ms: 0.0,
            error_message: None,
        }
    }

    pub fn failed(algorithm_type: AlgorithmType, item_id: &str, error: &AlgorithmError) -> Self {
        Self {
            algorithm_type,
            item_id: item_id.to_string(),
            success: false,
            status: AlgorithmStatus::Failed,
            selected_option: None,
            proposed_quantity: 0.0,
            estimated_cost: Decimal::ZERO,
            estimated_lead_time_days: 0.0,
            confidence: 0.0,
            reasoning: error.to_string(),
            alternatives_considered: Vec::new(),
            execution_time_ms: 0.0,
            error_message: Some(error.to_string()),
        }
    }

    /// 算法判定"不走该路径"（标签以 _NONE 结尾）
    pub fn is_decline(&self) -> bool {
        self.success
            && self
                .selected_option
                .as_deref()
                .map(|label| label.ends_with("_NONE"))
                .unwrap_or(false)
    }
}

// ==========================================
// Trait: SourcingAlgorithm
// ==========================================
pub trait SourcingAlgorithm: Send + Sync {
    fn algorithm_type(&self) -> AlgorithmType;

    /// 策略简述（元数据）
    fn strategy(&self) -> &'static str;

    fn validate_input(&self, input: &AlgorithmInput) -> Result<(), AlgorithmError>;

    fn execute(&self, input: &AlgorithmInput) -> Result<AlgorithmOutput, AlgorithmError>;

    /// 校验 → 执行 → 计时；任何错误转为 FAILED 输出
    fn run(&self, input: &AlgorithmInput) -> AlgorithmOutput {
        let started = Instant::now();
        let result = self
            .validate_input(input)
            .and_then(|_| self.execute(input));

        let mut output = match result {
            Ok(mut output) => {
                output.status = AlgorithmStatus::Completed;
                output.confidence = output.confidence.clamp(0.0, 1.0);
                output
            }
            Err(err) => {
                warn!(algorithm = %self.algorithm_type(), item_id = %input.item_id, error = %err, "算法执行失败");
                AlgorithmOutput::failed(self.algorithm_type(), &input.item_id, &err)
            }
        };
        output.execution_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        debug!(
            algorithm = %self.algorithm_type(),
            item_id = %input.item_id,
            success = output.success,
            label = ?output.selected_option,
            elapsed_ms = output.execution_time_ms,
            "算法执行完成"
        );
        output
    }
}
