// ==========================================
// 供应链计划引擎 - 计划数据源 Trait
// ==========================================
// 职责: 定义计划所需的外部数据读取接口（物料主数据/库存快照/候选选项）
// 红线: 不包含写入、不包含计划逻辑
// ==========================================

use crate::domain::{InventorySnapshot, ItemMaster, SourcingOption};
use crate::engine::orchestrator::PlanningRequest;
use crate::error::{PlannerError, PlannerResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

// ==========================================
// PlanningDataSource Trait
// ==========================================
// 实现者: InMemoryDataSource（文件/测试）、上游 ERP 适配器
#[async_trait]
pub trait PlanningDataSource: Send + Sync {
    /// 物料主数据
    ///
    /// # 返回
    /// - Err(DataSource): 物料不存在
    async fn item_master(&self, item_id: &str) -> PlannerResult<ItemMaster>;

    /// 库存快照
    ///
    /// # 返回
    /// - Ok(None): 该物料无库存记录
    async fn inventory_snapshot(&self, item_id: &str) -> PlannerResult<Option<InventorySnapshot>>;

    /// 候选寻源选项（按偏好顺序）
    async fn candidate_options(&self, item_id: &str) -> PlannerResult<Vec<SourcingOption>>;
}

// ==========================================
// PlanningBundle - 单文件输入格式
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningBundle {
    pub items: Vec<ItemMaster>,
    pub snapshots: Vec<InventorySnapshot>,
    pub options: Vec<SourcingOption>,
    pub requests: Vec<PlanningRequest>,
}

impl PlanningBundle {
    pub fn from_json(text: &str) -> PlannerResult<Self> {
        let bundle: PlanningBundle = serde_json::from_str(text)?;
        for item in &bundle.items {
            item.validate()?;
        }
        for option in &bundle.options {
            option.validate()?;
        }
        Ok(bundle)
    }

    pub fn from_file(path: &Path) -> PlannerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let bundle = Self::from_json(&text)?;
        info!(
            path = %path.display(),
            items = bundle.items.len(),
            options = bundle.options.len(),
            requests = bundle.requests.len(),
            "计划输入已加载"
        );
        Ok(bundle)
    }
}

// ==========================================
// InMemoryDataSource
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataSource {
    items: HashMap<String, ItemMaster>,
    snapshots: HashMap<String, InventorySnapshot>,
    options: HashMap<String, Vec<SourcingOption>>,
}

impl InMemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// 由输入文件内容构建（请求列表由调用方单独使用）
    pub fn from_bundle(bundle: &PlanningBundle) -> Self {
        let mut source = Self::new();
        for item in &bundle.items {
            source.insert_item(item.clone());
        }
        for snapshot in &bundle.snapshots {
            source.insert_snapshot(snapshot.clone());
        }
        for option in &bundle.options {
            source.insert_option(option.clone());
        }
        source
    }

    pub fn insert_item(&mut self, item: ItemMaster) {
        self.items.insert(item.item_id.clone(), item);
    }

    pub fn insert_snapshot(&mut self, snapshot: InventorySnapshot) {
        self.snapshots.insert(snapshot.item_id.clone(), snapshot);
    }

    pub fn insert_option(&mut self, option: SourcingOption) {
        self.options.entry(option.item_id.clone()).or_default().push(option);
    }

    pub fn with_item(mut self, item: ItemMaster) -> Self {
        self.insert_item(item);
        self
    }

    pub fn with_snapshot(mut self, snapshot: InventorySnapshot) -> Self {
        self.insert_snapshot(snapshot);
        self
    }

    pub fn with_options(mut self, options: Vec<SourcingOption>) -> Self {
        for option in options {
            self.insert_option(option);
        }
        self
    }
}

#[async_trait]
impl PlanningDataSource for InMemoryDataSource {
    async fn item_master(&self, item_id: &str) -> PlannerResult<ItemMaster> {
        self.items
            .get(item_id)
            .cloned()
            .ok_or_else(|| PlannerError::DataSource(format!("物料主数据不存在: {}", item_id)))
    }

    async fn inventory_snapshot(&self, item_id: &str) -> PlannerResult<Option<InventorySnapshot>> {
        Ok(self.snapshots.get(item_id).cloned())
    }

    async fn candidate_options(&self, item_id: &str) -> PlannerResult<Vec<SourcingOption>> {
        let options = self.options.get(item_id).cloned().unwrap_or_default();
        debug!(item_id, options = options.len(), "读取候选选项");
        Ok(options)
    }
}
