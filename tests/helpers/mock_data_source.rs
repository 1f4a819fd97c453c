// ==========================================
// Mock 数据源实现 - 用于集成测试
// ==========================================
// 职责: 记录调用次数，可对指定物料注入数据源故障
// ==========================================

#![allow(dead_code)]

use async_trait::async_trait;
use scpe_planner::domain::{InventorySnapshot, ItemMaster, SourcingOption};
use scpe_planner::engine::{InMemoryDataSource, PlanningDataSource};
use scpe_planner::error::{PlannerError, PlannerResult};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Mock 数据源
#[derive(Debug, Default)]
pub struct MockDataSource {
    inner: InMemoryDataSource,
    failing_items: HashSet<String>,
    item_calls: AtomicUsize,
    snapshot_calls: AtomicUsize,
    option_calls: AtomicUsize,
}

impl MockDataSource {
    pub fn new(inner: InMemoryDataSource) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// 指定物料的候选选项读取失败
    pub fn fail_options_for(mut self, item_id: &str) -> Self {
        self.failing_items.insert(item_id.to_string());
        self
    }

    pub fn item_calls(&self) -> usize {
        self.item_calls.load(Ordering::SeqCst)
    }

    pub fn snapshot_calls(&self) -> usize {
        self.snapshot_calls.load(Ordering::SeqCst)
    }

    pub fn option_calls(&self) -> usize {
        self.option_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlanningDataSource for MockDataSource {
    async fn item_master(&self, item_id: &str) -> PlannerResult<ItemMaster> {
        self.item_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.item_master(item_id).await
    }

    async fn inventory_snapshot(&self, item_id: &str) -> PlannerResult<Option<InventorySnapshot>> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.inventory_snapshot(item_id).await
    }

    async fn candidate_options(&self, item_id: &str) -> PlannerResult<Vec<SourcingOption>> {
        self.option_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_items.contains(item_id) {
            return Err(PlannerError::DataSource(format!("上游接口超时: {}", item_id)));
        }
        self.inner.candidate_options(item_id).await
    }
}
