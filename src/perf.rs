// ==========================================
// 供应链计划引擎 - 性能统计
// ==========================================
// 职责: 记录阶段耗时 (elapsed_ms)，支持嵌套深度与慢阶段告警
// 开关: SCPE_SLOW_STAGE_MS=200 配置慢阶段阈值（毫秒，0=关闭）
// ==========================================

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Once;
use std::time::Instant;

static SLOW_STAGE_THRESHOLD_MS: AtomicU64 = AtomicU64::new(0);
static THRESHOLD_INIT: Once = Once::new();

thread_local! {
    static PERF_DEPTH: Cell<u32> = Cell::new(0);
}

fn slow_stage_threshold_ms() -> u64 {
    THRESHOLD_INIT.call_once(|| {
        let ms = std::env::var("SCPE_SLOW_STAGE_MS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(if cfg!(debug_assertions) { 0 } else { 1_000 });
        SLOW_STAGE_THRESHOLD_MS.store(ms, Ordering::Relaxed);
    });
    SLOW_STAGE_THRESHOLD_MS.load(Ordering::Relaxed)
}

/// 性能统计 Guard：drop 时记录 elapsed_ms 与嵌套深度
///
/// 使用方式：
/// ```ignore
/// let _perf = scpe_planner::perf::PerfGuard::new("plan_item");
/// // do work...
/// ```
pub struct PerfGuard {
    op: &'static str,
    start: Instant,
    depth: u32,
}

impl PerfGuard {
    pub fn new(op: &'static str) -> Self {
        let depth = PERF_DEPTH.with(|d| {
            let next = d.get().saturating_add(1);
            d.set(next);
            next
        });
        Self {
            op,
            start: Instant::now(),
            depth,
        }
    }

    /// 已耗时（毫秒）
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        let elapsed_ms = self.elapsed_ms();
        let threshold = slow_stage_threshold_ms();

        if threshold > 0 && elapsed_ms >= threshold {
            tracing::warn!(
                target: "perf",
                op = self.op,
                elapsed_ms,
                depth = self.depth,
                threshold_ms = threshold,
                "slow stage"
            );
        } else {
            tracing::info!(
                target: "perf",
                op = self.op,
                elapsed_ms,
                depth = self.depth,
                "done"
            );
        }

        PERF_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_tracks_nesting_depth() {
        let outer = PerfGuard::new("outer");
        {
            let inner = PerfGuard::new("inner");
            assert_eq!(inner.depth, outer.depth + 1);
        }
        let again = PerfGuard::new("again");
        assert_eq!(again.depth, outer.depth + 1);
    }
}
