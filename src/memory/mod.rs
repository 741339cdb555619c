//! 内存压力控制
//!
//! 常驻进程反复处理数十 MB 的瞬时图像缓冲，工作集在近零与峰值之间振荡；
//! 若只依赖分配器自行归还，容器内存限额下 RSS 可能持续走高。
//! 这里把归还变成可触发、可观测的动作：
//! - 每次生成/编辑调用开始前做阈值检查（RSS / 预算 > 0.70 时修剪一次）
//! - 调用结束后（成功或失败路径都）做 3 遍激进修剪，趟间让出调度器，
//!   让挂起的析构/回调先跑完再修剪下一遍
//!
//! 修剪原语是 glibc 的 `malloc_trim(0)`（把空闲堆页还给内核），
//! 仅 Linux/gnu 可用；不可用时两个操作都退化为单次 yield。

use std::sync::Arc;

use sysinfo::System;

/// 触发主动修剪的占用率阈值
pub const PRESSURE_THRESHOLD: f64 = 0.70;

/// 激进回收的修剪遍数
pub const RECLAIM_PASSES: u32 = 3;

/// 按需采样的进程内存快照（只记日志，不存储）
#[derive(Debug, Clone, Copy)]
pub struct MemorySnapshot {
    pub resident_bytes: u64,
    pub virtual_bytes: u64,
}

/// 采样当前进程的 RSS / 虚拟内存
pub fn snapshot() -> MemorySnapshot {
    let mut sys = System::new();
    if let Ok(pid) = sysinfo::get_current_pid() {
        sys.refresh_process(pid);
        if let Some(process) = sys.process(pid) {
            return MemorySnapshot {
                resident_bytes: process.memory(),
                virtual_bytes: process.virtual_memory(),
            };
        }
    }
    MemorySnapshot {
        resident_bytes: 0,
        virtual_bytes: 0,
    }
}

/// 强制回收能力是否可用（编译期属性）
pub fn reclaim_available() -> bool {
    cfg!(all(target_os = "linux", target_env = "gnu"))
}

/// 一遍修剪：空闲堆页归还内核
fn reclaim_pass() {
    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    unsafe {
        libc::malloc_trim(0);
    }
}

/// 内存压力控制器：持有堆预算（launcher 解析，默认 512 MiB）。
/// 修剪动作是可注入的钩子，测试里替换为计数器以断言遍数。
pub struct MemoryPressureController {
    budget_bytes: u64,
    available: bool,
    trim: Arc<dyn Fn() + Send + Sync>,
}

impl MemoryPressureController {
    pub fn new(budget_bytes: u64) -> Self {
        Self {
            budget_bytes,
            available: reclaim_available(),
            trim: Arc::new(reclaim_pass),
        }
    }

    #[cfg(test)]
    fn with_trim(budget_bytes: u64, trim: Arc<dyn Fn() + Send + Sync>) -> Self {
        Self {
            budget_bytes,
            available: true,
            trim,
        }
    }

    pub fn budget_bytes(&self) -> u64 {
        self.budget_bytes
    }

    fn over_threshold(resident_bytes: u64, budget_bytes: u64) -> bool {
        budget_bytes > 0 && resident_bytes as f64 / budget_bytes as f64 > PRESSURE_THRESHOLD
    }

    /// 阈值检查：在分配大缓冲之前调用；超阈值则修剪一次并记录占用率
    pub async fn check_and_maybe_collect(&self) {
        if !self.available {
            tokio::task::yield_now().await;
            return;
        }
        let snap = snapshot();
        if Self::over_threshold(snap.resident_bytes, self.budget_bytes) {
            let pct = snap.resident_bytes as f64 / self.budget_bytes as f64 * 100.0;
            tracing::info!(
                "Memory pressure at {:.1}% of {} MiB budget, trimming",
                pct,
                self.budget_bytes / (1024 * 1024)
            );
            (self.trim)();
        }
    }

    /// 激进回收：恰好 RECLAIM_PASSES（3）遍修剪，趟间 yield；结束后采样记日志。
    /// 生成/编辑调用的成功与失败路径都必须走到这里。
    pub async fn force_aggressive_reclaim(&self) {
        if !self.available {
            tokio::task::yield_now().await;
            return;
        }
        for pass in 0..RECLAIM_PASSES {
            if pass > 0 {
                tokio::task::yield_now().await;
            }
            (self.trim)();
        }
        let snap = snapshot();
        tracing::info!(
            rss_mb = snap.resident_bytes / (1024 * 1024),
            virt_mb = snap.virtual_bytes / (1024 * 1024),
            "Aggressive reclaim complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_controller(budget_bytes: u64) -> (MemoryPressureController, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let hook = count.clone();
        let controller = MemoryPressureController::with_trim(
            budget_bytes,
            Arc::new(move || {
                hook.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (controller, count)
    }

    #[test]
    fn test_snapshot_reports_nonzero_rss() {
        let snap = snapshot();
        assert!(snap.resident_bytes > 0);
    }

    #[test]
    fn test_threshold_boundary() {
        let budget = 100 * 1024 * 1024_u64;
        assert!(!MemoryPressureController::over_threshold(
            70 * 1024 * 1024,
            budget
        ));
        assert!(MemoryPressureController::over_threshold(
            71 * 1024 * 1024,
            budget
        ));
        // 预算为零时永不触发（避免除零）
        assert!(!MemoryPressureController::over_threshold(1, 0));
    }

    #[tokio::test]
    async fn test_reclaim_operations_complete() {
        let controller = MemoryPressureController::new(512 * 1024 * 1024);
        controller.check_and_maybe_collect().await;
        controller.force_aggressive_reclaim().await;
    }

    #[tokio::test]
    async fn test_aggressive_reclaim_runs_exact_pass_count() {
        let (controller, count) = counting_controller(512 * 1024 * 1024);
        controller.force_aggressive_reclaim().await;
        assert_eq!(count.load(Ordering::SeqCst), RECLAIM_PASSES as usize);
    }

    #[tokio::test]
    async fn test_pressure_check_trims_once_over_threshold() {
        // 预算 1 字节：任何真实 RSS 都超过阈值
        let (controller, count) = counting_controller(1);
        controller.check_and_maybe_collect().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_pressure_check_skips_below_threshold() {
        // 预算远大于任何真实 RSS：不触发修剪
        let (controller, count) = counting_controller(u64::MAX / 2);
        controller.check_and_maybe_collect().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
