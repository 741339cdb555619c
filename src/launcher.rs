//! 启动期引导：能力探测与堆预算解析
//!
//! 强制回收（malloc_trim）在 Rust 里是普通库调用，不需要任何启动期标志，
//! 因此不存在「为开启能力而以子进程重启自身」的监管态：引导恒定收敛为
//! 直接运行，这里只负责探测能力、解析堆预算并把结果记入日志。
//! 预算可用 `NANO_BANANA_HEAP_MB` 覆盖，默认 512 MiB，
//! 由内存压力控制器作为占用率分母消费。

use crate::memory;

/// 堆预算环境变量（单位 MiB）
pub const HEAP_BUDGET_ENV: &str = "NANO_BANANA_HEAP_MB";

/// 缺省堆预算（MiB）
pub const DEFAULT_HEAP_BUDGET_MB: u64 = 512;

/// 引导结果：能力状态 + 堆预算；不产生子进程
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchPlan {
    pub reclaim_available: bool,
    pub heap_budget_bytes: u64,
}

/// 进程启动时调用一次
pub fn bootstrap() -> LaunchPlan {
    let reclaim_available = memory::reclaim_available();
    let heap_budget_bytes = heap_budget_bytes(std::env::var(HEAP_BUDGET_ENV).ok());

    if reclaim_available {
        tracing::info!(
            budget_mb = heap_budget_bytes / (1024 * 1024),
            "Forced-reclaim capability available, running directly"
        );
    } else {
        tracing::warn!(
            "Forced-reclaim capability unavailable on this platform, \
             memory pressure controls degrade to scheduler yields"
        );
    }

    LaunchPlan {
        reclaim_available,
        heap_budget_bytes,
    }
}

/// 解析预算：非法或缺失取默认；单位 MiB → 字节
fn heap_budget_bytes(env_value: Option<String>) -> u64 {
    let mb = env_value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|&mb| mb > 0)
        .unwrap_or(DEFAULT_HEAP_BUDGET_MB);
    mb * 1024 * 1024
}
