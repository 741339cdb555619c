//! nano-banana - Gemini 图像生成 MCP 服务器
//!
//! 入口：初始化日志（stderr）、启动期引导、装配工具注册表并运行 stdio 服务器。

use std::sync::Arc;

use nano_banana::config::ConfigStore;
use nano_banana::gemini::{GeminiClient, ImageModel};
use nano_banana::launcher;
use nano_banana::memory::MemoryPressureController;
use nano_banana::rpc::McpServer;
use nano_banana::storage::StorageRouter;
use nano_banana::tools::{
    ConfigStatusTool, ConfigureTokenTool, EditImageTool, GenerateImageTool, ToolRegistry,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖；stdout 是 RPC 通道，日志必须走 stderr
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    // 启动期引导：能力探测 + 堆预算
    let plan = launcher::bootstrap();

    let config = Arc::new(ConfigStore::default());
    let memory = Arc::new(MemoryPressureController::new(plan.heap_budget_bytes));
    let storage = Arc::new(StorageRouter::new(config.clone()));
    let model: Arc<dyn ImageModel> = Arc::new(GeminiClient::new());

    let mut registry = ToolRegistry::new();
    registry.register(ConfigureTokenTool::new(config.clone()));
    registry.register(GenerateImageTool::new(
        config.clone(),
        model.clone(),
        storage.clone(),
        memory.clone(),
    ));
    registry.register(EditImageTool::new(
        config.clone(),
        model,
        storage,
        memory,
    ));
    registry.register(ConfigStatusTool::new(config));

    McpServer::new(registry).run().await
}
