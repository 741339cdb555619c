//! 端到端：MCP 请求 → 工具执行 → 本地回退落盘 → 结果负载

use std::sync::Arc;

use nano_banana::config::{ConfigStore, CONFIG_FILE};
use nano_banana::gemini::{ImageModel, MockImageModel};
use nano_banana::launcher;
use nano_banana::memory::MemoryPressureController;
use nano_banana::rpc::McpServer;
use nano_banana::storage::StorageRouter;
use nano_banana::tools::{
    ConfigStatusTool, ConfigureTokenTool, EditImageTool, GenerateImageTool, ToolRegistry,
};

fn build_server(dir: &std::path::Path) -> McpServer {
    // 注入空环境查找：进程里真实的 GEMINI_API_KEY / Azure 配置不影响断言
    let config = Arc::new(ConfigStore::with_env_lookup(dir.join(CONFIG_FILE), |_| None));
    let memory = Arc::new(MemoryPressureController::new(512 * 1024 * 1024));
    let storage = Arc::new(StorageRouter::new(config.clone()).with_local_dir(dir.join("imgs")));
    let model: Arc<dyn ImageModel> = Arc::new(MockImageModel::default());

    let mut registry = ToolRegistry::new();
    registry.register(ConfigureTokenTool::new(config.clone()));
    registry.register(GenerateImageTool::new(
        config.clone(),
        model.clone(),
        storage.clone(),
        memory.clone(),
    ));
    registry.register(EditImageTool::new(config.clone(), model, storage, memory));
    registry.register(ConfigStatusTool::new(config));
    McpServer::new(registry)
}

#[tokio::test]
async fn test_full_generate_flow_over_rpc() {
    let tmp = tempfile::tempdir().unwrap();
    let server = build_server(tmp.path());

    // 握手
    let resp = server
        .handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#)
        .await
        .unwrap();
    assert!(resp.error.is_none());

    // 四个工具都已注册
    let resp = server
        .handle_line(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#)
        .await
        .unwrap();
    let tools = resp.result.unwrap()["tools"].as_array().unwrap().len();
    assert_eq!(tools, 4);

    // 先配置 Key
    let resp = server
        .handle_line(
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"configure_gemini_token","arguments":{"apiKey":"k-test"}}}"#,
        )
        .await
        .unwrap();
    assert!(resp.error.is_none());

    // 生成：无远端配置 → 本地落盘，remoteUrl 为 null
    let resp = server
        .handle_line(
            r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"generate_image","arguments":{"prompt":"a red circle"}}}"#,
        )
        .await
        .unwrap();
    let result = resp.result.unwrap();
    assert_eq!(result["isError"], false);
    let payload: serde_json::Value =
        serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap();
    assert!(payload["remoteUrl"].is_null());

    let files: Vec<_> = std::fs::read_dir(tmp.path().join("imgs")).unwrap().collect();
    assert_eq!(files.len(), 1);
    let name = files[0].as_ref().unwrap().file_name();
    let name = name.to_string_lossy();
    assert!(name.starts_with("generated-") && name.ends_with(".png"));
}

#[tokio::test]
async fn test_edit_flow_with_unreachable_reference() {
    let tmp = tempfile::tempdir().unwrap();
    let server = build_server(tmp.path());

    server
        .handle_line(
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"configure_gemini_token","arguments":{"apiKey":"k-test"}}}"#,
        )
        .await
        .unwrap();

    let primary = tmp.path().join("main.png");
    std::fs::write(&primary, b"primary-bytes").unwrap();

    // 参考图不可达：调用仍需成功
    let request = serde_json::json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "tools/call",
        "params": {
            "name": "edit_image",
            "arguments": {
                "imagePath": primary.to_str().unwrap(),
                "prompt": "make it blue",
                "referenceImages": [tmp.path().join("missing.png").to_str().unwrap()],
            },
        },
    });
    let resp = server.handle_line(&request.to_string()).await.unwrap();
    let result = resp.result.unwrap();
    assert_eq!(result["isError"], false);
}

#[tokio::test]
async fn test_generate_without_key_returns_typed_error() {
    let tmp = tempfile::tempdir().unwrap();
    let server = build_server(tmp.path());

    let resp = server
        .handle_line(
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"generate_image","arguments":{"prompt":"x"}}}"#,
        )
        .await
        .unwrap();
    let error = resp.error.expect("missing key must surface as an RPC error");
    assert_eq!(error.code, -32602);
    assert!(error.message.contains("API key"));
}

#[test]
fn test_bootstrap_is_direct_with_positive_budget() {
    let plan = launcher::bootstrap();
    assert!(plan.heap_budget_bytes > 0);
}
