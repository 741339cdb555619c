//! nano-banana - Gemini 图像生成 MCP 服务器
//!
//! 模块划分：
//! - **config**: 配置解析（环境变量 + JSON 记录）与来源标记
//! - **core**: 服务器错误类型
//! - **gemini**: 图像模型抽象与实现（REST / Mock）
//! - **launcher**: 启动期能力探测与堆预算解析
//! - **memory**: 内存压力控制（阈值检查 + 激进回收）
//! - **pipeline**: 图像负载流水线（解码 → 持久化 → 释放）与输入图像加载
//! - **rpc**: JSON-RPC 报文与 MCP stdio 服务器
//! - **storage**: 远端对象存储（Azure Blob）、本地回退与路由
//! - **tools**: 四个工具与注册表

pub mod config;
pub mod core;
pub mod gemini;
pub mod launcher;
pub mod memory;
pub mod pipeline;
pub mod rpc;
pub mod storage;
pub mod tools;

pub use crate::core::ServerError;
