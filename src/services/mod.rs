//! # 业务逻辑服务模块
//!
//! 包含核心业务逻辑的实现，与 Tauri command 层解耦：
//! - `normalizer` - 会话记录归一化：持久化记录 → DisplayMessage
//! - `chart` - 图表编码：表格结果 + 图表配置 → 图表视图
//! - `renderer` - 消息渲染：Markdown、工具调用块、占位消息
//! - `stream` - 聊天流式响应的按行解析
//! - `client` - 远端聊天接口客户端
//! - `session` - 聊天会话控制器
//! - `config` - 连接配置加载
//! - `state` - 应用全局状态与加载、发送流程

pub mod chart;
pub mod client;
pub mod config;
pub mod normalizer;
pub mod renderer;
pub mod session;
pub mod state;
pub mod stream;
