//! # Tauri Command 处理模块
//!
//! 本模块包含所有注册到 Tauri 的 command 处理函数：
//! - `chat` - 会话记录加载、消息渲染与流式发送
//! - `settings` - 连接配置的读取与替换

pub mod chat;
pub mod settings;
