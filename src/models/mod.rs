//! # 数据模型模块
//!
//! 定义了与前端 TypeScript 类型一一对应的 Rust 数据结构：
//! - `record` - 持久化会话记录及其内容片段
//! - `display` - 归一化后的显示消息与工具调用
//! - `chart` - 图表配置与图表视图
//! - `settings` - 远端接口连接配置

pub mod chart;
pub mod display;
pub mod record;
pub mod settings;
