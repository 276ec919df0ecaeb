//! # 通用工具函数
//!
//! - `path` - 配置目录与配置文件路径

pub mod path;
