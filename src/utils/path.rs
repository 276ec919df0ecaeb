//! # 路径工具函数
//!
//! 本应用的配置独立存储在系统配置目录下的 `chart-chat-viewer/` 中：
//! - Windows: `C:\Users\username\AppData\Roaming\chart-chat-viewer`
//! - Linux: `/home/username/.config/chart-chat-viewer`
//! - macOS: `/Users/username/Library/Application Support/chart-chat-viewer`

use std::path::PathBuf;

/// 配置目录名
pub const APP_DIR_NAME: &str = "chart-chat-viewer";

/// 连接配置文件名
pub const CONNECTION_FILE_NAME: &str = "connection.json";

/// 获取本应用配置目录的绝对路径
///
/// # 错误
/// 无法确定系统配置目录时（如无 HOME 环境变量）返回错误信息
pub fn get_app_config_path() -> Result<PathBuf, String> {
    let base = dirs::config_dir().ok_or_else(|| "无法获取系统配置目录".to_string())?;
    Ok(base.join(APP_DIR_NAME))
}

/// 获取连接配置文件的绝对路径
pub fn get_connection_config_path() -> Result<PathBuf, String> {
    Ok(get_app_config_path()?.join(CONNECTION_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_config_path_layout() {
        // CI 容器中可能没有配置目录，此时只验证返回错误而非 panic
        if let Ok(path) = get_connection_config_path() {
            assert!(path.ends_with(PathBuf::from(APP_DIR_NAME).join(CONNECTION_FILE_NAME)));
        }
    }
}
