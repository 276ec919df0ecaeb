//! # 连接配置 Tauri Commands
//!
//! - `read_connection_config` - 读取当前生效的连接配置
//! - `update_connection_config` - 替换连接配置（仅内存，不回写文件）
//! - `get_config_path` - 获取 `connection.json` 的绝对路径

use tauri::State;

use crate::models::settings::ConnectionConfig;
use crate::services::state::AppState;
use crate::utils::path;

#[tauri::command]
pub fn read_connection_config(app_state: State<'_, AppState>) -> Result<ConnectionConfig, String> {
    app_state.connection_config()
}

/// 替换连接配置
///
/// 新配置立即生效，当前会话被清空，前端需重新调用 `load_transcript`。
///
/// # 错误
/// access token 含非法请求头字符或回复尚未结束时返回错误，原配置保持不变
#[tauri::command]
pub fn update_connection_config(
    config: ConnectionConfig,
    app_state: State<'_, AppState>,
) -> Result<(), String> {
    app_state.replace_connection_config(config)
}

/// 获取连接配置文件路径
///
/// 前端据此提示用户在哪里持久化修改连接参数。
#[tauri::command]
pub async fn get_config_path() -> Result<String, String> {
    let config_path = path::get_connection_config_path()?;
    Ok(config_path.to_string_lossy().to_string())
}
