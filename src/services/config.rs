//! # 连接配置加载
//!
//! 启动时从 `connection.json` 读取连接配置；文件不存在时使用默认值。
//! 运行期的修改只保存在内存中，不回写文件。

use std::path::Path;

use crate::models::settings::ConnectionConfig;
use crate::utils::path;

/// 从指定文件加载连接配置
///
/// # 参数
/// - `config_path` - `connection.json` 的绝对路径
///
/// # 返回值
/// 文件不存在时返回默认配置；缺失的字段同样取默认值
///
/// # 错误
/// 文件存在但无法读取或 JSON 解析失败时返回错误
pub async fn load_connection_config_from(config_path: &Path) -> Result<ConnectionConfig, String> {
    if !config_path.exists() {
        log::info!("未找到连接配置 {}，使用默认值", config_path.display());
        return Ok(ConnectionConfig::default());
    }

    let content = tokio::fs::read_to_string(config_path)
        .await
        .map_err(|e| format!("读取连接配置失败: {}", e))?;

    serde_json::from_str(&content).map_err(|e| format!("解析连接配置失败: {}", e))
}

/// 从默认位置加载连接配置
///
/// 无法确定配置目录或配置文件损坏时记录警告并回退到默认配置，不阻止应用启动。
pub async fn load_connection_config() -> ConnectionConfig {
    let result = match path::get_connection_config_path() {
        Ok(config_path) => load_connection_config_from(&config_path).await,
        Err(e) => Err(e),
    };
    result.unwrap_or_else(|e| {
        log::warn!("{}，使用默认连接配置", e);
        ConnectionConfig::default()
    })
}
