//! # 连接配置数据模型
//!
//! 定义远端聊天接口的连接参数（ConnectionConfig）。
//! 配置文件位于应用配置目录下的 `connection.json`，缺失时使用默认值。

use serde::{Deserialize, Serialize};

/// 默认接口前缀
pub const DEFAULT_API_BASE: &str = "http://localhost:4200/api/sales/chats";

/// 默认会话 ID
pub const DEFAULT_CHAT_ID: &str = "19";

/// 远端聊天接口连接配置
///
/// 会话记录拉取与聊天流式请求共用同一个地址：`{api_base}/{chat_id}/messages`。
///
/// 对应前端 TypeScript 接口：
/// ```typescript
/// interface ConnectionConfig {
///   apiBase: string;
///   chatId: string;
///   accessToken: string;
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionConfig {
    /// 接口前缀（不含会话 ID），末尾斜杠可有可无
    pub api_base: String,
    /// 会话标识符
    pub chat_id: String,
    /// 请求头 `x-access-token` 的值
    pub access_token: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            chat_id: DEFAULT_CHAT_ID.to_string(),
            access_token: String::new(),
        }
    }
}

impl ConnectionConfig {
    /// 会话消息接口的完整地址
    pub fn messages_url(&self) -> String {
        format!(
            "{}/{}/messages",
            self.api_base.trim_end_matches('/'),
            self.chat_id
        )
    }
}
