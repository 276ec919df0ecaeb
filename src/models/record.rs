//! # 持久化会话记录数据模型
//!
//! 对应服务端存储的会话历史（`GET .../messages` 返回的 `data` 数组中的每一项）。
//!
//! 服务端返回的记录形状较为松散：`content` 可能是字符串，也可能是内容块数组，
//! 数组中可能出现本应用不认识的块类型。这里把它们收敛为显式的枚举类型：
//! - `RecordContent` - 纯文本 / 内容块列表 / 无法识别
//! - `ContentPart` - `text` / `tool-call` / 其他
//! - `PersistedRecord` - 普通消息 / 工具结果
//!
//! 解码采用宽松策略：单个内容块或单条记录解析失败时只跳过该项，不影响其余数据。

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// 消息角色
///
/// `tool` 角色不会出现在这里：工具结果记录由 `PersistedRecord::ToolResults` 单独表示，
/// 不会生成 DisplayMessage。缺失或无法识别的角色落入 `Unknown`，记录本身仍会显示。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Data,
    #[serde(other)]
    Unknown,
}

impl MessageRole {
    /// 角色的小写字符串形式，用于 CSS 类名和 `data-role` 属性
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Data => "data",
            MessageRole::Unknown => "unknown",
        }
    }
}

/// 单个内容块
///
/// 通过 `type` 字段区分；未识别的块类型（如 `image`、`reasoning`）统一落入 `Other`。
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    /// 文本块：参与 content 拼接
    #[serde(rename = "text")]
    Text { text: String },
    /// 工具调用块：转换为 `call` 状态的 ToolInvocation
    #[serde(rename = "tool-call", rename_all = "camelCase")]
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        #[serde(default)]
        args: Value,
    },
    #[serde(other)]
    Other,
}

/// 记录的 content 字段
#[derive(Debug, Clone, PartialEq)]
pub enum RecordContent {
    /// 纯字符串 content，原样作为显示文本
    Text(String),
    /// 有序内容块列表（解析失败的块已被跳过）
    Parts(Vec<ContentPart>),
    /// 既不是字符串也不是数组（null、对象、数字等），归一化时视为空
    Unrecognized,
}

impl RecordContent {
    /// 从原始 JSON 值宽松地构建 content
    ///
    /// 数组中的每个元素独立解析，解析失败的元素直接丢弃。
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(s)) => RecordContent::Text(s.clone()),
            Some(Value::Array(items)) => RecordContent::Parts(
                items
                    .iter()
                    .filter_map(|item| ContentPart::deserialize(item).ok())
                    .collect(),
            ),
            _ => RecordContent::Unrecognized,
        }
    }
}

/// 工具结果条目：`role = tool` 记录中 content 数组的单个元素
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultPart {
    /// 对应先前某个 `tool-call` 块的调用 ID（归一化时的连接键）
    pub tool_call_id: String,
    /// 工具名称（部分服务端会附带，仅作参考）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// 工具返回值，结构由工具自身决定
    #[serde(default)]
    pub result: Value,
}

/// 一条持久化会话记录
#[derive(Debug, Clone, PartialEq)]
pub enum PersistedRecord {
    /// user / assistant / system / data 消息：生成一条 DisplayMessage
    Message {
        id: String,
        role: MessageRole,
        content: RecordContent,
    },
    /// tool 消息：不生成 DisplayMessage，只用于把先前的工具调用推进到 `result` 状态
    ToolResults {
        id: String,
        results: Vec<ToolResultPart>,
    },
}

/// 记录头部：仅用于读取 id 和 role
#[derive(Deserialize)]
struct RecordHeader {
    #[serde(default, deserialize_with = "deserialize_id")]
    id: String,
    #[serde(default)]
    role: Option<String>,
}

/// 接受字符串或数字形式的 ID（部分数据库以自增整数作为主键）
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

impl PersistedRecord {
    /// 从原始 JSON 值解码一条记录
    ///
    /// # 返回值
    /// - `Ok(record)` - 解码成功
    /// - `Err(msg)` - 记录不是 JSON 对象或 id / role 字段类型不符
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let header = RecordHeader::deserialize(value)
            .map_err(|e| format!("解析会话记录头部失败: {}", e))?;
        let content = value.get("content");

        let role = match header.role.as_deref().unwrap_or_default() {
            "tool" => {
                let results = content
                    .and_then(|c| c.as_array())
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|item| ToolResultPart::deserialize(item).ok())
                            .collect()
                    })
                    .unwrap_or_default();
                return Ok(PersistedRecord::ToolResults {
                    id: header.id,
                    results,
                });
            }
            "user" => MessageRole::User,
            "assistant" => MessageRole::Assistant,
            "system" => MessageRole::System,
            "data" => MessageRole::Data,
            other => {
                log::debug!("记录 {} 的角色 \"{}\" 无法识别，按 unknown 显示", header.id, other);
                MessageRole::Unknown
            }
        };

        Ok(PersistedRecord::Message {
            id: header.id,
            role,
            content: RecordContent::from_value(content),
        })
    }

    /// 记录 ID
    pub fn id(&self) -> &str {
        match self {
            PersistedRecord::Message { id, .. } | PersistedRecord::ToolResults { id, .. } => id,
        }
    }
}

/// 会话记录接口的响应体：`{ data: PersistedRecord[] }`
///
/// `data` 保持为原始 JSON，逐条宽松解码，避免单条坏记录导致整个会话加载失败。
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptResponse {
    #[serde(default)]
    pub data: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_string_content() {
        let record =
            PersistedRecord::from_value(&json!({ "id": "1", "role": "user", "content": "hi" }))
                .unwrap();
        assert_eq!(
            record,
            PersistedRecord::Message {
                id: "1".into(),
                role: MessageRole::User,
                content: RecordContent::Text("hi".into()),
            }
        );
    }

    #[test]
    fn test_decode_parts_skips_unknown_and_malformed() {
        let record = PersistedRecord::from_value(&json!({
            "id": 7,
            "role": "assistant",
            "content": [
                { "type": "text", "text": "a" },
                { "type": "image", "image": "..." },
                { "type": "text" },
                { "type": "tool-call", "toolCallId": "c1", "toolName": "t", "args": { "x": 1 } }
            ]
        }))
        .unwrap();

        let PersistedRecord::Message { id, content, .. } = record else {
            panic!("应解码为普通消息");
        };
        // 数字 ID 被转换为字符串
        assert_eq!(id, "7");
        let RecordContent::Parts(parts) = content else {
            panic!("应解码为内容块列表");
        };
        // image 块落入 Other，缺少 text 字段的块被丢弃
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1], ContentPart::Other);
        assert!(matches!(&parts[2], ContentPart::ToolCall { tool_call_id, .. } if tool_call_id == "c1"));
    }

    #[test]
    fn test_decode_tool_record() {
        let record = PersistedRecord::from_value(&json!({
            "id": "t1",
            "role": "tool",
            "content": [
                { "type": "tool-result", "toolCallId": "c1", "toolName": "t", "result": { "ok": true } },
                { "garbage": 1 }
            ]
        }))
        .unwrap();

        let PersistedRecord::ToolResults { results, .. } = record else {
            panic!("应解码为工具结果记录");
        };
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].tool_call_id, "c1");
        assert_eq!(results[0].result, json!({ "ok": true }));
    }

    #[test]
    fn test_decode_unknown_or_missing_role_keeps_record() {
        for value in [
            json!({ "id": "1", "role": "robot", "content": "beep" }),
            json!({ "id": "1", "content": "beep" }),
        ] {
            let record = PersistedRecord::from_value(&value).unwrap();
            assert_eq!(
                record,
                PersistedRecord::Message {
                    id: "1".into(),
                    role: MessageRole::Unknown,
                    content: RecordContent::Text("beep".into()),
                }
            );
        }
    }

    #[test]
    fn test_decode_non_object_fails() {
        assert!(PersistedRecord::from_value(&json!(42)).is_err());
        assert!(PersistedRecord::from_value(&json!({ "id": "1", "role": 5 })).is_err());
    }

    #[test]
    fn test_non_array_content_is_unrecognized() {
        let record = PersistedRecord::from_value(&json!({
            "id": "1", "role": "assistant", "content": { "weird": true }
        }))
        .unwrap();
        assert!(matches!(
            record,
            PersistedRecord::Message { content: RecordContent::Unrecognized, .. }
        ));
    }
}
