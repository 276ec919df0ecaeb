//! # 显示层数据模型
//!
//! 定义前端渲染所需的归一化消息结构，与服务端的持久化记录完全解耦。
//!
//! ## 数据流
//! ```text
//! GET .../messages → TranscriptResponse { data: Vec<Value> }
//!      → normalizer::records_from_values → Vec<PersistedRecord>
//!      → normalizer::convert_to_ui_messages → Vec<DisplayMessage>
//!      → renderer::render_message → RenderedMessage（IPC 返回前端）
//! ```
//!
//! `DisplayMessage` 同时也是发送聊天请求时的消息格式（序列化为 camelCase JSON）。

use serde::Serialize;
use serde_json::Value;

use crate::models::record::MessageRole;

/// 工具调用的显示状态
///
/// 序列化为带 `state` 标签的对象：
/// `{ "state": "call", "toolCallId": ..., "toolName": ..., "args": ... }`
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "state", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ToolInvocation {
    /// 已发出调用、尚未收到结果：前端显示加载占位
    Call {
        tool_call_id: String,
        tool_name: String,
        args: Value,
    },
    /// 已收到结果
    Result {
        tool_call_id: String,
        tool_name: String,
        args: Value,
        result: Value,
    },
}

impl ToolInvocation {
    /// 调用 ID（列表渲染的稳定 key，也是与工具结果匹配的连接键）
    pub fn tool_call_id(&self) -> &str {
        match self {
            ToolInvocation::Call { tool_call_id, .. }
            | ToolInvocation::Result { tool_call_id, .. } => tool_call_id,
        }
    }

    /// 工具名称
    pub fn tool_name(&self) -> &str {
        match self {
            ToolInvocation::Call { tool_name, .. } | ToolInvocation::Result { tool_name, .. } => {
                tool_name
            }
        }
    }

    /// 调用参数
    pub fn args(&self) -> &Value {
        match self {
            ToolInvocation::Call { args, .. } | ToolInvocation::Result { args, .. } => args,
        }
    }

    /// 是否仍处于 `call` 状态
    pub fn is_pending(&self) -> bool {
        matches!(self, ToolInvocation::Call { .. })
    }

    /// 以给定结果推进到 `result` 状态
    ///
    /// 已经是 `result` 状态的调用同样会被新结果覆盖，与工具结果记录的合并语义一致。
    pub fn resolve(self, result: Value) -> Self {
        match self {
            ToolInvocation::Call {
                tool_call_id,
                tool_name,
                args,
            }
            | ToolInvocation::Result {
                tool_call_id,
                tool_name,
                args,
                ..
            } => ToolInvocation::Result {
                tool_call_id,
                tool_name,
                args,
                result,
            },
        }
    }
}

/// 单条显示消息
///
/// 由 `normalizer::convert_to_ui_messages` 从持久化记录生成，
/// 或由 `session::ChatSession` 在流式接收时增量构建。
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DisplayMessage {
    /// 原始记录 ID；本地新建的用户消息使用 UUID
    pub id: String,
    /// 消息角色
    pub role: MessageRole,
    /// 扁平化后的文本内容（所有 text 块按顺序拼接）
    pub content: String,
    /// 工具调用列表（保持原始顺序，toolCallId 在同一消息内唯一）
    pub tool_invocations: Vec<ToolInvocation>,
}

impl DisplayMessage {
    /// 创建不含工具调用的纯文本消息
    pub fn text(id: impl Into<String>, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
            tool_invocations: Vec::new(),
        }
    }

    /// 是否存在尚未返回结果的工具调用
    pub fn has_pending_invocations(&self) -> bool {
        self.tool_invocations.iter().any(ToolInvocation::is_pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_invocation_serializes_with_state_tag() {
        let call = ToolInvocation::Call {
            tool_call_id: "c1".into(),
            tool_name: "retrieveDataFromSystem".into(),
            args: json!({ "isChartVisualization": true }),
        };
        assert_eq!(
            serde_json::to_value(&call).unwrap(),
            json!({
                "state": "call",
                "toolCallId": "c1",
                "toolName": "retrieveDataFromSystem",
                "args": { "isChartVisualization": true }
            })
        );

        let resolved = call.resolve(json!([1, 2]));
        assert_eq!(serde_json::to_value(&resolved).unwrap()["state"], "result");
        assert_eq!(resolved.tool_call_id(), "c1");
        assert!(!resolved.is_pending());
    }

    #[test]
    fn test_display_message_camel_case() {
        let msg = DisplayMessage::text("m1", MessageRole::Assistant, "hi");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "assistant");
        assert_eq!(value["toolInvocations"], json!([]));
    }
}
