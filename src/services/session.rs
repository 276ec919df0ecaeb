//! # 聊天会话控制器
//!
//! 持有当前会话的消息列表，并负责三类更新：
//! - 初始加载：用归一化后的会话记录整体替换消息列表
//! - 用户提交：追加一条用户消息，进入等待回复状态
//! - 流式回复：按到达顺序应用数据片段，增量构建助手消息
//!
//! 每次更新都整体替换 `messages`，不对外暴露可变引用。
//! 本结构不做任何 I/O；网络请求由 `client::ChatClient` 完成，调用方在两者之间搬运数据。

use serde::Serialize;

use crate::models::display::{DisplayMessage, ToolInvocation};
use crate::models::record::{MessageRole, PersistedRecord};
use crate::services::normalizer;
use crate::services::renderer::{self, RenderOptions, RenderedMessage};
use crate::services::stream::StreamPart;

/// 会话状态
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "status", content = "message")]
pub enum SessionStatus {
    /// 空闲，可以提交新消息
    Ready,
    /// 已提交，尚未收到任何回复内容
    Submitted,
    /// 正在接收回复
    Streaming,
    /// 上一次请求失败
    Error(String),
}

/// 聊天会话
#[derive(Debug, Clone)]
pub struct ChatSession {
    messages: Vec<DisplayMessage>,
    status: SessionStatus,
    /// 当前正在构建的助手消息 ID
    active_assistant: Option<String>,
    /// 服务端在步骤开始时分配的消息 ID，供下一条助手消息使用
    pending_message_id: Option<String>,
    /// 会话代次：每次 `seed` / `reset` 递增，旧代次的流数据片段不再应用
    generation: u64,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            status: SessionStatus::Ready,
            active_assistant: None,
            pending_message_id: None,
            generation: 0,
        }
    }

    /// 当前会话代次
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 当前消息列表
    pub fn messages(&self) -> &[DisplayMessage] {
        &self.messages
    }

    /// 当前状态
    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    /// 是否正在等待或接收回复
    pub fn is_busy(&self) -> bool {
        matches!(self.status, SessionStatus::Submitted | SessionStatus::Streaming)
    }

    /// 是否需要显示"思考中"占位：已提交但助手尚未产出任何内容
    pub fn awaiting_first_content(&self) -> bool {
        if !self.is_busy() {
            return false;
        }
        match self.active_message() {
            Some(message) => message.content.is_empty() && message.tool_invocations.is_empty(),
            None => true,
        }
    }

    /// 渲染全部消息；等待首个回复内容时在末尾追加"思考中"占位
    pub fn render(&self, options: &RenderOptions) -> Vec<RenderedMessage> {
        let mut rendered = renderer::render_messages(&self.messages, options);
        if self.awaiting_first_content() {
            rendered.push(renderer::thinking_message());
        }
        rendered
    }

    /// 用持久化记录整体替换消息列表（初始加载）
    ///
    /// # 返回值
    /// 归一化后的消息数量
    pub fn seed(&mut self, records: &[PersistedRecord]) -> usize {
        self.messages = normalizer::convert_to_ui_messages(records);
        self.generation += 1;
        self.status = SessionStatus::Ready;
        self.active_assistant = None;
        self.pending_message_id = None;
        self.messages.len()
    }

    /// 清空会话（连接配置变更时调用）
    pub fn reset(&mut self) {
        let generation = self.generation + 1;
        *self = Self::new();
        self.generation = generation;
    }

    /// 追加用户消息并进入等待回复状态
    ///
    /// # 错误
    /// 上一次回复尚未结束，或文本为空时返回错误
    pub fn submit_user_message(&mut self, text: &str) -> Result<DisplayMessage, String> {
        if self.is_busy() {
            return Err("上一条消息仍在等待回复".to_string());
        }
        let text = text.trim();
        if text.is_empty() {
            return Err("消息内容不能为空".to_string());
        }

        let message = DisplayMessage::text(
            uuid::Uuid::new_v4().to_string(),
            MessageRole::User,
            text,
        );
        self.replace_messages(|messages| messages.push(message.clone()));
        self.status = SessionStatus::Submitted;
        self.active_assistant = None;
        self.pending_message_id = None;
        Ok(message)
    }

    /// 应用一个流式数据片段
    ///
    /// # 返回值
    /// 受影响的消息（用于推送给前端）；片段不影响任何消息时返回 None
    pub fn apply_part(&mut self, part: StreamPart) -> Option<DisplayMessage> {
        match part {
            StreamPart::Text(delta) => {
                if delta.is_empty() {
                    return None;
                }
                self.status = SessionStatus::Streaming;
                self.update_active(|message| message.content.push_str(&delta))
            }
            StreamPart::ToolCall {
                tool_call_id,
                tool_name,
                args,
            } => {
                self.status = SessionStatus::Streaming;
                self.update_active(|message| {
                    let exists = message
                        .tool_invocations
                        .iter()
                        .any(|inv| inv.tool_call_id() == tool_call_id);
                    if !exists {
                        message.tool_invocations.push(ToolInvocation::Call {
                            tool_call_id,
                            tool_name,
                            args,
                        });
                    }
                })
            }
            StreamPart::ToolResult(result) => {
                let id = result.tool_call_id.clone();
                let messages = std::mem::take(&mut self.messages);
                self.messages = normalizer::apply_tool_results(messages, &[result]);
                self.messages
                    .iter()
                    .rev()
                    .find(|m| m.tool_invocations.iter().any(|inv| inv.tool_call_id() == id))
                    .cloned()
            }
            StreamPart::StartStep { message_id } => {
                if self.active_assistant.is_none() {
                    self.pending_message_id = message_id;
                }
                None
            }
            StreamPart::FinishStep => None,
            StreamPart::Finish => {
                self.finish();
                None
            }
            StreamPart::Error(message) => {
                log::warn!("聊天接口在流中报告错误: {}", message);
                self.fail(message);
                None
            }
        }
    }

    /// 回复正常结束
    pub fn finish(&mut self) {
        if self.is_busy() {
            self.status = SessionStatus::Ready;
        }
        self.active_assistant = None;
        self.pending_message_id = None;
    }

    /// 请求失败：保留已收到的内容，记录错误
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = SessionStatus::Error(message.into());
        self.active_assistant = None;
        self.pending_message_id = None;
    }

    /// 当前正在构建的助手消息
    fn active_message(&self) -> Option<&DisplayMessage> {
        let id = self.active_assistant.as_deref()?;
        self.messages.iter().rev().find(|m| m.id == id)
    }

    /// 修改当前助手消息；尚不存在时先创建
    fn update_active(&mut self, f: impl FnOnce(&mut DisplayMessage)) -> Option<DisplayMessage> {
        let id = match &self.active_assistant {
            Some(id) => id.clone(),
            None => {
                let id = self
                    .pending_message_id
                    .take()
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                let message = DisplayMessage::text(id.clone(), MessageRole::Assistant, "");
                self.replace_messages(|messages| messages.push(message));
                self.active_assistant = Some(id.clone());
                id
            }
        };

        let mut updated = None;
        self.replace_messages(|messages| {
            if let Some(message) = messages.iter_mut().rev().find(|m| m.id == id) {
                f(message);
                updated = Some(message.clone());
            }
        });
        updated
    }

    /// 基于当前列表构建新列表并整体替换
    fn replace_messages(&mut self, f: impl FnOnce(&mut Vec<DisplayMessage>)) {
        let mut next = self.messages.clone();
        f(&mut next);
        self.messages = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::ToolResultPart;
    use serde_json::{json, Value};

    fn seeded() -> ChatSession {
        let records = normalizer::records_from_values(
            json!([
                { "id": "1", "role": "user", "content": "hi" },
                { "id": "2", "role": "assistant", "content": "hello" }
            ])
            .as_array()
            .unwrap(),
        );
        let mut session = ChatSession::new();
        assert_eq!(session.seed(&records), 2);
        session
    }

    #[test]
    fn test_submit_appends_user_message() {
        let mut session = seeded();
        let message = session.submit_user_message("  show sales  ").unwrap();

        assert_eq!(message.content, "show sales");
        assert_eq!(session.messages().len(), 3);
        assert_eq!(session.status(), &SessionStatus::Submitted);
        assert!(session.awaiting_first_content());

        // 等待回复期间不能再次提交
        assert!(session.submit_user_message("again").is_err());
    }

    #[test]
    fn test_submit_rejects_empty_text() {
        let mut session = seeded();
        assert!(session.submit_user_message("   ").is_err());
        assert_eq!(session.messages().len(), 2);
    }

    #[test]
    fn test_text_deltas_grow_one_assistant_message() {
        let mut session = seeded();
        session.submit_user_message("q").unwrap();

        session.apply_part(StreamPart::StartStep {
            message_id: Some("srv-1".into()),
        });
        session.apply_part(StreamPart::Text("Hel".into()));
        let updated = session.apply_part(StreamPart::Text("lo".into())).unwrap();

        assert_eq!(updated.id, "srv-1");
        assert_eq!(updated.content, "Hello");
        assert_eq!(session.messages().len(), 4);
        assert_eq!(session.status(), &SessionStatus::Streaming);
        assert!(!session.awaiting_first_content());

        session.apply_part(StreamPart::Finish);
        assert_eq!(session.status(), &SessionStatus::Ready);
    }

    #[test]
    fn test_tool_call_then_result() {
        let mut session = seeded();
        session.submit_user_message("chart please").unwrap();

        session.apply_part(StreamPart::ToolCall {
            tool_call_id: "c1".into(),
            tool_name: "retrieveDataFromSystem".into(),
            args: json!({ "isChartVisualization": true }),
        });
        assert!(session.messages().last().unwrap().has_pending_invocations());

        let updated = session
            .apply_part(StreamPart::ToolResult(ToolResultPart {
                tool_call_id: "c1".into(),
                tool_name: None,
                result: json!({ "queryResult": [] }),
            }))
            .unwrap();
        assert!(!updated.has_pending_invocations());
        assert_eq!(session.messages().len(), 4);

        // 结果之后的文本仍追加到同一条助手消息
        let updated = session.apply_part(StreamPart::Text("Here".into())).unwrap();
        assert_eq!(updated.tool_invocations.len(), 1);
        assert_eq!(updated.content, "Here");
    }

    #[test]
    fn test_unmatched_tool_result_changes_nothing() {
        let mut session = seeded();
        let before = session.messages().to_vec();
        let updated = session.apply_part(StreamPart::ToolResult(ToolResultPart {
            tool_call_id: "nope".into(),
            tool_name: None,
            result: Value::Null,
        }));
        assert!(updated.is_none());
        assert_eq!(session.messages(), before.as_slice());
    }

    #[test]
    fn test_stream_error_keeps_partial_content() {
        let mut session = seeded();
        session.submit_user_message("q").unwrap();
        session.apply_part(StreamPart::Text("partial".into()));
        session.apply_part(StreamPart::Error("rate limited".into()));

        assert_eq!(
            session.status(),
            &SessionStatus::Error("rate limited".into())
        );
        assert_eq!(session.messages().last().unwrap().content, "partial");
        // 出错后可以重新提交
        assert!(session.submit_user_message("retry").is_ok());
    }

    #[test]
    fn test_render_appends_thinking_placeholder() {
        let mut session = seeded();
        let options = RenderOptions::default();
        assert_eq!(session.render(&options).len(), 2);

        session.submit_user_message("q").unwrap();
        let rendered = session.render(&options);
        assert_eq!(rendered.len(), 4);
        assert_eq!(rendered.last().unwrap().id, renderer::THINKING_MESSAGE_ID);

        session.apply_part(StreamPart::Text("a".into()));
        let rendered = session.render(&options);
        assert_eq!(rendered.len(), 4);
        assert_ne!(rendered.last().unwrap().id, renderer::THINKING_MESSAGE_ID);
    }

    #[test]
    fn test_seed_and_reset_advance_generation() {
        let mut session = ChatSession::new();
        assert_eq!(session.generation(), 0);
        session.seed(&[]);
        assert_eq!(session.generation(), 1);
        session.submit_user_message("q").unwrap();
        assert_eq!(session.generation(), 1);
        session.reset();
        assert_eq!(session.generation(), 2);
        assert!(session.messages().is_empty());
        assert!(!session.is_busy());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_value(SessionStatus::Ready).unwrap(),
            json!({ "status": "ready" })
        );
        assert_eq!(
            serde_json::to_value(SessionStatus::Error("x".into())).unwrap(),
            json!({ "status": "error", "message": "x" })
        );
    }
}
