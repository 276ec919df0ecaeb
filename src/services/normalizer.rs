//! # 消息归一化器
//!
//! 将服务端存储的持久化记录列表转换为前端可直接渲染的 `DisplayMessage` 列表。
//!
//! ## 转换规则
//! - 非 tool 记录 → 恰好一条 DisplayMessage（保留 id 和 role）
//!   - content 为字符串：原样作为文本
//!   - content 为内容块数组：所有 `text` 块按顺序拼接；每个 `tool-call` 块生成一个 `call` 状态的调用
//! - tool 记录 → 不生成消息，把此前所有消息中 ID 匹配的 `call` 调用推进到 `result` 状态
//!
//! 整个过程是一次从左到右的折叠：每一步产出新的列表，tool 记录只能解析出现在它之前的调用。
//! ID 无匹配、content 形状无法识别时静默忽略。

use std::collections::HashMap;

use serde_json::Value;

use crate::models::display::{DisplayMessage, ToolInvocation};
use crate::models::record::{
    ContentPart, MessageRole, PersistedRecord, RecordContent, ToolResultPart,
};

/// 从原始 JSON 列表宽松解码持久化记录
///
/// 无法解码的记录（不是 JSON 对象、字段类型不符）跳过并记录警告，其余记录保持原顺序。
/// 角色缺失或未知的记录不会被跳过，以 `MessageRole::Unknown` 显示。
pub fn records_from_values(values: &[Value]) -> Vec<PersistedRecord> {
    values
        .iter()
        .enumerate()
        .filter_map(|(index, value)| match PersistedRecord::from_value(value) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("跳过第 {} 条会话记录: {}", index, e);
                None
            }
        })
        .collect()
}

/// 归一化入口：持久化记录 → 显示消息
///
/// # 参数
/// - `records` - 按时间顺序排列的持久化记录
///
/// # 返回值
/// 显示消息列表，长度等于非 tool 记录的数量
pub fn convert_to_ui_messages(records: &[PersistedRecord]) -> Vec<DisplayMessage> {
    records
        .iter()
        .fold(Vec::new(), |messages, record| match record {
            PersistedRecord::ToolResults { results, .. } => apply_tool_results(messages, results),
            PersistedRecord::Message { id, role, content } => {
                let mut messages = messages;
                messages.push(build_display_message(id, *role, content));
                messages
            }
        })
}

/// 用一组工具结果更新消息列表中的工具调用
///
/// 对每条消息的每个调用：若其 toolCallId 出现在 `results` 中，替换为携带该结果的
/// `result` 状态；否则保持不变。同一 ID 出现多次时取第一条结果。
///
/// # 参数
/// - `messages` - 当前消息列表（按值接收，返回新列表）
/// - `results` - 工具结果条目
pub fn apply_tool_results(
    messages: Vec<DisplayMessage>,
    results: &[ToolResultPart],
) -> Vec<DisplayMessage> {
    if results.is_empty() {
        return messages;
    }

    let mut by_id: HashMap<&str, &Value> = HashMap::with_capacity(results.len());
    for part in results {
        by_id.entry(part.tool_call_id.as_str()).or_insert(&part.result);
    }

    let mut matched = 0usize;
    let updated = messages
        .into_iter()
        .map(|message| {
            let DisplayMessage {
                id,
                role,
                content,
                tool_invocations,
            } = message;
            let tool_invocations = tool_invocations
                .into_iter()
                .map(|invocation| match by_id.get(invocation.tool_call_id()) {
                    Some(result) => {
                        matched += 1;
                        invocation.resolve((*result).clone())
                    }
                    None => invocation,
                })
                .collect();
            DisplayMessage {
                id,
                role,
                content,
                tool_invocations,
            }
        })
        .collect();

    if matched < by_id.len() {
        log::debug!(
            "{} 个工具结果未找到对应的工具调用，已忽略",
            by_id.len().saturating_sub(matched)
        );
    }
    updated
}

/// 由单条非 tool 记录构建 DisplayMessage
fn build_display_message(
    id: &str,
    role: MessageRole,
    content: &RecordContent,
) -> DisplayMessage {
    let mut text = String::new();
    let mut tool_invocations = Vec::new();

    match content {
        RecordContent::Text(s) => text.push_str(s),
        RecordContent::Parts(parts) => {
            for part in parts {
                match part {
                    ContentPart::Text { text: t } => text.push_str(t),
                    ContentPart::ToolCall {
                        tool_call_id,
                        tool_name,
                        args,
                    } => {
                        // 同一消息内 toolCallId 唯一：重复的调用块只保留第一个
                        let duplicate = tool_invocations
                            .iter()
                            .any(|inv: &ToolInvocation| inv.tool_call_id() == tool_call_id);
                        if duplicate {
                            log::debug!("消息 {} 中存在重复的工具调用 ID: {}", id, tool_call_id);
                            continue;
                        }
                        tool_invocations.push(ToolInvocation::Call {
                            tool_call_id: tool_call_id.clone(),
                            tool_name: tool_name.clone(),
                            args: args.clone(),
                        });
                    }
                    ContentPart::Other => {}
                }
            }
        }
        RecordContent::Unrecognized => {}
    }

    DisplayMessage {
        id: id.to_string(),
        role,
        content: text,
        tool_invocations,
    }
}
