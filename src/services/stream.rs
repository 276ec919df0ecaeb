//! # 聊天流式响应解析
//!
//! 聊天接口以按行分隔的数据流返回助手回复，每行格式为 `CODE:JSON`：
//!
//! | 代码 | 含义 | JSON 载荷 |
//! |------|------|-----------|
//! | `0` | 文本增量 | 字符串 |
//! | `3` | 错误 | 字符串 |
//! | `9` | 工具调用 | `{ toolCallId, toolName, args }` |
//! | `a` | 工具结果 | `{ toolCallId, result }` |
//! | `f` | 步骤开始 | `{ messageId }` |
//! | `e` | 步骤结束 | 任意 |
//! | `d` | 消息结束 | 任意 |
//!
//! 其他代码和格式错误的行静默跳过。
//!
//! 网络分块与行边界无关，`LineDecoder` 负责把任意切分的字节块重新拼成完整行。

use bytes::{Buf, BytesMut};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;

use crate::models::record::ToolResultPart;

/// 流中的一个数据片段
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPart {
    /// 助手文本增量
    Text(String),
    /// 工具调用
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        args: Value,
    },
    /// 工具结果
    ToolResult(ToolResultPart),
    /// 服务端报告的错误
    Error(String),
    /// 新步骤开始，携带服务端分配的消息 ID
    StartStep { message_id: Option<String> },
    /// 步骤结束
    FinishStep,
    /// 整条回复结束
    Finish,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolCallPayload {
    tool_call_id: String,
    tool_name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartStepPayload {
    #[serde(default)]
    message_id: Option<String>,
}

/// 解析单行数据流
///
/// # 返回值
/// - `Some(part)` - 识别的数据片段
/// - `None` - 空行、未知代码或 JSON 载荷不符
pub fn parse_line(line: &str) -> Option<StreamPart> {
    let line = line.trim_end_matches('\r');
    let (code, payload) = line.split_once(':')?;
    let value: Value = serde_json::from_str(payload).ok()?;

    match code {
        "0" => value.as_str().map(|s| StreamPart::Text(s.to_string())),
        "3" => Some(StreamPart::Error(match value {
            Value::String(s) => s,
            other => other.to_string(),
        })),
        "9" => {
            let call = ToolCallPayload::deserialize(&value).ok()?;
            Some(StreamPart::ToolCall {
                tool_call_id: call.tool_call_id,
                tool_name: call.tool_name,
                args: call.args,
            })
        }
        "a" => ToolResultPart::deserialize(&value)
            .ok()
            .map(StreamPart::ToolResult),
        "f" => {
            let step = StartStepPayload::deserialize(&value).ok()?;
            Some(StreamPart::StartStep {
                message_id: step.message_id,
            })
        }
        "e" => Some(StreamPart::FinishStep),
        "d" => Some(StreamPart::Finish),
        _ => None,
    }
}

/// 行解码器：把任意切分的字节块拼接为完整的文本行
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: BytesMut,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个字节块，返回其中已完整的行（不含换行符）
    ///
    /// 非 UTF-8 字节按替换字符处理。
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = memchr::memchr(b'\n', &self.buffer) {
            let line = self.buffer.split_to(pos);
            self.buffer.advance(1);
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// 流结束时取出最后一段未以换行结尾的内容
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = self.buffer.split();
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// 读取字节流并逐个回调数据片段
///
/// # 参数
/// - `stream` - 字节块流（通常来自 `reqwest::Response::bytes_stream`）
/// - `on_part` - 每解析出一个片段调用一次，顺序与到达顺序一致
///
/// # 返回值
/// 成功读完返回解析出的片段数量
///
/// # 错误
/// 底层字节流报错时返回错误（此前已回调的片段不回滚）
pub async fn read_parts<S, B, E>(
    mut stream: S,
    mut on_part: impl FnMut(StreamPart),
) -> Result<usize, String>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut decoder = LineDecoder::new();
    let mut count = 0usize;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| format!("读取聊天响应流失败: {}", e))?;
        for line in decoder.push(chunk.as_ref()) {
            match parse_line(&line) {
                Some(part) => {
                    count += 1;
                    on_part(part);
                }
                None if !line.trim().is_empty() => {
                    log::debug!("跳过无法识别的流数据行: {}", line);
                }
                None => {}
            }
        }
    }

    if let Some(part) = decoder.finish().as_deref().and_then(parse_line) {
        count += 1;
        on_part(part);
    }

    Ok(count)
}
