//! # 消息渲染器
//!
//! 将单条 `DisplayMessage` 渲染为前端可直接展示的 `RenderedMessage`：
//! - 按角色区分样式（用户消息右对齐气泡，助手消息带头像）
//! - 非空文本内容经 pulldown-cmark 转换为 HTML（原始 HTML 被转义）
//! - 每个工具调用对应一个以 toolCallId 为 key 的块：
//!   - `result` 状态 + 数据检索工具 + 请求了图表可视化 → 图表块
//!   - 其他 `result` → 空块
//!   - `call` 状态 → "Retrieving data..." 占位
//!
//! `render_html` 把渲染结果拼成一段完整的 HTML 片段（同时存入 `RenderedMessage::html`），图表视图以 JSON 形式挂在
//! `data-chart` 属性上，交给 WebView 中的图表库绘制。

use pulldown_cmark::{html, Event, Options, Parser};
use pulldown_cmark_escape::escape_html;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::chart::{ChartPayload, ChartView};
use crate::models::display::{DisplayMessage, ToolInvocation};
use crate::models::record::MessageRole;
use crate::services::chart;

/// 默认的数据检索工具名称
pub const DATA_TOOL_NAME: &str = "retrieveDataFromSystem";

/// 加载占位文本
pub const RETRIEVING_PLACEHOLDER: &str = "Retrieving data...";

/// 思考中占位文本
pub const THINKING_PLACEHOLDER: &str = "Thinking...";

/// 思考中占位消息的固定 ID
pub const THINKING_MESSAGE_ID: &str = "thinking";

/// 渲染选项
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// 会产出图表的数据检索工具名称
    pub data_tool_name: String,
    /// 加载中需要以骨架屏样式展示的工具名称
    pub skeleton_tools: Vec<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            data_tool_name: DATA_TOOL_NAME.to_string(),
            skeleton_tools: vec!["getWeather".to_string()],
        }
    }
}

/// 渲染后的消息（IPC 返回前端）
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RenderedMessage {
    /// 消息 ID（列表渲染 key）
    pub id: String,
    pub role: MessageRole,
    /// 是否以用户气泡样式展示
    pub is_user: bool,
    /// 是否显示助手头像
    pub show_avatar: bool,
    /// Markdown 转换后的 HTML；文本为空时为 None
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_html: Option<String>,
    /// 工具调用块，顺序与 toolInvocations 一致
    pub blocks: Vec<InvocationBlock>,
    /// 是否为思考中占位消息
    pub pending: bool,
    /// 完整 HTML 片段，WebView 直接插入
    pub html: String,
}

/// 单个工具调用的渲染块
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum InvocationBlock {
    /// 图表
    Chart { key: String, chart: ChartView },
    /// 已返回结果但无需展示
    Resolved { key: String },
    /// 等待结果中
    Loading {
        key: String,
        label: String,
        skeleton: bool,
    },
}

impl RenderedMessage {
    fn with_html(mut self) -> Self {
        self.html = render_html(&self);
        self
    }
}

impl InvocationBlock {
    /// 块的稳定 key（即 toolCallId）
    pub fn key(&self) -> &str {
        match self {
            InvocationBlock::Chart { key, .. }
            | InvocationBlock::Resolved { key }
            | InvocationBlock::Loading { key, .. } => key,
        }
    }
}

/// 渲染单条消息
///
/// # 参数
/// - `message` - 显示消息
/// - `options` - 渲染选项（数据检索工具名称等）
pub fn render_message(message: &DisplayMessage, options: &RenderOptions) -> RenderedMessage {
    let content_html = if message.content.is_empty() {
        None
    } else {
        Some(render_markdown(&message.content))
    };

    let blocks = message
        .tool_invocations
        .iter()
        .map(|invocation| render_invocation(invocation, options))
        .collect();

    RenderedMessage {
        id: message.id.clone(),
        role: message.role,
        is_user: message.role == MessageRole::User,
        show_avatar: message.role == MessageRole::Assistant,
        content_html,
        blocks,
        pending: false,
        html: String::new(),
    }
    .with_html()
}

/// 批量渲染消息列表
pub fn render_messages(messages: &[DisplayMessage], options: &RenderOptions) -> Vec<RenderedMessage> {
    messages
        .iter()
        .map(|message| render_message(message, options))
        .collect()
}

/// 思考中占位消息（无状态）
pub fn thinking_message() -> RenderedMessage {
    RenderedMessage {
        id: THINKING_MESSAGE_ID.to_string(),
        role: MessageRole::Assistant,
        is_user: false,
        show_avatar: true,
        content_html: Some(format!("<p>{}</p>\n", THINKING_PLACEHOLDER)),
        blocks: Vec::new(),
        pending: true,
        html: String::new(),
    }
    .with_html()
}

/// 渲染单个工具调用
fn render_invocation(invocation: &ToolInvocation, options: &RenderOptions) -> InvocationBlock {
    let key = invocation.tool_call_id().to_string();
    match invocation {
        ToolInvocation::Call { tool_name, .. } => InvocationBlock::Loading {
            key,
            label: RETRIEVING_PLACEHOLDER.to_string(),
            skeleton: options.skeleton_tools.iter().any(|t| t == tool_name),
        },
        ToolInvocation::Result {
            tool_name,
            args,
            result,
            ..
        } => {
            if *tool_name != options.data_tool_name || !requests_chart(args) {
                return InvocationBlock::Resolved { key };
            }
            match chart_payload(result) {
                Some(payload) => InvocationBlock::Chart {
                    chart: chart::render_chart(&payload.query_result, &payload.config),
                    key,
                },
                None => InvocationBlock::Resolved { key },
            }
        }
    }
}

/// 调用参数中是否请求了图表可视化（`isChartVisualization` 为真值）
fn requests_chart(args: &Value) -> bool {
    match args.get("isChartVisualization") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
        Some(Value::Null) | None => false,
    }
}

/// 从工具结果中提取图表数据
///
/// 缺少 `queryResult` / `config` 或结构不符时返回 None（静默不渲染图表）。
fn chart_payload(result: &Value) -> Option<ChartPayload> {
    if result.get("queryResult").is_none() || result.get("config").is_none() {
        return None;
    }
    match ChartPayload::deserialize(result) {
        Ok(payload) => Some(payload),
        Err(e) => {
            log::debug!("工具结果不是有效的图表数据，已忽略: {}", e);
            None
        }
    }
}

/// Markdown → HTML
///
/// 原始 HTML 事件转换为文本，避免消息内容注入脚本。
pub fn render_markdown(content: &str) -> String {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_TABLES);
    opts.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(content, opts).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });

    let mut output = String::with_capacity(content.len() * 3 / 2);
    html::push_html(&mut output, parser);
    output
}

/// HTML 属性值转义
fn escape_attr(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    // 写入 String 不会失败
    let _ = escape_html(&mut out, text);
    out
}

/// 将渲染结果拼接为 HTML 片段
///
/// 结构：
/// ```html
/// <div class="message message-user" data-role="user" data-id="...">
///   <div class="message-body">
///     <div class="message-content">...markdown...</div>
///     <div class="message-tools">
///       <figure class="chart" data-key="..." data-chart='{...}'><h3>Title</h3></figure>
///       <pre class="tool-loading" data-key="...">Retrieving data...</pre>
///     </div>
///   </div>
/// </div>
/// ```
pub fn render_html(message: &RenderedMessage) -> String {
    let role = message.role.as_str();
    let mut classes = vec!["message".to_string(), format!("message-{}", role)];
    if message.pending {
        classes.push("message-pending".to_string());
    }

    let mut out = String::new();
    out.push_str(&format!(
        r#"<div class="{}" data-role="{}" data-id="{}">"#,
        classes.join(" "),
        role,
        escape_attr(&message.id)
    ));
    if message.show_avatar {
        out.push_str(r#"<div class="message-avatar" aria-hidden="true">✦</div>"#);
    }
    out.push_str(r#"<div class="message-body">"#);

    if let Some(content) = &message.content_html {
        out.push_str(r#"<div class="message-content">"#);
        out.push_str(content);
        out.push_str("</div>");
    }

    if !message.blocks.is_empty() {
        out.push_str(r#"<div class="message-tools">"#);
        for block in &message.blocks {
            out.push_str(&render_block_html(block));
        }
        out.push_str("</div>");
    }

    out.push_str("</div></div>");
    out
}

/// 单个工具调用块的 HTML
fn render_block_html(block: &InvocationBlock) -> String {
    let key = escape_attr(block.key());
    match block {
        InvocationBlock::Chart { chart, .. } => {
            let encoded = serde_json::to_string(chart).unwrap_or_else(|_| "null".to_string());
            format!(
                r#"<figure class="chart" data-key="{}" data-chart="{}"><h3 class="chart-title">{}</h3></figure>"#,
                key,
                escape_attr(&encoded),
                escape_attr(&chart.title)
            )
        }
        InvocationBlock::Resolved { .. } => format!(r#"<div data-key="{}"></div>"#, key),
        InvocationBlock::Loading { label, skeleton, .. } => {
            let class = if *skeleton {
                "tool-loading skeleton"
            } else {
                "tool-loading"
            };
            format!(
                r#"<pre class="{}" data-key="{}">{}</pre>"#,
                class,
                key,
                escape_attr(label)
            )
        }
    }
}
