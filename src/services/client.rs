//! # 远端聊天接口客户端
//!
//! 封装对聊天接口的两类请求：
//! - `fetch_transcript` - `GET {url}`，拉取已存储的完整会话记录
//! - `stream_chat` - `POST {url}`，发送当前对话并流式接收助手回复
//!
//! 两者共用同一个地址和 `x-access-token` 请求头，均来自 `ConnectionConfig`。
//! 不设置超时与重试：请求失败时直接返回错误，由调用方决定如何展示。

use reqwest::header::{HeaderMap, HeaderValue};
use serde::Serialize;
use serde_json::Value;

use crate::models::display::DisplayMessage;
use crate::models::record::TranscriptResponse;
use crate::models::settings::ConnectionConfig;
use crate::services::stream::{self, StreamPart};

/// 鉴权请求头名称
pub const ACCESS_TOKEN_HEADER: &str = "x-access-token";

/// 聊天请求体：`{ id, messages }`
#[derive(Serialize)]
struct ChatRequest<'a> {
    id: &'a str,
    messages: &'a [DisplayMessage],
}

/// 聊天接口客户端
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    config: ConnectionConfig,
}

impl ChatClient {
    /// 以给定连接配置创建客户端
    ///
    /// # 错误
    /// access token 含有非法请求头字符，或底层 HTTP 客户端初始化失败时返回错误
    pub fn new(config: ConnectionConfig) -> Result<Self, String> {
        let mut headers = HeaderMap::new();
        let token = HeaderValue::from_str(&config.access_token)
            .map_err(|e| format!("access token 不是合法的请求头值: {}", e))?;
        headers.insert(ACCESS_TOKEN_HEADER, token);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| format!("创建 HTTP 客户端失败: {}", e))?;

        Ok(Self { http, config })
    }

    /// 当前连接配置
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// 拉取会话记录
    ///
    /// # 返回值
    /// 响应体 `data` 字段中的原始记录（由 normalizer 负责宽松解码）
    ///
    /// # 错误
    /// 网络错误、非 2xx 状态码或响应体不是 `{ data: [...] }` 时返回错误
    pub async fn fetch_transcript(&self) -> Result<Vec<Value>, String> {
        let url = self.config.messages_url();
        log::info!("拉取会话记录: {}", url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("请求会话记录失败: {}", e))?
            .error_for_status()
            .map_err(|e| format!("会话记录接口返回错误: {}", e))?;

        let body: TranscriptResponse = response
            .json()
            .await
            .map_err(|e| format!("解析会话记录响应失败: {}", e))?;

        log::info!("已拉取 {} 条会话记录", body.data.len());
        Ok(body.data)
    }

    /// 发送对话并流式接收回复
    ///
    /// # 参数
    /// - `messages` - 包含最新用户消息在内的完整对话
    /// - `on_part` - 每收到一个数据片段回调一次
    ///
    /// # 返回值
    /// 收到的数据片段数量
    ///
    /// # 错误
    /// 网络错误、非 2xx 状态码或流中途中断时返回错误
    pub async fn stream_chat(
        &self,
        messages: &[DisplayMessage],
        on_part: impl FnMut(StreamPart),
    ) -> Result<usize, String> {
        let url = self.config.messages_url();
        let request = ChatRequest {
            id: &self.config.chat_id,
            messages,
        };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("发送聊天请求失败: {}", e))?
            .error_for_status()
            .map_err(|e| format!("聊天接口返回错误: {}", e))?;

        let count = stream::read_parts(Box::pin(response.bytes_stream()), on_part).await?;
        log::debug!("聊天响应流结束，共 {} 个数据片段", count);
        Ok(count)
    }
}
