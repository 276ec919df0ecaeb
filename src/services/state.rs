//! # 应用全局状态与聊天流程
//!
//! `AppState` 通过 Tauri 的 `manage()` 注册为应用状态，持有：
//! - 当前连接配置（`RwLock`，读多写少）
//! - 唯一的聊天会话（`Mutex`，只在同步代码段内加锁，绝不跨 `.await` 持有）
//!
//! 加载会话记录与发送消息两个流程也在这里编排，事件推送通过回调注入，
//! command 层只负责把回调接到 `tauri::ipc::Channel` 上。
//!
//! 回复进行中时拒绝切换连接配置和重新加载会话记录；流数据片段只应用到发起请求时的会话代次。

use std::sync::{Mutex, MutexGuard, RwLock};

use serde::Serialize;

use crate::models::display::DisplayMessage;
use crate::models::settings::ConnectionConfig;
use crate::services::client::ChatClient;
use crate::services::normalizer;
use crate::services::renderer::{self, RenderOptions, RenderedMessage};
use crate::services::session::{ChatSession, SessionStatus};
use crate::services::stream::StreamPart;

/// 发送消息过程中推送给前端的事件
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum StreamEvent {
    /// 会话状态变化
    Status(SessionStatus),
    /// 新增或更新的一条消息，按 id 替换前端列表中的同名消息
    Message(RenderedMessage),
    /// 回复结束后的完整消息列表
    Finished(Vec<RenderedMessage>),
}

/// 应用全局状态
pub struct AppState {
    config: RwLock<ConnectionConfig>,
    session: Mutex<ChatSession>,
    render_options: RenderOptions,
}

impl AppState {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config: RwLock::new(config),
            session: Mutex::new(ChatSession::new()),
            render_options: RenderOptions::default(),
        }
    }

    /// 当前连接配置的副本
    pub fn connection_config(&self) -> Result<ConnectionConfig, String> {
        self.config
            .read()
            .map(|config| config.clone())
            .map_err(|e| format!("读取连接配置锁失败: {}", e))
    }

    /// 替换连接配置（仅内存），并清空当前会话
    ///
    /// # 错误
    /// access token 不是合法请求头值、回复尚未结束或锁中毒时返回错误，原配置保持不变
    pub fn replace_connection_config(&self, config: ConnectionConfig) -> Result<(), String> {
        ChatClient::new(config.clone())?;

        // 加锁顺序：先会话，后配置
        let mut session = self.lock_session()?;
        if session.is_busy() {
            return Err("回复尚未结束，不能切换连接配置".to_string());
        }
        {
            let mut current = self
                .config
                .write()
                .map_err(|e| format!("写入连接配置锁失败: {}", e))?;
            *current = config;
        }
        session.reset();
        log::info!("连接配置已更新，会话已清空");
        Ok(())
    }

    /// 当前消息列表的副本
    pub fn messages(&self) -> Result<Vec<DisplayMessage>, String> {
        Ok(self.lock_session()?.messages().to_vec())
    }

    /// 渲染当前消息列表（等待回复时含思考中占位）
    pub fn render(&self) -> Result<Vec<RenderedMessage>, String> {
        Ok(self.lock_session()?.render(&self.render_options))
    }

    /// 当前会话状态
    pub fn status(&self) -> Result<SessionStatus, String> {
        Ok(self.lock_session()?.status().clone())
    }

    fn lock_session(&self) -> Result<MutexGuard<'_, ChatSession>, String> {
        self.session
            .lock()
            .map_err(|e| format!("获取会话锁失败: {}", e))
    }

    fn client(&self) -> Result<ChatClient, String> {
        ChatClient::new(self.connection_config()?)
    }

    /// 把一个流数据片段应用到指定代次的会话
    ///
    /// # 返回值
    /// 需要推送的事件；会话代次已变化时片段被丢弃，返回空列表
    fn apply_streamed_part(
        &self,
        generation: u64,
        part: StreamPart,
    ) -> Result<Vec<StreamEvent>, String> {
        let mut session = self.lock_session()?;
        if session.generation() != generation {
            log::debug!("会话已切换，丢弃旧回复的数据片段");
            return Ok(Vec::new());
        }

        let before = session.status().clone();
        let mut events = Vec::new();
        if let Some(message) = session.apply_part(part) {
            events.push(StreamEvent::Message(renderer::render_message(
                &message,
                &self.render_options,
            )));
        }
        if *session.status() != before {
            events.push(StreamEvent::Status(session.status().clone()));
        }
        Ok(events)
    }

    /// 结束一次回复：成功时回到 ready，失败时记录错误
    ///
    /// 会话代次已变化时不做任何修改，返回空列表。
    fn finish_turn(
        &self,
        generation: u64,
        result: &Result<usize, String>,
    ) -> Result<Vec<StreamEvent>, String> {
        let mut session = self.lock_session()?;
        if session.generation() != generation {
            return Ok(Vec::new());
        }
        match result {
            Ok(_) => session.finish(),
            Err(e) => session.fail(e.clone()),
        }
        Ok(vec![
            StreamEvent::Status(session.status().clone()),
            StreamEvent::Finished(session.render(&self.render_options)),
        ])
    }
}

/// 拉取会话记录并替换当前消息列表
///
/// # 返回值
/// 渲染后的完整消息列表
///
/// # 错误
/// 回复尚未结束、请求或响应解析失败、加载期间会话被切换时返回错误，此时当前消息列表保持不变
pub async fn load_transcript(state: &AppState) -> Result<Vec<RenderedMessage>, String> {
    let (client, generation) = {
        let session = state.lock_session()?;
        if session.is_busy() {
            return Err("回复尚未结束，不能重新加载会话记录".to_string());
        }
        (state.client()?, session.generation())
    };

    let values = client.fetch_transcript().await?;
    let records = normalizer::records_from_values(&values);

    let mut session = state.lock_session()?;
    if session.is_busy() || session.generation() != generation {
        return Err("加载期间会话已变更，已放弃本次加载结果".to_string());
    }
    let count = session.seed(&records);
    log::info!("会话记录归一化完成: {} 条记录 -> {} 条消息", values.len(), count);
    Ok(session.render(&state.render_options))
}

/// 发送一条用户消息并流式应用助手回复
///
/// # 参数
/// - `state` - 应用状态
/// - `text` - 用户输入
/// - `emit` - 事件回调，按发生顺序调用
///
/// # 返回值
/// 收到的流数据片段数量
///
/// # 错误
/// 上一条回复未结束、输入为空、请求失败或流中断时返回错误。
/// 请求失败时已收到的内容保留在会话中，状态记为 error。
pub async fn send_message(
    state: &AppState,
    text: &str,
    emit: impl Fn(StreamEvent),
) -> Result<usize, String> {
    let (client, generation, conversation, user_message) = {
        let mut session = state.lock_session()?;
        let client = state.client()?;
        let user_message = session.submit_user_message(text)?;
        (
            client,
            session.generation(),
            session.messages().to_vec(),
            user_message,
        )
    };

    emit(StreamEvent::Message(renderer::render_message(
        &user_message,
        &state.render_options,
    )));
    emit(StreamEvent::Message(renderer::thinking_message()));
    emit(StreamEvent::Status(SessionStatus::Submitted));

    let result = client
        .stream_chat(&conversation, |part| {
            match state.apply_streamed_part(generation, part) {
                Ok(events) => events.into_iter().for_each(&emit),
                Err(e) => log::error!("{}", e),
            }
        })
        .await;

    if let Err(e) = &result {
        log::error!("发送消息失败: {}", e);
    }
    state
        .finish_turn(generation, &result)?
        .into_iter()
        .for_each(&emit);

    result
}
