//! # 聊天 Tauri Commands
//!
//! - `load_transcript` - 拉取并归一化会话记录，返回渲染结果
//! - `get_messages` - 当前显示消息列表
//! - `render_messages` - 当前渲染结果（等待回复时含思考中占位）
//! - `get_session_status` - 当前会话状态
//! - `send_message` - 发送消息，通过 Channel 流式推送 `StreamEvent`

use tauri::ipc::Channel;
use tauri::State;

use crate::models::display::DisplayMessage;
use crate::services::renderer::RenderedMessage;
use crate::services::session::SessionStatus;
use crate::services::state::{self, AppState, StreamEvent};

/// 拉取会话记录并替换当前消息列表
///
/// # 错误
/// 网络错误、非 2xx 状态码或响应体格式不符时返回错误，当前消息列表不变
#[tauri::command]
pub async fn load_transcript(app_state: State<'_, AppState>) -> Result<Vec<RenderedMessage>, String> {
    state::load_transcript(&app_state).await
}

#[tauri::command]
pub fn get_messages(app_state: State<'_, AppState>) -> Result<Vec<DisplayMessage>, String> {
    app_state.messages()
}

#[tauri::command]
pub fn render_messages(app_state: State<'_, AppState>) -> Result<Vec<RenderedMessage>, String> {
    app_state.render()
}

#[tauri::command]
pub fn get_session_status(app_state: State<'_, AppState>) -> Result<SessionStatus, String> {
    app_state.status()
}

/// 发送一条用户消息
///
/// 用户消息、思考中占位、每条被更新的助手消息和状态变化依次推送到 `on_event`，
/// 结束时推送一次完整列表。
///
/// # 参数
/// - `text` - 用户输入
/// - `on_event` - 前端创建的事件通道
///
/// # 返回值
/// 收到的流数据片段数量
#[tauri::command]
pub async fn send_message(
    text: String,
    on_event: Channel<StreamEvent>,
    app_state: State<'_, AppState>,
) -> Result<usize, String> {
    state::send_message(&app_state, &text, |event| {
        if let Err(e) = on_event.send(event) {
            log::warn!("推送聊天事件失败: {}", e);
        }
    })
    .await
}
