//! # Chart Chat Viewer - 应用核心初始化模块
//!
//! 本模块负责 Tauri 应用的完整初始化流程，包括：
//! - 加载连接配置并初始化应用全局状态（`AppState`）
//! - 注册自定义 Tauri commands（会话加载、消息渲染、流式发送、连接配置）
//! - 在调试构建中注册日志插件
//!
//! ## 架构说明
//! 通过将核心逻辑放在 `lib.rs` 而非 `main.rs` 中，
//! Tauri 可以在桌面端（`main.rs`）和移动端入口之间共享此初始化代码。
//! 桌面壳位于 `desktop` feature 之后；不启用时本库只包含纯逻辑部分，可在无 GUI 环境下编译测试。
//!
//! ## 模块结构
//! - `commands/` - Tauri command 处理函数（IPC 接口层，仅 `desktop`）
//! - `models/` - 数据模型（对应前端 TypeScript 类型）
//! - `services/` - 核心业务逻辑（归一化、图表编码、渲染、流式客户端）
//! - `utils/` - 通用工具函数

#[cfg(feature = "desktop")]
mod commands;
pub mod models;
pub mod services;
pub mod utils;

#[cfg(feature = "desktop")]
use tauri::Manager;

#[cfg(feature = "desktop")]
use services::state::AppState;

// 当目标平台为移动端（Android/iOS）时，此属性将 `run()` 函数标记为 Tauri 移动端入口点。
// 在桌面端编译时，此属性不生效，`run()` 由 `main.rs` 直接调用。
#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
/// Tauri 应用启动函数
///
/// 1. 创建 `tauri::Builder` 默认实例
/// 2. 注册所有自定义 Tauri commands
/// 3. 在 `setup` 钩子中按需注册日志插件，加载 `connection.json` 并注册 `AppState`
/// 4. 生成应用上下文并启动主事件循环
///
/// # Panics
/// 如果 Tauri 应用启动失败（例如配置文件缺失或窗口创建失败），
/// 将通过 `.expect()` 触发 panic 并输出错误信息。
pub fn run() {
    tauri::Builder::default()
        .invoke_handler(tauri::generate_handler![
            // 会话与消息 commands
            commands::chat::load_transcript,
            commands::chat::get_messages,
            commands::chat::render_messages,
            commands::chat::get_session_status,
            commands::chat::send_message,
            // 连接配置 commands
            commands::settings::read_connection_config,
            commands::settings::update_connection_config,
            commands::settings::get_config_path,
        ])
        .setup(|app| {
            // 仅在开发调试模式下启用日志插件
            if cfg!(debug_assertions) {
                app.handle().plugin(
                    tauri_plugin_log::Builder::default()
                        .level(log::LevelFilter::Info)
                        .build(),
                )?;
            }

            // 配置缺失或损坏时回退到默认值，不阻止启动
            let config =
                tauri::async_runtime::block_on(services::config::load_connection_config());
            log::info!("聊天接口地址: {}", config.messages_url());
            app.manage(AppState::new(config));
            Ok(())
        })
        // 编译时读取 `tauri.conf.json`，生成应用名称、窗口配置、安全策略等上下文
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
