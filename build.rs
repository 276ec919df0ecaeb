//! # Chart Chat Viewer - Tauri Cargo 构建脚本
//!
//! 启用 `desktop` feature 时，在编译主项目之前执行 Tauri 的构建准备工作：
//! - 生成 Tauri 运行时所需的资源绑定代码
//! - 处理应用图标、权限清单等静态资源
//!
//! 未启用 `desktop` 时仅编译核心库，构建脚本不做任何事。

/// 构建脚本入口函数
///
/// 调用 `tauri_build::build()`，根据 `tauri.conf.json` 生成相应的编译产物。
fn main() {
    #[cfg(feature = "desktop")]
    tauri_build::build()
}
