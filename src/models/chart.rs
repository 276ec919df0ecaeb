//! # 图表配置与图表视图数据模型
//!
//! - `ChartConfig` / `ChartPayload`：数据检索工具返回值中的声明式图表描述（输入）
//! - `ChartView` 及其子结构：图表子渲染器产出的视觉编码（输出，交给 WebView 中的图表库绘制）

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 图表类型
///
/// 服务端可能返回本应用不认识的类型字符串，统一落入 `Unknown`，渲染为空白图表框。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
    Area,
    Pie,
    #[serde(other)]
    Unknown,
}

/// 图表配置（工具结果中的 `config` 字段）
///
/// 对应工具约定：
/// ```typescript
/// interface ChartConfig {
///   type: "line" | "bar" | "area" | "pie";
///   title: string;
///   xKey: string;
///   yKeys: string[];
///   keyLabels?: Record<string, string>;
///   colors?: Record<string, string>;
///   legend?: boolean;
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartConfig {
    #[serde(rename = "type")]
    pub kind: ChartKind,
    #[serde(default)]
    pub title: String,
    pub x_key: String,
    pub y_keys: Vec<String>,
    /// 数据键 → 显示名称
    #[serde(default)]
    pub key_labels: HashMap<String, String>,
    /// 数据键 → 颜色（CSS 颜色字符串）
    #[serde(default)]
    pub colors: HashMap<String, String>,
    #[serde(default)]
    pub legend: bool,

    // ---- 以下字段随配置透传，渲染时不解释 ----
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub takeaway: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiple_lines: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_categories: Option<Vec<String>>,
}

impl ChartConfig {
    /// 数据键的显示名称：优先使用 `keyLabels`，否则为键本身
    pub fn label_for<'a>(&'a self, key: &'a str) -> &'a str {
        self.key_labels.get(key).map(String::as_str).unwrap_or(key)
    }
}

/// 一行表格数据
pub type ChartRow = Map<String, Value>;

/// 数据检索工具的图表结果：`{ queryResult, config }`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPayload {
    pub query_result: Vec<ChartRow>,
    pub config: ChartConfig,
}

/// 图表视图：图表子渲染器的输出
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartView {
    pub title: String,
    pub kind: ChartKind,
    pub legend: bool,
    pub body: ChartBody,
}

/// 图表主体
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "variant", rename_all = "camelCase")]
pub enum ChartBody {
    /// 数据行数不足以绘制（≤ 1 行），显示 "No Data"
    NoData,
    /// 未实现的图表类型：仅绘制空白图表框
    Empty,
    /// 折线图 / 柱状图
    Cartesian(CartesianChart),
    /// 饼图
    Pie(PieChart),
    /// 数据无法转换为数值时的单图表错误状态，不影响消息的其余部分
    Error { message: String },
}

/// 笛卡尔坐标系图表（折线 / 柱状）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartesianChart {
    /// X 轴数据键
    pub x_key: String,
    /// X 轴类目（与每个序列的数据点一一对应）
    pub categories: Vec<AxisCategory>,
    /// 数据序列，每个 yKey 一个
    pub series: Vec<Series>,
    /// Y 轴宽度（像素）
    pub y_axis_width: u32,
}

/// X 轴类目
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisCategory {
    /// 原始值
    pub value: Value,
    /// 刻度标签（日期类值格式化为 "Mon YYYY"）
    pub tick_label: String,
    /// 提示框标签（日期类值格式化为 "Month YYYY"）
    pub tooltip_label: String,
}

/// 单个数据序列
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    pub key: String,
    /// 图例 / 提示框中显示的名称
    pub label: String,
    pub color: String,
    pub points: Vec<SeriesPoint>,
}

/// 序列中的一个数据点
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPoint {
    /// 绘制用的值：折线图为解析后的数值，柱状图为原始值
    pub value: Value,
    /// 紧凑格式的显示文本（如 "1.2K"）
    pub formatted: String,
}

/// 饼图
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PieChart {
    /// 作为扇区大小的数据键（yKeys 的第一个）
    pub value_key: String,
    pub total: f64,
    pub slices: Vec<PieSlice>,
}

/// 饼图扇区
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PieSlice {
    pub name: String,
    pub value: f64,
    /// 占总量的比例（0.0 - 1.0）
    pub percent: f64,
    /// "{name}: {value} ({percent}%)"
    pub label: String,
    pub color: String,
}
