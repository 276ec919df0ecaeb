//! # 图表子渲染器
//!
//! 将数据检索工具返回的表格数据（`queryResult`）和声明式图表配置（`config`）
//! 转换为 `ChartView` 视觉编码，由 WebView 中的图表库负责实际绘制。
//!
//! ## 各类型的编码规则
//! - **line**：每个 yKey 一条折线；数值先剔除 `[0-9.-]` 以外的字符再解析（兼容 "$1,234"、"12%"）；
//!   日期类 X 值（含 `-` 的字符串）刻度格式化为 "Mon YYYY"
//! - **bar**：每个 yKey 一组柱子，数值原样透传
//! - **pie**：仅使用第一个 yKey；每行一个扇区，标签含紧凑数值和一位小数的百分比；
//!   颜色按行号对 15 色调色板取模
//! - **area / 未知类型**：空白图表框
//!
//! 数据行数 ≤ 1 时不绘制，显示 "No Data"。
//! 数值解析失败时返回该图表的 `ChartBody::Error`，不影响同一消息中的其他内容。

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::Value;

use crate::models::chart::{
    AxisCategory, CartesianChart, ChartBody, ChartConfig, ChartKind, ChartRow, ChartView,
    PieChart, PieSlice, Series, SeriesPoint,
};

/// 固定调色板（15 色）
pub const PALETTE: [&str; 15] = [
    "#0088FE", "#00C49F", "#FFBB28", "#FF8042", "#AF19FF", "#FF6F61", "#6A0572", "#FFC300",
    "#8338EC", "#3A86FF", "#FFD700", "#FF5733", "#C70039", "#900C3F", "#581845",
];

/// 序列默认颜色数量：使用调色板第 1-5 号颜色循环
const SERIES_COLOR_COUNT: usize = 5;

/// Y 轴宽度（像素）
const Y_AXIS_WIDTH: u32 = 80;

/// 匹配所有非数值字符（数字、小数点、负号以外）
static NON_NUMERIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9.-]+").unwrap());

/// 匹配字符串开头的十进制浮点数前缀
static FLOAT_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").unwrap()
});

/// 按位置取调色板颜色
pub fn palette_color(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

/// 序列的颜色：配置中指定的颜色优先，否则按序号使用默认颜色
fn series_color(config: &ChartConfig, key: &str, index: usize) -> String {
    config
        .colors
        .get(key)
        .cloned()
        .unwrap_or_else(|| palette_color(index % SERIES_COLOR_COUNT + 1).to_string())
}

/// 解析字符串开头的浮点数前缀
///
/// 前导空白被忽略；"12.5kg" → 12.5，"abc" → None。
pub fn parse_float_prefix(text: &str) -> Option<f64> {
    let trimmed = text.trim_start();
    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    if unsigned.starts_with("Infinity") {
        return Some(if negative {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }
    FLOAT_PREFIX_RE
        .find(trimmed)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// 剔除非数值字符后解析（折线图的数值转换规则）
///
/// "$1,234" → 1234，"12.5%" → 12.5；数字类型直接使用。
pub fn parse_stripped_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned = NON_NUMERIC_RE.replace_all(s, "");
            parse_float_prefix(&cleaned)
        }
        _ => None,
    }
}

/// 宽松数值转换：字符串取浮点前缀，数字直接使用
fn loose_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_float_prefix(s),
        _ => None,
    }
}

/// en-US 紧凑数值格式："1.2K"、"12K"、"3.4M"、"999"
///
/// 规则：缩放后整数部分为一位时保留两位有效数字，否则取整；
/// 取整进位到 1000 时升到下一个单位（999999 → "1M"）。
pub fn format_compact(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "∞" } else { "-∞" }.to_string();
    }

    const UNITS: [&str; 5] = ["", "K", "M", "B", "T"];

    let sign = if value < 0.0 { "-" } else { "" };
    let abs = value.abs();

    let mut unit = 0usize;
    let mut scaled = abs;
    while scaled >= 1000.0 && unit < UNITS.len() - 1 {
        scaled /= 1000.0;
        unit += 1;
    }

    let mut rounded = round_compact(scaled);
    if rounded >= 1000.0 && unit < UNITS.len() - 1 {
        unit += 1;
        rounded = round_compact(rounded / 1000.0);
    }

    format!("{}{}{}", sign, rounded, UNITS[unit])
}

/// 紧凑格式的取整规则
fn round_compact(x: f64) -> f64 {
    if x == 0.0 {
        return 0.0;
    }
    if x >= 10.0 {
        return x.round();
    }
    // 两位有效数字
    let magnitude = x.log10().floor() as i32;
    let factor = 10f64.powi(1 - magnitude);
    (x * factor).round() / factor
}

/// 任意 JSON 值的紧凑数值文本（字符串按浮点前缀解析，无法解析时为 "NaN"）
pub fn format_value(value: &Value) -> String {
    format_compact(loose_number(value).unwrap_or(f64::NAN))
}

/// JSON 值的纯文本形式：字符串不带引号，null 为空
fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// 解析日期类字符串
///
/// 支持 "2024-01-15"、"2024-01"、RFC 3339 以及不带时区的日期时间。
fn parse_date_like(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{}-01", text), "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|dt| dt.date())
}

/// X 轴日期标签
///
/// 含 `-` 且能解析为日期的字符串格式化为 "Jan 2024"（`long` 为 true 时为 "January 2024"），
/// 其他值保持原样。
pub fn format_date_label(value: &Value, long: bool) -> String {
    if let Value::String(s) = value {
        if s.contains('-') {
            if let Some(date) = parse_date_like(s) {
                let pattern = if long { "%B %Y" } else { "%b %Y" };
                return date.format(pattern).to_string();
            }
        }
    }
    plain_text(value)
}

/// 图表渲染入口
///
/// # 参数
/// - `rows` - 表格数据（`queryResult`）
/// - `config` - 图表配置
///
/// # 返回值
/// 图表视图；数据不足时 body 为 `NoData`，数值无法解析时 body 为 `Error`
pub fn render_chart(rows: &[ChartRow], config: &ChartConfig) -> ChartView {
    let body = if rows.len() <= 1 {
        ChartBody::NoData
    } else {
        let encoded = match config.kind {
            ChartKind::Line => encode_line(rows, config),
            ChartKind::Bar => Ok(encode_bar(rows, config)),
            ChartKind::Pie => encode_pie(rows, config),
            ChartKind::Area | ChartKind::Unknown => Ok(ChartBody::Empty),
        };
        encoded.unwrap_or_else(|message| {
            log::warn!("图表 \"{}\" 渲染失败: {}", config.title, message);
            ChartBody::Error { message }
        })
    };

    ChartView {
        title: config.title.clone(),
        kind: config.kind,
        legend: config.legend,
        body,
    }
}

/// 折线图编码：数值清洗 + 日期刻度
fn encode_line(rows: &[ChartRow], config: &ChartConfig) -> Result<ChartBody, String> {
    let categories = rows
        .iter()
        .map(|row| {
            let value = row.get(&config.x_key).cloned().unwrap_or(Value::Null);
            AxisCategory {
                tick_label: format_date_label(&value, false),
                tooltip_label: format_date_label(&value, true),
                value,
            }
        })
        .collect();

    let mut series = Vec::with_capacity(config.y_keys.len());
    for (index, key) in config.y_keys.iter().enumerate() {
        let mut points = Vec::with_capacity(rows.len());
        for (row_index, row) in rows.iter().enumerate() {
            let raw = row.get(key).unwrap_or(&Value::Null);
            let number = parse_stripped_number(raw)
                .filter(|n| !n.is_nan())
                .ok_or_else(|| {
                    format!("第 {} 行的 {} 无法解析为数值: {}", row_index + 1, key, raw)
                })?;
            points.push(SeriesPoint {
                value: number_value(number),
                formatted: format_compact(number),
            });
        }
        series.push(Series {
            key: key.clone(),
            label: config.label_for(key).to_string(),
            color: series_color(config, key, index),
            points,
        });
    }

    Ok(ChartBody::Cartesian(CartesianChart {
        x_key: config.x_key.clone(),
        categories,
        series,
        y_axis_width: Y_AXIS_WIDTH,
    }))
}

/// 柱状图编码：数值原样透传
fn encode_bar(rows: &[ChartRow], config: &ChartConfig) -> ChartBody {
    let categories = rows
        .iter()
        .map(|row| {
            let value = row.get(&config.x_key).cloned().unwrap_or(Value::Null);
            let label = plain_text(&value);
            AxisCategory {
                tick_label: label.clone(),
                tooltip_label: label,
                value,
            }
        })
        .collect();

    let series = config
        .y_keys
        .iter()
        .enumerate()
        .map(|(index, key)| Series {
            key: key.clone(),
            label: config.label_for(key).to_string(),
            color: series_color(config, key, index),
            points: rows
                .iter()
                .map(|row| {
                    let value = row.get(key).cloned().unwrap_or(Value::Null);
                    SeriesPoint {
                        formatted: format_value(&value),
                        value,
                    }
                })
                .collect(),
        })
        .collect();

    ChartBody::Cartesian(CartesianChart {
        x_key: config.x_key.clone(),
        categories,
        series,
        y_axis_width: Y_AXIS_WIDTH,
    })
}

/// 饼图编码：第一个 yKey 作为扇区大小
fn encode_pie(rows: &[ChartRow], config: &ChartConfig) -> Result<ChartBody, String> {
    let value_key = config
        .y_keys
        .first()
        .ok_or_else(|| "饼图配置缺少 yKeys".to_string())?;

    let mut entries = Vec::with_capacity(rows.len());
    for (row_index, row) in rows.iter().enumerate() {
        let raw = row.get(value_key).unwrap_or(&Value::Null);
        let value = loose_number(raw)
            .filter(|n| n.is_finite())
            .ok_or_else(|| {
                format!("第 {} 行的 {} 无法解析为数值: {}", row_index + 1, value_key, raw)
            })?;
        let name = plain_text(row.get(&config.x_key).unwrap_or(&Value::Null));
        entries.push((name, value));
    }

    let total: f64 = entries.iter().map(|(_, v)| v).sum();
    let slices = entries
        .into_iter()
        .enumerate()
        .map(|(index, (name, value))| {
            let percent = if total == 0.0 { 0.0 } else { value / total };
            PieSlice {
                label: format!(
                    "{}: {} ({:.1}%)",
                    name,
                    format_compact(value),
                    percent * 100.0
                ),
                name,
                value,
                percent,
                color: palette_color(index).to_string(),
            }
        })
        .collect();

    Ok(ChartBody::Pie(PieChart {
        value_key: value_key.clone(),
        total,
        slices,
    }))
}

/// f64 → JSON 数字（非有限值无法表示为 JSON 数字，退化为 null）
fn number_value(n: f64) -> Value {
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(value: Value) -> Vec<ChartRow> {
        serde_json::from_value(value).unwrap()
    }

    fn config(value: Value) -> ChartConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_stripped_number() {
        assert_eq!(parse_stripped_number(&json!("$1,234")), Some(1234.0));
        assert_eq!(parse_stripped_number(&json!("12.5%")), Some(12.5));
        assert_eq!(parse_stripped_number(&json!("-3.2 USD")), Some(-3.2));
        assert_eq!(parse_stripped_number(&json!(42)), Some(42.0));
        assert_eq!(parse_stripped_number(&json!("n/a")), None);
        assert_eq!(parse_stripped_number(&json!(null)), None);
    }

    #[test]
    fn test_parse_float_prefix() {
        assert_eq!(parse_float_prefix("  12.5kg"), Some(12.5));
        assert_eq!(parse_float_prefix(".5"), Some(0.5));
        assert_eq!(parse_float_prefix("1e3x"), Some(1000.0));
        assert_eq!(parse_float_prefix("abc"), None);
        assert_eq!(parse_float_prefix("-Infinity"), Some(f64::NEG_INFINITY));
    }

    #[test]
    fn test_format_compact() {
        assert_eq!(format_compact(0.0), "0");
        assert_eq!(format_compact(999.0), "999");
        assert_eq!(format_compact(1234.0), "1.2K");
        assert_eq!(format_compact(12345.0), "12K");
        assert_eq!(format_compact(123456.0), "123K");
        assert_eq!(format_compact(1_500_000.0), "1.5M");
        assert_eq!(format_compact(999_999.0), "1M");
        assert_eq!(format_compact(2_000_000_000.0), "2B");
        assert_eq!(format_compact(-1234.0), "-1.2K");
        assert_eq!(format_compact(1.25), "1.3");
        assert_eq!(format_compact(0.123), "0.12");
        assert_eq!(format_compact(f64::NAN), "NaN");
    }

    #[test]
    fn test_format_date_label() {
        assert_eq!(format_date_label(&json!("2024-01-15"), false), "Jan 2024");
        assert_eq!(format_date_label(&json!("2024-03"), true), "March 2024");
        assert_eq!(
            format_date_label(&json!("2023-11-02T10:00:00Z"), false),
            "Nov 2023"
        );
        // 不含 "-" 或无法解析的值保持原样
        assert_eq!(format_date_label(&json!("Q1"), false), "Q1");
        assert_eq!(format_date_label(&json!("north-east"), false), "north-east");
        assert_eq!(format_date_label(&json!(2024), false), "2024");
    }

    #[test]
    fn test_single_row_renders_no_data() {
        let view = render_chart(
            &rows(json!([{ "month": "2024-01", "v": "1" }])),
            &config(json!({ "type": "line", "title": "T", "xKey": "month", "yKeys": ["v"] })),
        );
        assert_eq!(view.body, ChartBody::NoData);
        assert_eq!(view.title, "T");

        let view = render_chart(
            &[],
            &config(json!({ "type": "pie", "xKey": "x", "yKeys": ["v"] })),
        );
        assert_eq!(view.body, ChartBody::NoData);
    }

    #[test]
    fn test_line_chart_encoding() {
        let view = render_chart(
            &rows(json!([
                { "month": "2024-01-01", "revenue": "$1,234", "cost": "500" },
                { "month": "2024-02-01", "revenue": "$2,500,000", "cost": "750.5" }
            ])),
            &config(json!({
                "type": "line",
                "title": "Revenue",
                "xKey": "month",
                "yKeys": ["revenue", "cost"],
                "keyLabels": { "revenue": "Revenue" },
                "colors": { "cost": "#123456" },
                "legend": true
            })),
        );
        assert!(view.legend);

        let ChartBody::Cartesian(chart) = view.body else {
            panic!("应为笛卡尔图表");
        };
        assert_eq!(chart.categories[0].tick_label, "Jan 2024");
        assert_eq!(chart.categories[1].tooltip_label, "February 2024");
        assert_eq!(chart.series.len(), 2);

        let revenue = &chart.series[0];
        assert_eq!(revenue.label, "Revenue");
        assert_eq!(revenue.color, PALETTE[1]);
        assert_eq!(revenue.points[0].value, json!(1234.0));
        assert_eq!(revenue.points[0].formatted, "1.2K");
        assert_eq!(revenue.points[1].formatted, "2.5M");

        let cost = &chart.series[1];
        assert_eq!(cost.label, "cost");
        assert_eq!(cost.color, "#123456");
        assert_eq!(cost.points[1].value, json!(750.5));
    }

    #[test]
    fn test_line_chart_unparseable_value_is_chart_error() {
        let view = render_chart(
            &rows(json!([
                { "month": "Jan", "v": "10" },
                { "month": "Feb", "v": "n/a" }
            ])),
            &config(json!({ "type": "line", "xKey": "month", "yKeys": ["v"] })),
        );
        assert!(matches!(view.body, ChartBody::Error { ref message } if message.contains("第 2 行")));
    }

    #[test]
    fn test_bar_chart_passes_values_through() {
        let view = render_chart(
            &rows(json!([
                { "region": "North", "sales": 1500 },
                { "region": "South", "sales": "2500" }
            ])),
            &config(json!({ "type": "bar", "xKey": "region", "yKeys": ["sales"] })),
        );
        let ChartBody::Cartesian(chart) = view.body else {
            panic!("应为笛卡尔图表");
        };
        assert_eq!(chart.categories[1].tick_label, "South");
        assert_eq!(chart.series[0].points[0].value, json!(1500));
        assert_eq!(chart.series[0].points[1].value, json!("2500"));
        assert_eq!(chart.series[0].points[1].formatted, "2.5K");
    }

    #[test]
    fn test_pie_chart_percentages() {
        let view = render_chart(
            &rows(json!([
                { "cat": "A", "v": "10" },
                { "cat": "A", "v": "30" }
            ])),
            &config(json!({ "type": "pie", "xKey": "cat", "yKeys": ["v"] })),
        );
        let ChartBody::Pie(pie) = view.body else {
            panic!("应为饼图");
        };
        assert_eq!(pie.total, 40.0);
        assert_eq!(pie.slices[0].label, "A: 10 (25.0%)");
        assert_eq!(pie.slices[1].label, "A: 30 (75.0%)");
        assert_eq!(pie.slices[0].color, PALETTE[0]);
        assert_eq!(pie.slices[1].color, PALETTE[1]);
    }

    #[test]
    fn test_pie_colors_wrap_around_palette() {
        let data: Vec<Value> = (0..17).map(|i| json!({ "k": format!("s{}", i), "v": 1 })).collect();
        let view = render_chart(
            &rows(Value::Array(data)),
            &config(json!({ "type": "pie", "xKey": "k", "yKeys": ["v"] })),
        );
        let ChartBody::Pie(pie) = view.body else {
            panic!("应为饼图");
        };
        assert_eq!(pie.slices[15].color, PALETTE[0]);
        assert_eq!(pie.slices[16].color, PALETTE[1]);
    }

    #[test]
    fn test_area_and_unknown_render_empty_frame() {
        let data = rows(json!([{ "x": 1, "y": 1 }, { "x": 2, "y": 2 }]));
        for kind in ["area", "scatter"] {
            let view = render_chart(
                &data,
                &config(json!({ "type": kind, "xKey": "x", "yKeys": ["y"] })),
            );
            assert_eq!(view.body, ChartBody::Empty);
        }
    }
}
