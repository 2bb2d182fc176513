//! LLM 输出的 JSON 清理与解析
//!
//! 模型经常把 JSON 包在 ```json 代码块里，或者包一层 `{"questions": [...]}`，这里统一处理。

use regex::Regex;
use serde_json::Value as JsonValue;

/// 去掉 Markdown 代码块标记和首尾空白
pub fn clean_json_text(text: &str) -> String {
    match Regex::new(r"```(?:json|JSON)?") {
        Ok(re) => re.replace_all(text, "").trim().to_string(),
        Err(_) => text.replace("```json", "").replace("```", "").trim().to_string(),
    }
}

/// 解析顶层 JSON 数组
///
/// 允许模型返回只包含一个数组字段的对象（例如 `{"questions": [...]}`）。
/// 失败时返回用于诊断的错误描述。
pub fn parse_json_array(text: &str) -> Result<Vec<JsonValue>, String> {
    let cleaned = clean_json_text(text);
    let value: JsonValue = serde_json::from_str(&cleaned).map_err(|e| e.to_string())?;

    match value {
        JsonValue::Array(items) => Ok(items),
        JsonValue::Object(map) => {
            let mut arrays = map.into_iter().filter_map(|(_, v)| match v {
                JsonValue::Array(items) => Some(items),
                _ => None,
            });
            match (arrays.next(), arrays.next()) {
                (Some(items), None) => Ok(items),
                _ => Err("返回的对象中没有唯一的数组字段".to_string()),
            }
        }
        other => Err(format!("期望 JSON 数组，实际为: {}", type_name(&other))),
    }
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
