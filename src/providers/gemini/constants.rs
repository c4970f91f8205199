//! Gemini 配置常量

/// generateContent 接口的 API 版本路径
pub const GEMINI_API_VERSION: &str = "v1beta";

/// 要求上游返回 JSON
pub const RESPONSE_MIME_TYPE: &str = "application/json";

/// 响应 schema 中的字段，全部为必填字符串
pub const PROVOCATION_FIELDS: &[&str] = &["setup", "task"];

pub const SCHEMA_TYPE_OBJECT: &str = "OBJECT";
pub const SCHEMA_TYPE_STRING: &str = "STRING";
