//! Gemini generateContent 请求体

use serde::Serialize;
use std::collections::BTreeMap;

use super::constants::{
    PROVOCATION_FIELDS, RESPONSE_MIME_TYPE, SCHEMA_TYPE_OBJECT, SCHEMA_TYPE_STRING,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

impl Content {
    fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![Part { text: text.into() }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaProperty {
    #[serde(rename = "type")]
    pub schema_type: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseSchema {
    #[serde(rename = "type")]
    pub schema_type: &'static str,
    pub properties: BTreeMap<&'static str, SchemaProperty>,
    pub required: Vec<&'static str>,
}

impl ResponseSchema {
    /// `{ setup: STRING, task: STRING }`，两个字段都必填
    fn provocation() -> Self {
        let properties = PROVOCATION_FIELDS
            .iter()
            .map(|field| {
                (
                    *field,
                    SchemaProperty {
                        schema_type: SCHEMA_TYPE_STRING,
                    },
                )
            })
            .collect();

        Self {
            schema_type: SCHEMA_TYPE_OBJECT,
            properties,
            required: PROVOCATION_FIELDS.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: &'static str,
    pub response_schema: ResponseSchema,
}

/// 发送给上游的固定结构请求体
///
/// user prompt 作为唯一的 content part，system prompt 放在 systemInstruction 中，
/// generationConfig 约束上游返回 `setup` / `task` 对象
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamPayload {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
    pub system_instruction: Content,
}

impl UpstreamPayload {
    pub fn provocation(system_prompt: &str, user_prompt: &str) -> Self {
        Self {
            contents: vec![Content::text(user_prompt)],
            generation_config: GenerationConfig {
                response_mime_type: RESPONSE_MIME_TYPE,
                response_schema: ResponseSchema::provocation(),
            },
            system_instruction: Content::text(system_prompt),
        }
    }
}
