use serde::{Deserialize, Serialize};

/// 清洗后的序列记录
///
/// 由 Cleaner 从原始 .seq 文件生成，一个序列一个 JSON 文件，生成后不再修改。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub sequence_id: String,
    pub formulas: Vec<String>,
    pub formula_count: usize,
}

impl NormalizedRecord {
    pub fn new(sequence_id: impl Into<String>, formulas: Vec<String>) -> Self {
        let formula_count = formulas.len();
        Self {
            sequence_id: sequence_id.into(),
            formulas,
            formula_count,
        }
    }

    /// 记录是否可以打包为分类请求
    pub fn is_valid(&self) -> bool {
        !self.sequence_id.is_empty() && !self.formulas.is_empty()
    }
}

/// Batch API 的单条请求（JSONL 分片中的一行）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub custom_id: String,
    pub method: String,
    pub url: String,
    pub body: RequestBody,
}

/// 请求体（chat completion 参数）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestBody {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub response_format: ResponseFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
}

impl ResponseFormat {
    pub fn json_object() -> Self {
        Self {
            format_type: "json_object".to_string(),
        }
    }
}
