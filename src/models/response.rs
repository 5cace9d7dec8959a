use serde::{Deserialize, Serialize};

use crate::models::taxonomy::FormulaType;

/// Batch 输出文件中的单行响应信封
///
/// 每行对应一个请求，外层是服务方包装的状态与响应体。
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(default)]
    pub custom_id: Option<String>,
    /// 缺省按 200 处理（与服务方输出格式保持一致）
    #[serde(default = "default_status_code")]
    pub status_code: u16,
    #[serde(default)]
    pub response: Option<ResponsePayload>,
}

fn default_status_code() -> u16 {
    200
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponsePayload {
    #[serde(default)]
    pub body: Option<ResponseBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseBody {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: Message,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    /// 模型返回的内容，本身是一段 JSON 编码的分类结果
    #[serde(default)]
    pub content: Option<String>,
}

impl ResponseEnvelope {
    /// 取出模型返回的内容字符串（第一个 choice）
    pub fn message_content(&self) -> Option<&str> {
        self.response
            .as_ref()?
            .body
            .as_ref()?
            .choices
            .first()?
            .message
            .content
            .as_deref()
    }
}

/// 单个序列的分类结果
///
/// 模型按约定返回的 JSON 结构；未知的 formula_type 在反序列化时已归入 other。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    #[serde(default)]
    pub sequence_id: String,
    #[serde(default)]
    pub extracted_formulas: Vec<ExtractedFormula>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedFormula {
    pub formula_text: String,
    pub formula_type: FormulaType,
    #[serde(default)]
    pub formula_latex: Option<String>,
    #[serde(default)]
    pub confidence: f64,
}
