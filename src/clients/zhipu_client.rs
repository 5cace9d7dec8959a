/// 智谱AI Batch API 客户端
///
/// 封装所有与远程 Batch 服务相关的 HTTP 调用逻辑
use reqwest::multipart;
use serde_json::Value;
use tracing::debug;

use crate::clients::batch_api::{BatchApi, BatchJob, CreateBatchRequest};
use crate::config::Config;
use crate::error::{AppError, AppResult};

/// 基于 reqwest 的 Batch API 客户端
pub struct ZhipuBatchClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ZhipuBatchClient {
    /// 创建新的 Batch 客户端
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// 检查响应状态，错误响应转换为 ApiError::BadResponse
    async fn check_status(
        endpoint: &str,
        response: reqwest::Response,
    ) -> AppResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.ok();
        Err(AppError::api_bad_response(
            endpoint,
            Some(status.as_u16()),
            message,
        ))
    }

    /// 从 JSON 响应体中取出字符串字段
    fn extract_str(endpoint: &str, value: &Value, field: &'static str) -> AppResult<String> {
        value
            .get(field)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| AppError::api_missing_field(endpoint, field))
    }
}

impl BatchApi for ZhipuBatchClient {
    async fn upload_file(&self, file_name: &str, bytes: Vec<u8>) -> AppResult<String> {
        let endpoint = "files";
        debug!("上传分片文件: {} ({} 字节)", file_name, bytes.len());

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/jsonl")
            .map_err(|e| AppError::api_request_failed(endpoint, e))?;
        let form = multipart::Form::new()
            .text("purpose", "batch")
            .part("file", part);

        let response = self
            .client
            .post(self.url(endpoint))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint, e))?;

        let response = Self::check_status(endpoint, response).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint, e))?;

        Self::extract_str(endpoint, &body, "id")
    }

    async fn create_batch(&self, request: &CreateBatchRequest) -> AppResult<String> {
        let endpoint = "batches";
        debug!("创建 Batch 任务: 输入文件 {}", request.input_file_id);

        let response = self
            .client
            .post(self.url(endpoint))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint, e))?;

        let response = Self::check_status(endpoint, response).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint, e))?;

        Self::extract_str(endpoint, &body, "id")
    }

    async fn retrieve_batch(&self, batch_id: &str) -> AppResult<BatchJob> {
        let endpoint = format!("batches/{}", batch_id);

        let response = self
            .client
            .get(self.url(&endpoint))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(&endpoint, e))?;

        let response = Self::check_status(&endpoint, response).await?;
        let job: BatchJob = response
            .json()
            .await
            .map_err(|e| AppError::api_request_failed(&endpoint, e))?;

        Ok(job)
    }

    async fn fetch_file_content(&self, file_id: &str) -> AppResult<Vec<u8>> {
        let endpoint = format!("files/{}/content", file_id);

        let response = self
            .client
            .get(self.url(&endpoint))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(&endpoint, e))?;

        let response = Self::check_status(&endpoint, response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::api_request_failed(&endpoint, e))?;

        Ok(bytes.to_vec())
    }
}
