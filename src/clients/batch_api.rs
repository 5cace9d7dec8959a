//! Batch API 抽象接口
//!
//! 远程批量推理服务的最小操作面：上传文件、创建任务、查询任务、下载文件内容。
//! 提交和下载流程只依赖这个 trait，便于在测试中替换为内存实现。

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::AppResult;

/// Batch 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Validating,
    InProgress,
    Finalizing,
    Completed,
    Failed,
    Expired,
    Cancelled,
}

impl BatchStatus {
    /// 任务是否仍在处理中
    pub fn is_running(self) -> bool {
        matches!(
            self,
            BatchStatus::Validating | BatchStatus::InProgress | BatchStatus::Finalizing
        )
    }

    /// 任务是否异常终止（不含 completed）
    pub fn is_terminal_failure(self) -> bool {
        matches!(
            self,
            BatchStatus::Failed | BatchStatus::Expired | BatchStatus::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Validating => "validating",
            BatchStatus::InProgress => "in_progress",
            BatchStatus::Finalizing => "finalizing",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
            BatchStatus::Expired => "expired",
            BatchStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 远程 Batch 任务的当前快照
///
/// 由服务方维护，本地只读；轮询获取，不做推送。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    pub id: String,
    pub status: BatchStatus,
    #[serde(default)]
    pub output_file_id: Option<String>,
    #[serde(default)]
    pub error_file_id: Option<String>,
}

/// 创建 Batch 任务的参数
#[derive(Debug, Clone, Serialize)]
pub struct CreateBatchRequest {
    pub input_file_id: String,
    pub endpoint: String,
    pub completion_window: String,
    pub metadata: BatchMetadata,
}

/// 任务的描述性元数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchMetadata {
    pub description: String,
    pub original_filename: String,
}

/// Batch API 客户端接口
pub trait BatchApi: Send + Sync {
    /// 上传一个分片文件，返回文件ID
    fn upload_file(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> impl Future<Output = AppResult<String>> + Send;

    /// 基于已上传的文件创建 Batch 任务，返回任务ID
    fn create_batch(
        &self,
        request: &CreateBatchRequest,
    ) -> impl Future<Output = AppResult<String>> + Send;

    /// 查询任务状态
    fn retrieve_batch(&self, batch_id: &str) -> impl Future<Output = AppResult<BatchJob>> + Send;

    /// 下载文件内容
    fn fetch_file_content(&self, file_id: &str)
        -> impl Future<Output = AppResult<Vec<u8>>> + Send;
}
