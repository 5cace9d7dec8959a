//! 内存版 Batch API 实现
//!
//! 不走网络，把上传的文件和创建的任务保存在内存中。
//! 用于测试和干跑（dry-run）；任务状态由调用方显式推进。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::clients::batch_api::{BatchApi, BatchJob, BatchStatus, CreateBatchRequest};
use crate::error::{AppError, AppResult};

#[derive(Default)]
struct Inner {
    /// file_id -> (文件名, 内容)
    files: HashMap<String, (String, Vec<u8>)>,
    /// batch_id -> 任务快照
    batches: HashMap<String, BatchJob>,
    /// batch_id -> 创建请求（供断言检查）
    create_requests: HashMap<String, CreateBatchRequest>,
    next_file_id: u64,
    next_batch_id: u64,
}

/// 内存版 Batch API 客户端
#[derive(Default)]
pub struct InMemoryBatchClient {
    inner: Mutex<Inner>,
    /// 接下来的 N 次上传返回失败（模拟瞬时网络错误）
    upload_failures: AtomicU32,
    /// 接下来的 N 次任务创建返回失败
    create_failures: AtomicU32,
}

impl InMemoryBatchClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 让接下来的 n 次上传失败
    pub fn fail_next_uploads(&self, n: u32) {
        self.upload_failures.store(n, Ordering::SeqCst);
    }

    /// 让接下来的 n 次任务创建失败
    pub fn fail_next_creates(&self, n: u32) {
        self.create_failures.store(n, Ordering::SeqCst);
    }

    /// 直接注入一个文件，返回文件ID
    pub fn insert_file(&self, name: &str, bytes: Vec<u8>) -> String {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.next_file_id += 1;
        let file_id = format!("file_{}", inner.next_file_id);
        inner.files.insert(file_id.clone(), (name.to_string(), bytes));
        file_id
    }

    /// 设置任务状态
    pub fn set_batch_status(&self, batch_id: &str, status: BatchStatus) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(job) = inner.batches.get_mut(batch_id) {
            job.status = status;
        }
    }

    /// 标记任务完成并注入输出文件内容
    pub fn complete_batch(&self, batch_id: &str, output: Vec<u8>) {
        let output_file_id = self.insert_file("batch_output.jsonl", output);
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(job) = inner.batches.get_mut(batch_id) {
            job.status = BatchStatus::Completed;
            job.output_file_id = Some(output_file_id);
        }
    }

    /// 给任务附加错误文件内容
    pub fn attach_error_file(&self, batch_id: &str, error: Vec<u8>) {
        let error_file_id = self.insert_file("batch_errors.jsonl", error);
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(job) = inner.batches.get_mut(batch_id) {
            job.error_file_id = Some(error_file_id);
        }
    }

    /// 已上传文件的内容（按文件ID）
    pub fn file_bytes(&self, file_id: &str) -> Option<Vec<u8>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.files.get(file_id).map(|(_, bytes)| bytes.clone())
    }

    /// 已创建任务的ID列表（按创建顺序）
    pub fn batch_ids(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<String> = inner.batches.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// 某个任务的创建请求
    pub fn create_request(&self, batch_id: &str) -> Option<CreateBatchRequest> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.create_requests.get(batch_id).cloned()
    }
}

impl BatchApi for InMemoryBatchClient {
    async fn upload_file(&self, file_name: &str, bytes: Vec<u8>) -> AppResult<String> {
        if self
            .upload_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(AppError::api_bad_response(
                "files",
                Some(503),
                Some("模拟上传失败".to_string()),
            ));
        }
        Ok(self.insert_file(file_name, bytes))
    }

    async fn create_batch(&self, request: &CreateBatchRequest) -> AppResult<String> {
        if self
            .create_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(AppError::api_bad_response(
                "batches",
                Some(503),
                Some("模拟创建失败".to_string()),
            ));
        }

        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if !inner.files.contains_key(&request.input_file_id) {
            return Err(AppError::api_missing_field("batches", "input_file_id"));
        }

        inner.next_batch_id += 1;
        let batch_id = format!("batch_{:04}", inner.next_batch_id);
        inner.batches.insert(
            batch_id.clone(),
            BatchJob {
                id: batch_id.clone(),
                status: BatchStatus::Validating,
                output_file_id: None,
                error_file_id: None,
            },
        );
        inner
            .create_requests
            .insert(batch_id.clone(), request.clone());
        Ok(batch_id)
    }

    async fn retrieve_batch(&self, batch_id: &str) -> AppResult<BatchJob> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .batches
            .get(batch_id)
            .cloned()
            .ok_or_else(|| AppError::api_bad_response("batches", Some(404), None))
    }

    async fn fetch_file_content(&self, file_id: &str) -> AppResult<Vec<u8>> {
        self.file_bytes(file_id)
            .ok_or_else(|| AppError::api_bad_response("files", Some(404), None))
    }
}
