//! 批量任务提交服务
//!
//! 逐个分片：校验 JSONL 格式 → 上传 → 创建 Batch 任务，
//! 瞬时失败按次数上限重试，单个分片失败不影响其余分片。

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::clients::{BatchApi, BatchMetadata, CreateBatchRequest};
use crate::config::Config;

/// 提交结果
#[derive(Debug, Default)]
pub struct SubmitOutcome {
    /// 成功创建的任务ID（按分片顺序）
    pub task_ids: Vec<String>,
    /// 校验失败被跳过的分片数
    pub skipped_shards: usize,
    /// 重试耗尽仍失败的分片数
    pub failed_shards: usize,
}

/// 校验分片文件格式
///
/// 每个非空行必须是 JSON 且包含 custom_id / method / url / body 四个字段；
/// 有效行数为 0 同样视为无效。返回有效请求数。
pub fn validate_shard(shard_path: &Path) -> Result<usize> {
    let content = std::fs::read_to_string(shard_path)
        .with_context(|| format!("无法读取分片文件: {}", shard_path.display()))?;

    let mut line_count = 0usize;
    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let data: serde_json::Value = serde_json::from_str(line)
            .with_context(|| format!("第 {} 行JSON格式错误", i + 1))?;
        for key in ["custom_id", "method", "url", "body"] {
            if data.get(key).is_none() {
                anyhow::bail!("第 {} 行缺少必需字段: {}", i + 1, key);
            }
        }
        line_count += 1;
    }

    if line_count == 0 {
        anyhow::bail!("分片文件不包含有效请求: {}", shard_path.display());
    }
    Ok(line_count)
}

/// 批量任务提交器
pub struct BatchSubmitter<'a, C: BatchApi> {
    client: &'a C,
    config: &'a Config,
}

impl<'a, C: BatchApi> BatchSubmitter<'a, C> {
    pub fn new(client: &'a C, config: &'a Config) -> Self {
        Self { client, config }
    }

    /// 带重试机制的单分片提交
    ///
    /// 上传或创建任务失败时等待 5 * 尝试次数 秒后重试，
    /// 重试耗尽返回 None 由调用方记为失败分片。
    pub async fn submit_shard_with_retry(&self, shard_path: &Path) -> Option<String> {
        let file_name = shard_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();

        for attempt in 1..=self.config.max_retries {
            info!(
                "🔄 尝试 {}/{}: 上传文件 {}",
                attempt, self.config.max_retries, file_name
            );

            match self.try_submit_once(shard_path, &file_name).await {
                Ok(batch_id) => {
                    info!("  ✅ Batch任务创建成功，ID: {}", batch_id);
                    return Some(batch_id);
                }
                Err(e) => {
                    warn!("  ❌ 尝试 {} 失败: {:#}", attempt, e);
                    if attempt < self.config.max_retries {
                        let wait = Duration::from_secs(5 * u64::from(attempt));
                        info!("  ⏳ 等待 {} 秒后重试...", wait.as_secs());
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }

        None
    }

    async fn try_submit_once(&self, shard_path: &Path, file_name: &str) -> Result<String> {
        let bytes = std::fs::read(shard_path)
            .with_context(|| format!("无法读取分片文件: {}", shard_path.display()))?;

        let file_id = self.client.upload_file(file_name, bytes).await?;
        info!("  ✅ 文件上传成功，ID: {}", file_id);

        let batch_id = self
            .client
            .create_batch(&CreateBatchRequest {
                input_file_id: file_id,
                endpoint: self.config.endpoint.clone(),
                completion_window: self.config.completion_window.clone(),
                metadata: BatchMetadata {
                    description: "OEIS公式分类任务（四大类）".to_string(),
                    original_filename: file_name.to_string(),
                },
            })
            .await?;

        Ok(batch_id)
    }

    /// 提交全部分片并把任务ID写入任务ID文件
    pub async fn submit_all(&self, shard_paths: &[std::path::PathBuf]) -> Result<SubmitOutcome> {
        let mut outcome = SubmitOutcome::default();

        for (i, shard_path) in shard_paths.iter().enumerate() {
            info!(
                "\n📋 处理文件 {}/{}: {}",
                i + 1,
                shard_paths.len(),
                shard_path.display()
            );

            match validate_shard(shard_path) {
                Ok(count) => {
                    info!("✅ JSONL文件验证通过，包含 {} 个有效请求", count);
                }
                Err(e) => {
                    warn!("  ⚠️ 文件验证失败，跳过: {:#}", e);
                    outcome.skipped_shards += 1;
                    continue;
                }
            }

            match self.submit_shard_with_retry(shard_path).await {
                Some(batch_id) => outcome.task_ids.push(batch_id),
                None => {
                    error!("  ❌ 所有重试均失败: {}", shard_path.display());
                    outcome.failed_shards += 1;
                }
            }
        }

        if outcome.task_ids.is_empty() {
            warn!("❌ 未能创建任何任务");
            return Ok(outcome);
        }

        let mut content = outcome.task_ids.join("\n");
        content.push('\n');
        std::fs::write(&self.config.task_id_file, content)
            .with_context(|| format!("无法写入任务ID文件: {}", self.config.task_id_file))?;
        info!(
            "\n📝 成功创建 {} 个任务，ID已保存到: {}",
            outcome.task_ids.len(),
            self.config.task_id_file
        );

        Ok(outcome)
    }
}
