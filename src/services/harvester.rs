//! 结果收取服务
//!
//! 按任务ID列表轮询 Batch 任务状态，下载已完成任务的输出，
//! 逐行解析分类结果并落盘，同时生成每个任务的统计文件。
//! 对同一任务重复调用是安全的：重新下载、重新推导，产物一致。

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{error, info, warn};

use crate::clients::{BatchApi, BatchStatus};
use crate::models::{ClassificationResult, ResponseEnvelope, ShardStatistics, Taxonomy};

/// 一轮收取的状态汇总
#[derive(Debug, Default)]
pub struct HarvestOutcome {
    pub completed: usize,
    pub in_progress: usize,
    pub failed: usize,
}

/// 读取任务ID文件
///
/// 文件不存在或没有有效任务ID是本阶段的致命错误。
pub fn load_task_ids(task_id_file: &Path) -> Result<Vec<String>> {
    if !task_id_file.exists() {
        anyhow::bail!("任务ID文件不存在: {}", task_id_file.display());
    }
    let content = std::fs::read_to_string(task_id_file)
        .with_context(|| format!("无法读取任务ID文件: {}", task_id_file.display()))?;

    let task_ids: Vec<String> = content
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
        .collect();

    if task_ids.is_empty() {
        anyhow::bail!("任务ID文件中没有有效的任务ID: {}", task_id_file.display());
    }
    Ok(task_ids)
}

/// 结果收取器
pub struct ResultHarvester<'a, C: BatchApi> {
    client: &'a C,
    taxonomy: Taxonomy,
}

impl<'a, C: BatchApi> ResultHarvester<'a, C> {
    pub fn new(client: &'a C, taxonomy: Taxonomy) -> Self {
        Self { client, taxonomy }
    }

    /// 仅检查任务状态，不下载结果
    pub async fn check_status_only(&self, task_ids: &[String]) -> HarvestOutcome {
        let mut outcome = HarvestOutcome::default();

        for (i, task_id) in task_ids.iter().enumerate() {
            info!("\n🔍 检查任务 {}/{}: {}", i + 1, task_ids.len(), task_id);

            match self.client.retrieve_batch(task_id).await {
                Ok(job) => {
                    info!("  📊 任务状态: {}", job.status);
                    if job.status == BatchStatus::Completed {
                        outcome.completed += 1;
                    } else if job.status.is_running() {
                        outcome.in_progress += 1;
                    } else {
                        outcome.failed += 1;
                    }
                }
                Err(e) => {
                    error!("  ❌ 检查任务状态时出错: {}", e);
                    outcome.failed += 1;
                }
            }
        }

        info!("\n📊 任务状态汇总:");
        info!("  ✅ 已完成: {}", outcome.completed);
        info!("  ⏳ 处理中: {}", outcome.in_progress);
        info!("  ❌ 失败: {}", outcome.failed);

        if outcome.in_progress == 0 && outcome.completed > 0 {
            info!("\n🎉 所有任务已完成，可以运行下载模式获取结果!");
        } else if outcome.in_progress > 0 {
            info!("\n⏳ 仍有 {} 个任务在处理中，请稍后再检查", outcome.in_progress);
        }

        outcome
    }

    /// 检查全部任务并下载已完成任务的结果
    ///
    /// 每个任务使用独立的输出目录 task_{i}（i 为任务在列表中的 1 起始序号）。
    pub async fn check_and_download(
        &self,
        task_ids: &[String],
        output_base: &Path,
    ) -> Result<HarvestOutcome> {
        let mut outcome = HarvestOutcome::default();

        for (i, task_id) in task_ids.iter().enumerate() {
            let task_dir = output_base.join(format!("task_{}", i + 1));
            info!("\n🔍 处理任务 {}/{}: {}", i + 1, task_ids.len(), task_id);

            match self.harvest_one(task_id, &task_dir).await {
                Ok(Some(status)) => match status {
                    BatchStatus::Completed => outcome.completed += 1,
                    s if s.is_running() => outcome.in_progress += 1,
                    _ => outcome.failed += 1,
                },
                Ok(None) => outcome.failed += 1,
                Err(e) => {
                    error!("  ❌ 处理任务 {} 失败: {}", task_id, e);
                    outcome.failed += 1;
                }
            }
        }

        Ok(outcome)
    }

    /// 检查单个任务状态并下载结果
    ///
    /// 返回任务状态；查询出错时记日志并返回 None，不影响其余任务。
    async fn harvest_one(&self, task_id: &str, task_dir: &Path) -> Result<Option<BatchStatus>> {
        info!("  ⏳ 检查任务状态...");

        let job = match self.client.retrieve_batch(task_id).await {
            Ok(job) => job,
            Err(e) => {
                error!("  ❌ 检查任务状态时出错: {}", e);
                return Ok(None);
            }
        };
        info!("  📊 任务状态: {}", job.status);

        if job.status == BatchStatus::Completed {
            info!("  🎉 任务已完成，开始下载结果...");

            if let Some(output_file_id) = &job.output_file_id {
                let bytes = self.client.fetch_file_content(output_file_id).await?;
                std::fs::create_dir_all(task_dir)
                    .with_context(|| format!("无法创建任务目录: {}", task_dir.display()))?;
                let output_path = task_dir.join("batch_output.jsonl");
                std::fs::write(&output_path, &bytes)
                    .with_context(|| format!("无法写入结果文件: {}", output_path.display()))?;
                info!("  ✅ 结果已下载至: {}", output_path.display());

                let content = String::from_utf8_lossy(&bytes);
                self.process_results(&content, task_dir)?;
            } else {
                warn!("  ⚠️ 无输出文件ID");
            }

            // 部分请求失败时任务整体仍是 completed，错误明细单独下载
            self.download_error_file(&job.error_file_id, task_dir)
                .await?;
        } else if job.status.is_running() {
            info!("  ⏳ 任务仍在处理中 ({})", job.status);
            info!("  💡 请稍后再运行下载模式");
        } else {
            error!("  ❌ 任务异常终止: {}", job.status);
            self.download_error_file(&job.error_file_id, task_dir)
                .await?;
        }

        Ok(Some(job.status))
    }

    async fn download_error_file(
        &self,
        error_file_id: &Option<String>,
        task_dir: &Path,
    ) -> Result<()> {
        if let Some(error_file_id) = error_file_id {
            let bytes = self.client.fetch_file_content(error_file_id).await?;
            std::fs::create_dir_all(task_dir)
                .with_context(|| format!("无法创建任务目录: {}", task_dir.display()))?;
            let error_path = task_dir.join("batch_errors.jsonl");
            std::fs::write(&error_path, &bytes)
                .with_context(|| format!("无法写入错误文件: {}", error_path.display()))?;
            warn!("  ⚠️ 错误信息已下载至: {}", error_path.display());
        }
        Ok(())
    }

    /// 解析结果文件并落盘
    ///
    /// 每行一个响应信封：非 200 状态码或内容解析失败都只记为一个失败序列，
    /// 不中断整个文件的处理。成功的结果按 sequence_id 写成单独的 JSON 文件。
    pub fn process_results(&self, output: &str, output_dir: &Path) -> Result<ShardStatistics> {
        let mut stats = ShardStatistics::new(&self.taxonomy);

        for (line_num, line) in output.lines().enumerate() {
            let line_num = line_num + 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let envelope: ResponseEnvelope = match serde_json::from_str(line) {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!("  ❌ 处理第 {} 行时出错: {}", line_num, e);
                    stats.record_failure();
                    continue;
                }
            };

            if envelope.status_code != 200 {
                warn!(
                    "  ⚠️ 第 {} 行请求失败，状态码: {}",
                    line_num, envelope.status_code
                );
                stats.record_failure();
                continue;
            }

            let Some(content) = envelope.message_content() else {
                warn!("  ❌ 第 {} 行: 响应中没有模型内容", line_num);
                stats.record_failure();
                continue;
            };

            let mut result: ClassificationResult = match serde_json::from_str(content) {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        "  ❌ 第 {} 行: 无法解析模型返回的JSON内容: {}",
                        line_num,
                        crate::utils::logging::truncate_text(content, 120)
                    );
                    stats.record_failure();
                    continue;
                }
            };

            if result.sequence_id.is_empty() {
                result.sequence_id = format!("unknown_{}", line_num);
            }

            let artifact_path = output_dir.join(format!("{}_classified.json", result.sequence_id));
            let json = serde_json::to_string_pretty(&result)?;
            std::fs::write(&artifact_path, json)
                .with_context(|| format!("无法写入分类结果: {}", artifact_path.display()))?;

            stats.record_sequence(
                result
                    .extracted_formulas
                    .iter()
                    .map(|formula| formula.formula_type),
            );

            if stats.successful_sequences % 100 == 0 {
                info!(
                    "  📊 已处理 {} 个序列，{} 个公式",
                    stats.successful_sequences, stats.total_formulas
                );
            }
        }

        stats.finalize();
        write_statistics(&stats, output_dir)?;

        info!(
            "  📊 处理完成! 成功处理 {} 个序列，失败 {} 个序列",
            stats.successful_sequences, stats.failed_sequences
        );
        info!("  📊 总共提取 {} 个公式", stats.total_formulas);

        Ok(stats)
    }
}

/// 写入单个任务的统计文件
fn write_statistics(stats: &ShardStatistics, output_dir: &Path) -> Result<()> {
    let stats_path = output_dir.join("formula_type_statistics.json");
    let json = serde_json::to_string_pretty(stats)?;
    std::fs::write(&stats_path, json)
        .with_context(|| format!("无法写入统计文件: {}", stats_path.display()))?;
    info!("  📈 统计信息已保存至: {}", stats_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{BatchApi, CreateBatchRequest, InMemoryBatchClient};
    use crate::models::FormulaType;

    fn response_line(sequence_id: &str, formula_types: &[&str]) -> String {
        let formulas: Vec<serde_json::Value> = formula_types
            .iter()
            .map(|t| {
                serde_json::json!({
                    "formula_text": "a(n) = n",
                    "formula_type": t,
                    "formula_latex": "a(n) = n",
                    "confidence": 0.9
                })
            })
            .collect();
        let content = serde_json::json!({
            "sequence_id": sequence_id,
            "extracted_formulas": formulas
        })
        .to_string();

        serde_json::json!({
            "custom_id": format!("request-0-{}", sequence_id),
            "status_code": 200,
            "response": {"body": {"choices": [{"message": {"content": content}}]}}
        })
        .to_string()
    }

    fn failed_line(status_code: u16) -> String {
        serde_json::json!({
            "custom_id": "request-9-A000999",
            "status_code": status_code,
            "response": null
        })
        .to_string()
    }

    fn harvester(client: &InMemoryBatchClient) -> ResultHarvester<'_, InMemoryBatchClient> {
        ResultHarvester::new(client, Taxonomy::four_way())
    }

    async fn create_job(client: &InMemoryBatchClient) -> String {
        let file_id = client.insert_file("batch_requests_1.jsonl", b"{}".to_vec());
        client
            .create_batch(&CreateBatchRequest {
                input_file_id: file_id,
                endpoint: "/v4/chat/completions".to_string(),
                completion_window: "24h".to_string(),
                metadata: crate::clients::BatchMetadata {
                    description: "测试".to_string(),
                    original_filename: "batch_requests_1.jsonl".to_string(),
                },
            })
            .await
            .unwrap()
    }

    #[test]
    fn test_load_task_ids_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch_task_ids.txt");
        std::fs::write(&path, "batch_0001\n\n  \nbatch_0002\n").unwrap();

        let ids = load_task_ids(&path).unwrap();
        assert_eq!(ids, vec!["batch_0001", "batch_0002"]);
    }

    #[test]
    fn test_missing_or_empty_task_id_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_task_ids(&dir.path().join("no_such_file.txt")).is_err());

        let empty = dir.path().join("empty.txt");
        std::fs::write(&empty, "\n  \n").unwrap();
        assert!(load_task_ids(&empty).is_err());
    }

    #[test]
    fn test_process_results_counts_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let client = InMemoryBatchClient::new();
        let harvester = harvester(&client);

        let output = [
            response_line("A000045", &["closed_form", "recurrence"]),
            failed_line(500),
            response_line("A000108", &["generating_function"]),
            "not valid json".to_string(),
        ]
        .join("\n");

        let stats = harvester.process_results(&output, dir.path()).unwrap();

        assert_eq!(stats.successful_sequences, 2);
        assert_eq!(stats.failed_sequences, 2);
        assert_eq!(stats.total_sequences, 4);
        assert_eq!(stats.total_formulas, 3);
        assert_eq!(stats.type_counts.get(FormulaType::ClosedForm), 1);
        assert_eq!(stats.type_counts.get(FormulaType::Recurrence), 1);
        assert_eq!(stats.type_counts.get(FormulaType::GeneratingFunction), 1);

        // 成功的序列有产物文件；失败行没有
        assert!(dir.path().join("A000045_classified.json").exists());
        assert!(dir.path().join("A000108_classified.json").exists());
        assert!(!dir.path().join("A000999_classified.json").exists());
        assert!(dir.path().join("formula_type_statistics.json").exists());
    }

    #[test]
    fn test_unknown_type_coerced_to_other_in_stats() {
        let dir = tempfile::tempdir().unwrap();
        let client = InMemoryBatchClient::new();
        let harvester = harvester(&client);

        let output = response_line("A000001", &["matrix_form"]);
        let stats = harvester.process_results(&output, dir.path()).unwrap();

        assert_eq!(stats.type_counts.get(FormulaType::Other), 1);
        assert_eq!(stats.total_formulas, 1);

        // 产物文件中的类型同样是 other
        let artifact =
            std::fs::read_to_string(dir.path().join("A000001_classified.json")).unwrap();
        let result: ClassificationResult = serde_json::from_str(&artifact).unwrap();
        assert_eq!(result.extracted_formulas[0].formula_type, FormulaType::Other);
    }

    #[test]
    fn test_missing_sequence_id_gets_line_number_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let client = InMemoryBatchClient::new();
        let harvester = harvester(&client);

        let content = r#"{"extracted_formulas":[]}"#;
        let output = serde_json::json!({
            "status_code": 200,
            "response": {"body": {"choices": [{"message": {"content": content}}]}}
        })
        .to_string();

        let stats = harvester.process_results(&output, dir.path()).unwrap();
        assert_eq!(stats.successful_sequences, 1);
        assert!(dir.path().join("unknown_1_classified.json").exists());
    }

    #[tokio::test]
    async fn test_completed_job_downloads_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let client = InMemoryBatchClient::new();
        let batch_id = create_job(&client).await;
        client.complete_batch(
            &batch_id,
            response_line("A000045", &["recurrence"]).into_bytes(),
        );

        let harvester = harvester(&client);
        let task_ids = vec![batch_id];

        let first = harvester
            .check_and_download(&task_ids, dir.path())
            .await
            .unwrap();
        assert_eq!(first.completed, 1);

        let stats_path = dir.path().join("task_1/formula_type_statistics.json");
        let first_stats = std::fs::read_to_string(&stats_path).unwrap();

        // 重复收取同一任务：产物保持一致
        let second = harvester
            .check_and_download(&task_ids, dir.path())
            .await
            .unwrap();
        assert_eq!(second.completed, 1);
        let second_stats = std::fs::read_to_string(&stats_path).unwrap();
        assert_eq!(first_stats, second_stats);

        assert!(dir.path().join("task_1/batch_output.jsonl").exists());
        assert!(dir.path().join("task_1/A000045_classified.json").exists());
    }

    #[tokio::test]
    async fn test_running_job_has_no_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let client = InMemoryBatchClient::new();
        let batch_id = create_job(&client).await;
        client.set_batch_status(&batch_id, BatchStatus::InProgress);

        let harvester = harvester(&client);
        let outcome = harvester
            .check_and_download(&[batch_id], dir.path())
            .await
            .unwrap();

        assert_eq!(outcome.in_progress, 1);
        // 运行中的任务不产生任何落盘产物
        assert!(!dir.path().join("task_1").exists());
    }

    #[tokio::test]
    async fn test_terminal_job_still_downloads_error_file() {
        let dir = tempfile::tempdir().unwrap();
        let client = InMemoryBatchClient::new();
        let batch_id = create_job(&client).await;
        client.set_batch_status(&batch_id, BatchStatus::Failed);
        client.attach_error_file(&batch_id, b"{\"error\":\"boom\"}\n".to_vec());

        let harvester = harvester(&client);
        let outcome = harvester
            .check_and_download(&[batch_id], dir.path())
            .await
            .unwrap();

        assert_eq!(outcome.failed, 1);
        assert!(dir.path().join("task_1/batch_errors.jsonl").exists());
        assert!(!dir.path().join("task_1/batch_output.jsonl").exists());
    }

    #[tokio::test]
    async fn test_status_only_mode_tallies_without_downloading() {
        let dir = tempfile::tempdir().unwrap();
        let client = InMemoryBatchClient::new();

        let completed = create_job(&client).await;
        client.complete_batch(&completed, b"".to_vec());
        let running = create_job(&client).await;
        client.set_batch_status(&running, BatchStatus::Validating);
        let dead = create_job(&client).await;
        client.set_batch_status(&dead, BatchStatus::Cancelled);

        let harvester = harvester(&client);
        let outcome = harvester
            .check_status_only(&[completed, running, dead, "missing".to_string()])
            .await;

        assert_eq!(outcome.completed, 1);
        assert_eq!(outcome.in_progress, 1);
        assert_eq!(outcome.failed, 2);
        // 状态检查不产生任何目录
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }
}
