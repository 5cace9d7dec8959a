//! 批量请求打包服务
//!
//! 遍历记录目录，为每条有效记录构建一个分类请求，
//! 按请求数和字节数两个上限切分成多个 JSONL 分片文件。

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::Config;
use crate::models::{
    find_all_record_files, load_record, BatchRequest, ChatMessage, NormalizedRecord, RequestBody,
    ResponseFormat, Taxonomy,
};

/// 打包结果
#[derive(Debug)]
pub struct PackageOutcome {
    /// 生成的分片文件路径（按序）
    pub shard_paths: Vec<PathBuf>,
    /// 成功打包的请求总数
    pub total_requests: usize,
    /// 跳过的记录数（缺字段、空公式、读取失败）
    pub skipped_records: usize,
}

/// 批量请求打包器
pub struct BatchPackager<'a> {
    config: &'a Config,
    taxonomy: Taxonomy,
}

impl<'a> BatchPackager<'a> {
    pub fn new(config: &'a Config, taxonomy: Taxonomy) -> Self {
        Self { config, taxonomy }
    }

    /// 构建 system prompt：固定的四大类分类说明 + 每类一个示例
    pub fn build_system_prompt(&self) -> String {
        let mut type_table = serde_json::Map::new();
        for category in self.taxonomy.categories() {
            type_table.insert(
                category.formula_type.key().to_string(),
                serde_json::Value::String(category.formula_type.description().to_string()),
            );
        }
        let type_table_json = serde_json::to_string_pretty(&serde_json::Value::Object(type_table))
            .unwrap_or_default();

        let mut guidelines = String::new();
        for (i, category) in self.taxonomy.categories().iter().enumerate() {
            guidelines.push_str(&format!(
                "{}. {} ({}): {}，如 {}\n",
                i + 1,
                category.formula_type.name(),
                category.formula_type.key(),
                category.guideline,
                category.example
            ));
        }

        format!(
            r#"你是一个专业的数学公式解析器。你的任务是从用户提供的文本中精确识别和提取所有数学公式，并对每个公式进行分类。

请将公式分类为以下四种类型之一：
{}

分类指南：
{}
最终输出请使用JSON格式，包含以下字段：
- "sequence_id": 序列ID
- "extracted_formulas": 列表，每个元素是一个对象，包含:
  - "formula_text": 原始公式文本
  - "formula_type": 公式类型（必须从上述四种类型中选择）
  - "formula_latex": 公式的LaTeX表示（如果适用）
  - "confidence": 你对分类的置信度（0-1之间的数值）

请确保提取和分类尽可能准确。对于不确定的类型，请选择"other"。"#,
            type_table_json, guidelines
        )
    }

    /// 构建用户消息：序列ID + 编号的公式列表
    pub fn build_user_prompt(&self, record: &NormalizedRecord) -> String {
        let formulas = record
            .formulas
            .iter()
            .enumerate()
            .map(|(i, formula)| format!("{}. {}", i + 1, formula))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Sequence ID: {}\nFormulas to classify:\n{}",
            record.sequence_id, formulas
        )
    }

    /// 为一条记录构建 Batch 请求
    ///
    /// sequential_index 在整个打包运行中单调递增（从 0 开始），
    /// 和 sequence_id 一起构成全局唯一的 custom_id。
    pub fn build_request(&self, record: &NormalizedRecord, sequential_index: usize) -> BatchRequest {
        BatchRequest {
            custom_id: format!("request-{}-{}", sequential_index, record.sequence_id),
            method: "POST".to_string(),
            url: self.config.endpoint.clone(),
            body: RequestBody {
                model: self.config.model_name.clone(),
                messages: vec![
                    ChatMessage {
                        role: "system".to_string(),
                        content: self.build_system_prompt(),
                    },
                    ChatMessage {
                        role: "user".to_string(),
                        content: self.build_user_prompt(record),
                    },
                ],
                temperature: self.config.temperature,
                max_tokens: self.config.max_tokens,
                response_format: ResponseFormat::json_object(),
            },
        }
    }

    /// 打包整个记录目录
    ///
    /// 没有任何有效记录时返回空的分片列表（不算错误），由调用方决定是否继续。
    pub fn package(&self, records_root: &Path, output_dir: &Path) -> Result<PackageOutcome> {
        info!("🔍 开始在目录中搜索JSON文件: {}", records_root.display());
        let record_files = find_all_record_files(records_root)?;
        info!("✅ 总共找到 {} 个JSON文件", record_files.len());

        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("无法创建输出目录: {}", output_dir.display()))?;

        let mut writer = ShardWriter::new(
            output_dir,
            self.config.max_requests_per_shard,
            self.config.max_shard_bytes,
        );
        let mut skipped_records = 0usize;

        for record_path in &record_files {
            let record = match load_record(record_path) {
                Ok(record) => record,
                Err(e) => {
                    warn!("  ❌ 读取文件时出错: {:#}", e);
                    skipped_records += 1;
                    continue;
                }
            };

            if !record.is_valid() {
                warn!(
                    "  ⚠️ formulas字段为空或缺少必要字段，跳过: {}",
                    record_path.display()
                );
                skipped_records += 1;
                continue;
            }

            let request = self.build_request(&record, writer.total_requests());
            let line = serde_json::to_string(&request)?;
            writer.write_request(&line)?;

            if writer.total_requests() % 100 == 0 {
                info!("📊 已处理 {} 个请求", writer.total_requests());
            }
        }

        let (shard_paths, total_requests) = writer.finish()?;
        info!(
            "📊 总共创建 {} 个JSONL文件，包含 {} 个请求",
            shard_paths.len(),
            total_requests
        );

        Ok(PackageOutcome {
            shard_paths,
            total_requests,
            skipped_records,
        })
    }
}

/// 受请求数和字节数双重上限约束的分片写入器
///
/// 分片文件按需惰性创建：写入第一条请求时才打开文件。
/// 任一上限会被下一条请求超出时，先关闭当前分片、再新开一片，
/// 触发滚动的那条请求整体写入新分片，绝不拆分。
struct ShardWriter {
    output_dir: PathBuf,
    max_requests: usize,
    max_bytes: usize,
    file: Option<BufWriter<File>>,
    file_index: usize,
    current_requests: usize,
    current_bytes: usize,
    total_requests: usize,
    shard_paths: Vec<PathBuf>,
}

impl ShardWriter {
    fn new(output_dir: &Path, max_requests: usize, max_bytes: usize) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            max_requests,
            max_bytes,
            file: None,
            file_index: 0,
            current_requests: 0,
            current_bytes: 0,
            total_requests: 0,
            shard_paths: Vec::new(),
        }
    }

    fn total_requests(&self) -> usize {
        self.total_requests
    }

    fn open_next_shard(&mut self) -> Result<()> {
        self.file_index += 1;
        let path = self
            .output_dir
            .join(format!("batch_requests_{}.jsonl", self.file_index));
        info!("📝 开始创建JSONL文件: {}", path.display());

        let file = File::create(&path)
            .with_context(|| format!("无法创建分片文件: {}", path.display()))?;
        self.file = Some(BufWriter::new(file));
        self.shard_paths.push(path);
        self.current_requests = 0;
        self.current_bytes = 0;
        Ok(())
    }

    fn close_current_shard(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().context("无法刷新分片文件")?;
            info!(
                "✅ 已创建: {} (包含 {} 个请求, {:.2} MB)",
                self.shard_paths
                    .last()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
                self.current_requests,
                self.current_bytes as f64 / 1024.0 / 1024.0
            );
        }
        Ok(())
    }

    fn write_request(&mut self, line: &str) -> Result<()> {
        // 行字节数含换行符，保证分片文件整体不超过字节上限
        let request_size = line.len() + 1;

        if self.file.is_some()
            && (self.current_requests >= self.max_requests
                || self.current_bytes + request_size > self.max_bytes)
        {
            self.close_current_shard()?;
        }
        if self.file.is_none() {
            self.open_next_shard()?;
        }

        if let Some(file) = self.file.as_mut() {
            writeln!(file, "{}", line).context("无法写入分片文件")?;
        }
        self.current_requests += 1;
        self.current_bytes += request_size;
        self.total_requests += 1;
        Ok(())
    }

    fn finish(mut self) -> Result<(Vec<PathBuf>, usize)> {
        self.close_current_shard()?;
        Ok((self.shard_paths, self.total_requests))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn test_config() -> Config {
        Config::default()
    }

    fn write_record(dir: &Path, sequence_id: &str, formulas: &[&str]) {
        let record = NormalizedRecord::new(
            sequence_id,
            formulas.iter().map(|s| s.to_string()).collect(),
        );
        std::fs::write(
            dir.join(format!("{}.json", sequence_id)),
            serde_json::to_string_pretty(&record).unwrap(),
        )
        .unwrap();
    }

    fn read_requests(path: &Path) -> Vec<BatchRequest> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_single_record_single_shard() {
        let records = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_record(records.path(), "A000045", &["F(n) = F(n-1)+F(n-2)"]);

        let mut config = test_config();
        config.max_requests_per_shard = 1;
        let packager = BatchPackager::new(&config, Taxonomy::four_way());

        let outcome = packager.package(records.path(), output.path()).unwrap();
        assert_eq!(outcome.total_requests, 1);
        assert_eq!(outcome.shard_paths.len(), 1);

        let requests = read_requests(&outcome.shard_paths[0]);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].custom_id, "request-0-A000045");
        assert_eq!(requests[0].method, "POST");
        assert!(requests[0].body.messages[1]
            .content
            .contains("1. F(n) = F(n-1)+F(n-2)"));
    }

    #[test]
    fn test_request_count_bound_rolls_over() {
        let records = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        for i in 0..5 {
            write_record(records.path(), &format!("A00000{}", i), &["a(n) = n"]);
        }

        let mut config = test_config();
        config.max_requests_per_shard = 2;
        let packager = BatchPackager::new(&config, Taxonomy::four_way());

        let outcome = packager.package(records.path(), output.path()).unwrap();
        assert_eq!(outcome.total_requests, 5);
        assert_eq!(outcome.shard_paths.len(), 3);

        // 每片不超过上限，最后一片装下剩余请求
        let counts: Vec<usize> = outcome
            .shard_paths
            .iter()
            .map(|p| read_requests(p).len())
            .collect();
        assert_eq!(counts, vec![2, 2, 1]);
    }

    #[test]
    fn test_byte_bound_rolls_over_and_oversized_request_gets_own_shard() {
        let records = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_record(records.path(), "A000001", &["a(n) = n"]);
        write_record(records.path(), "A000002", &["a(n) = n^2"]);

        let mut config = test_config();
        // 单条请求（带满长 system prompt）必然超过该上限
        config.max_shard_bytes = 64;
        let packager = BatchPackager::new(&config, Taxonomy::four_way());

        let outcome = packager.package(records.path(), output.path()).unwrap();
        assert_eq!(outcome.total_requests, 2);
        // 超限请求各占一个分片，从不拆分
        assert_eq!(outcome.shard_paths.len(), 2);
        for path in &outcome.shard_paths {
            assert_eq!(read_requests(path).len(), 1);
        }
    }

    #[test]
    fn test_custom_ids_unique_and_order_stable() {
        let records = tempfile::tempdir().unwrap();
        let output1 = tempfile::tempdir().unwrap();
        let output2 = tempfile::tempdir().unwrap();

        let sub_b = records.path().join("b000");
        let sub_a = records.path().join("a000");
        std::fs::create_dir_all(&sub_b).unwrap();
        std::fs::create_dir_all(&sub_a).unwrap();
        write_record(&sub_a, "A000100", &["a(n) = n"]);
        write_record(&sub_b, "A000200", &["a(n) = 2n"]);
        write_record(&sub_a, "A000045", &["F(n) = F(n-1)+F(n-2)"]);

        let config = test_config();
        let packager = BatchPackager::new(&config, Taxonomy::four_way());

        let outcome1 = packager.package(records.path(), output1.path()).unwrap();
        let requests1: Vec<BatchRequest> = outcome1
            .shard_paths
            .iter()
            .flat_map(|p| read_requests(p))
            .collect();

        let ids: Vec<&str> = requests1.iter().map(|r| r.custom_id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "request-0-A000045",
                "request-1-A000100",
                "request-2-A000200"
            ]
        );
        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());

        // 再跑一遍，编号保持一致
        let outcome2 = packager.package(records.path(), output2.path()).unwrap();
        let requests2: Vec<BatchRequest> = outcome2
            .shard_paths
            .iter()
            .flat_map(|p| read_requests(p))
            .collect();
        let ids2: Vec<&str> = requests2.iter().map(|r| r.custom_id.as_str()).collect();
        assert_eq!(ids, ids2);
    }

    #[test]
    fn test_invalid_records_skipped_not_fatal() {
        let records = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();

        write_record(records.path(), "A000045", &["F(n) = F(n-1)+F(n-2)"]);
        // 空公式列表：跳过
        std::fs::write(
            records.path().join("A000001.json"),
            r#"{"sequence_id":"A000001","formulas":[],"formula_count":0}"#,
        )
        .unwrap();
        // 非法 JSON：跳过
        std::fs::write(records.path().join("A000002.json"), "not json").unwrap();

        let config = test_config();
        let packager = BatchPackager::new(&config, Taxonomy::four_way());

        let outcome = packager.package(records.path(), output.path()).unwrap();
        assert_eq!(outcome.total_requests, 1);
        assert_eq!(outcome.skipped_records, 2);
    }

    #[test]
    fn test_no_valid_records_yields_empty_shard_list() {
        let records = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();

        let config = test_config();
        let packager = BatchPackager::new(&config, Taxonomy::four_way());

        let outcome = packager.package(records.path(), output.path()).unwrap();
        assert!(outcome.shard_paths.is_empty());
        assert_eq!(outcome.total_requests, 0);
    }

    #[test]
    fn test_system_prompt_names_all_four_categories() {
        let config = test_config();
        let packager = BatchPackager::new(&config, Taxonomy::four_way());
        let prompt = packager.build_system_prompt();

        for key in ["closed_form", "recurrence", "generating_function", "other"] {
            assert!(prompt.contains(key), "prompt 应包含类别 {}", key);
        }
        assert!(prompt.contains("G.f.: x/(1-x-x^2)"));
    }
}
