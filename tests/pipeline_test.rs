//! 全流程集成测试
//!
//! 用内存客户端跑通完整流水线：
//! 清洗 → 打包 → 提交 → 模拟任务完成 → 下载解析 → 汇总。

use std::path::Path;

use oeis_formula_classify::clients::InMemoryBatchClient;
use oeis_formula_classify::models::{FormulaType, SummaryReport, Taxonomy};
use oeis_formula_classify::services::{
    load_task_ids, Aggregator, BatchPackager, BatchSubmitter, RecordCleaner, ResultHarvester,
};
use oeis_formula_classify::Config;

/// 构造一批原始 .seq 文件
fn write_raw_tree(root: &Path) {
    let a000 = root.join("A000");
    std::fs::create_dir_all(&a000).unwrap();

    std::fs::write(
        a000.join("A000045.seq"),
        "%I A000045 M0692 N0256\n\
         %S A000045 0,1,1,2,3,5,8,13,21,34\n\
         %F A000045 a(n) = a(n-1) + a(n-2). - _Editor_, Jan 01 2000\n\
         %F A000045 G.f.: x / (1 - x - x^2).\n",
    )
    .unwrap();

    std::fs::write(
        a000.join("A000108.seq"),
        "%S A000108 1,1,2,5,14,42\n\
         %F A000108 a(n) = binomial(2n,n)/(n+1).\n\
         %F A000108 Conjecture: a(n) is odd iff n = 2^k - 1.\n",
    )
    .unwrap();

    // 只含被剔除内容的序列：不应产出记录
    std::fs::write(
        a000.join("A000999.seq"),
        "%F A000999 From _Someone_, Jan 01 2000: (Start)\n\
         %F A000999 a(n) = n.\n\
         %F A000999 (End)\n",
    )
    .unwrap();
}

/// 按上传的分片内容构造 Batch 输出文件
///
/// 每个请求返回一条固定类型的分类结果。
fn synthesize_output(shard_bytes: &[u8]) -> Vec<u8> {
    let shard = String::from_utf8_lossy(shard_bytes);
    let mut lines = Vec::new();

    for line in shard.lines().filter(|line| !line.trim().is_empty()) {
        let request: serde_json::Value = serde_json::from_str(line).unwrap();
        let custom_id = request["custom_id"].as_str().unwrap();
        // custom_id 形如 request-{序号}-{序列ID}
        let sequence_id = custom_id.splitn(3, '-').nth(2).unwrap();

        let formula_count = request["body"]["messages"][1]["content"]
            .as_str()
            .unwrap()
            .lines()
            .filter(|l| l.starts_with(|c: char| c.is_ascii_digit()))
            .count();

        let formulas: Vec<serde_json::Value> = (0..formula_count)
            .map(|i| {
                serde_json::json!({
                    "formula_text": format!("formula {}", i + 1),
                    "formula_type": if i == 0 { "recurrence" } else { "generating_function" },
                    "formula_latex": null,
                    "confidence": 0.95
                })
            })
            .collect();
        let content = serde_json::json!({
            "sequence_id": sequence_id,
            "extracted_formulas": formulas
        })
        .to_string();

        let envelope = serde_json::json!({
            "custom_id": custom_id,
            "status_code": 200,
            "response": {"body": {"choices": [{"message": {"content": content}}]}}
        });
        lines.push(envelope.to_string());
    }

    let mut bytes = lines.join("\n").into_bytes();
    bytes.push(b'\n');
    bytes
}

#[tokio::test]
async fn test_full_pipeline_with_in_memory_client() {
    let workspace = tempfile::tempdir().unwrap();
    let raw_dir = workspace.path().join("oeis");
    let records_dir = workspace.path().join("records");
    let requests_dir = workspace.path().join("requests");
    let results_dir = workspace.path().join("results");
    let task_id_file = workspace.path().join("batch_task_ids.txt");

    write_raw_tree(&raw_dir);

    let config = Config {
        task_id_file: task_id_file.to_string_lossy().to_string(),
        ..Config::default()
    };

    // 1. 清洗
    let cleaner = RecordCleaner::new().unwrap();
    let clean_stats = cleaner.clean_tree(&raw_dir, &records_dir).unwrap();
    assert_eq!(clean_stats.total_sequences, 2);
    assert_eq!(clean_stats.single_formula_sequences, 1);
    assert!(records_dir.join("a000/A000045.json").exists());
    assert!(!records_dir.join("a000/A000999.json").exists());

    // 2. 打包
    let packager = BatchPackager::new(&config, Taxonomy::four_way());
    let package = packager.package(&records_dir, &requests_dir).unwrap();
    assert_eq!(package.total_requests, 2);
    assert_eq!(package.shard_paths.len(), 1);
    assert_eq!(package.skipped_records, 0);

    // 3. 提交
    let client = InMemoryBatchClient::new();
    let submitter = BatchSubmitter::new(&client, &config);
    let submit = submitter.submit_all(&package.shard_paths).await.unwrap();
    assert_eq!(submit.task_ids.len(), 1);
    assert_eq!(submit.failed_shards, 0);

    let task_ids = load_task_ids(&task_id_file).unwrap();
    assert_eq!(task_ids, submit.task_ids);

    // 4. 模拟服务方完成任务
    for task_id in &task_ids {
        let request = client.create_request(task_id).unwrap();
        let shard_bytes = client.file_bytes(&request.input_file_id).unwrap();
        client.complete_batch(task_id, synthesize_output(&shard_bytes));
    }

    // 5. 下载解析
    let harvester = ResultHarvester::new(&client, Taxonomy::four_way());
    let harvest = harvester
        .check_and_download(&task_ids, &results_dir)
        .await
        .unwrap();
    assert_eq!(harvest.completed, 1);
    assert_eq!(harvest.failed, 0);

    let task_dir = results_dir.join("task_1");
    assert!(task_dir.join("batch_output.jsonl").exists());
    assert!(task_dir.join("A000045_classified.json").exists());
    assert!(task_dir.join("A000108_classified.json").exists());
    assert!(task_dir.join("formula_type_statistics.json").exists());

    // 6. 汇总
    let report = Aggregator::new(Taxonomy::four_way())
        .summarize(&results_dir)
        .unwrap();
    assert_eq!(report.total_tasks, 1);
    assert_eq!(report.total_sequences, 2);
    assert_eq!(report.failed_sequences, 0);
    // A000045 两条公式（递推 + 生成函数），A000108 一条（递推）
    assert_eq!(report.total_formulas, 3);
    assert_eq!(report.formula_type_counts.get(FormulaType::Recurrence), 2);
    assert_eq!(
        report.formula_type_counts.get(FormulaType::GeneratingFunction),
        1
    );

    // 汇总报告落盘后可以再读回
    let on_disk =
        std::fs::read_to_string(results_dir.join("summary_report.json")).unwrap();
    let parsed: SummaryReport = serde_json::from_str(&on_disk).unwrap();
    assert_eq!(parsed.total_formulas, report.total_formulas);
}

#[tokio::test(start_paused = true)]
async fn test_pipeline_tolerates_transient_submit_failures() {
    let workspace = tempfile::tempdir().unwrap();
    let raw_dir = workspace.path().join("oeis");
    let records_dir = workspace.path().join("records");
    let requests_dir = workspace.path().join("requests");
    let task_id_file = workspace.path().join("batch_task_ids.txt");

    write_raw_tree(&raw_dir);

    let config = Config {
        task_id_file: task_id_file.to_string_lossy().to_string(),
        ..Config::default()
    };

    let cleaner = RecordCleaner::new().unwrap();
    cleaner.clean_tree(&raw_dir, &records_dir).unwrap();
    let packager = BatchPackager::new(&config, Taxonomy::four_way());
    let package = packager.package(&records_dir, &requests_dir).unwrap();

    // 前两次上传失败，第三次成功（重试上限为 3）
    let client = InMemoryBatchClient::new();
    client.fail_next_uploads(2);

    let submitter = BatchSubmitter::new(&client, &config);
    let submit = tokio::time::timeout(
        std::time::Duration::from_secs(60),
        submitter.submit_all(&package.shard_paths),
    )
    .await
    .expect("提交不应卡死")
    .unwrap();

    assert_eq!(submit.task_ids.len(), 1);
    assert_eq!(submit.failed_shards, 0);
    assert!(task_id_file.exists());
}
