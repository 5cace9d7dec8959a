//! 汇总服务
//!
//! 扫描结果根目录下的所有 task_* 目录，读取每个任务的统计文件，
//! 合并为一份全局汇总报告。单个统计文件缺失或损坏只跳过该任务。

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::models::{ShardStatistics, SummaryReport, Taxonomy};

/// 汇总器
pub struct Aggregator {
    taxonomy: Taxonomy,
}

impl Aggregator {
    pub fn new(taxonomy: Taxonomy) -> Self {
        Self { taxonomy }
    }

    /// 汇总所有任务目录的统计文件并写出 summary_report.json
    ///
    /// 结果根目录不存在才是致命错误；没有任务目录时产出全零报告。
    pub fn summarize(&self, results_root: &Path) -> Result<SummaryReport> {
        if !results_root.exists() {
            anyhow::bail!("结果目录不存在: {}", results_root.display());
        }

        let task_dirs = find_task_dirs(results_root)?;
        info!("📂 找到 {} 个任务目录", task_dirs.len());

        let mut report = SummaryReport::new(&self.taxonomy);

        for task_dir in &task_dirs {
            let stats_path = task_dir.join("formula_type_statistics.json");
            let stats = match read_statistics(&stats_path) {
                Ok(stats) => stats,
                Err(e) => {
                    warn!("  ⚠️ 跳过 {}: {}", task_dir.display(), e);
                    continue;
                }
            };
            report.absorb(&stats);
            info!(
                "  📊 {}: {} 个序列，{} 个公式",
                task_dir.display(),
                stats.total_sequences,
                stats.total_formulas
            );
        }

        report.finalize();

        let report_path = results_root.join("summary_report.json");
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&report_path, json)
            .with_context(|| format!("无法写入汇总报告: {}", report_path.display()))?;

        info!("\n📈 汇总完成:");
        info!("  📋 任务数: {}", report.total_tasks);
        info!("  📊 序列总数: {}", report.total_sequences);
        info!("  📊 公式总数: {}", report.total_formulas);
        info!("  📝 报告已保存至: {}", report_path.display());

        Ok(report)
    }
}

/// 收集结果根目录下的 task_* 子目录，按名称排序保证遍历顺序稳定
fn find_task_dirs(results_root: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    let entries = std::fs::read_dir(results_root)
        .with_context(|| format!("无法读取结果目录: {}", results_root.display()))?;

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let is_task_dir = path.is_dir()
            && path
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with("task_"))
                .unwrap_or(false);
        if is_task_dir {
            dirs.push(path);
        }
    }

    dirs.sort();
    Ok(dirs)
}

fn read_statistics(stats_path: &Path) -> Result<ShardStatistics> {
    let content = std::fs::read_to_string(stats_path)
        .with_context(|| format!("无法读取统计文件: {}", stats_path.display()))?;
    let stats = serde_json::from_str(&content)
        .with_context(|| format!("统计文件格式错误: {}", stats_path.display()))?;
    Ok(stats)
}
