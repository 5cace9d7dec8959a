//! 记录清洗服务
//!
//! 把原始 OEIS .seq 文件中的 %F 公式行提取出来，
//! 清洗成结构化的 NormalizedRecord JSON 文件。
//!
//! 清洗按固定顺序做三步：
//! 1. 删除 From ... (Start) 到 (End) 之间的注释块（含首尾两行）
//! 2. 删除包含 "Conjecture" 的行
//! 3. 保留 %F 行，去掉行首标签和行尾署名，trim 后保留非空行

use anyhow::{Context, Result};
use regex::Regex;
use std::path::Path;
use tracing::{info, warn};

use crate::models::NormalizedRecord;

/// 清洗统计
#[derive(Debug, Default)]
pub struct CleanStats {
    /// 生成的记录总数
    pub total_sequences: usize,
    /// 只剩一行公式的序列数
    pub single_formula_sequences: usize,
}

/// 记录清洗器
pub struct RecordCleaner {
    /// %F 标签和序列编号前缀
    tag_prefix: Regex,
    /// 行尾署名（短横线 + 作者引用到行尾）
    attribution: Regex,
}

impl RecordCleaner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            tag_prefix: Regex::new(r"^%F\s+[A-Za-z0-9]+").context("无法编译标签前缀正则")?,
            attribution: Regex::new(r" - _.*$").context("无法编译署名正则")?,
        })
    }

    /// 清理单行公式：去掉 %F 和序列编号 + 人名和日期
    fn clean_formula_line(&self, line: &str) -> String {
        let line = self.tag_prefix.replace(line, "");
        let line = line.trim();
        let line = self.attribution.replace(line, "");
        line.trim().to_string()
    }

    /// 删除 From 到 (Start) 和 (End) 之间的内容（包括 From 和 (End) 行）
    ///
    /// (Start) 没有匹配的 (End) 时，删除一直持续到输入末尾。
    fn strip_commentary_blocks<'a>(&self, lines: &[&'a str]) -> Vec<&'a str> {
        let mut result = Vec::new();
        let mut skip = false;

        for line in lines {
            if line.contains("From") && line.contains("(Start)") {
                skip = true;
            }
            if !skip {
                result.push(*line);
            }
            if skip && line.contains("(End)") {
                skip = false;
            }
        }

        result
    }

    /// 删除包含 "Conjecture" 的行
    fn remove_conjecture_lines<'a>(&self, lines: Vec<&'a str>) -> Vec<&'a str> {
        lines
            .into_iter()
            .filter(|line| !line.contains("Conjecture"))
            .collect()
    }

    /// 从原始文本中提取清洗后的公式列表（保序，保留重复）
    pub fn extract_formulas(&self, raw: &str) -> Vec<String> {
        let lines: Vec<&str> = raw.lines().collect();
        let lines = self.strip_commentary_blocks(&lines);
        let lines = self.remove_conjecture_lines(lines);

        let mut formulas = Vec::new();
        for line in lines {
            if line.starts_with("%F") {
                let text = self.clean_formula_line(line);
                if !text.is_empty() {
                    formulas.push(text);
                }
            }
        }
        formulas
    }

    /// 清洗单个序列的原始文本
    ///
    /// 没有剩下任何公式时返回 None（跳过该序列，不算错误）。
    pub fn clean_record(&self, sequence_id: &str, raw: &str) -> Option<NormalizedRecord> {
        let formulas = self.extract_formulas(raw);
        if formulas.is_empty() {
            return None;
        }
        Some(NormalizedRecord::new(sequence_id, formulas))
    }

    /// 清洗整个 OEIS 目录树
    ///
    /// 遍历 src_root 下按字典序排序的子文件夹，子文件夹里按序处理 .seq 文件，
    /// 输出到 dst_root 下对应的小写文件夹。只有产出公式的序列才生成文件。
    pub fn clean_tree(&self, src_root: &Path, dst_root: &Path) -> Result<CleanStats> {
        if !src_root.exists() {
            anyhow::bail!("原始数据目录不存在: {}", src_root.display());
        }
        std::fs::create_dir_all(dst_root)
            .with_context(|| format!("无法创建输出目录: {}", dst_root.display()))?;

        let mut stats = CleanStats::default();

        let mut folders: Vec<_> = std::fs::read_dir(src_root)
            .with_context(|| format!("无法读取目录: {}", src_root.display()))?
            .collect::<std::io::Result<Vec<_>>>()?
            .into_iter()
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        folders.sort();

        for folder in folders {
            let folder_name = folder
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default();
            let dst_folder = dst_root.join(folder_name.to_lowercase());
            std::fs::create_dir_all(&dst_folder)
                .with_context(|| format!("无法创建输出目录: {}", dst_folder.display()))?;

            let mut seq_files: Vec<_> = std::fs::read_dir(&folder)
                .with_context(|| format!("无法读取目录: {}", folder.display()))?
                .collect::<std::io::Result<Vec<_>>>()?
                .into_iter()
                .map(|entry| entry.path())
                .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("seq"))
                .collect();
            seq_files.sort();

            for seq_file in seq_files {
                // 原始文件编码不可靠，按 UTF-8 有损解码
                let bytes = match std::fs::read(&seq_file) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!("读取文件失败 {}: {}", seq_file.display(), e);
                        continue;
                    }
                };
                let raw = String::from_utf8_lossy(&bytes);

                let sequence_id = seq_file
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().to_string())
                    .unwrap_or_default();

                if let Some(record) = self.clean_record(&sequence_id, &raw) {
                    let dst_file = dst_folder.join(format!("{}.json", sequence_id));
                    let json = serde_json::to_string_pretty(&record)?;
                    std::fs::write(&dst_file, json)
                        .with_context(|| format!("无法写入记录文件: {}", dst_file.display()))?;

                    if record.formula_count == 1 {
                        stats.single_formula_sequences += 1;
                    }
                    stats.total_sequences += 1;
                }
            }

            info!("📂 处理完成文件夹 {}", folder_name);
        }

        info!("✅ %F 行提取并清理完成！");
        info!(
            "📊 总共有 {} 个序列只剩下了一行公式。",
            stats.single_formula_sequences
        );
        info!("📊 总共有 {} 个序列被处理！", stats.total_sequences);

        Ok(stats)
    }
}
