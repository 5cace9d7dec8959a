use crate::error::{AppError, AppResult};
use crate::models::record::NormalizedRecord;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// 从 JSON 文件加载数据并转换为 NormalizedRecord 对象
pub fn load_record(record_path: &Path) -> AppResult<NormalizedRecord> {
    let content = std::fs::read_to_string(record_path)
        .map_err(|e| AppError::file_read_failed(record_path.display().to_string(), e))?;

    let record: NormalizedRecord = serde_json::from_str(&content)?;
    Ok(record)
}

/// 递归查找目录下的所有 JSON 记录文件
///
/// 遍历顺序是确定的：目录和文件名都按字典序排序，
/// 保证多次运行产生的 custom_id 编号一致。
pub fn find_all_record_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        anyhow::bail!("目录不存在: {}", root.display());
    }

    let mut record_files = Vec::new();
    collect_json_files(root, &mut record_files)?;
    Ok(record_files)
}

fn collect_json_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("无法读取目录: {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("无法遍历目录: {}", dir.display()))?
        .into_iter()
        .map(|entry| entry.path())
        .collect();
    entries.sort();

    // 先收集本目录的文件，再按序进入子目录
    for path in &entries {
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json") {
            out.push(path.clone());
        }
    }
    for path in &entries {
        if path.is_dir() {
            collect_json_files(path, out)?;
        }
    }

    Ok(())
}
