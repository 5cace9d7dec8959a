//! 应用编排器
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责按运行模式编排各个服务：
//!
//! 1. **clean**：清洗原始 OEIS 数据，抽取公式行
//! 2. **submit**：打包批量请求分片并提交 Batch 任务
//! 3. **status**：检查所有已提交任务的状态
//! 4. **download**：下载已完成任务的结果并解析落盘
//! 5. **summary**：汇总所有任务的统计，生成全局报告
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个阶段的细节，向下委托各服务
//! - **阶段独立**：每个模式可单独运行，阶段之间通过磁盘文件衔接

use anyhow::Result;
use std::path::Path;
use tracing::{info, warn};

use crate::clients::ZhipuBatchClient;
use crate::config::Config;
use crate::models::Taxonomy;
use crate::services::{
    load_task_ids, Aggregator, BatchPackager, BatchSubmitter, RecordCleaner, ResultHarvester,
};
use crate::utils::logging;

/// 运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Clean,
    Submit,
    Status,
    Download,
    Summary,
}

impl Mode {
    /// 解析命令行参数中的模式名称
    pub fn parse(arg: &str) -> Option<Self> {
        match arg {
            "clean" => Some(Mode::Clean),
            "submit" => Some(Mode::Submit),
            "status" => Some(Mode::Status),
            "download" => Some(Mode::Download),
            "summary" => Some(Mode::Summary),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Clean => "clean",
            Mode::Submit => "submit",
            Mode::Status => "status",
            Mode::Download => "download",
            Mode::Summary => "summary",
        }
    }
}

/// 应用主结构
pub struct App {
    config: Config,
    client: ZhipuBatchClient,
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config) -> Self {
        let client = ZhipuBatchClient::new(&config);
        Self { config, client }
    }

    /// 运行应用主逻辑
    pub async fn run(&self, mode: Mode) -> Result<()> {
        logging::log_startup(mode.as_str());

        match mode {
            Mode::Clean => self.run_clean()?,
            Mode::Submit => self.run_submit().await?,
            Mode::Status => self.run_status().await?,
            Mode::Download => self.run_download().await?,
            Mode::Summary => self.run_summary()?,
        }

        logging::log_finished(mode.as_str());
        Ok(())
    }

    /// 清洗原始 OEIS 数据
    fn run_clean(&self) -> Result<()> {
        info!("\n📁 原始数据目录: {}", self.config.oeis_src_dir);
        info!("📁 清洗结果目录: {}", self.config.records_dir);

        let cleaner = RecordCleaner::new()?;
        let stats = cleaner.clean_tree(
            Path::new(&self.config.oeis_src_dir),
            Path::new(&self.config.records_dir),
        )?;

        log_clean_complete(stats.total_sequences, stats.single_formula_sequences);
        Ok(())
    }

    /// 打包并提交批量请求
    async fn run_submit(&self) -> Result<()> {
        info!("\n📦 开始打包批量请求...");

        let packager = BatchPackager::new(&self.config, Taxonomy::four_way());
        let outcome = packager.package(
            Path::new(&self.config.records_dir),
            Path::new(&self.config.requests_dir),
        )?;

        if outcome.total_requests == 0 {
            warn!("⚠️ 没有可提交的请求，请先运行 clean 模式准备数据");
            return Ok(());
        }

        log_package_complete(
            outcome.shard_paths.len(),
            outcome.total_requests,
            outcome.skipped_records,
        );

        info!("\n🚀 开始提交 Batch 任务...");
        let submitter = BatchSubmitter::new(&self.client, &self.config);
        let result = submitter.submit_all(&outcome.shard_paths).await?;

        log_submit_complete(
            result.task_ids.len(),
            result.skipped_shards,
            result.failed_shards,
            &self.config.task_id_file,
        );
        Ok(())
    }

    /// 检查任务状态
    async fn run_status(&self) -> Result<()> {
        let task_ids = load_task_ids(Path::new(&self.config.task_id_file))?;
        info!("📋 共 {} 个任务", task_ids.len());

        let harvester = ResultHarvester::new(&self.client, Taxonomy::four_way());
        harvester.check_status_only(&task_ids).await;
        Ok(())
    }

    /// 下载并解析已完成任务的结果
    async fn run_download(&self) -> Result<()> {
        let task_ids = load_task_ids(Path::new(&self.config.task_id_file))?;
        info!("📋 共 {} 个任务", task_ids.len());
        info!("📁 结果目录: {}", self.config.results_dir);

        let harvester = ResultHarvester::new(&self.client, Taxonomy::four_way());
        let outcome = harvester
            .check_and_download(&task_ids, Path::new(&self.config.results_dir))
            .await?;

        log_harvest_complete(outcome.completed, outcome.in_progress, outcome.failed);

        if outcome.completed > 0 && outcome.in_progress == 0 {
            info!("💡 可以运行 summary 模式生成汇总报告");
        }
        Ok(())
    }

    /// 汇总所有任务的统计
    fn run_summary(&self) -> Result<()> {
        let aggregator = Aggregator::new(Taxonomy::four_way());
        aggregator.summarize(Path::new(&self.config.results_dir))?;
        Ok(())
    }
}

// ========== 日志辅助函数 ==========

fn log_clean_complete(total: usize, single_formula: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📊 清洗完成统计");
    info!("✅ 含公式的序列: {}", total);
    info!("📋 仅含一条公式的序列: {}", single_formula);
    info!("{}", "=".repeat(60));
}

fn log_package_complete(shards: usize, requests: usize, skipped: usize) {
    info!("\n{}", "─".repeat(60));
    info!("✓ 打包完成: {} 个分片，共 {} 个请求", shards, requests);
    if skipped > 0 {
        info!("⚠️ 跳过 {} 个无效记录", skipped);
    }
    info!("{}", "─".repeat(60));
}

fn log_submit_complete(submitted: usize, skipped: usize, failed: usize, task_id_file: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 提交完成统计");
    info!("✅ 成功: {}", submitted);
    info!("⚠️ 跳过: {}", skipped);
    info!("❌ 失败: {}", failed);
    if submitted > 0 {
        info!("📝 任务ID已保存至: {}", task_id_file);
    }
    info!("{}", "=".repeat(60));
}

fn log_harvest_complete(completed: usize, in_progress: usize, failed: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📊 下载完成统计");
    info!("✅ 已完成: {}", completed);
    info!("⏳ 处理中: {}", in_progress);
    info!("❌ 失败: {}", failed);
    info!("{}", "=".repeat(60));
}
