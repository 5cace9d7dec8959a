//! # OEIS Formula Classify
//!
//! 一个基于 LLM Batch API 的 OEIS 公式四大类分类流水线
//!
//! ## 架构设计
//!
//! 本系统采用分层架构，各阶段通过磁盘文件衔接，可独立重跑：
//!
//! ### ① 模型层（Models）
//! - `models/` - 数据结构：清洗记录、批量请求、响应信封、统计报告
//! - `Taxonomy` - 四大类公式分类体系（封闭形式 / 递推 / 生成函数 / 其他）
//!
//! ### ② 客户端层（Clients）
//! - `clients/` - Batch API 访问能力
//! - `BatchApi` - 文件上传、任务创建、状态查询、结果下载的统一接口
//! - `ZhipuBatchClient` - 智谱 Batch API 的 HTTP 实现
//! - `InMemoryBatchClient` - 内存实现，用于测试与干跑
//!
//! ### ③ 业务服务层（Services）
//! - `services/` - 流水线的五个阶段
//! - `RecordCleaner` - 清洗原始 OEIS 数据，抽取公式行
//! - `BatchPackager` - 构造批量请求并按大小分片
//! - `BatchSubmitter` - 校验分片、带重试提交任务
//! - `ResultHarvester` - 轮询任务、下载解析结果
//! - `Aggregator` - 合并各任务统计，生成全局报告
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/app` - 按运行模式串联各服务

pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;

// 重新导出常用类型
pub use clients::{BatchApi, BatchJob, BatchStatus, InMemoryBatchClient, ZhipuBatchClient};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{FormulaType, NormalizedRecord, Taxonomy};
pub use orchestrator::{App, Mode};
