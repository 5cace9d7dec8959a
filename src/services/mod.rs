//! 业务服务层
//!
//! 流水线的五个阶段：清洗、打包、提交、收取、汇总。

pub mod aggregator;
pub mod cleaner;
pub mod harvester;
pub mod packager;
pub mod submitter;

pub use aggregator::Aggregator;
pub use cleaner::{CleanStats, RecordCleaner};
pub use harvester::{load_task_ids, HarvestOutcome, ResultHarvester};
pub use packager::{BatchPackager, PackageOutcome};
pub use submitter::{validate_shard, BatchSubmitter, SubmitOutcome};
