//! Batch API 客户端层
//!
//! `BatchApi` 是远程服务的唯一接口；`ZhipuBatchClient` 是走网络的实现，
//! `InMemoryBatchClient` 在测试和干跑时替代它。

pub mod batch_api;
pub mod memory;
pub mod zhipu_client;

pub use batch_api::{BatchApi, BatchJob, BatchMetadata, BatchStatus, CreateBatchRequest};
pub use memory::InMemoryBatchClient;
pub use zhipu_client::ZhipuBatchClient;
