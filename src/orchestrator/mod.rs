//! 编排层
//!
//! 按运行模式把各个服务串成完整的流水线。

pub mod app;

pub use app::{App, Mode};
