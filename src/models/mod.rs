//! 数据模型
//!
//! 管线各阶段之间交接的数据结构：清洗后的记录、批量请求、
//! 响应信封、分类结果和统计信息。

pub mod loaders;
pub mod record;
pub mod response;
pub mod statistics;
pub mod taxonomy;

pub use loaders::{find_all_record_files, load_record};
pub use record::{BatchRequest, ChatMessage, NormalizedRecord, RequestBody, ResponseFormat};
pub use response::{ClassificationResult, ExtractedFormula, ResponseEnvelope};
pub use statistics::{ShardStatistics, SummaryReport, TypeCounts, TypePercentages};
pub use taxonomy::{Category, FormulaType, Taxonomy};
