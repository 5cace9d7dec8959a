/// 程序配置文件
#[derive(Clone, Debug)]
pub struct Config {
    // --- 路径配置 ---
    /// 原始 OEIS 数据目录（.seq 文件）
    pub oeis_src_dir: String,
    /// 清洗后的记录 JSON 输出目录
    pub records_dir: String,
    /// 批量请求 JSONL 分片输出目录
    pub requests_dir: String,
    /// 任务ID列表文件
    pub task_id_file: String,
    /// 结果下载目录
    pub results_dir: String,
    // --- Batch API 配置 ---
    pub api_key: String,
    pub api_base_url: String,
    pub model_name: String,
    /// Batch 请求的目标端点
    pub endpoint: String,
    /// Batch 任务的完成时间窗口
    pub completion_window: String,
    // --- 分片配置 ---
    /// 每个分片最多包含的请求数
    pub max_requests_per_shard: usize,
    /// 每个分片的最大字节数
    pub max_shard_bytes: usize,
    // --- 请求参数 ---
    pub temperature: f32,
    pub max_tokens: u32,
    /// 上传/创建任务失败时的最大重试次数
    pub max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            oeis_src_dir: "oeis".to_string(),
            records_dir: "oeis_onlyclean_json".to_string(),
            requests_dir: "batch_requests".to_string(),
            task_id_file: "batch_task_ids.txt".to_string(),
            results_dir: "batch_results".to_string(),
            api_key: String::new(),
            api_base_url: "https://open.bigmodel.cn/api/paas/v4".to_string(),
            model_name: "glm-4-flash".to_string(),
            endpoint: "/v4/chat/completions".to_string(),
            completion_window: "24h".to_string(),
            max_requests_per_shard: 50_000,
            max_shard_bytes: 100 * 1024 * 1024,
            temperature: 0.1,
            max_tokens: 2000,
            max_retries: 3,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            oeis_src_dir: std::env::var("OEIS_SRC_DIR").unwrap_or(default.oeis_src_dir),
            records_dir: std::env::var("RECORDS_DIR").unwrap_or(default.records_dir),
            requests_dir: std::env::var("REQUESTS_DIR").unwrap_or(default.requests_dir),
            task_id_file: std::env::var("TASK_ID_FILE").unwrap_or(default.task_id_file),
            results_dir: std::env::var("RESULTS_DIR").unwrap_or(default.results_dir),
            api_key: std::env::var("BATCH_API_KEY").unwrap_or(default.api_key),
            api_base_url: std::env::var("BATCH_API_BASE_URL").unwrap_or(default.api_base_url),
            model_name: std::env::var("BATCH_MODEL_NAME").unwrap_or(default.model_name),
            endpoint: std::env::var("BATCH_ENDPOINT").unwrap_or(default.endpoint),
            completion_window: std::env::var("BATCH_COMPLETION_WINDOW")
                .unwrap_or(default.completion_window),
            max_requests_per_shard: std::env::var("MAX_REQUESTS_PER_SHARD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_requests_per_shard),
            max_shard_bytes: std::env::var("MAX_SHARD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_shard_bytes),
            temperature: std::env::var("LLM_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.temperature),
            max_tokens: std::env::var("LLM_MAX_TOKENS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_tokens),
            max_retries: std::env::var("MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_retries),
        }
    }
}
