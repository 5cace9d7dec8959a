/// 日志工具模块
///
/// 提供日志初始化和输出格式的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化全局日志订阅器
///
/// 日志级别通过 RUST_LOG 环境变量控制，默认 info。
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `mode`: 运行模式名称
pub fn log_startup(mode: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 OEIS 公式分类流水线 - {} 模式", mode);
    info!(
        "启动时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
}

/// 记录阶段完成信息
///
/// # 参数
/// - `mode`: 运行模式名称
pub fn log_finished(mode: &str) {
    info!("\n{}", "=".repeat(60));
    info!("✅ {} 模式执行完成", mode);
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("a(n) = Fibonacci(n)", 6), "a(n) =...");
    }
}
