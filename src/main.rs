use anyhow::Result;

use oeis_formula_classify::orchestrator::{App, Mode};
use oeis_formula_classify::utils::logging;
use oeis_formula_classify::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 解析运行模式
    let arg = std::env::args().nth(1);
    let Some(mode) = arg.as_deref().and_then(Mode::parse) else {
        print_usage();
        std::process::exit(2);
    };

    // 加载配置
    let config = Config::from_env();

    // 初始化并运行应用
    App::initialize(config).run(mode).await?;

    Ok(())
}

fn print_usage() {
    eprintln!("用法: oeis_formula_classify <模式>");
    eprintln!();
    eprintln!("模式:");
    eprintln!("  clean     清洗原始 OEIS 数据，抽取公式行");
    eprintln!("  submit    打包批量请求分片并提交 Batch 任务");
    eprintln!("  status    检查所有已提交任务的状态");
    eprintln!("  download  下载已完成任务的结果并解析");
    eprintln!("  summary   汇总所有任务统计，生成全局报告");
}
