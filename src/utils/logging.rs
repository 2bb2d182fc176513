/// 日志工具模块
///
/// 提供日志初始化和格式化输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// 初始化 tracing 日志
///
/// `RUST_LOG` 优先；未设置时根据 `verbose_logging` 使用 `debug` 或 `info`。
/// 重复调用是安全的（测试中常见）。
pub fn init(config: &Config) {
    let default_level = if config.verbose_logging { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录会话开始信息
///
/// # 参数
/// - `document`: 文档名称
/// - `batch_size`: 每批题目数量
pub fn log_session_start(document: &str, batch_size: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 开始学习会话: {}", document);
    info!("📊 每批题目数量: {}", batch_size);
    info!("{}", "=".repeat(60));
}

/// 记录批次开始信息
///
/// # 参数
/// - `start`: 起始游标（0-based）
/// - `end`: 结束游标（不含）
/// - `total`: 题目总数
pub fn log_batch_start(start: usize, end: usize, total: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 正在求解第 {}-{} 题 / 共 {} 题", start + 1, end, total);
    info!("{}", "=".repeat(60));
}

/// 记录批次完成信息
pub fn log_batch_complete(start: usize, score: usize, total: usize, cursor: usize, all: usize) {
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ 批次 {} 完成: 得分 {}/{}，进度 {}/{}",
        start + 1,
        score,
        total,
        cursor,
        all
    );
    info!("{}", "─".repeat(60));
}

/// 打印整份文档完成后的统计信息
pub fn print_final_stats(score: usize, total: usize, batches: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部题目完成");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 总得分: {}/{}（共 {} 批）", score, total, batches);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大字符数
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
