use anyhow::Result;
use study_session::utils::logging;
use study_session::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load()?;

    // 初始化日志
    logging::init(&config);

    // 初始化并运行应用
    let app = App::initialize(config)?;
    let args: Vec<String> = std::env::args().skip(1).collect();
    app.run(&args).await?;

    Ok(())
}
