use kiosk_server::{Config, Server, ServerState, print_banner, setup_environment};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. 加载 .env 和配置
    let _ = dotenv::dotenv();
    let config = Config::from_env();

    // 2. 设置环境 (工作目录, 日志)
    setup_environment(&config)?;

    print_banner();

    tracing::info!(environment = %config.environment, "💊 Kiosk server starting...");

    // 3. 初始化服务器状态
    let state = ServerState::initialize(&config).await?;

    // 4. 启动 HTTP 服务器
    let server = Server::with_state(config, state);

    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
