use govbot_server::{ServerConfig, init_tracing, run_server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e.into());
        }
    }

    let config = ServerConfig::from_env()?;
    init_tracing(config.log_format);

    run_server(config).await
}
