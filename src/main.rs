use std::sync::Arc;

use anyhow::Context;
use cleanse_lib::config::Config;
use cleanse_lib::gemini::GeminiClient;
use cleanse_lib::local_server;
use log::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env().context("refusing to start")?;
    info!("Using model {} via {}", config.model, config.api_base);

    let editor = GeminiClient::new(&config).context("failed to set up generation client")?;
    local_server::start_server(&config, Arc::new(editor))
        .await
        .context("server failed to start")?;

    Ok(())
}
