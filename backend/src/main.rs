use clap::Parser;
use portal_lib::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    log::info!("Starting transcription portal...");
    portal_lib::run(config).await
}
