use anyhow::Result;
use clap::Parser;
use ocpi_node::{CliArgs, LoggingConfig, ServerConfig, init_logging, run_server};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    let logging = LoggingConfig::from_env();
    let _guard = init_logging(&logging)?;

    let config = ServerConfig::from_args(args)?;
    run_server(config).await
}
