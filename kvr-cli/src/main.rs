use clap::Parser;
use kvr_cli::{KvrCli, run};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = KvrCli::parse();
    run(cli).await
}
