use clap::Parser;
use conversation_store::cli::{self, Cli};
use conversation_store::config::StoreConfig;
use conversation_store::context::Stores;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    // 日志写 stderr，stdout 只留给 JSON 输出
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "conversation_store=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match execute(cli).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("❌ {err}");
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> conversation_store::error::Result<String> {
    let mut config = StoreConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config = config.with_data_dir(dir);
    }
    let stores = Stores::open(&config)?;
    let value = cli::run(cli.command, &stores).await?;
    Ok(serde_json::to_string_pretty(&value)?)
}
