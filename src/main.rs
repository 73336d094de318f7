use clap::Parser;
use respite::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, RESPITE_JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    let config = respite::config::config();
    cli::init_tracing(config);

    let cli = Cli::parse();

    if let Err(e) = cli::run(cli, config).await {
        match std::env::var("RESPITE_VERBOSE").as_deref() {
            Ok("true") | Ok("1") => eprintln!("Error: {e:?}"),
            _ => eprintln!("Error: {e}"),
        }
        std::process::exit(1);
    }

    Ok(())
}
