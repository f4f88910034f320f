use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use quickconnect_resolver::config::Config;
use quickconnect_resolver::Resolver;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("quickconnect_resolver=info,qc_resolve=info")
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let id = args
        .next()
        .context("usage: qc-resolve <quickconnect-id> [config.toml]")?;

    let config = match args.next() {
        Some(path) => {
            let config = Config::load(&path)
                .with_context(|| format!("Failed to load config from {}", path))?;
            tracing::info!("Loaded config from {}", path);
            config
        }
        None => Config::default(),
    };

    let resolver = Resolver::new(config.resolve_options())?;

    // Cancel the resolution on Ctrl-C
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling");
            interrupt.cancel();
        }
    });

    let urls = resolver
        .resolve(&id, &cancel)
        .await
        .with_context(|| format!("Failed to resolve {}", id))?;

    for url in urls {
        println!("{url}");
    }
    Ok(())
}
