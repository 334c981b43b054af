use clap::Parser;
use scribble_collab::DEFAULT_PORT;

/// Runs the collaborative editing server. Takes no arguments: it always
/// binds `0.0.0.0:6969`.
#[derive(Parser, Debug)]
#[command(name = "server", about = "Collaborative text editor server")]
struct Args;

#[tokio::main]
async fn main() {
    Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let addr = format!("0.0.0.0:{DEFAULT_PORT}");
    if let Err(err) = scribble_collab::server::run(&addr).await {
        tracing::error!(%err, "server failed");
        std::process::exit(1);
    }
}
