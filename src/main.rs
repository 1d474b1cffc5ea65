use voxchat::{init_tracing, run, AppSettings};

#[tokio::main]
async fn main() {
    // Load VOXCHAT_* overrides from a local .env when present.
    let _ = dotenvy::dotenv();
    init_tracing();

    let settings = AppSettings::load();
    if let Err(e) = run(settings).await {
        eprintln!("voxchat: {}", e);
        std::process::exit(1);
    }
}
