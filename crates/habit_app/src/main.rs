use habit_app::app::{run, AppConfig};

fn main() {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let config = AppConfig::from_env().unwrap_or_else(|err| {
        tracing::warn!(%err, "invalid configuration, using defaults");
        AppConfig::default()
    });
    if let Err(err) = run(config) {
        eprintln!("Failed to run habit tracker: {err:#}");
    }
}
