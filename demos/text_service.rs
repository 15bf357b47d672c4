use tracing::{info, warn};

use tracing_record_formatter::init::init_text;
use tracing_record_formatter::{ExtraProvider, FormatterConfig, RuntimeProvider};

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = FormatterConfig::new()
        .with_provider(RuntimeProvider)
        .with_provider(ExtraProvider);
    init_text("{timestamp} {status} [{thread}] {location} | {message}", config)?;

    info!("starting worker");
    // `status` is recorded at the call site, so it shadows the computed one.
    warn!(status = "degraded", "queue is backing up");
    Ok(())
}
