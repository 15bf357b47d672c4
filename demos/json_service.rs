use std::time::Instant;
use tracing::{error, info, info_span};

use serde_json::json;
use tracing_record_formatter::context::spawn;
use tracing_record_formatter::init::init_json;
use tracing_record_formatter::runtime::named_task;
use tracing_record_formatter::{
    inject_log_context, ExtraProvider, FormatterConfig, LogContextProvider, RequestInfo,
    RequestProvider, RuntimeProvider,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = FormatterConfig::from_env()?
        .with_provider(RuntimeProvider)
        .with_provider(RequestProvider::request())
        .with_provider(LogContextProvider::log_context())
        .with_provider(ExtraProvider);
    init_json(config)?;

    info!("starting service");

    let _deployment = inject_log_context([("deployment", json!("eu-west-1"))])?;

    let request = RequestInfo {
        route: Some("/login".to_string()),
        url: "https://auth.example.com/login".to_string(),
        remote_addr: Some("10.0.0.7".to_string()),
        ..RequestInfo::new("POST", "/login")
    };

    spawn(named_task(
        "login-handler",
        request.scope(async {
            info_span!("login").in_scope(|| {
                error!(user_id = 42, reason = "invalid password", "authentication failed");
            });
        }),
    ))
    .await?;

    let n: u64 = 10_000;
    let start = Instant::now();
    for i in 0..n {
        info!(iteration = i, "load test");
    }
    let elapsed = start.elapsed();
    eprintln!(
        "formatted {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );
    Ok(())
}
