//! `scribe run`: one task, then exit.

use super::runtime::Runtime;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(
    profile: Option<&str>,
    message: &str,
    skip_approval: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut runtime = Runtime::build(profile, skip_approval)?;
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    let outcome = runtime.execute(message, &mut input).await?;

    if runtime.config.telemetry.enabled
        && let Some(totals) = runtime.tracker().last_run()
    {
        eprintln!();
        eprintln!("  {}", totals.summary());
    }

    match outcome.failure() {
        Some(reason) => Err(reason.to_string().into()),
        None => Ok(()),
    }
}
