//! `scribe chat`: interactive session over stdin.

use super::runtime::Runtime;
use std::future::Future;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

pub async fn run(profile: Option<&str>, skip_approval: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut runtime = Runtime::build(profile, skip_approval)?;
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║          Scribe: Interactive Session         ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:  {}", runtime.provider_name);
    println!("  Model:     {}", runtime.model);
    println!(
        "  Approval:  {}",
        if runtime.approval_enabled { "required for every change" } else { "off" }
    );
    println!();
    println!("  Type your task and press Enter. '/reset' clears the history,");
    println!("  'exit' or Ctrl+C at the prompt quits; Ctrl+C during a task cancels it.");
    println!();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = next_task(&mut input, tokio::signal::ctrl_c()).await? else {
            println!();
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "exit" | "quit" => break,
            "/reset" => {
                runtime.reset();
                println!("  History cleared.");
                continue;
            }
            _ => {}
        }

        let outcome = runtime.execute(line, &mut input).await?;
        if outcome.is_completed()
            && runtime.config.telemetry.enabled
            && let Some(totals) = runtime.tracker().last_run()
        {
            eprintln!("  ({})", totals.summary());
        }
        println!();
    }

    if runtime.config.telemetry.enabled {
        let snapshot = runtime.tracker().snapshot();
        if snapshot.runs > 0 {
            println!("  Session total: {}", snapshot.total.summary());
        }
    }
    println!("  Goodbye!");
    Ok(())
}

/// The next line typed at the prompt, or `None` on end of input or when
/// `interrupt` fires first.
async fn next_task<R, I>(input: &mut Lines<R>, interrupt: I) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    I: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        line = input.next_line() => line,
        _ = interrupt => Ok(None),
    }
}
