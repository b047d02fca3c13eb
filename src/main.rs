// src/main.rs

use taskgroup::{RunOutcome, cli, logging, run};

#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("taskgroup error: {err:?}");
            std::process::exit(1);
        }
    }
}

/// `Ok(false)` when the run was cancelled or any task failed.
async fn run_main() -> anyhow::Result<bool> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    let ok = match run(args).await? {
        Some(summary) => summary.outcome == RunOutcome::Finished && summary.failure_count == 0,
        None => true,
    };
    Ok(ok)
}
