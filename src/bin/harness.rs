use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use file_async_harness::{
    cli::{Cli, Role},
    client::HttpSink,
    config::{HarnessConfig, ReceiverConfig, SenderConfig},
    error::HarnessError,
    logging::init_tracing,
    scheduler::Scheduler,
    server::ReceiverServer,
    verify::compare_dirs,
};
use tokio::fs;
use tracing::{error, info, warn};

async fn run_sender(config: SenderConfig) -> Result<bool, HarnessError> {
    fs::create_dir_all(&config.output_dir)
        .await
        .map_err(|err| HarnessError::io(&config.output_dir, err))?;

    let sink = Arc::new(HttpSink::new(
        config.receiver_url(),
        config.timeout_options.clone(),
    ));
    let summary = Scheduler::new(config, sink).run().await;
    for failure in &summary.failures {
        warn!("task {} failed: {}", failure.task_id, failure.reason);
    }
    Ok(summary.is_success())
}

async fn run_receiver(config: ReceiverConfig) -> Result<bool, HarnessError> {
    let mut server = ReceiverServer::new(config);
    server.listen().await?;

    let outcome = tokio::select! {
        res = server.wait() => Some(res),
        _ = tokio::signal::ctrl_c() => None,
    };
    match outcome {
        Some(res) => res?,
        None => {
            info!("shutting down");
            server.stop().await?;
        }
    }
    Ok(true)
}

async fn run_verify(config: HarnessConfig) -> Result<bool, HarnessError> {
    let report = compare_dirs(&config.sender.output_dir, &config.receiver.output_dir).await?;
    Ok(report.is_clean())
}

async fn run(cli: Cli) -> Result<bool, HarnessError> {
    let config = cli.to_config();
    config.validate()?;

    match cli.server {
        Role::Sender => run_sender(config.sender).await,
        Role::Receiver => run_receiver(config.receiver).await,
        Role::Verify => run_verify(config).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
