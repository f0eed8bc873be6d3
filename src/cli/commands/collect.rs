//! `stetho collect`: the full pipeline.

use tokio_util::sync::CancellationToken;
use tracing::info;

use stetho_collect::{CollectorPhase, ProgressReceiver, ScheduleOptions};

use crate::cli::args::CollectArgs;
use crate::cli::commands::common;
use crate::config::RuntimeConfig;
use crate::error::StethoError;
use crate::exit_codes;
use crate::run::{connect_cluster, run_pipeline, PipelineOptions};

pub async fn run(
    args: &CollectArgs,
    interactive: bool,
    config: &RuntimeConfig,
) -> Result<i32, StethoError> {
    let sources = common::parse_sources(&args.load.sources)?;
    let load = common::load_options(&args.load, config);

    if args.dry_run {
        let specs = crate::run::load_specs(&sources, load, connect_cluster().await).await?;
        common::print_specs(&specs)?;
        return Ok(exit_codes::codes::PASS);
    }

    let client = connect_cluster().await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received; finishing current collector");
            trigger.cancel();
        }
    });

    let (progress_tx, progress_rx) = stetho_collect::channel();
    let consumer = spawn_progress_consumer(progress_rx, interactive);

    let schedule = ScheduleOptions {
        ignore_permission_errors: args.collect_without_permissions,
        remote_image: config.remote_image.clone(),
        remote_namespace: config.remote_namespace.clone(),
        ..ScheduleOptions::default()
    };

    let options = PipelineOptions {
        load,
        schedule,
        output: args.output.clone(),
        workdir: None,
        since: args.since.clone(),
        since_time: args.since_time.clone(),
        namespace: args.namespace.clone(),
    };

    let outcome = run_pipeline(&sources, client, options, progress_tx, cancel.clone()).await?;
    let _ = consumer.await;

    for result in &outcome.results {
        println!(
            "{}: {} - {}",
            result.verdict.as_str().to_uppercase(),
            result.title,
            result.message
        );
    }
    for (title, reason) in &outcome.summary.failed {
        println!("collector {title} failed: {reason}");
    }
    println!("bundle written to {}", outcome.archive.display());

    if outcome.interrupted {
        return Ok(exit_codes::codes::GENERIC);
    }
    Ok(exit_codes::from_results(&outcome.results))
}

/// Drain progress events. Interactive mode renders to the terminal;
/// otherwise events go to the structured log.
fn spawn_progress_consumer(
    mut receiver: ProgressReceiver,
    interactive: bool,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            if let Some(message) = &event.message {
                tracing::warn!(collector = %event.current_name, "{message}");
            }
            match event.current_status {
                CollectorPhase::Running if interactive => {
                    println!(
                        "[{}/{}] collecting {}",
                        event.completed + 1,
                        event.total,
                        event.current_name
                    );
                }
                CollectorPhase::Failed | CollectorPhase::Skipped if interactive => {
                    println!(
                        "[{}/{}] {} {:?}",
                        event.completed, event.total, event.current_name, event.current_status
                    );
                }
                _ if interactive => {}
                _ => {
                    tracing::debug!(
                        collector = %event.current_name,
                        status = ?event.current_status,
                        completed = event.completed,
                        total = event.total,
                        "progress"
                    );
                }
            }
        }
    })
}
