//! `herald run`: the scheduler loop and control surface.

use std::sync::Arc;

use chrono::Utc;
use miette::Result;
use tokio::sync::watch;
use tracing::{error, info, warn};

use herald_bluesky::{
    BlueskyClient, BlueskyTransport, Directory, MentionSource, PostSearchSource, Strategy,
    TargetListSource,
};
use herald_compose::ChatCompletionGenerator;
use herald_outreach::{CandidateSource, Outreach, Scheduler};
use herald_quota::{QuotaStore, QuotaTracker, RecipientLedger};
use herald_web::AppState;

use crate::config::RunArgs;

/// Run until interrupted, then flush state.
pub async fn run(args: RunArgs) -> Result<()> {
    let config = args
        .outreach_config()
        .map_err(|e| miette::miette!("invalid configuration: {}", e))?;
    let state_dir = args.state.resolve();
    tokio::fs::create_dir_all(&state_dir)
        .await
        .map_err(|e| miette::miette!("failed to create {}: {}", state_dir.display(), e))?;

    info!(
        state_dir = %state_dir.display(),
        strategy = %args.strategy,
        daily_target = config.policy.daily_target,
        min_interval_secs = config.policy.min_interval.num_seconds(),
        "starting herald"
    );

    let client = Arc::new(
        BlueskyClient::new(&args.pds_url, &args.handle, &args.app_password)
            .await
            .map_err(|e| miette::miette!("failed to create Bluesky client: {}", e))?,
    );
    let own_did = client
        .did()
        .await
        .map_err(|e| miette::miette!("failed to get DID: {}", e))?;

    let now = Utc::now();
    let tracker = QuotaTracker::open(QuotaStore::in_dir(&state_dir), config.policy, now).await;
    let ledger = RecipientLedger::open_in_dir(&state_dir).await;
    info!(contacted = ledger.len(), "loaded recipient ledger");

    let source = build_source(&args, Arc::clone(&client), &own_did, &ledger).await?;
    let generator = Arc::new(ChatCompletionGenerator::new(args.compose_config()));
    let transport = Arc::new(BlueskyTransport::new(
        Arc::clone(&client),
        args.provider_cap_fallback(),
    ));

    let outreach = Arc::new(Outreach::new(
        config, tracker, ledger, source, generator, transport,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal");
        let _ = shutdown_tx_clone.send(true);
    });

    let scheduler = Scheduler::new(Arc::clone(&outreach));
    let mut scheduler_handle = {
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move { scheduler.run(shutdown_rx).await })
    };

    let web_handle = if args.no_control {
        info!("control surface disabled");
        None
    } else {
        let state = Arc::new(AppState::new(Arc::clone(&outreach)));
        let mut web_shutdown_rx = shutdown_rx.clone();
        let shutdown = async move {
            let _ = web_shutdown_rx.wait_for(|stop| *stop).await;
        };
        let port = args.port;
        let shutdown_tx = shutdown_tx.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = herald_web::run_server(state, port, shutdown).await {
                error!(error = %e, "control surface failed, shutting down");
                let _ = shutdown_tx.send(true);
            }
        }))
    };

    // Wait for shutdown, or for the scheduler to stop on its own
    let mut main_shutdown_rx = shutdown_rx.clone();
    let (scheduler_joined, scheduler_failed) = tokio::select! {
        biased;
        _ = async { let _ = main_shutdown_rx.wait_for(|stop| *stop).await; } => (false, false),
        result = &mut scheduler_handle => {
            // The scheduler also exits on shutdown; only an early exit is a failure.
            let requested = *main_shutdown_rx.borrow();
            if !requested {
                match result {
                    Ok(()) => error!("scheduler stopped unexpectedly, shutting down"),
                    Err(e) => error!(error = %e, "scheduler task failed, shutting down"),
                }
                let _ = shutdown_tx.send(true);
            }
            (true, !requested)
        }
    };

    info!("shutting down");

    if !scheduler_joined {
        let _ = scheduler_handle.await;
    }
    if let Some(handle) = web_handle {
        let _ = handle.await;
    }

    if let Err(e) = outreach.flush().await {
        warn!(error = %e, "failed to flush state on shutdown");
        return Err(miette::miette!("failed to flush state: {}", e));
    }

    if scheduler_failed {
        return Err(miette::miette!("scheduler stopped before shutdown was requested"));
    }

    info!("herald shut down gracefully");
    Ok(())
}

async fn build_source(
    args: &RunArgs,
    client: Arc<BlueskyClient>,
    own_did: &str,
    ledger: &RecipientLedger,
) -> Result<Arc<dyn CandidateSource>> {
    let fallback = args.provider_cap_fallback();
    let directory: Arc<dyn Directory> = client.clone();

    let source: Arc<dyn CandidateSource> = match args.strategy {
        Strategy::Targets => {
            let path = args
                .target_file
                .as_deref()
                .ok_or_else(|| miette::miette!("the targets strategy needs --target-file"))?;
            let source = TargetListSource::from_file(directory, path, own_did, fallback)
                .await
                .map_err(|e| miette::miette!("{}", e))?
                .with_contacted(ledger.ids());
            info!(
                count = source.targets().len(),
                remaining = source.remaining(),
                "loaded targets"
            );
            Arc::new(source)
        }
        Strategy::Search => {
            let query = args
                .query
                .as_deref()
                .ok_or_else(|| miette::miette!("the search strategy needs --query"))?;
            Arc::new(PostSearchSource::new(directory, query, own_did, fallback))
        }
        Strategy::Mentions => Arc::new(MentionSource::new(
            directory,
            client.handle(),
            own_did,
            fallback,
        )),
    };

    Ok(source)
}
