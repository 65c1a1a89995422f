use std::{process, sync::Arc, time::Duration};

use bozza::{
    application::{
        adapters::{RemoteDraftClient, SessionProvider, SnapshotStore},
        editor::{CommitDue, ConnectivityMonitor, EditorService, ReconcileOutcome},
        error::AppError,
    },
    config,
    infra::{
        http::{HttpDraftClient, RateLimitStore},
        session::ConfiguredSession,
        storage::FileSnapshotStore,
        telemetry,
    },
    presentation::repl,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{Dispatch, Level, debug, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Edit(Box::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Edit(args) => run_edit(settings, *args).await,
        config::Command::Sync(_) => run_sync(settings).await,
        config::Command::Status(_) => run_status(settings).await,
        config::Command::Discard(args) => run_discard(settings, args).await,
    }
}

struct Engine {
    service: EditorService,
    fires: UnboundedReceiver<CommitDue>,
    client: Arc<HttpDraftClient>,
    limiter: RateLimitStore,
}

fn build_engine(settings: &config::Settings) -> Result<Engine, AppError> {
    let limiter = RateLimitStore::new(
        Duration::from_secs(u64::from(settings.rate_limit.window_seconds.get())),
        settings.rate_limit.max_requests.get(),
    );
    let client = Arc::new(
        HttpDraftClient::new(
            &settings.remote.base_url,
            settings.remote.api_token.clone(),
            settings.remote.account_id,
            limiter.clone(),
        )
        .map_err(AppError::from)?,
    );

    let remote: Arc<dyn RemoteDraftClient> = client.clone();
    let sessions: Arc<dyn SessionProvider> =
        Arc::new(ConfiguredSession::from_settings(&settings.remote));
    let snapshots: Arc<dyn SnapshotStore> = Arc::new(FileSnapshotStore::new(
        settings.storage.snapshot_path.clone(),
    ));

    let (service, fires) =
        EditorService::new(remote, sessions, snapshots, settings.autosave.quiet_period);

    Ok(Engine {
        service,
        fires,
        client,
        limiter,
    })
}

async fn run_edit(settings: config::Settings, args: config::EditArgs) -> Result<(), AppError> {
    let Engine {
        mut service,
        mut fires,
        client,
        limiter,
    } = build_engine(&settings)?;

    let monitor = ConnectivityMonitor::new(false);

    // The first probe runs before the shell so the startup reconciliation of
    // any leftover snapshot happens ahead of user input.
    let online = client.probe().await;
    monitor.set_online(online);
    if let Some(ReconcileOutcome::Synced { draft_id }) = service.set_connectivity(online).await {
        println!("leftover draft synced ({draft_id})");
    }

    if let Some(post_id) = args.edit {
        service.load_for_editing(post_id).await?;
        println!("editing post {post_id}");
    }

    let probe_handle = spawn_probe_loop(
        client.clone(),
        monitor.clone(),
        settings.connectivity.probe_interval,
    );
    let sweep_handle = spawn_sweep_loop(limiter, settings.rate_limit.sweep_cadence);

    let result = repl::run(&mut service, &mut fires, &monitor).await;

    probe_handle.abort();
    let _ = probe_handle.await;
    sweep_handle.abort();
    let _ = sweep_handle.await;

    result
}

async fn run_sync(settings: config::Settings) -> Result<(), AppError> {
    let Engine {
        mut service, client, ..
    } = build_engine(&settings)?;

    let online = client.probe().await;
    let outcome = match service.set_connectivity(online).await {
        Some(outcome) => outcome,
        None => ReconcileOutcome::Offline,
    };

    match outcome {
        ReconcileOutcome::NoSnapshot => println!("no local snapshot to sync"),
        ReconcileOutcome::ClearedBlank => println!("dropped a blank local snapshot"),
        ReconcileOutcome::Synced { draft_id } => println!("local draft synced ({draft_id})"),
        ReconcileOutcome::Offline => println!("server unreachable, snapshot kept"),
        ReconcileOutcome::Deferred => println!("sync deferred, snapshot kept"),
    }
    Ok(())
}

async fn run_status(settings: config::Settings) -> Result<(), AppError> {
    let Engine { service, client, .. } = build_engine(&settings)?;

    let online = client.probe().await;
    let status = serde_json::json!({
        "online": online,
        "signed_in": settings.remote.account_id.is_some() && settings.remote.api_token.is_some(),
        "snapshot_path": settings.storage.snapshot_path,
        "snapshot": service.peek_snapshot(),
    });
    let rendered = serde_json::to_string_pretty(&status)
        .map_err(|err| AppError::unexpected(format!("failed to render status: {err}")))?;
    println!("{rendered}");
    Ok(())
}

async fn run_discard(settings: config::Settings, args: config::DiscardArgs) -> Result<(), AppError> {
    let Engine { mut service, .. } = build_engine(&settings)?;

    service.discard_snapshot(args.remote).await?;
    println!("local snapshot dropped");
    Ok(())
}

fn spawn_probe_loop(
    client: Arc<HttpDraftClient>,
    monitor: ConnectivityMonitor,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await; // Skip the first immediate tick; startup already probed
        loop {
            interval.tick().await;
            let online = client.probe().await;
            if monitor.set_online(online) {
                info!(target = "bozza::probe", online, "connectivity changed");
            }
        }
    })
}

fn spawn_sweep_loop(limiter: RateLimitStore, cadence: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cadence);
        interval.tick().await;
        loop {
            interval.tick().await;
            let evicted = limiter.sweep();
            if evicted > 0 {
                debug!(evicted, "idle throttle buckets swept");
            }
        }
    })
}
