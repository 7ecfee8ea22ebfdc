use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod demo;
use demo::{DemoApp, DemoFramework};

use treelens_core::backend::Backend;
use treelens_core::config::{logs_dir, TreelensConfig};
use treelens_core::events::BackendEvent;
use treelens_core::ipc::BridgeServer;
use treelens_core::poller::{PollerConfig, SelectionPoller};

#[derive(Parser)]
#[command(name = "treelens-server")]
#[command(about = "Serves a demo component tree to a treelens inspector")]
struct Args {
    /// Session name for the bridge socket
    #[arg(short, long, default_value = "default", env = "TREELENS_SESSION")]
    session: String,

    /// Selection polling interval in milliseconds (overrides the config file)
    #[arg(long)]
    poll_ms: Option<u64>,

    /// Advance the demo counter every N milliseconds (0 disables)
    #[arg(long, default_value_t = 0)]
    tick_ms: u64,

    /// Point the framework's tooling at this demo component on startup
    #[arg(long)]
    inspect: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Setup logging
    let log_dir = logs_dir();
    let file_appender = tracing_appender::rolling::never(&log_dir, "treelens-server.log");
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(file_appender)
        .with_ansi(false)
        .init();

    info!(session = %args.session, "Starting treelens-server");

    let mut config = TreelensConfig::load();
    if let Some(poll_ms) = args.poll_ms {
        config.selection_poll_ms = poll_ms;
    }

    let framework = DemoFramework::new();
    let backend = Backend::with_host(config, framework.clone());
    let demo = Arc::new(DemoApp::mount(&backend, &framework)?);

    if let Some(name) = &args.inspect {
        match demo.find(name) {
            Some(component) => framework.inspect(framework.screen_node(component)),
            None => warn!(component = %name, "no such demo component"),
        }
    }

    let poller = SelectionPoller::spawn(backend.clone(), PollerConfig::from(backend.config()));
    let ticker = (args.tick_ms > 0).then(|| {
        spawn_ticker(
            backend.clone(),
            demo.clone(),
            Duration::from_millis(args.tick_ms),
        )
    });

    let server = BridgeServer::new(backend.clone(), &args.session);
    let mut events = backend.subscribe();
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                info!(error = %e, "Bridge server exited");
            }
        }
        _ = wait_for_shutdown(&mut events) => {
            info!("Shutdown requested by inspector");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
    }

    info!("Cleaning up");
    if let Some(ticker) = ticker {
        ticker.abort();
    }
    poller.stop().await;
    backend.detach_bridge();
    info!(renders = demo.counter.renders(), "Counter render count");
    // Dropping the server removes its socket.
    drop(server);
    info!("Server stopped");

    Ok(())
}

/// Resolves once the backend emits `shutdown`.
async fn wait_for_shutdown(events: &mut broadcast::Receiver<BackendEvent>) {
    loop {
        match events.recv().await {
            Ok(BackendEvent::Shutdown) => return,
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "shutdown watcher lagged behind backend events");
            }
            Err(RecvError::Closed) => std::future::pending::<()>().await,
        }
    }
}

fn spawn_ticker(backend: Arc<Backend>, demo: Arc<DemoApp>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            demo.tick(&backend);
        }
    })
}
