use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dvroute::core::KernelRouteSink;
use dvroute::kernel::{IpRouteSink, IpRouteSource, LoggingSink};
use dvroute::{Router, RouterConfigBuilder};

#[derive(Parser)]
#[command(name = "dvrouted", version, about = "Distance-vector routing daemon")]
struct Cli {
    /// Router identifier announced to neighbors
    id: String,

    /// Control channel (TCP) listen port
    control_port: u16,

    /// Update channel (UDP) listen port
    update_port: u16,

    /// Neighbors to dial, as ip:port of their control channel
    neighbors: Vec<SocketAddr>,

    /// Address both listeners bind to
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    bind: IpAddr,

    /// Log forwarding-table changes instead of applying them
    #[arg(long)]
    no_kernel: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(default: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config = RouterConfigBuilder::new(cli.id)
        .bind_ip(cli.bind)
        .control_port(cli.control_port)
        .update_port(cli.update_port)
        .neighbors(cli.neighbors)
        .build();

    let sink: Arc<dyn KernelRouteSink> = if cli.no_kernel {
        Arc::new(LoggingSink)
    } else {
        Arc::new(IpRouteSink)
    };

    let router = match Router::bind(config, Arc::new(IpRouteSource::default()), sink).await {
        Ok(router) => router,
        Err(e) => {
            tracing::error!("failed to start router: {e}");
            return ExitCode::FAILURE;
        }
    };

    let handle = router.spawn();
    tokio::select! {
        result = handle.wait() => {
            if let Err(e) = result {
                tracing::error!("router stopped: {e}");
            }
            ExitCode::FAILURE
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received SIGINT, shutting down");
            ExitCode::SUCCESS
        }
    }
}
