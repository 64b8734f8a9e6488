//! sqlbeat: poll MySQL with read-only queries and emit metric records
//!
//! ## Usage
//!
//! `sqlbeat [CONFIG]`: records are written to stdout as JSON lines.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | SQLBEAT_CONFIG | sqlbeat.toml | Config path when none is given on the command line |
//! | SQLBEAT_LOG_FORMAT | text | `text` or `json` |
//! | RUST_LOG | info | Log filter |
//! | SQLBEAT_HOSTNAME, SQLBEAT_PORT, SQLBEAT_USERNAME, SQLBEAT_PASSWORD, SQLBEAT_PERIOD_MS | - | Config overrides |

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use sqlbeat::observability::{init_tracing, LogFormat};
use sqlbeat::publish::JsonLinesPublisher;
use sqlbeat::source::mysql::MySqlExecutor;
use sqlbeat::{Beat, BeatConfig, SystemClock};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const DEFAULT_CONFIG_PATH: &str = "sqlbeat.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(LogFormat::from_env()).map_err(|e| e as Box<dyn std::error::Error>)?;

    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("SQLBEAT_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    info!(path = %path, "loading configuration");

    let config = BeatConfig::load(&path).inspect_err(|e| error!(error = %e, "invalid configuration"))?;

    let executor = MySqlExecutor::new(&config.database);
    let mut beat = Beat::new(&config, executor, JsonLinesPublisher::stdout(), SystemClock::new())
        .inspect_err(|e| error!(error = %e, "invalid configuration"))?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl-C, stopping after the current cycle");
                signal_token.cancel();
            }
            Err(e) => warn!(error = %e, "unable to listen for Ctrl-C"),
        }
    });

    let result = beat.run(shutdown).await;

    let (executor, _publisher) = beat.into_parts();
    executor.shutdown().await;

    result?;
    info!("sqlbeat stopped");
    Ok(())
}
