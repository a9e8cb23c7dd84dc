//! Tracing initialization and configuration.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Initialize the logging system.
///
/// Reads the `LGPD_LOG` environment variable for per-crate log levels.
/// Format: `LGPD_LOG=lgpd_scheduler=debug,lgpd_storage=warn`
///
/// Falls back to `info` for the workspace crates if `LGPD_LOG` is not set
/// or is invalid. Idempotent.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("LGPD_LOG").unwrap_or_else(|_| {
            EnvFilter::new(
                "lgpd_core=info,lgpd_detect=info,lgpd_storage=info,lgpd_sources=info,\
                 lgpd_report=info,lgpd_scheduler=info,lgpd=info",
            )
        });

        let _ = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(filter)
            .try_init();
    });
}
