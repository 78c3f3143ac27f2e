//=====================================================
// File: logging.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Tracing setup for the loader binary and embedding hosts
// Objective: Install one fmt subscriber with an env filter, at most once
//=====================================================

use std::env;
use std::sync::OnceLock;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::SubscriberBuilder;

static INIT: OnceLock<()> = OnceLock::new();

/// Initialize tracing with a component label.
///
/// A valid `RUST_LOG` decides the filter on its own. Otherwise events at
/// INFO and above are shown, or DEBUG and above when `verbose` is set.
pub fn init(component: &str, verbose: bool) {
    INIT.get_or_init(|| {
        let rust_log = env::var(EnvFilter::DEFAULT_ENV).ok();
        // Fails when the host already installed a global subscriber.
        let _ = SubscriberBuilder::default()
            .with_env_filter(filter_for(rust_log.as_deref(), verbose))
            .with_target(true)
            .with_ansi(true)
            .with_writer(std::io::stderr)
            .compact()
            .try_init();
    });
    tracing::debug!(component, "tracing initialised");
}

fn filter_for(rust_log: Option<&str>, verbose: bool) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| {
            let floor = if verbose { Level::DEBUG } else { Level::INFO };
            EnvFilter::default().add_directive(floor.into())
        })
}
