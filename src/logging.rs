//=============================================
// solvra_lua/logging.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Tracing helpers shared by the CLI, demos and embedding hosts
// Objective: Install one fmt subscriber per process with a component label
//=============================================

use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::SubscriberBuilder;

static INIT: OnceLock<()> = OnceLock::new();

/// Initialize tracing at `info` unless `RUST_LOG` says otherwise.
pub fn init(component: &str) {
    init_with_default(component, "info");
}

/// Initialize tracing with a fallback directive used when `RUST_LOG` is unset.
/// Later calls only log the component label.
pub fn init_with_default(component: &str, directive: &str) {
    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
        // Another subscriber may already be installed by the embedding host.
        let _ = SubscriberBuilder::default()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact()
            .try_init();
    });
    tracing::info!(component, "tracing initialised");
}
