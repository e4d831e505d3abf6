use tracing::Subscriber;
use tracing_subscriber::{fmt, EnvFilter};

use crate::env::{Env, ENV_CONFIG};

// Used when RUST_LOG is unset, so per-file outcomes show up without any setup.
const DEFAULT_DIRECTIVE: &str = "log_compressor=info,compress_logs=info";

fn use_json(env: &Env, pretty_print: bool) -> bool {
    !pretty_print && matches!(env, Env::Stag | Env::Prod)
}

/// Installs the global tracing subscriber. JSON lines in staging and production unless
/// PRETTY_PRINT is set, human readable otherwise. Thread names are included, the compression
/// work hops between the runtime and the blocking pool.
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    let builder = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_thread_names(true);

    let subscriber: Box<dyn Subscriber + Send + Sync> =
        if use_json(&ENV_CONFIG.env, ENV_CONFIG.pretty_print) {
            Box::new(builder.json().finish())
        } else {
            Box::new(builder.finish())
        };

    tracing::subscriber::set_global_default(subscriber)
        .expect("expect to be able to set global default subscriber");
}
