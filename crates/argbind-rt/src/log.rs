use std::sync::Once;

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "ARGBIND_LOG";

/// Installs the stderr subscriber once per process. `ARGBIND_LOG=1` enables
/// debug output; any other value is read as an `EnvFilter` directive.
pub fn init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let raw = std::env::var(LOG_ENV).ok();
        let filter = EnvFilter::try_new(directive(raw.as_deref()))
            .unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    });
}

fn directive(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        None | Some("") | Some("0") => "warn".to_string(),
        Some("1") => "debug".to_string(),
        Some(other) => other.to_string(),
    }
}
