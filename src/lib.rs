pub mod api;
pub mod core;

/// Installs the `env_logger` backend, defaulting to `info`. Safe to call twice.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
