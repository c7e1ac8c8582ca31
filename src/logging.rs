//! Thin wrappers around the `log` facade.
//!
//! The engine never owns a logging backend; `init_logger` is a convenience
//! for binaries (see `src/bin/linksim.rs`) and tests. Library code only ever
//! calls the `log_*` helpers below, which forward to `log::info!` and
//! friends at a granularity of one line per accepted/dropped frame, one line
//! per ARQ transition, and one line per profile change.

/// Initialize the global logger from `RUST_LOG`, defaulting to `info`.
pub fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

#[inline]
pub fn log_debug(msg: &str) {
    log::debug!("{}", msg);
}

#[inline]
pub fn log_info(msg: &str) {
    log::info!("{}", msg);
}

#[inline]
pub fn log_warn(msg: &str) {
    log::warn!("{}", msg);
}

#[inline]
pub fn log_error(msg: &str) {
    log::error!("{}", msg);
}
