//! Logger setup shared by the converter binaries

/// Install an env_logger backend.
///
/// Level filtering follows `RUST_LOG` and falls back to `info` when unset.
/// Lines carry millisecond timestamps, which is enough to time the build,
/// extract and save stages of a conversion. Calling it again is a no-op.
///
/// ```
/// surfkd::core::logging::init();
/// surfkd::core::logging::init();
/// log::info!("Converting cloud.rsf");
/// ```
pub fn init() {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    )
    .format_timestamp_millis()
    .try_init();
}
