use env_logger::{Builder, Env};
use std::io::Write;
use std::path::Path;

/// Install the data-prep log format:
/// `2026-08-07T10:11:12.345Z INFO [fbank_musan.rs:42] message`.
///
/// Level defaults to `info`, overridable through `RUST_LOG`. Safe to call
/// more than once (later calls are no-ops), so tests can share it.
pub fn init() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let file = record
                .file()
                .and_then(|f| Path::new(f).file_name())
                .and_then(|f| f.to_str())
                .unwrap_or("?");
            writeln!(
                buf,
                "{} {} [{}:{}] {}",
                buf.timestamp_millis(),
                record.level(),
                file,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .try_init()
        .ok();
}
