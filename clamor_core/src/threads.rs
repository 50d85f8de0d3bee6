use std::sync::Once;

static LIMIT: Once = Once::new();

/// Cap the global rayon pool at a single thread.
///
/// The batch feature extractor builds its own worker pool; the global pool
/// must stay single-threaded or the two oversubscribe the machine. Call once
/// at startup, before any parallel work.
pub fn limit_math_threads() {
    LIMIT.call_once(|| {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(1)
            .build_global()
        {
            // Another component already sized the global pool; nothing to do.
            log::warn!("global thread pool already initialized: {e}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_idempotent() {
        limit_math_threads();
        limit_math_threads();
    }
}
