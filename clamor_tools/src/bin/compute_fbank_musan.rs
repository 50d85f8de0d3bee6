use anyhow::Result;
use std::path::Path;

use clamor_tools::{fbank_musan, logging};

fn main() -> Result<()> {
    logging::init();
    // Applied before any parallel work: the batch extractor owns the worker
    // parallelism, the global pool stays single-threaded.
    clamor_core::threads::limit_math_threads();

    fbank_musan::run(Path::new("data/manifests"), Path::new("data/fbank"))
}
