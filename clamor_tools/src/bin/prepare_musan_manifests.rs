use anyhow::Result;
use std::path::Path;

use clamor_tools::{logging, prepare_musan};

fn main() -> Result<()> {
    logging::init();

    prepare_musan::run(Path::new("data/musan"), Path::new("data/manifests"))
}
