//! Data-preparation binaries for the MUSAN corpus: manifest scanning and
//! fbank feature computation.

pub mod fbank_musan;
pub mod logging;
pub mod prepare_musan;
