mod batch;
mod fbank;
mod storage;

pub use batch::compute_and_store_features_batch;
pub use fbank::{FbankConfig, FbankExtractor};
pub use storage::{FeatureWriter, read_features};
