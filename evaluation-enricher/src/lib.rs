pub mod config;
pub mod database;
pub mod enricher;
pub mod error;
pub mod keys;
pub mod lookup;
pub mod metrics_consts;
pub mod pipeline;
pub mod records;
pub mod reducer;
pub mod storage;
pub mod test_utils;
