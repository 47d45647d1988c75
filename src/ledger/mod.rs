pub mod audit;
pub mod config;
pub mod dates;
pub mod dedup;
pub mod extractors;
pub mod insert;
pub mod merge;
pub mod normalize;
pub mod paths;
pub mod reader;
pub mod record;
pub mod retry;
pub mod secrets;
pub mod shift;
pub mod util;
