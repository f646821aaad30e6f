pub mod paths;
pub mod units;
