pub mod audit;
pub mod backup;
pub mod core;
pub mod fees;
pub mod reports;
pub mod roster;
pub mod sessions;
pub mod settings;
pub mod units;
