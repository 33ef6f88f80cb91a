pub mod factory;
pub mod traits;
pub mod types;

pub mod binance;
pub mod simulator;

#[cfg(test)]
mod binance_tests;
