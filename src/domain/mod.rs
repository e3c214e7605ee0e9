pub mod backtest;
pub mod bar;
pub mod cache;
pub mod error;
pub mod execution;
pub mod indicator;
pub mod metrics;
pub mod optimizer;
pub mod risk;
pub mod rule;
pub mod simulator;
pub mod strategy;
