pub mod config;
pub mod data_store;
pub mod dataset;
pub mod error;
pub mod features;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod standardizer;
pub mod target;
