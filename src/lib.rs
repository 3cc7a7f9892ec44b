// src/lib.rs

// Anomaly detection module
pub mod anomaly_detection;

pub mod cli;
pub mod ledger;
