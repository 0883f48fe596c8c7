pub mod context;
pub mod file_adapter;
pub mod health_monitor;
pub mod normalizer;
pub mod signer;
pub mod staging;
pub mod storage;
pub mod upload_service;
