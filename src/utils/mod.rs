// src/utils/mod.rs
pub mod http;
pub mod polling;
pub mod serialization;
