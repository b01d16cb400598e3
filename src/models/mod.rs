// src/models/mod.rs
pub mod credential;
pub mod did;
pub mod metadata;
pub mod session;
