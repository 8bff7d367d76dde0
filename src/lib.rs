// src/lib.rs

//! Shelter listing ingestion library

pub mod error;
pub mod models;
pub mod pipeline;
pub mod reference;
pub mod services;
pub mod state;
pub mod storage;
pub mod utils;
