pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod metrics;
pub mod providers;
pub mod repository;
