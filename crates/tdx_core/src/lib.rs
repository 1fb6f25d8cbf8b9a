pub mod config;
pub mod db;
pub mod documents;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod notify;
pub mod report;
