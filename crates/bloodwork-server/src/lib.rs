//! REST API server: report upload, job progress, patient records, and analysis.

pub mod auth;
pub mod dto;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;
