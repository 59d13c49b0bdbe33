//! Async client for the Copernicus Climate Data Store (CDS) retrieval API.
//!
//! The CDS serves ERA5 reanalysis through an asynchronous job protocol:
//! a retrieval request is submitted to the dataset endpoint, the archive
//! queues a job, and the caller polls until the job finishes and a result
//! file becomes available for download. This crate wraps that flow:
//!
//! 1. `POST /resources/{dataset}` with the request JSON
//! 2. `GET /tasks/{request_id}` with exponential backoff until the job
//!    reports `completed` or `failed`, bounded by a total wait deadline
//! 3. stream the result to a `.part` file and rename it into place
//!
//! Credentials come from `CDSAPI_URL` / `CDSAPI_KEY`, the same variables
//! the official Python client reads.

pub mod client;
pub mod error;
pub mod request;

pub use client::{CdsConfig, Client};
pub use error::{CdsError, CdsResult};
pub use request::Era5Request;
