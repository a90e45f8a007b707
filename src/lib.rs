//! KYC Verification Client
//!
//! This library drives the client side of a KYC document verification
//! backend: it presigns uploads for the selected document and selfie
//! images, pushes them to object storage, creates a verification job and
//! polls it until the backend reaches a verdict.

pub mod config;
pub mod models;
pub mod services;

pub use config::{AppConfig, WorkflowConfig};
pub use services::api::{ApiError, VerificationApi};
pub use services::http::HttpVerificationClient;
pub use services::workflow::{
    start, VerificationRequest, WorkflowError, WorkflowHandle, WorkflowOutcome, WorkflowReport,
    WorkflowRun,
};
