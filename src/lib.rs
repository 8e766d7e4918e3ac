//! Lifecycle requests for per-environment SPA/SSR deployments.
//!
//! A request describes one environment ([`descriptor::EnvironmentDescriptor`]).
//! The [`processor::RequestProcessor`] derives the template parameters for it,
//! sequences the steps of the request and hands the cluster mutations to a
//! [`provisioner::Provisioner`].

pub mod access_url;
pub mod config;
pub mod descriptor;
pub mod executor;
pub mod processor;
pub mod provisioner;

pub use descriptor::EnvironmentDescriptor;
pub use processor::{Outcome, RequestProcessor, Status};
