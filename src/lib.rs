//! apiservice-operator: keeps aggregated APIService registrations in line
//! with an operator's desired state
//!
//! This crate provides a Kubernetes controller that creates, verifies and
//! removes `apiregistration.k8s.io/v1` APIServices and reports their health
//! through conditions on an `APIServiceOperator` resource.

pub mod controller;
pub mod crd;
pub mod error;
pub mod telemetry;

#[cfg(feature = "rest-api")]
pub mod rest_api;

pub use crate::error::{Error, Result};
