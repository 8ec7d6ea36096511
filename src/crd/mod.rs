//! Custom Resource Definitions for the APIService operator
//!
//! This module declares the aggregator's `APIService` type and the
//! operator's own configuration/status resource.

mod api_service;
mod operator;
pub mod types;


pub use api_service::{
    APIService, APIServiceCondition, APIServiceSpec, APIServiceStatus, GroupVersion,
    ServiceReference, APISERVICE_AVAILABLE, DEFAULT_SERVICE_PORT,
};
pub use operator::{APIServiceOperator, APIServiceOperatorSpec, APIServiceOperatorStatus};
pub use types::*;
