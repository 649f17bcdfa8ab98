//! Filter dispatch.
//!
//! # Responsibilities
//! - Try filters in registration order
//! - Invoke the first filter whose route matches
//! - Turn filter failures and panics into error responses
//!
//! # Design Decisions
//! - Immutable after construction (shared across connections without locks)
//! - First match wins; a declining filter sends the request to the proxy
//!   instead of the next filter
//! - Only a broken request body escapes as an error; it aborts the connection

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use http::StatusCode;

use crate::filters::{Filter, FilterError};
use crate::http::codec::CodecError;
use crate::http::request::Request;
use crate::http::response::Response;

/// Result of running the chain over one request.
#[derive(Debug)]
pub enum Dispatch {
    /// A filter produced a response (possibly an error response).
    Answered { filter: &'static str, response: Response },
    /// The matching filter declined.
    Declined { filter: &'static str },
    /// No filter matched.
    Unclaimed,
}

pub struct FilterChain {
    filters: Vec<Arc<dyn Filter>>,
}

impl FilterChain {
    pub fn new(filters: Vec<Arc<dyn Filter>>) -> Self {
        Self { filters }
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// First filter whose route matches.
    pub fn find(&self, domain: &str, path: &str) -> Option<&Arc<dyn Filter>> {
        self.filters.iter().find(|f| f.matches(domain, path))
    }

    pub fn claims(&self, domain: &str, path: &str) -> bool {
        self.find(domain, path).is_some()
    }

    pub async fn dispatch(
        &self,
        domain: &str,
        path: &str,
        request: &mut Request<'_>,
    ) -> Result<Dispatch, CodecError> {
        let Some(filter) = self.find(domain, path) else {
            return Ok(Dispatch::Unclaimed);
        };
        let name = filter.name();

        let outcome = AssertUnwindSafe(filter.handle(domain, path, request))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(Some(response))) => {
                tracing::debug!(filter = name, domain, path, status = response.status().as_u16(), "Filter answered");
                Ok(Dispatch::Answered { filter: name, response })
            }
            Ok(Ok(None)) => {
                tracing::debug!(filter = name, domain, path, "Filter declined");
                Ok(Dispatch::Declined { filter: name })
            }
            Ok(Err(err)) => match err.status() {
                Some(status) => {
                    tracing::warn!(filter = name, domain, path, error = %err, "Filter failed");
                    Ok(Dispatch::Answered {
                        filter: name,
                        response: Response::new(status),
                    })
                }
                None => match err {
                    FilterError::Body(codec) => Err(codec),
                    other => Err(CodecError::Io(std::io::Error::other(other.to_string()))),
                },
            },
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::warn!(filter = name, domain, path, panic = %message, "Filter panicked");
                Ok(Dispatch::Answered {
                    filter: name,
                    response: Response::new(StatusCode::INTERNAL_SERVER_ERROR),
                })
            }
        }
    }
}
