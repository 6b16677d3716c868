//! Minimal stand-in for the enclosing request-processing pipeline.
//!
//! The real framework this proxy is a filter inside of — its context
//! object, request/response wrappers, spec decoding, filter registry —
//! is out of scope for this crate (see `SPEC_FULL.md` §1). This module
//! models just enough of that boundary, in terms of the `http` crate's
//! `Request`/`Response` primitives, for `ProviderProxy::handle` to have
//! something concrete to read from and write to, and for it to be
//! testable without a real pipeline.

use bytes::Bytes;
use http::{HeaderMap, Method};

/// The inbound request the pipeline hands to the filter.
///
/// `path` is whatever the pipeline resolved the request's path to be;
/// an empty or `/` path means "use the body to determine the RPC
/// method" (§4.F step 2).
pub struct InboundRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl InboundRequest {
    pub fn new(method: Method, path: impl Into<String>, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            path: path.into(),
            headers,
            body,
        }
    }
}

/// The outbound response the filter attaches back to the shared
/// context once the upstream call completes.
pub struct OutboundResponse {
    pub status: http::StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// The shared per-request context the pipeline passes through every
/// filter in a chain.
///
/// Only carries what this filter needs: the inbound request, and a slot
/// for the outbound response once produced. A real pipeline's context
/// would carry far more (tracing spans, other filters' state, …) — all
/// of that is out of scope here.
pub struct Context {
    request: InboundRequest,
    response: Option<OutboundResponse>,
}

impl Context {
    pub fn new(request: InboundRequest) -> Self {
        Self {
            request,
            response: None,
        }
    }

    pub fn request(&self) -> &InboundRequest {
        &self.request
    }

    pub fn set_response(&mut self, response: OutboundResponse) {
        self.response = Some(response);
    }

    pub fn response(&self) -> Option<&OutboundResponse> {
        self.response.as_ref()
    }

    pub fn into_response(self) -> Option<OutboundResponse> {
        self.response
    }
}
