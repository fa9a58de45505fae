//! # Mock Framework
//!
//! Utilities for testing clients and actors without spawning real regions.
//!
//! - [`create_mock_client`] hands back a client and the receiving end of its channel, so a
//!   test can inspect each request with [`expect_request`] and answer it by hand.
//! - [`MockPort`] answers calls from a queue of scripted replies, checked against the
//!   expected operation tag, and records every call for later assertions.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use super::core::{
    FrameworkError, Operation, RegionClient, RegionPort, RegionRequest, Response, SharedRegion,
};
use crate::model::Caller;

// =============================================================================
// EXPECTATION BUILDER API
// =============================================================================

struct Expectation<R: SharedRegion> {
    tag: &'static str,
    response: Result<R::Reply, FrameworkError>,
}

/// A port answering from scripted expectations, in order.
///
/// # Example
/// ```ignore
/// let mock = MockPort::<Paddock>::new();
/// mock.expect("go_check_horses").return_ok(PaddockReply::HorsesReady);
///
/// let port: Arc<dyn RegionPort<Paddock>> = Arc::new(mock.clone());
/// // Drive the client or actor under test...
/// mock.verify();
/// ```
pub struct MockPort<R: SharedRegion> {
    expectations: Arc<Mutex<VecDeque<Expectation<R>>>>,
    calls: Arc<Mutex<Vec<(Caller, &'static str)>>>,
}

impl<R: SharedRegion> Clone for MockPort<R> {
    fn clone(&self) -> Self {
        Self {
            expectations: self.expectations.clone(),
            calls: self.calls.clone(),
        }
    }
}

impl<R: SharedRegion> Default for MockPort<R> {
    fn default() -> Self {
        Self {
            expectations: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<R: SharedRegion> MockPort<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expects the next call to be the operation tagged `tag`.
    pub fn expect(&self, tag: &'static str) -> ExpectationBuilder<R> {
        ExpectationBuilder {
            tag,
            expectations: self.expectations.clone(),
        }
    }

    /// `(caller, tag)` of every call received so far.
    pub fn calls(&self) -> Vec<(Caller, &'static str)> {
        self.calls.lock().unwrap().clone()
    }

    /// Verifies that all expectations were met.
    pub fn verify(&self) {
        let exps = self.expectations.lock().unwrap();
        if !exps.is_empty() {
            panic!("Not all expectations were met. {} remaining", exps.len());
        }
    }
}

#[async_trait]
impl<R: SharedRegion> RegionPort<R> for MockPort<R> {
    async fn call(&self, caller: Caller, op: R::Op) -> Result<R::Reply, FrameworkError> {
        let tag = op.tag();
        self.calls.lock().unwrap().push((caller, tag));
        let expectation = self.expectations.lock().unwrap().pop_front();
        match expectation {
            Some(exp) if exp.tag == tag => exp.response,
            Some(exp) => panic!("Expected {} but {caller} called {tag}", exp.tag),
            None => panic!("Unexpected call to {tag} by {caller}"),
        }
    }
}

/// Builder for one scripted reply.
pub struct ExpectationBuilder<R: SharedRegion> {
    tag: &'static str,
    expectations: Arc<Mutex<VecDeque<Expectation<R>>>>,
}

impl<R: SharedRegion> ExpectationBuilder<R> {
    /// Sets the expectation to return a successful result.
    pub fn return_ok(self, reply: R::Reply) {
        self.expectations.lock().unwrap().push_back(Expectation {
            tag: self.tag,
            response: Ok(reply),
        });
    }

    /// Sets the expectation to return an error.
    pub fn return_err(self, error: FrameworkError) {
        self.expectations.lock().unwrap().push_back(Expectation {
            tag: self.tag,
            response: Err(error),
        });
    }
}

// =============================================================================
// CHANNEL HELPERS
// =============================================================================

/// Creates a client whose requests land on a receiver the test controls.
pub fn create_mock_client<R: SharedRegion>(
    buffer_size: usize,
) -> (RegionClient<R>, mpsc::Receiver<RegionRequest<R>>) {
    let (sender, receiver) = mpsc::channel(buffer_size);
    (RegionClient::new(sender), receiver)
}

/// Takes the next request off a mock channel.
pub async fn expect_request<R: SharedRegion>(
    receiver: &mut mpsc::Receiver<RegionRequest<R>>,
) -> Option<(Caller, R::Op, Response<R::Reply>)> {
    receiver
        .recv()
        .await
        .map(|request| (request.caller, request.op, request.respond_to))
}
