//! Request/response seam towards the controller.
//!
//! The engine never performs I/O itself. It describes every exchange as a [`Request`] and hands
//! it to a [`Transport`]; the returned future is awaited on whatever executor the host uses.

use crate::TransportError;
use futures::future::LocalBoxFuture;
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Put,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    pub method: Method,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Request {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Put,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method.as_str(), self.path)
    }
}

pub type TransportResult = std::result::Result<Value, TransportError>;

/// Performs one request against the controller and yields the parsed JSON body.
///
/// Implementations report non-success statuses and unparsable bodies as [`TransportError`].
pub trait Transport {
    fn send<'a>(&'a self, request: &'a Request) -> LocalBoxFuture<'a, TransportResult>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send<'a>(&'a self, request: &'a Request) -> LocalBoxFuture<'a, TransportResult> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send<'a>(&'a self, request: &'a Request) -> LocalBoxFuture<'a, TransportResult> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Rc<T> {
    fn send<'a>(&'a self, request: &'a Request) -> LocalBoxFuture<'a, TransportResult> {
        (**self).send(request)
    }
}

/// A recorded controller session: poll responses in order plus canned side responses keyed by
/// request path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub polls: Vec<Value>,
    #[serde(default)]
    pub responses: IndexMap<String, Value, FxBuildHasher>,
}

/// Serves a [`Session`] without any network access.
///
/// Poll requests (`/timeout/...`) consume the next recorded poll; every other request is looked
/// up by path. A missing entry, or an exhausted poll queue, fails as `Unreachable`. An entry of
/// the form `{"$status": 500}` fails with that status.
#[derive(Debug, Default)]
pub struct ReplayTransport {
    polls: RefCell<VecDeque<Value>>,
    responses: IndexMap<String, Value, FxBuildHasher>,
    sent: RefCell<Vec<Request>>,
}

impl ReplayTransport {
    pub fn new(session: Session) -> Self {
        Self {
            polls: RefCell::new(session.polls.into()),
            responses: session.responses,
            sent: RefCell::new(Vec::new()),
        }
    }

    pub fn push_poll(&self, poll: Value) {
        self.polls.borrow_mut().push_back(poll);
    }

    pub fn set_response(&mut self, path: impl Into<String>, value: Value) {
        self.responses.insert(path.into(), value);
    }

    pub fn remaining_polls(&self) -> usize {
        self.polls.borrow().len()
    }

    /// Every request seen so far, in order.
    pub fn sent(&self) -> Vec<Request> {
        self.sent.borrow().clone()
    }

    fn answer(&self, request: &Request) -> TransportResult {
        self.sent.borrow_mut().push(request.clone());
        let unreachable = |message: &str| TransportError::Unreachable {
            url: request.path.clone(),
            message: message.to_string(),
        };
        let value = if request.path.starts_with("/timeout/") {
            self.polls
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| unreachable("no recorded poll left"))?
        } else {
            self.responses
                .get(&request.path)
                .cloned()
                .ok_or_else(|| unreachable("no recorded response"))?
        };
        if let Some(status) = value.get("$status").and_then(Value::as_u64) {
            return Err(TransportError::Status {
                status: u16::try_from(status).unwrap_or(u16::MAX),
                url: request.path.clone(),
            });
        }
        Ok(value)
    }
}

impl Transport for ReplayTransport {
    fn send<'a>(&'a self, request: &'a Request) -> LocalBoxFuture<'a, TransportResult> {
        let result = self.answer(request);
        Box::pin(futures::future::ready(result))
    }
}
