//! Recording in-memory transport for unit tests.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;
use crate::transport::{Method, Request, Response, Transport};
use crate::{Api, ApiConfig, BaseUrl, Result};

pub const BASE: &str = "https://sandbox.zenodo.org";

#[derive(Clone)]
enum Reply {
    Ok(Response),
    Fail(String),
}

#[derive(Default)]
struct State {
    routes: HashMap<(Method, String), VecDeque<Reply>>,
    calls: Vec<Request>,
}

/// Serves queued replies per (method, url); the last reply of a queue
/// repeats. Every request is recorded.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<State>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api(&self) -> Api {
        Api::new(ApiConfig::new(BaseUrl::new(BASE).unwrap()), self.clone())
    }

    pub fn on(&self, method: Method, url: &str, status: u16, body: Value) {
        let body = if body.is_null() {
            Vec::new()
        } else {
            serde_json::to_vec(&body).unwrap()
        };
        self.on_raw(method, url, status, body);
    }

    pub fn on_raw(&self, method: Method, url: &str, status: u16, body: Vec<u8>) {
        self.push(method, url, Reply::Ok(Response::new(status, body)));
    }

    pub fn on_error(&self, method: Method, url: &str, message: &str) {
        self.push(method, url, Reply::Fail(message.to_string()));
    }

    fn push(&self, method: Method, url: &str, reply: Reply) {
        let mut state = self.state.lock().unwrap();
        state
            .routes
            .entry((method, url.to_string()))
            .or_default()
            .push_back(reply);
    }

    pub fn calls(&self) -> Vec<Request> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, method: Method, url: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.method == method && c.url == url)
            .count()
    }

    fn reply(&self, request: Request) -> Result<Response> {
        let mut state = self.state.lock().unwrap();
        let key = (request.method, request.url.clone());
        state.calls.push(request);

        let queue = state.routes.get_mut(&key);
        let reply = match queue {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };

        match reply {
            Some(Reply::Ok(response)) => Ok(response),
            Some(Reply::Fail(message)) => Err(TransportError::Connection { message }.into()),
            None => Err(TransportError::Connection {
                message: format!("no mock for {} {}", key.0, key.1),
            }
            .into()),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        self.reply(request)
    }

    async fn download(&self, request: Request, dest: &Path) -> Result<Response> {
        let response = self.reply(request)?;
        if response.is_success() {
            tokio::fs::write(dest, &response.body).await?;
            Ok(Response::new(response.status, Vec::new()))
        } else {
            Ok(response)
        }
    }
}
