//! Mock HTTP client for testing.
//!
//! Provides a scripted HTTP client that returns predefined responses or
//! errors per route and records every request it receives.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::traits::{HttpClient, HttpError, Method, Request, Response};

/// Configuration for a mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return a response with any status
    Success(Response),
    /// Fail at the transport level
    Error(HttpError),
}

impl MockResponse {
    /// Shorthand for a JSON response.
    pub fn json(status: u16, value: serde_json::Value) -> Self {
        MockResponse::Success(Response::json_body(status, &value))
    }
}

fn route_key(method: Method, url: &str) -> String {
    format!("{} {}", method, url)
}

/// Mock HTTP client for testing.
///
/// Responses are scripted per `METHOD url`. Each route holds a queue: every
/// request pops the front response until one is left, which then answers
/// every later request.
///
/// # Example
///
/// ```ignore
/// use sessionkit::adapters::mock::{MockHttpClient, MockResponse};
/// use sessionkit::traits::{HttpClient, Method, Request};
/// use serde_json::json;
///
/// let client = MockHttpClient::new();
/// client.push_response(
///     Method::Get,
///     "http://api.test/venues",
///     MockResponse::json(500, json!({})),
/// );
/// client.push_response(
///     Method::Get,
///     "http://api.test/venues",
///     MockResponse::json(200, json!([])),
/// );
///
/// let first = client.send(Request::new(Method::Get, "http://api.test/venues")).await?;
/// assert_eq!(first.status, 500);
/// let second = client.send(Request::new(Method::Get, "http://api.test/venues")).await?;
/// assert_eq!(second.status, 200);
/// assert_eq!(client.request_count(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockHttpClient {
    /// Scripted responses by route
    responses: Arc<Mutex<HashMap<String, VecDeque<MockResponse>>>>,
    /// Default response when no route matches
    default_response: Arc<Mutex<Option<MockResponse>>>,
    /// Recorded requests for verification
    requests: Arc<Mutex<Vec<Request>>>,
    /// Artificial latency applied to every request
    delay: Arc<Mutex<Option<Duration>>>,
}

impl MockHttpClient {
    /// Create a new mock HTTP client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the script for a route with a single response.
    pub fn set_response(&self, method: Method, url: &str, response: MockResponse) {
        let mut responses = self.responses.lock().unwrap();
        responses.insert(route_key(method, url), VecDeque::from(vec![response]));
    }

    /// Append a response to the script for a route.
    pub fn push_response(&self, method: Method, url: &str, response: MockResponse) {
        let mut responses = self.responses.lock().unwrap();
        responses
            .entry(route_key(method, url))
            .or_default()
            .push_back(response);
    }

    /// Set a default response for routes without a script.
    pub fn set_default_response(&self, response: MockResponse) {
        *self.default_response.lock().unwrap() = Some(response);
    }

    /// Delay every response by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Get all recorded requests.
    pub fn get_requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Recorded requests for one route.
    pub fn requests_to(&self, method: Method, url: &str) -> Vec<Request> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.url == url)
            .cloned()
            .collect()
    }

    /// Clear all recorded requests.
    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
    }

    fn next_response(&self, method: Method, url: &str) -> Option<MockResponse> {
        let mut responses = self.responses.lock().unwrap();
        if let Some(queue) = responses.get_mut(&route_key(method, url)) {
            if queue.len() > 1 {
                return queue.pop_front();
            }
            if let Some(last) = queue.front() {
                return Some(last.clone());
            }
        }
        self.default_response.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn send(&self, request: Request) -> Result<Response, HttpError> {
        let method = request.method;
        let url = request.url.clone();
        self.requests.lock().unwrap().push(request);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.next_response(method, &url) {
            Some(MockResponse::Success(response)) => Ok(response),
            Some(MockResponse::Error(err)) => Err(err),
            None => Err(HttpError::Other(format!(
                "No mock response for {} {}",
                method, url
            ))),
        }
    }
}
