//! In-memory transport for tests
//!
//! [`MockTransport`] records every command it receives and answers from
//! scripted responses or handlers, so reconciliation runs can be exercised
//! without a cloud.
//!
//! ```
//! use declarative::mock::MockTransport;
//! use declarative::{CloudClient, Params};
//! use serde_json::json;
//!
//! let mock = MockTransport::new();
//! mock.respond("listZones", json!({"count": 1, "zone": [{"id": "z1", "name": "ch-gva-2"}]}));
//!
//! let client = CloudClient::with_transport(Box::new(mock.clone()));
//! let zones = client.list_records("listZones", &Params::new(), "zone").unwrap();
//! assert_eq!(zones.len(), 1);
//! assert_eq!(mock.count("listZones"), 1);
//! ```

use crate::api::Transport;
use crate::error::{Error, Result};
use crate::params::Params;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

type Handler = Arc<dyn Fn(&Params) -> Result<Value> + Send + Sync>;

#[derive(Default)]
struct MockState {
    scripted: HashMap<String, VecDeque<Value>>,
    handlers: HashMap<String, Handler>,
    calls: Vec<(String, Params)>,
}

/// Mock transport with call recording.
///
/// Clones share the same state, so a test can keep one handle while the
/// client owns another.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create a mock that knows no commands
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer `command` with `response`
    pub fn respond(&self, command: &str, response: Value) {
        self.respond_sequence(command, vec![response]);
    }

    /// Answer `command` with each response in turn; the last one repeats
    pub fn respond_sequence(&self, command: &str, responses: Vec<Value>) {
        let mut state = self.state.lock().unwrap();
        state.handlers.remove(command);
        state
            .scripted
            .insert(command.to_string(), responses.into_iter().collect());
    }

    /// Answer `command` by calling `handler` with the request arguments
    pub fn on<F>(&self, command: &str, handler: F)
    where
        F: Fn(&Params) -> Result<Value> + Send + Sync + 'static,
    {
        let mut state = self.state.lock().unwrap();
        state.scripted.remove(command);
        state.handlers.insert(command.to_string(), Arc::new(handler));
    }

    /// Every call received so far, in order
    pub fn calls(&self) -> Vec<(String, Params)> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Arguments of every call to `command`
    pub fn calls_to(&self, command: &str) -> Vec<Params> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(c, _)| c == command)
            .map(|(_, p)| p.clone())
            .collect()
    }

    /// Number of calls to `command`
    pub fn count(&self, command: &str) -> usize {
        self.calls_to(command).len()
    }

    /// Command names received so far, in order
    pub fn commands(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .map(|(c, _)| c.clone())
            .collect()
    }
}

impl Transport for MockTransport {
    fn request(&self, command: &str, params: &Params) -> Result<Value> {
        let handler = {
            let mut state = self.state.lock().unwrap();
            state.calls.push((command.to_string(), params.clone()));

            if let Some(queue) = state.scripted.get_mut(command) {
                let response = if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                };
                return response
                    .ok_or_else(|| Error::Transport(format!("no mock response for {command}")));
            }
            state.handlers.get(command).cloned()
        };

        match handler {
            Some(handler) => handler(params),
            None => Err(Error::Transport(format!("no mock response for {command}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sequence_repeats_last() {
        let mock = MockTransport::new();
        mock.respond_sequence("queryAsyncJobResult", vec![json!(1), json!(2)]);

        let p = Params::new();
        assert_eq!(mock.request("queryAsyncJobResult", &p).unwrap(), json!(1));
        assert_eq!(mock.request("queryAsyncJobResult", &p).unwrap(), json!(2));
        assert_eq!(mock.request("queryAsyncJobResult", &p).unwrap(), json!(2));
        assert_eq!(mock.count("queryAsyncJobResult"), 3);
    }

    #[test]
    fn test_unknown_command_fails() {
        let mock = MockTransport::new();
        assert!(mock.request("listZones", &Params::new()).is_err());
        assert_eq!(mock.commands(), vec!["listZones".to_string()]);
    }

    #[test]
    fn test_handler_sees_params() {
        let mock = MockTransport::new();
        mock.on("listTags", |p| Ok(json!({"echo": p.get_text("resourceid")})));

        let response = mock
            .request("listTags", &Params::new().with("resourceid", "r1"))
            .unwrap();
        assert_eq!(response, json!({"echo": "r1"}));
    }
}
