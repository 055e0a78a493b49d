//! Blocking HTTP transport
//!
//! Sends signed requests with `ureq` and strips the
//! `{"<command>response": {...}}` envelope from the answer.

use crate::config::{Credentials, HttpMethod};
use crate::signing::signed_query;
use declarative::{Error, Params, Result, Transport};
use log::{debug, trace};
use serde_json::Value;

/// Signed transport over HTTP(S).
///
/// HTTP error statuses are not treated as failures on their own: the API
/// reports errors inside the body, which the client turns into
/// [`Error::RemoteOperation`].
pub struct HttpTransport {
    agent: ureq::Agent,
    credentials: Credentials,
}

impl HttpTransport {
    /// Create a transport; the credentials' timeout bounds each request
    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(credentials.timeout))
            .build()
            .into();
        Self { agent, credentials }
    }

    /// The endpoint requests are sent to
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.credentials.endpoint
    }

    fn query(&self, command: &str, params: &Params) -> Result<String> {
        let mut pairs = params.encode();
        pairs.push(("command".to_string(), command.to_string()));
        pairs.push(("response".to_string(), "json".to_string()));
        pairs.push(("apiKey".to_string(), self.credentials.key.clone()));
        signed_query(&pairs, &self.credentials.secret)
    }
}

impl Transport for HttpTransport {
    fn request(&self, command: &str, params: &Params) -> Result<Value> {
        let query = self.query(command, params)?;
        let endpoint = &self.credentials.endpoint;
        debug!("http: {} {endpoint} command={command}", self.credentials.method);

        let sent = match self.credentials.method {
            HttpMethod::Get => self.agent.get(&format!("{endpoint}?{query}")).call(),
            HttpMethod::Post => self
                .agent
                .post(endpoint)
                .header("Content-Type", "application/x-www-form-urlencoded")
                .send(query),
        };
        let mut response = sent.map_err(|e| Error::Transport(format!("{command}: {e}")))?;

        let status = response.status();
        let body: Value = response.body_mut().read_json().map_err(|e| {
            Error::Transport(format!("{command}: HTTP {status}, unreadable body: {e}"))
        })?;
        trace!("http: {command} answered {status}: {body}");
        unwrap_envelope(command, body)
    }
}

/// Extract the payload of a `<command>response` envelope
pub fn unwrap_envelope(command: &str, body: Value) -> Result<Value> {
    let Value::Object(mut map) = body else {
        return Err(Error::InvalidResponse(format!(
            "{command}: expected a JSON object"
        )));
    };
    let expected = format!("{}response", command.to_lowercase());
    if let Some(inner) = map.remove(&expected) {
        return Ok(inner);
    }
    // Error answers may use a different envelope name
    let key = map.keys().find(|k| k.ends_with("response")).cloned();
    match key.and_then(|k| map.remove(&k)) {
        Some(inner) => Ok(inner),
        None => Err(Error::InvalidResponse(format!(
            "{command}: missing '{expected}' envelope"
        ))),
    }
}
