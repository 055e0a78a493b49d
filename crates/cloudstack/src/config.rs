//! Connection settings
//!
//! Explicit credentials win. Otherwise the named region is read from the
//! `CLOUDSTACK_*` environment variables, then from a TOML profile file:
//!
//! ```toml
//! [cloudstack]
//! endpoint = "https://api.example.com/compute"
//! key = "api key"
//! secret = "api secret"
//! method = "post"   # optional, default "get"
//! timeout = 30      # optional, seconds, default 10
//! ```

use declarative::{Error, Result};
use log::debug;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default profile name
pub const DEFAULT_REGION: &str = "cloudstack";

/// Name of the profile file looked up in the working and home directory
pub const PROFILE_FILE: &str = "cloudstack.toml";

/// How requests are sent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(Self::Get),
            "post" => Ok(Self::Post),
            other => Err(format!("unsupported HTTP method '{other}' (use get or post)")),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "get"),
            Self::Post => write!(f, "post"),
        }
    }
}

/// Connection flags as given by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionArgs {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub api_url: Option<String>,
    pub api_http_method: HttpMethod,
    pub api_timeout: u64,
    pub api_region: String,
}

impl Default for ConnectionArgs {
    fn default() -> Self {
        Self {
            api_key: None,
            api_secret: None,
            api_url: None,
            api_http_method: HttpMethod::Get,
            api_timeout: DEFAULT_TIMEOUT_SECS,
            api_region: DEFAULT_REGION.to_string(),
        }
    }
}

/// Fully resolved credentials of one session
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub endpoint: String,
    pub key: String,
    pub secret: String,
    pub method: HttpMethod,
    pub timeout: Duration,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("endpoint", &self.endpoint)
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .field("method", &self.method)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct Profile {
    endpoint: String,
    key: String,
    secret: String,
    #[serde(default)]
    method: Option<HttpMethod>,
    #[serde(default)]
    timeout: Option<u64>,
}

impl Profile {
    fn into_credentials(self, args: &ConnectionArgs) -> Credentials {
        Credentials {
            endpoint: self.endpoint,
            key: self.key,
            secret: self.secret,
            method: self.method.unwrap_or(args.api_http_method),
            timeout: Duration::from_secs(self.timeout.unwrap_or(args.api_timeout)),
        }
    }
}

/// Resolve credentials from the process environment and the default profile paths
pub fn resolve(args: &ConnectionArgs) -> Result<Credentials> {
    let env = |name: &str| std::env::var(name).ok();
    let paths = profile_search_paths(&env);
    resolve_with(args, &env, &paths)
}

/// Resolve credentials with an injected environment and profile search path
pub fn resolve_with(
    args: &ConnectionArgs,
    env: &dyn Fn(&str) -> Option<String>,
    search_paths: &[PathBuf],
) -> Result<Credentials> {
    let explicit = [&args.api_key, &args.api_secret, &args.api_url];
    let given = explicit.iter().filter(|v| v.is_some()).count();

    if let (Some(key), Some(secret), Some(endpoint)) = (&args.api_key, &args.api_secret, &args.api_url) {
        debug!("connection: using explicit credentials for {endpoint}");
        return Ok(Credentials {
            endpoint: endpoint.clone(),
            key: key.clone(),
            secret: secret.clone(),
            method: args.api_http_method,
            timeout: Duration::from_secs(args.api_timeout),
        });
    }
    if given > 0 {
        return Err(Error::config(
            "api_key, api_secret and api_url are required together",
        ));
    }

    if let Some(credentials) = from_env(args, env)? {
        debug!("connection: using CLOUDSTACK_* environment");
        return Ok(credentials);
    }

    let Some(path) = search_paths.iter().find(|p| p.is_file()) else {
        return Err(Error::config(format!(
            "no credentials: pass --api-key/--api-secret/--api-url, set CLOUDSTACK_ENDPOINT/KEY/SECRET or create {PROFILE_FILE}"
        )));
    };
    from_profile_file(args, path)
}

fn from_env(args: &ConnectionArgs, env: &dyn Fn(&str) -> Option<String>) -> Result<Option<Credentials>> {
    let (Some(endpoint), Some(key), Some(secret)) = (
        env("CLOUDSTACK_ENDPOINT"),
        env("CLOUDSTACK_KEY"),
        env("CLOUDSTACK_SECRET"),
    ) else {
        return Ok(None);
    };
    let method = match env("CLOUDSTACK_METHOD") {
        Some(m) => m.parse().map_err(Error::Config)?,
        None => args.api_http_method,
    };
    let timeout = match env("CLOUDSTACK_TIMEOUT") {
        Some(t) => t
            .trim()
            .parse()
            .map_err(|_| Error::config(format!("invalid CLOUDSTACK_TIMEOUT '{t}'")))?,
        None => args.api_timeout,
    };
    Ok(Some(Credentials {
        endpoint,
        key,
        secret,
        method,
        timeout: Duration::from_secs(timeout),
    }))
}

fn from_profile_file(args: &ConnectionArgs, path: &Path) -> Result<Credentials> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::config(format!("cannot read {}: {e}", path.display())))?;
    let mut profiles: HashMap<String, Profile> = toml::from_str(&content)
        .map_err(|e| Error::config(format!("invalid profile file {}: {e}", path.display())))?;
    let profile = profiles.remove(&args.api_region).ok_or_else(|| {
        Error::config(format!(
            "region '{}' not found in {}",
            args.api_region,
            path.display()
        ))
    })?;
    debug!(
        "connection: using region '{}' from {}",
        args.api_region,
        path.display()
    );
    Ok(profile.into_credentials(args))
}

/// Profile file candidates, in lookup order
pub fn profile_search_paths(env: &dyn Fn(&str) -> Option<String>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(configured) = env("CLOUDSTACK_CONFIG") {
        paths.push(PathBuf::from(shellexpand::tilde(&configured).into_owned()));
    }
    paths.push(PathBuf::from(PROFILE_FILE));
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(format!(".{PROFILE_FILE}")));
    }
    paths
}
