//! # CloudStack connection
//!
//! Opens one authenticated API session per run.
//!
//! Credentials come from explicit connection arguments, the `CLOUDSTACK_*`
//! environment variables or a TOML profile file, in that order. Requests are
//! signed with HMAC-SHA1 and sent over blocking HTTP.
//!
//! ```no_run
//! use cloudstack::{ConnectionArgs, connect};
//! use declarative::Params;
//!
//! let client = connect(&ConnectionArgs::default())?;
//! let zones = client.list_records("listZones", &Params::new(), "zone")?;
//! println!("{} zone(s)", zones.len());
//! # Ok::<(), declarative::Error>(())
//! ```

pub mod config;
pub mod http;
pub mod signing;

pub use config::{
    ConnectionArgs, Credentials, DEFAULT_REGION, DEFAULT_TIMEOUT_SECS, HttpMethod, resolve,
};
pub use http::HttpTransport;

use declarative::{CloudClient, Result};
use log::info;

/// Resolve credentials and build the client of a run
pub fn connect(args: &ConnectionArgs) -> Result<CloudClient> {
    let credentials = resolve(args)?;
    info!(
        "connecting to {} ({})",
        credentials.endpoint, credentials.method
    );
    Ok(CloudClient::with_transport(Box::new(HttpTransport::new(
        credentials,
    ))))
}
