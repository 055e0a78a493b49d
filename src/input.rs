//! Declaration files
//!
//! A declaration is one JSON or TOML document describing a single resource.
//! Its `type` field names the resource type; every other field is passed to
//! that type:
//!
//! ```toml
//! type = "loadbalancer_rule"
//! name = "web"
//! public_ip = "198.51.100.10"
//! public_port = 80
//! private_port = 8080
//! members = ["web01", "web02"]
//! ```

use anyhow::{Context as AnyhowContext, Result, bail};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// A loaded declaration, not yet bound to a resource type
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub kind: String,
    pub body: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
}

impl Format {
    fn of(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            _ => bail!(
                "unsupported declaration file '{}' (expected .json or .toml)",
                path.display()
            ),
        }
    }
}

/// Load a declaration file
pub fn load(path: &Path) -> Result<Declaration> {
    let format = Format::of(path)?;
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse(&content, format).with_context(|| format!("Invalid declaration in {}", path.display()))
}

fn parse(content: &str, format: Format) -> Result<Declaration> {
    let value: Value = match format {
        Format::Json => serde_json::from_str(content)?,
        Format::Toml => {
            let table: toml::Table = toml::from_str(content)?;
            serde_json::to_value(table)?
        }
    };
    let Value::Object(mut body) = value else {
        bail!("a declaration must be a table of fields");
    };
    let kind = match body.remove("type") {
        Some(Value::String(kind)) => kind,
        Some(other) => bail!("'type' must be a string, got {other}"),
        None => bail!("missing 'type' field (see `stratus types`)"),
    };
    Ok(Declaration {
        kind,
        body: Value::Object(body),
    })
}
