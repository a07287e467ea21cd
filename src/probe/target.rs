//! Target parsing and validation.

use reqwest::Url;
use thiserror::Error;

use super::label::sanitize;

/// Reasons a target line cannot be probed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    /// The line is not a URL at all.
    #[error("malformed target '{target}': {reason}")]
    Malformed { target: String, reason: String },

    /// The URL uses a scheme the prober cannot speak.
    #[error("unsupported scheme '{scheme}' in target '{target}'")]
    UnsupportedScheme { target: String, scheme: String },

    /// The URL parsed but carries no host to label.
    #[error("target '{target}' has no host")]
    MissingHost { target: String },
}

/// Strip surrounding whitespace and carriage returns from a raw target line.
pub fn trim_target(raw: &str) -> &str {
    raw.trim_matches(|c: char| c.is_whitespace())
}

/// Whether a raw target line is empty after trimming.
pub fn is_blank(raw: &str) -> bool {
    trim_target(raw).is_empty()
}

/// A target that parsed into an HTTP(S) URL with a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTarget {
    raw: String,
    url: Url,
    label: String,
}

impl ParsedTarget {
    /// Parse one raw target line.
    ///
    /// Returns `Ok(None)` for lines that are blank after trimming; those are
    /// never probed and never touch the registry.
    ///
    /// # Errors
    /// Returns [`TargetError`] when the line is not an `http`/`https` URL
    /// with a host.
    pub fn parse(raw: &str) -> Result<Option<Self>, TargetError> {
        let trimmed = trim_target(raw);
        if trimmed.is_empty() {
            return Ok(None);
        }

        let url = Url::parse(trimmed).map_err(|e| TargetError::Malformed {
            target: trimmed.to_owned(),
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(TargetError::UnsupportedScheme {
                    target: trimmed.to_owned(),
                    scheme: scheme.to_owned(),
                });
            }
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| TargetError::MissingHost {
                target: trimmed.to_owned(),
            })?;

        // Explicit ports are part of the label input: `svc:8080` labels as `svc_`.
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        };
        let label = sanitize(&authority);

        Ok(Some(Self {
            raw: trimmed.to_owned(),
            url,
            label,
        }))
    }

    /// The trimmed target line as configured.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The parsed URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The sanitized metric label for this target's host.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl std::fmt::Display for ParsedTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}
