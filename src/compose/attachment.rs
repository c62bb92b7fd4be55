/*
 * Copyright Stalwart Labs Ltd. See the COPYING
 * file at the top-level directory of this distribution.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

use std::{path::PathBuf, time::Duration};

use reqwest::{header::CONTENT_LENGTH, redirect, StatusCode};

const REMOTE_SCHEMES: [&str; 3] = ["http", "https", "ftp"];

/// Where an attachment is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentRef {
    Local(PathBuf),
    Remote(String),
}

/// Outcome of an attachment probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Available,
    Missing,
    /// The probe itself failed, so existence could not be established.
    Unreachable(String),
}

/// Checks that an attachment exists before a message is composed.
#[derive(Debug, Clone)]
pub struct AttachmentProbe {
    timeout: Duration,
}

impl AttachmentRef {
    /// Classifies a reference as a remote URL (`http`, `https` or `ftp`) or a local path.
    pub fn resolve(reference: &str) -> Self {
        if is_remote(reference) {
            AttachmentRef::Remote(reference.to_string())
        } else {
            AttachmentRef::Local(PathBuf::from(reference))
        }
    }

    /// File name to announce in the attachment's MIME headers.
    pub fn file_name(&self) -> Option<String> {
        match self {
            AttachmentRef::Local(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            AttachmentRef::Remote(url) => reqwest::Url::parse(url)
                .ok()?
                .path_segments()?
                .filter(|segment| !segment.is_empty())
                .last()
                .map(str::to_string),
        }
        .filter(|name| !name.is_empty())
    }
}

fn is_remote(reference: &str) -> bool {
    REMOTE_SCHEMES.iter().any(|scheme| {
        reference
            .strip_prefix(scheme)
            .and_then(|rest| rest.strip_prefix("://"))
            .is_some_and(|rest| {
                !rest.contains(['\n', '\r', '\u{0085}', '\u{2028}', '\u{2029}'])
            })
    })
}

impl Default for AttachmentProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl AttachmentProbe {
    pub fn new() -> Self {
        AttachmentProbe {
            timeout: Duration::from_secs(10),
        }
    }

    /// Sets the timeout of remote `HEAD` requests.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns `true` only when the attachment is known to exist.
    pub async fn exists(&self, reference: &str) -> bool {
        self.check(reference).await == Availability::Available
    }

    pub async fn check(&self, reference: &str) -> Availability {
        let availability = match AttachmentRef::resolve(reference) {
            AttachmentRef::Local(path) => match tokio::fs::try_exists(&path).await {
                Ok(true) => Availability::Available,
                Ok(false) => Availability::Missing,
                Err(err) => Availability::Unreachable(err.to_string()),
            },
            AttachmentRef::Remote(url) => self.check_remote(&url).await,
        };

        if let Availability::Unreachable(reason) = &availability {
            log::warn!("Failed to check attachment {:?}: {}", reference, reason);
        }

        availability
    }

    async fn check_remote(&self, url: &str) -> Availability {
        let client = match reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(self.timeout)
            .build()
        {
            Ok(client) => client,
            Err(err) => return Availability::Unreachable(err.to_string()),
        };

        let response = match client.head(url).send().await {
            Ok(response) => response,
            Err(err) => return Availability::Unreachable(err.to_string()),
        };

        // Read the raw header, HEAD responses have no body.
        let length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok());

        log::debug!(
            "HEAD {} returned {} with Content-Length {:?}",
            url,
            response.status(),
            length
        );

        match length {
            Some(length) if response.status() == StatusCode::OK && length > 0 => {
                Availability::Available
            }
            _ => Availability::Missing,
        }
    }
}
