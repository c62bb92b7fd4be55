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

//! # mail-compose
//!
//! _mail-compose_ is a Rust library that validates, composes and dispatches e-mail messages
//! on behalf of a configured account. It includes the following features:
//!
//! - Three message kinds: plain **text**, **HTML** (with a plain-text alternative) and
//!   **file** attachments.
//! - Recipient filtering for the _To_, _Cc_, _Bcc_ and _Reply-To_ sets.
//! - Attachment probing for local paths and remote `http`, `https` and `ftp` URLs
//!   (HTTP `HEAD` without following redirects).
//! - Scheduled send dates clamped to the current instant.
//! - Transport configuration derived from the account: implicit TLS port selection,
//!   bounce address and POP3-before-SMTP authentication.
//! - A default SMTP transport (_RFC 5321_) with `PLAIN` and `LOGIN` authentication
//!   (_RFC 4954_) over implicit TLS, built on [`mail-builder`](https://crates.io/crates/mail-builder).
//! - Full async (requires Tokio).
//!
//! ## Usage Example
//!
//! Send a text message through an SMTP server that requires authentication:
//!
//! ```rust
//!     let account = Account::new("smtp.example.com")
//!         .ssl(true)
//!         .credentials("john", "p4ssw0rd")
//!         .from("john@example.com", "John Doe");
//!
//!     let message_id = MessageComposer::new(SmtpTransport::new())
//!         .send(
//!             Some(&account),
//!             MessageIntent::text("Hi!", "Hello world!")
//!                 .to([("Jane Doe", "jane@example.com")])
//!                 .cc(["james@test.com"]),
//!         )
//!         .await
//!         .unwrap();
//! ```
//!
//! Attach a remote file, checked with a `HEAD` request before anything is sent:
//!
//! ```rust
//!     let message_id = MessageComposer::new(SmtpTransport::new())
//!         .send(
//!             Some(&account),
//!             MessageIntent::file(
//!                 "Report",
//!                 "See the attached report.",
//!                 "https://example.com/report.pdf",
//!             )
//!             .to(["jane@example.com"]),
//!         )
//!         .await
//!         .unwrap();
//! ```
//!
//! ## License
//!
//! Licensed under either of
//!
//!  * Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
//!  * MIT license ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)
//!
//! at your option.
//!

pub mod compose;
pub mod config;
pub mod pop3;
pub mod smtp;
#[forbid(unsafe_code)]
pub mod transport;

use std::{fmt::Display, time::Duration};

use smtp_proto::{EhloResponse, Response};

pub use compose::{
    attachment::{AttachmentProbe, AttachmentRef, Availability},
    recipient::{Recipient, RecipientKind},
    ComposedMessage, Content, MessageComposer, MessageIntent, MessageKind, ValidationError,
};
pub use config::{Account, Mailbox, Pop3Account, PopBeforeSmtp, TransportConfig};
pub use mail_builder;
pub use transport::{smtp::SmtpTransport, Transport};

#[derive(Debug)]
pub enum Error {
    /// Invalid input, detected before any transport work.
    Validation(ValidationError),

    /// I/O error
    Io(std::io::Error),

    /// TLS error
    Tls(Box<rustls::Error>),

    /// Base64 decode error
    Base64(base64::DecodeError),

    // SMTP authentication error.
    Auth(smtp::auth::Error),

    /// Failure parsing SMTP reply
    UnparseableReply,

    /// Unexpected SMTP reply.
    UnexpectedReply(Response<String>),

    /// SMTP authentication failure.
    AuthenticationFailed(Response<String>),

    /// Invalid TLS name provided.
    InvalidTLSName,

    /// The server does no support any of the available authentication methods.
    UnsupportedAuthMechanism,

    /// POP3 server rejected the login preceding SMTP submission.
    Pop3(String),

    /// Failure reported by a non-SMTP transport or while fetching an attachment.
    Transport(String),

    /// The transport accepted the message without assigning an identifier.
    MissingMessageId,

    /// Connection timeout.
    Timeout,
}

pub type Result<T> = std::result::Result<T, Error>;

/// SMTP client.
pub struct SmtpClient<T> {
    pub stream: T,
    pub timeout: Duration,
    pub debug: bool,
    pub capabilities: EhloResponse<String>,
}

/// Connection settings for an [`SmtpClient`].
#[derive(Clone)]
pub struct SmtpClientBuilder<T: AsRef<str>> {
    pub timeout: Duration,
    pub tls_connector: tokio_rustls::TlsConnector,
    pub tls_hostname: T,
    pub debug: bool,
    pub addr: String,
    pub local_host: String,
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Validation(e) => write!(f, "Validation error: {}", e),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Tls(e) => write!(f, "TLS error: {}", e),
            Error::Base64(e) => write!(f, "Base64 decode error: {}", e),
            Error::Auth(e) => write!(f, "SMTP authentication error: {}", e),
            Error::UnparseableReply => write!(f, "Unparseable SMTP reply"),
            Error::UnexpectedReply(e) => {
                write!(f, "Unexpected reply: {} {}", e.code(), e.message())
            }
            Error::AuthenticationFailed(e) => {
                write!(f, "Authentication failed: {} {}", e.code(), e.message())
            }
            Error::InvalidTLSName => write!(f, "Invalid TLS name provided"),
            Error::UnsupportedAuthMechanism => write!(
                f,
                "The server does no support any of the available authentication methods"
            ),
            Error::Pop3(e) => write!(f, "POP3 login failed: {}", e),
            Error::Transport(e) => write!(f, "Transport error: {}", e),
            Error::MissingMessageId => write!(f, "Transport returned an empty message id"),
            Error::Timeout => write!(f, "Connection timeout"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Validation(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::Base64(err)
    }
}
