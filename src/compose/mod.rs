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

use std::fmt::Display;

use chrono::{DateTime, Utc};

use crate::{
    config::{self, Account},
    transport::Transport,
};

use self::{
    attachment::{AttachmentProbe, AttachmentRef, Availability},
    recipient::{filter_and_count, Recipient, RecipientKind},
};

pub mod attachment;
pub mod date;
pub mod recipient;

/// Rejected input, reported before any transport work takes place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// No valid address left in a mandatory recipient set.
    EmptyReceiver { kind: RecipientKind },

    /// Blank message body.
    EmptyMessage { kind: MessageKind },

    /// The attachment does not exist or is empty.
    AttachmentMissing { reference: String },

    /// The attachment could not be probed (strict mode only).
    AttachmentUnreachable { reference: String, reason: String },

    /// No sending account was provided.
    MissingAccount,

    /// A mandatory account property is blank.
    MissingProperty { property: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Text,
    Html,
    File,
}

/// Body of a message as requested by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Text(String),
    Html { html: String, text: Option<String> },
    File { text: String, attachment: String },
}

/// Body of a message once validated, handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Html {
        html: String,
        text: Option<String>,
    },
    File {
        text: String,
        attachment: AttachmentRef,
    },
}

/// A message to send, built with [`MessageIntent::text`], [`MessageIntent::html`]
/// or [`MessageIntent::file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageIntent {
    pub subject: String,
    pub body: Body,
    pub to: Vec<Recipient>,
    pub cc: Vec<Recipient>,
    pub bcc: Vec<Recipient>,
    pub reply_to: Vec<Recipient>,
    pub date: Option<DateTime<Utc>>,
}

/// A validated message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedMessage {
    pub subject: String,
    pub content: Content,
    pub to: Vec<Recipient>,
    pub cc: Vec<Recipient>,
    pub bcc: Vec<Recipient>,
    pub reply_to: Vec<Recipient>,
    pub sent_date: Option<DateTime<Utc>>,
}

/// Validates messages and submits them through a [`Transport`].
pub struct MessageComposer<T> {
    transport: T,
    probe: AttachmentProbe,
    strict_probe: bool,
}

impl MessageIntent {
    fn new(subject: impl Into<String>, body: Body) -> Self {
        MessageIntent {
            subject: subject.into(),
            body,
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            reply_to: Vec::new(),
            date: None,
        }
    }

    /// Creates a plain text message.
    pub fn text(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(subject, Body::Text(body.into()))
    }

    /// Creates an HTML message.
    pub fn html(subject: impl Into<String>, html: impl Into<String>) -> Self {
        Self::new(
            subject,
            Body::Html {
                html: html.into(),
                text: None,
            },
        )
    }

    /// Creates a message carrying the file found at `attachment`, which is
    /// either a local path or an `http`, `https` or `ftp` URL.
    pub fn file(
        subject: impl Into<String>,
        body: impl Into<String>,
        attachment: impl Into<String>,
    ) -> Self {
        Self::new(
            subject,
            Body::File {
                text: body.into(),
                attachment: attachment.into(),
            },
        )
    }

    /// Sets the plain text shown by clients that cannot render HTML.
    pub fn alternative_text(mut self, text: impl Into<String>) -> Self {
        if let Body::Html { text: alternative, .. } = &mut self.body {
            *alternative = Some(text.into());
        }
        self
    }

    pub fn to(mut self, recipients: impl IntoIterator<Item = impl Into<Recipient>>) -> Self {
        self.to.extend(recipients.into_iter().map(Into::into));
        self
    }

    pub fn cc(mut self, recipients: impl IntoIterator<Item = impl Into<Recipient>>) -> Self {
        self.cc.extend(recipients.into_iter().map(Into::into));
        self
    }

    pub fn bcc(mut self, recipients: impl IntoIterator<Item = impl Into<Recipient>>) -> Self {
        self.bcc.extend(recipients.into_iter().map(Into::into));
        self
    }

    pub fn reply_to(mut self, recipients: impl IntoIterator<Item = impl Into<Recipient>>) -> Self {
        self.reply_to.extend(recipients.into_iter().map(Into::into));
        self
    }

    /// Schedules the message. Dates in the past are replaced with the current time.
    pub fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    pub fn kind(&self) -> MessageKind {
        match &self.body {
            Body::Text(_) => MessageKind::Text,
            Body::Html { .. } => MessageKind::Html,
            Body::File { .. } => MessageKind::File,
        }
    }
}

impl ComposedMessage {
    pub fn kind(&self) -> MessageKind {
        match &self.content {
            Content::Text(_) => MessageKind::Text,
            Content::Html { .. } => MessageKind::Html,
            Content::File { .. } => MessageKind::File,
        }
    }
}

impl<T: Transport> MessageComposer<T> {
    pub fn new(transport: T) -> Self {
        MessageComposer {
            transport,
            probe: AttachmentProbe::new(),
            strict_probe: false,
        }
    }

    /// Replaces the probe used to check file attachments.
    pub fn attachment_probe(mut self, probe: AttachmentProbe) -> Self {
        self.probe = probe;
        self
    }

    /// Reports probe failures as [`ValidationError::AttachmentUnreachable`]
    /// instead of treating them as missing attachments.
    pub fn strict_attachment_probe(mut self, strict: bool) -> Self {
        self.strict_probe = strict;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Validates `message` and submits it, returning the message id assigned by the transport.
    pub async fn send(&self, account: Option<&Account>, message: MessageIntent) -> crate::Result<String> {
        let kind = message.kind();
        let MessageIntent {
            subject,
            body,
            to,
            cc,
            bcc,
            reply_to,
            date,
        } = message;

        let attachment = match &body {
            Body::File { attachment, .. } => Some(self.verify_attachment(attachment).await?),
            _ => None,
        };

        let account = account.ok_or(ValidationError::MissingAccount)?;
        let (to, count) = filter_and_count(RecipientKind::To, &to)?;
        let (cc, _) = filter_and_count(RecipientKind::Cc, &cc)?;
        let (bcc, _) = filter_and_count(RecipientKind::Bcc, &bcc)?;
        let (reply_to, _) = filter_and_count(RecipientKind::ReplyTo, &reply_to)?;

        let content = match (body, attachment) {
            (Body::Text(text), _) => Content::Text(not_blank(MessageKind::Text, text)?),
            (Body::Html { html, text }, _) => Content::Html {
                html: not_blank(MessageKind::Html, html)?,
                text,
            },
            (Body::File { text, .. }, Some(attachment)) => Content::File { text, attachment },
            (Body::File { attachment, .. }, None) => {
                return Err(ValidationError::AttachmentMissing {
                    reference: attachment,
                }
                .into())
            }
        };

        let sent_date = date::normalize(date);
        let config = config::configure(Some(account))?;

        log::debug!(
            "Submitting {} message {:?} to {} recipient(s) via {}:{}",
            kind,
            subject,
            count + cc.len() + bcc.len(),
            config.host,
            config.port
        );

        let message_id = self
            .transport
            .send(
                ComposedMessage {
                    subject,
                    content,
                    to,
                    cc,
                    bcc,
                    reply_to,
                    sent_date,
                },
                config,
            )
            .await?;

        if !message_id.trim().is_empty() {
            Ok(message_id)
        } else {
            Err(crate::Error::MissingMessageId)
        }
    }

    async fn verify_attachment(&self, reference: &str) -> Result<AttachmentRef, ValidationError> {
        match self.probe.check(reference).await {
            Availability::Available => Ok(AttachmentRef::resolve(reference)),
            Availability::Unreachable(reason) if self.strict_probe => {
                Err(ValidationError::AttachmentUnreachable {
                    reference: reference.to_string(),
                    reason,
                })
            }
            Availability::Missing | Availability::Unreachable(_) => {
                Err(ValidationError::AttachmentMissing {
                    reference: reference.to_string(),
                })
            }
        }
    }
}

fn not_blank(kind: MessageKind, body: String) -> Result<String, ValidationError> {
    if !body.trim().is_empty() {
        Ok(body)
    } else {
        Err(ValidationError::EmptyMessage { kind })
    }
}

impl Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            MessageKind::Text => "text",
            MessageKind::Html => "html",
            MessageKind::File => "file",
        })
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::EmptyReceiver { kind } => {
                write!(f, "The {} recipients cannot be empty", kind)
            }
            ValidationError::EmptyMessage { kind } => {
                write!(f, "The {} message cannot be empty", kind)
            }
            ValidationError::AttachmentMissing { reference } => {
                write!(f, "Attachment {:?} does not exist", reference)
            }
            ValidationError::AttachmentUnreachable { reference, reason } => {
                write!(f, "Attachment {:?} could not be checked: {}", reference, reason)
            }
            ValidationError::MissingAccount => {
                write!(f, "The email account information cannot be empty")
            }
            ValidationError::MissingProperty { property } => {
                write!(f, "'{}' cannot be empty", property)
            }
        }
    }
}

impl std::error::Error for ValidationError {}
