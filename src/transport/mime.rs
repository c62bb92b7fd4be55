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

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use mail_builder::{
    headers::{address::Address, date::Date, raw::Raw, HeaderType},
    MessageBuilder,
};
use reqwest::redirect;

use crate::{
    compose::{attachment::AttachmentRef, recipient::Recipient, ComposedMessage, Content},
    config::Mailbox,
};

/// Plain text part sent along HTML messages that have no alternative text.
pub const HTML_FALLBACK: &str = "Your email client does not support HTML messages";

static MESSAGE_COUNTER: AtomicU64 = AtomicU64::new(0);

struct Attachment {
    content_type: String,
    file_name: String,
    contents: Vec<u8>,
}

/// Generates a unique Message-ID (without angle brackets) for the sender's domain.
pub fn generate_message_id(from: &Mailbox) -> String {
    let domain = from
        .address
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim().to_string())
        .filter(|domain| !domain.is_empty())
        .unwrap_or_else(|| {
            gethostname::gethostname()
                .to_str()
                .unwrap_or("localhost")
                .to_string()
        });

    format!(
        "{}.{}.{}@{}",
        Utc::now().timestamp_millis(),
        std::process::id(),
        MESSAGE_COUNTER.fetch_add(1, Ordering::Relaxed),
        domain
    )
}

/// Renders `message` as an RFC 5322 message.
///
/// Bcc recipients are left out of the headers. File attachments are read from
/// disk or downloaded at this point.
pub async fn build_message(
    message: &ComposedMessage,
    from: &Mailbox,
    message_id: &str,
    timeout: Duration,
) -> crate::Result<Vec<u8>> {
    let attachment = match &message.content {
        Content::File { attachment, .. } => Some(load_attachment(attachment, timeout).await?),
        _ => None,
    };

    let mut builder = MessageBuilder::new()
        .from(address(from.name.as_deref(), &from.address))
        .subject(message.subject.as_str())
        .message_id(message_id);

    if !message.to.is_empty() {
        builder = builder.header("To", addresses(&message.to));
    }
    if !message.cc.is_empty() {
        builder = builder.header("Cc", addresses(&message.cc));
    }
    if !message.reply_to.is_empty() {
        builder = builder.header("Reply-To", addresses(&message.reply_to));
    }
    if let Some(date) = message.sent_date {
        builder = builder.date(Date::new(date.timestamp()));
    }

    builder = match (&message.content, &attachment) {
        (Content::Text(text), _) => builder.text_body(text.as_str()),
        (Content::Html { html, text }, _) => builder
            .html_body(html.as_str())
            .text_body(text.as_deref().unwrap_or(HTML_FALLBACK)),
        (Content::File { text, .. }, Some(attachment)) => builder.text_body(text.as_str()).attachment(
            attachment.content_type.as_str(),
            attachment.file_name.as_str(),
            attachment.contents.as_slice(),
        ),
        (Content::File { text, .. }, None) => builder.text_body(text.as_str()),
    };

    Ok(builder.write_to_vec()?)
}

fn address<'x>(name: Option<&'x str>, email: &'x str) -> Address<'x> {
    match name {
        Some(name) => Address::from((name, email)),
        None => Address::from(email),
    }
}

fn addresses(recipients: &[Recipient]) -> HeaderType<'_> {
    if recipients
        .iter()
        .all(|recipient| recipient.name.is_none() || recipient.charset.is_none())
    {
        return Address::new_list(
            recipients
                .iter()
                .map(|recipient| address(recipient.name.as_deref(), &recipient.address))
                .collect(),
        )
        .into();
    }

    Raw::new(
        recipients
            .iter()
            .map(|recipient| match &recipient.name {
                Some(name) => format!(
                    "{} <{}>",
                    encode_display_name(name, recipient.charset.as_deref().unwrap_or("utf-8")),
                    recipient.address
                ),
                None => format!("<{}>", recipient.address),
            })
            .collect::<Vec<_>>()
            .join(", "),
    )
    .into()
}

/// Renders a display name as a quoted string, or as RFC 2047 encoded words
/// in `charset` when it contains non-ASCII characters.
///
/// ISO-8859-1 and UTF-8 are supported, names that cannot be represented in
/// the requested charset are encoded as UTF-8.
fn encode_display_name(name: &str, charset: &str) -> String {
    if name.is_ascii() {
        return format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""));
    }

    let latin1 = ["iso-8859-1", "iso8859-1", "latin1"]
        .iter()
        .any(|label| charset.eq_ignore_ascii_case(label))
        && name.chars().all(|ch| u8::try_from(ch).is_ok());
    let charset = if latin1 {
        "ISO-8859-1"
    } else {
        if !charset.eq_ignore_ascii_case("utf-8") {
            log::debug!("Encoding display name {:?} as utf-8 instead of {}", name, charset);
        }
        "utf-8"
    };

    // Encoded words are limited to 75 characters.
    let max_bytes = (75 - charset.len() - 7) / 4 * 3;
    let mut words = Vec::new();
    let mut bytes = Vec::with_capacity(max_bytes);
    for ch in name.chars() {
        let mut buf = [0u8; 4];
        let encoded = match u8::try_from(ch) {
            Ok(byte) if latin1 => vec![byte],
            _ => ch.encode_utf8(&mut buf).as_bytes().to_vec(),
        };
        if bytes.len() + encoded.len() > max_bytes {
            words.push(format!("=?{}?B?{}?=", charset, STANDARD.encode(&bytes)));
            bytes.clear();
        }
        bytes.extend_from_slice(&encoded);
    }
    if !bytes.is_empty() {
        words.push(format!("=?{}?B?{}?=", charset, STANDARD.encode(&bytes)));
    }

    words.join(" ")
}

async fn load_attachment(attachment: &AttachmentRef, timeout: Duration) -> crate::Result<Attachment> {
    let file_name = attachment
        .file_name()
        .unwrap_or_else(|| "attachment".to_string());
    let contents = match attachment {
        AttachmentRef::Local(path) => tokio::fs::read(path).await?,
        AttachmentRef::Remote(url) => download(url, timeout).await?,
    };

    Ok(Attachment {
        content_type: mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .to_string(),
        file_name,
        contents,
    })
}

async fn download(url: &str, timeout: Duration) -> crate::Result<Vec<u8>> {
    let response = reqwest::Client::builder()
        .redirect(redirect::Policy::none())
        .timeout(timeout)
        .build()
        .map_err(|err| crate::Error::Transport(err.to_string()))?
        .get(url)
        .send()
        .await
        .map_err(|err| crate::Error::Transport(err.to_string()))?;

    if !response.status().is_success() {
        return Err(crate::Error::Transport(format!(
            "GET {} returned {}",
            url,
            response.status()
        )));
    }

    Ok(response
        .bytes()
        .await
        .map_err(|err| crate::Error::Transport(err.to_string()))?
        .to_vec())
}
