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

use serde::Deserialize;

use super::ValidationError;

/// A single addressee of a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Recipient {
    pub address: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub charset: Option<String>,
}

/// The header a recipient set belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipientKind {
    To,
    Cc,
    Bcc,
    ReplyTo,
}

impl Recipient {
    /// Creates a recipient without a display name.
    pub fn new(address: impl Into<String>) -> Self {
        Recipient {
            address: address.into(),
            name: None,
            charset: None,
        }
    }

    /// Sets the display name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the charset used to encode the display name.
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    pub fn is_valid(&self) -> bool {
        !self.address.trim().is_empty()
    }
}

impl From<&str> for Recipient {
    fn from(address: &str) -> Self {
        Recipient::new(address)
    }
}

impl From<String> for Recipient {
    fn from(address: String) -> Self {
        Recipient::new(address)
    }
}

impl From<(&str, &str)> for Recipient {
    fn from((name, address): (&str, &str)) -> Self {
        Recipient::new(address).name(name)
    }
}

impl From<(String, String)> for Recipient {
    fn from((name, address): (String, String)) -> Self {
        Recipient::new(address).name(name)
    }
}

impl RecipientKind {
    /// Only the primary recipient set is mandatory.
    pub fn is_required(&self) -> bool {
        matches!(self, RecipientKind::To)
    }
}

impl Display for RecipientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RecipientKind::To => "to",
            RecipientKind::Cc => "cc",
            RecipientKind::Bcc => "bcc",
            RecipientKind::ReplyTo => "reply-to",
        })
    }
}

/// Drops entries with a blank address and returns the remaining recipients
/// together with their count.
///
/// The `To` set must yield at least one recipient, the other sets may end up
/// empty.
pub fn filter_and_count(
    kind: RecipientKind,
    recipients: &[Recipient],
) -> Result<(Vec<Recipient>, usize), ValidationError> {
    let valid = recipients
        .iter()
        .filter(|recipient| recipient.is_valid())
        .map(|recipient| Recipient {
            address: recipient.address.trim().to_string(),
            name: recipient
                .name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            charset: recipient.charset.clone(),
        })
        .collect::<Vec<_>>();

    if valid.is_empty() && kind.is_required() {
        return Err(ValidationError::EmptyReceiver { kind });
    }

    let count = valid.len();
    Ok((valid, count))
}

#[cfg(test)]
mod test {
    use crate::compose::ValidationError;

    use super::{filter_and_count, Recipient, RecipientKind};

    #[test]
    fn filter_blank_addresses() {
        let recipients = vec![
            Recipient::from("jane@example.com"),
            Recipient::from(""),
            Recipient::from("   "),
            Recipient::from(("James Smith", " james@test.com ")),
        ];

        let (valid, count) = filter_and_count(RecipientKind::To, &recipients).unwrap();
        assert_eq!(count, 2);
        assert_eq!(
            valid,
            vec![
                Recipient::new("jane@example.com"),
                Recipient::new("james@test.com").name("James Smith"),
            ]
        );
    }

    #[test]
    fn empty_to_set() {
        for recipients in [vec![], vec![Recipient::from(""), Recipient::from("\t")]] {
            assert_eq!(
                filter_and_count(RecipientKind::To, &recipients),
                Err(ValidationError::EmptyReceiver {
                    kind: RecipientKind::To
                })
            );
        }
    }

    #[test]
    fn optional_sets() {
        for kind in [RecipientKind::Cc, RecipientKind::Bcc, RecipientKind::ReplyTo] {
            assert_eq!(filter_and_count(kind, &[]), Ok((vec![], 0)));
            assert_eq!(
                filter_and_count(kind, &[Recipient::from(" ")]),
                Ok((vec![], 0))
            );
        }
    }

    #[test]
    fn keep_charset_and_drop_blank_name() {
        let (valid, _) = filter_and_count(
            RecipientKind::Cc,
            &[Recipient::new("a@x.com").name("  ").charset("ISO-8859-1")],
        )
        .unwrap();
        assert_eq!(valid, vec![Recipient::new("a@x.com").charset("ISO-8859-1")]);
    }
}
