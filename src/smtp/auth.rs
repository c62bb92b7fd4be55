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

use std::{borrow::Cow, fmt::Display};

use base64::{engine::general_purpose::STANDARD, Engine};
use smtp_proto::{AUTH_LOGIN, AUTH_PLAIN};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::SmtpClient;

pub struct Credentials<'x> {
    username: Cow<'x, str>,
    secret: Cow<'x, str>,
}

impl<'x> From<(&'x str, &'x str)> for Credentials<'x> {
    fn from(credentials: (&'x str, &'x str)) -> Self {
        Credentials {
            username: credentials.0.into(),
            secret: credentials.1.into(),
        }
    }
}

impl<'x> From<(String, String)> for Credentials<'x> {
    fn from(credentials: (String, String)) -> Self {
        Credentials {
            username: credentials.0.into(),
            secret: credentials.1.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    InvalidChallenge,
}

/// Authentication mechanism, in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Mechanism {
    /// Login
    Login = 1,

    /// Plain
    Plain = 2,
}

impl Mechanism {
    /// Picks the preferred mechanism among those advertised in the EHLO response.
    pub fn negotiate(auth_mechanisms: u64) -> Option<Mechanism> {
        [(AUTH_LOGIN, Mechanism::Login), (AUTH_PLAIN, Mechanism::Plain)]
            .into_iter()
            .find(|(flag, _)| auth_mechanisms & flag != 0)
            .map(|(_, mechanism)| mechanism)
    }
}

impl Display for Mechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mechanism::Plain => write!(f, "PLAIN"),
            Mechanism::Login => write!(f, "LOGIN"),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidChallenge => write!(f, "Invalid challenge received."),
        }
    }
}

impl From<Error> for crate::Error {
    fn from(err: Error) -> Self {
        crate::Error::Auth(err)
    }
}

impl<'x> Credentials<'x> {
    /// Creates a new `Credentials` instance.
    pub fn new(
        username: impl Into<Cow<'x, str>>,
        secret: impl Into<Cow<'x, str>>,
    ) -> Credentials<'x> {
        Credentials {
            username: username.into(),
            secret: secret.into(),
        }
    }

    pub(crate) fn encode(&self, mechanism: Mechanism, challenge: &str) -> crate::Result<String> {
        Ok(STANDARD.encode(
            match mechanism {
                Mechanism::Plain => {
                    format!("\u{0}{}\u{0}{}", self.username, self.secret)
                }

                Mechanism::Login => {
                    let challenge = STANDARD.decode(challenge.trim())?;
                    let challenge = String::from_utf8_lossy(&challenge).to_ascii_lowercase();

                    if challenge.starts_with("user name") || challenge.starts_with("username") {
                        &self.username
                    } else if challenge.starts_with("password") {
                        &self.secret
                    } else {
                        return Err(Error::InvalidChallenge.into());
                    }
                    .to_string()
                }
            }
            .as_bytes(),
        ))
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> SmtpClient<T> {
    /// Authenticates using the best mechanism advertised by the server.
    pub async fn authenticate(&mut self, credentials: &Credentials<'_>) -> crate::Result<()> {
        let mechanism = Mechanism::negotiate(self.capabilities.auth_mechanisms)
            .ok_or(crate::Error::UnsupportedAuthMechanism)?;

        if self.debug {
            log::debug!("C: AUTH {}", mechanism);
        }
        let mut reply = if mechanism == Mechanism::Plain {
            self.cmd(format!("AUTH {} {}\r\n", mechanism, credentials.encode(mechanism, "")?).as_bytes())
                .await?
        } else {
            self.cmd(format!("AUTH {}\r\n", mechanism).as_bytes())
                .await?
        };

        for _ in 0..3 {
            match reply.code() {
                334 => {
                    reply = self
                        .cmd(format!("{}\r\n", credentials.encode(mechanism, reply.message())?).as_bytes())
                        .await?;
                }
                235 => {
                    return Ok(());
                }
                _ => {
                    return Err(crate::Error::AuthenticationFailed(reply));
                }
            }
        }

        Err(crate::Error::UnexpectedReply(reply))
    }
}

#[cfg(test)]
mod test {
    use smtp_proto::{AUTH_LOGIN, AUTH_PLAIN, AUTH_XOAUTH2};

    use crate::smtp::auth::{Credentials, Mechanism};

    #[test]
    fn auth_encode() {
        // Login
        assert_eq!(
            Credentials::new("tim", "tanstaaftanstaaf")
                .encode(Mechanism::Login, "VXNlciBOYW1lAA==",)
                .unwrap(),
            "dGlt"
        );
        assert_eq!(
            Credentials::new("tim", "tanstaaftanstaaf")
                .encode(Mechanism::Login, "UGFzc3dvcmQ6",)
                .unwrap(),
            "dGFuc3RhYWZ0YW5zdGFhZg=="
        );
        assert!(Credentials::new("tim", "tanstaaftanstaaf")
            .encode(Mechanism::Login, "UmVhbG06",)
            .is_err());

        // Plain
        assert_eq!(
            Credentials::from(("tim", "tanstaaftanstaaf"))
                .encode(Mechanism::Plain, "",)
                .unwrap(),
            "AHRpbQB0YW5zdGFhZnRhbnN0YWFm"
        );
    }

    #[test]
    fn negotiate_mechanism() {
        assert_eq!(
            Mechanism::negotiate(AUTH_PLAIN | AUTH_LOGIN),
            Some(Mechanism::Login)
        );
        assert_eq!(Mechanism::negotiate(AUTH_PLAIN), Some(Mechanism::Plain));
        assert_eq!(Mechanism::negotiate(AUTH_XOAUTH2), None);
        assert_eq!(Mechanism::negotiate(0), None);
    }
}
