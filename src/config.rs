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

use serde::Deserialize;

use crate::compose::ValidationError;

/// Sending account, as found in the application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Account {
    pub host: String,
    pub port: u16,
    pub ssl_port: u16,
    pub ssl_enabled: bool,
    pub debug: bool,
    pub username: String,
    pub password: String,
    pub from: Mailbox,
    pub pop3: Pop3Account,
    pub bounce_enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Mailbox {
    pub address: String,
    pub name: Option<String>,
}

/// POP3 login settings used for POP3-before-SMTP.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Pop3Account {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

/// Settings handed to a transport for a single submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub host: String,
    pub port: u16,
    pub implicit_tls: bool,
    pub debug: bool,
    pub credentials: Option<(String, String)>,
    pub from: Mailbox,
    pub bounce_address: Option<String>,
    pub pop_before_smtp: Option<PopBeforeSmtp>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopBeforeSmtp {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl Default for Account {
    fn default() -> Self {
        Account {
            host: String::new(),
            port: 25,
            ssl_port: 465,
            ssl_enabled: false,
            debug: false,
            username: String::new(),
            password: String::new(),
            from: Mailbox::default(),
            pop3: Pop3Account::default(),
            bounce_enabled: false,
        }
    }
}

impl Default for Pop3Account {
    fn default() -> Self {
        Pop3Account {
            enabled: false,
            host: String::new(),
            port: 110,
            username: String::new(),
            password: String::new(),
        }
    }
}

impl Account {
    /// Creates an account for the given SMTP host.
    pub fn new(host: impl Into<String>) -> Self {
        Account {
            host: host.into(),
            ..Default::default()
        }
    }

    /// Sets the plaintext SMTP port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the implicit TLS SMTP port.
    pub fn ssl_port(mut self, port: u16) -> Self {
        self.ssl_port = port;
        self
    }

    pub fn ssl(mut self, ssl_enabled: bool) -> Self {
        self.ssl_enabled = ssl_enabled;
        self
    }

    /// Logs the SMTP conversation.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn from(mut self, address: impl Into<String>, name: impl Into<String>) -> Self {
        self.from = Mailbox {
            address: address.into(),
            name: Some(name.into()),
        };
        self
    }

    /// Uses the sender address as the envelope (bounce) address.
    pub fn bounce(mut self, bounce_enabled: bool) -> Self {
        self.bounce_enabled = bounce_enabled;
        self
    }

    /// Logs into a POP3 server before every SMTP submission.
    pub fn pop_before_smtp(
        mut self,
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.pop3 = Pop3Account {
            enabled: true,
            host: host.into(),
            username: username.into(),
            password: password.into(),
            ..self.pop3
        };
        self
    }

    /// Derives the transport settings of a single submission.
    pub fn transport_config(&self) -> Result<TransportConfig, ValidationError> {
        configure(Some(self))
    }
}

/// Builds the transport configuration for `account`.
pub fn configure(account: Option<&Account>) -> Result<TransportConfig, ValidationError> {
    let account = account.ok_or(ValidationError::MissingAccount)?;

    let pop_before_smtp = if account.pop3.enabled {
        let pop3 = &account.pop3;
        Some(PopBeforeSmtp {
            host: required("pop3.host", &pop3.host)?,
            port: pop3.port,
            username: required("pop3.username", &pop3.username)?,
            password: required("pop3.password", &pop3.password)?,
        })
    } else {
        None
    };

    Ok(TransportConfig {
        host: account.host.clone(),
        port: if account.ssl_enabled {
            account.ssl_port
        } else {
            account.port
        },
        implicit_tls: account.ssl_enabled,
        debug: account.debug,
        credentials: (!account.username.trim().is_empty())
            .then(|| (account.username.clone(), account.password.clone())),
        from: account.from.clone(),
        bounce_address: account
            .bounce_enabled
            .then(|| account.from.address.clone()),
        pop_before_smtp,
    })
}

fn required(property: &'static str, value: &str) -> Result<String, ValidationError> {
    if !value.trim().is_empty() {
        Ok(value.to_string())
    } else {
        Err(ValidationError::MissingProperty { property })
    }
}

#[cfg(test)]
mod test {
    use crate::compose::ValidationError;

    use super::{configure, Account, Mailbox, PopBeforeSmtp};

    #[test]
    fn select_port() {
        let account = Account::new("smtp.example.com").port(2525).ssl_port(4650);

        let config = configure(Some(&account)).unwrap();
        assert_eq!(config.port, 2525);
        assert!(!config.implicit_tls);

        let config = configure(Some(&account.clone().ssl(true))).unwrap();
        assert_eq!(config.port, 4650);
        assert!(config.implicit_tls);
    }

    #[test]
    fn bounce_address() {
        let account = Account::new("smtp.example.com").from("john@example.com", "John Doe");

        assert_eq!(configure(Some(&account)).unwrap().bounce_address, None);
        assert_eq!(
            configure(Some(&account.bounce(true)))
                .unwrap()
                .bounce_address
                .as_deref(),
            Some("john@example.com")
        );
    }

    #[test]
    fn pop_before_smtp() {
        let account = Account::new("smtp.example.com");
        assert_eq!(configure(Some(&account)).unwrap().pop_before_smtp, None);

        assert_eq!(
            configure(Some(
                &account
                    .clone()
                    .pop_before_smtp("pop.example.com", "john", "secret")
            ))
            .unwrap()
            .pop_before_smtp,
            Some(PopBeforeSmtp {
                host: "pop.example.com".to_string(),
                port: 110,
                username: "john".to_string(),
                password: "secret".to_string(),
            })
        );

        for (account, property) in [
            (account.clone().pop_before_smtp(" ", "john", "secret"), "pop3.host"),
            (
                account.clone().pop_before_smtp("pop.example.com", "", "secret"),
                "pop3.username",
            ),
            (
                account.clone().pop_before_smtp("pop.example.com", "john", ""),
                "pop3.password",
            ),
        ] {
            assert_eq!(
                configure(Some(&account)),
                Err(ValidationError::MissingProperty { property })
            );
        }
    }

    #[test]
    fn missing_account() {
        assert_eq!(configure(None), Err(ValidationError::MissingAccount));
    }

    #[test]
    fn credentials() {
        let account = Account::new("smtp.example.com");
        assert_eq!(configure(Some(&account)).unwrap().credentials, None);
        assert_eq!(
            configure(Some(&account.credentials("john", "p4ssw0rd")))
                .unwrap()
                .credentials,
            Some(("john".to_string(), "p4ssw0rd".to_string()))
        );
    }

    #[test]
    fn parse_account() {
        let account: Account = serde_json::from_str(
            r#"{
                "host": "smtp.qq.com",
                "sslPort": 994,
                "sslEnabled": true,
                "username": "85465@qq.com",
                "password": "2312312",
                "from": { "address": "a@163.com", "name": "Jia" },
                "bounceEnabled": true,
                "pop3": { "enabled": true, "host": "pop.qq.com", "username": "u", "password": "p" }
            }"#,
        )
        .unwrap();

        assert_eq!(account.port, 25);
        assert_eq!(account.pop3.port, 110);
        assert_eq!(
            account.from,
            Mailbox {
                address: "a@163.com".to_string(),
                name: Some("Jia".to_string())
            }
        );

        let config = account.transport_config().unwrap();
        assert_eq!(config.host, "smtp.qq.com");
        assert_eq!(config.port, 994);
        assert_eq!(config.bounce_address.as_deref(), Some("a@163.com"));
        assert!(config.pop_before_smtp.is_some());
    }
}
