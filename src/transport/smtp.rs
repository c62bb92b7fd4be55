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

use std::{collections::HashSet, time::Duration};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::TlsConnector;

use crate::{
    compose::ComposedMessage, config::TransportConfig, pop3, smtp::auth::Credentials,
    SmtpClient, SmtpClientBuilder,
};

use super::{
    mime::{build_message, generate_message_id},
    Transport,
};

/// Delivers messages over SMTP, one connection per message.
#[derive(Clone)]
pub struct SmtpTransport {
    timeout: Duration,
    helo_host: Option<String>,
    tls_connector: Option<TlsConnector>,
}

impl Default for SmtpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SmtpTransport {
    pub fn new() -> Self {
        SmtpTransport {
            timeout: Duration::from_secs(60),
            helo_host: None,
            tls_connector: None,
        }
    }

    /// Sets the timeout applied to the POP3 login, the attachment download
    /// and the SMTP session.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the EHLO hostname, defaults to the local hostname.
    pub fn helo_host(mut self, host: impl Into<String>) -> Self {
        self.helo_host = Some(host.into());
        self
    }

    /// Uses `tls_connector` for implicit TLS sessions instead of one trusting
    /// the Mozilla root certificates.
    pub fn tls_connector(mut self, tls_connector: TlsConnector) -> Self {
        self.tls_connector = Some(tls_connector);
        self
    }
}

#[async_trait::async_trait]
impl Transport for SmtpTransport {
    async fn send(&self, message: ComposedMessage, config: TransportConfig) -> crate::Result<String> {
        if let Some(pop3) = &config.pop_before_smtp {
            pop3::login(pop3, self.timeout).await?;
        }

        let message_id = generate_message_id(&config.from);
        let body = build_message(&message, &config.from, &message_id, self.timeout).await?;
        let mail_from = config
            .bounce_address
            .as_deref()
            .unwrap_or(config.from.address.as_str());
        let rcpt_to = envelope_recipients(&message);

        let mut builder = SmtpClientBuilder::new(config.host.as_str(), config.port)
            .timeout(self.timeout)
            .debug(config.debug);
        if let Some(helo_host) = &self.helo_host {
            builder = builder.helo_host(helo_host.as_str());
        }
        if let Some(tls_connector) = &self.tls_connector {
            builder = builder.tls_connector(tls_connector.clone());
        }

        let credentials = config.credentials.clone().map(Credentials::from);

        if config.implicit_tls {
            deliver(
                builder.connect().await?,
                credentials.as_ref(),
                mail_from,
                &rcpt_to,
                &body,
            )
            .await?;
        } else {
            deliver(
                builder.connect_plain().await?,
                credentials.as_ref(),
                mail_from,
                &rcpt_to,
                &body,
            )
            .await?;
        }

        log::debug!(
            "Delivered message <{}> to {}:{} for {} recipient(s)",
            message_id,
            config.host,
            config.port,
            rcpt_to.len()
        );

        Ok(format!("<{}>", message_id))
    }
}

/// Unique To, Cc and Bcc addresses, in order. Domains compare case-insensitively,
/// local parts as written.
fn envelope_recipients(message: &ComposedMessage) -> Vec<&str> {
    let mut seen = HashSet::new();
    message
        .to
        .iter()
        .chain(&message.cc)
        .chain(&message.bcc)
        .map(|recipient| recipient.address.as_str())
        .filter(|address| {
            seen.insert(match address.rsplit_once('@') {
                Some((local_part, domain)) => {
                    format!("{}@{}", local_part, domain.to_ascii_lowercase())
                }
                None => address.to_string(),
            })
        })
        .collect()
}

async fn deliver<T: AsyncRead + AsyncWrite + Unpin>(
    mut client: SmtpClient<T>,
    credentials: Option<&Credentials<'_>>,
    mail_from: &str,
    rcpt_to: &[&str],
    body: &[u8],
) -> crate::Result<()> {
    if let Some(credentials) = credentials {
        client.authenticate(credentials).await?;
    }

    client.mail_from(mail_from).await?;
    for rcpt in rcpt_to {
        client.rcpt_to(rcpt).await?;
    }
    client.data(body).await?;
    client.quit().await
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use tokio::{
        io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
        net::TcpListener,
        sync::oneshot,
    };

    use crate::{
        compose::{recipient::Recipient, ComposedMessage, Content},
        config::Account,
        smtp::tls::test::{test_tls_acceptor, test_tls_connector},
        transport::Transport,
        Error,
    };

    use super::{envelope_recipients, SmtpTransport};

    const EHLO_PLAIN: &str = "250-mx.example.com\r\n250-AUTH PLAIN\r\n250 8BITMIME\r\n";
    const EHLO_LOGIN: &str = "250-mx.example.com\r\n250-AUTH LOGIN PLAIN\r\n250 8BITMIME\r\n";

    // Minimal SMTP server accepting a single session, over implicit TLS when `tls`
    // is set. `auth` holds the replies to the AUTH command and to each following
    // challenge response. Returns the port and the commands received. DATA is
    // recorded along with whether the Subject header was seen.
    async fn spawn_server(
        tls: bool,
        ehlo: &'static str,
        auth: &'static [&'static str],
    ) -> (u16, oneshot::Receiver<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let commands = if tls {
                serve(test_tls_acceptor().accept(stream).await.unwrap(), ehlo, auth).await
            } else {
                serve(stream, ehlo, auth).await
            };
            let _ = tx.send(commands);
        });

        (port, rx)
    }

    async fn serve(
        stream: impl AsyncRead + AsyncWrite + Unpin,
        ehlo: &'static str,
        auth: &'static [&'static str],
    ) -> Vec<String> {
        let (reader, mut writer) = tokio::io::split(stream);
        let mut lines = BufReader::new(reader).lines();
        let mut auth_replies = auth.iter();
        let mut in_auth = false;
        let mut commands = Vec::new();

        writer.write_all(b"220 mx.example.com ESMTP\r\n").await.unwrap();
        writer.flush().await.unwrap();
        while let Ok(Some(line)) = lines.next_line().await {
            let reply = if in_auth || line.starts_with("AUTH") {
                let reply = auth_replies
                    .next()
                    .copied()
                    .unwrap_or("503 5.5.1 bad sequence\r\n");
                in_auth = reply.starts_with("334");
                reply
            } else if line.starts_with("EHLO") {
                ehlo
            } else if line == "DATA" {
                writer.write_all(b"354 go ahead\r\n").await.unwrap();
                writer.flush().await.unwrap();
                let mut data = String::new();
                while let Ok(Some(line)) = lines.next_line().await {
                    if line == "." {
                        break;
                    }
                    data.push_str(&line);
                    data.push_str("\r\n");
                }
                commands.push(format!("DATA {}", data.contains("Subject: hello")));
                writer.write_all(b"250 2.0.0 queued\r\n").await.unwrap();
                writer.flush().await.unwrap();
                continue;
            } else if line == "QUIT" {
                "221 bye\r\n"
            } else {
                "250 ok\r\n"
            };
            commands.push(line.clone());
            writer.write_all(reply.as_bytes()).await.unwrap();
            writer.flush().await.unwrap();
            if line == "QUIT" || reply.starts_with('5') {
                break;
            }
        }

        commands
    }

    fn message() -> ComposedMessage {
        ComposedMessage {
            subject: "hello".to_string(),
            content: Content::Text("world".to_string()),
            to: vec![Recipient::new("a@x.com")],
            cc: vec![
                Recipient::new("b@x.com"),
                Recipient::new("a@X.COM"),
                Recipient::new("A@x.com"),
            ],
            bcc: vec![Recipient::new("c@x.com")],
            reply_to: vec![],
            sent_date: None,
        }
    }

    #[test]
    fn unique_recipients() {
        assert_eq!(
            envelope_recipients(&message()),
            vec!["a@x.com", "b@x.com", "A@x.com", "c@x.com"]
        );
    }

    #[tokio::test]
    async fn smtp_session() {
        let _ = env_logger::try_init();
        let (port, commands) = spawn_server(false, EHLO_PLAIN, &["235 2.7.0 accepted\r\n"]).await;
        let config = Account::new("127.0.0.1")
            .port(port)
            .debug(true)
            .bounce(true)
            .credentials("tim", "tanstaaftanstaaf")
            .from("john@example.com", "John Doe")
            .transport_config()
            .unwrap();

        let message_id = SmtpTransport::new()
            .timeout(Duration::from_secs(5))
            .helo_host("client.example.com")
            .send(message(), config)
            .await
            .unwrap();
        assert!(message_id.starts_with('<') && message_id.ends_with("@example.com>"));

        assert_eq!(
            commands.await.unwrap(),
            vec![
                "EHLO client.example.com",
                "AUTH PLAIN AHRpbQB0YW5zdGFhZnRhbnN0YWFm",
                "MAIL FROM:<john@example.com>",
                "RCPT TO:<a@x.com>",
                "RCPT TO:<b@x.com>",
                "RCPT TO:<A@x.com>",
                "RCPT TO:<c@x.com>",
                "DATA true",
                "QUIT",
            ]
        );
    }

    #[tokio::test]
    async fn smtp_tls_login_session() {
        let (port, commands) = spawn_server(
            true,
            EHLO_LOGIN,
            &[
                "334 VXNlcm5hbWU6\r\n",
                "334 UGFzc3dvcmQ6\r\n",
                "235 2.7.0 accepted\r\n",
            ],
        )
        .await;
        let config = Account::new("127.0.0.1")
            .ssl(true)
            .ssl_port(port)
            .credentials("tim", "tanstaaftanstaaf")
            .from("john@example.com", "John Doe")
            .transport_config()
            .unwrap();

        SmtpTransport::new()
            .timeout(Duration::from_secs(5))
            .helo_host("client.example.com")
            .tls_connector(test_tls_connector())
            .send(message(), config)
            .await
            .unwrap();

        assert_eq!(
            commands.await.unwrap(),
            vec![
                "EHLO client.example.com",
                "AUTH LOGIN",
                "dGlt",
                "dGFuc3RhYWZ0YW5zdGFhZg==",
                "MAIL FROM:<john@example.com>",
                "RCPT TO:<a@x.com>",
                "RCPT TO:<b@x.com>",
                "RCPT TO:<A@x.com>",
                "RCPT TO:<c@x.com>",
                "DATA true",
                "QUIT",
            ]
        );
    }

    #[tokio::test]
    async fn smtp_auth_rejected() {
        let (port, _) = spawn_server(false, EHLO_PLAIN, &["535 5.7.8 bad credentials\r\n"]).await;
        let config = Account::new("127.0.0.1")
            .port(port)
            .credentials("tim", "wrong")
            .from("john@example.com", "John Doe")
            .transport_config()
            .unwrap();

        match SmtpTransport::new()
            .timeout(Duration::from_secs(5))
            .send(message(), config)
            .await
        {
            Err(Error::AuthenticationFailed(reply)) => assert_eq!(reply.code(), 535),
            other => panic!("Unexpected result {:?}", other),
        }
    }
}
