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

use std::time::Duration;

use smtp_proto::EhloResponse;
use tokio::net::TcpStream;
use tokio_rustls::{client::TlsStream, TlsConnector};

use crate::{SmtpClient, SmtpClientBuilder};

use super::{tls::build_tls_connector, AssertReply};

impl<T: AsRef<str>> SmtpClientBuilder<T> {
    pub fn new(hostname: T, port: u16) -> Self {
        SmtpClientBuilder {
            addr: format!("{}:{}", hostname.as_ref(), port),
            timeout: Duration::from_secs(60),
            tls_connector: build_tls_connector(),
            tls_hostname: hostname,
            debug: false,
            local_host: gethostname::gethostname()
                .to_str()
                .unwrap_or("[127.0.0.1]")
                .to_string(),
        }
    }

    /// Replaces the TLS connector, which trusts the Mozilla root certificates by default
    pub fn tls_connector(mut self, tls_connector: TlsConnector) -> Self {
        self.tls_connector = tls_connector;
        self
    }

    /// Set the EHLO hostname
    pub fn helo_host(mut self, host: impl Into<String>) -> Self {
        self.local_host = host.into();
        self
    }

    /// Sets the SMTP connection timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Logs the SMTP conversation
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Connect over implicit TLS
    pub async fn connect(&self) -> crate::Result<SmtpClient<TlsStream<TcpStream>>> {
        tokio::time::timeout(self.timeout, async {
            let mut client = self
                .tcp_connect()
                .await?
                .into_tls(&self.tls_connector, self.tls_hostname.as_ref())
                .await?;

            // Read greeting
            client.read().await?.assert_positive_completion()?;

            // Send EHLO
            client.ehlo(&self.local_host).await?;

            Ok(client)
        })
        .await
        .map_err(|_| crate::Error::Timeout)?
    }

    /// Connect over clear text
    pub async fn connect_plain(&self) -> crate::Result<SmtpClient<TcpStream>> {
        tokio::time::timeout(self.timeout, async {
            let mut client = self.tcp_connect().await?;

            // Read greeting
            client.read().await?.assert_positive_completion()?;

            // Send EHLO
            client.ehlo(&self.local_host).await?;

            Ok(client)
        })
        .await
        .map_err(|_| crate::Error::Timeout)?
    }

    async fn tcp_connect(&self) -> crate::Result<SmtpClient<TcpStream>> {
        if self.debug {
            log::debug!("Connecting to {}", self.addr);
        }
        Ok(SmtpClient {
            stream: TcpStream::connect(&self.addr).await?,
            timeout: self.timeout,
            debug: self.debug,
            capabilities: EhloResponse::default(),
        })
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use smtp_proto::AUTH_PLAIN;
    use tokio::{
        io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
        net::TcpListener,
    };

    use crate::{smtp::tls::test::test_tls_connector, Error, SmtpClientBuilder};

    // Plaintext server answering the greeting and EHLO.
    async fn spawn_plain_server() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut lines = BufReader::new(reader).lines();

            writer.write_all(b"220 mx ESMTP\r\n").await.unwrap();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.starts_with("EHLO") {
                    writer
                        .write_all(b"250-mx.example.com\r\n250 AUTH PLAIN\r\n")
                        .await
                        .unwrap();
                } else {
                    writer.write_all(b"221 bye\r\n").await.unwrap();
                    break;
                }
            }
        });

        port
    }

    #[tokio::test]
    async fn connect_plain() {
        let port = spawn_plain_server().await;
        let client = SmtpClientBuilder::new("127.0.0.1", port)
            .helo_host("client.example.com")
            .timeout(Duration::from_secs(5))
            .connect_plain()
            .await
            .unwrap();

        assert_eq!(client.capabilities.hostname, "mx.example.com");
        assert_eq!(client.capabilities.auth_mechanisms, AUTH_PLAIN);
        client.quit().await.unwrap();
    }

    #[tokio::test]
    async fn connect_requires_tls() {
        let port = spawn_plain_server().await;
        match SmtpClientBuilder::new("127.0.0.1", port)
            .tls_connector(test_tls_connector())
            .timeout(Duration::from_secs(5))
            .connect()
            .await
        {
            Err(Error::Tls(_)) | Err(Error::Io(_)) => (),
            Err(err) => panic!("Unexpected error {}", err),
            Ok(_) => panic!("Handshake succeeded against a plaintext server"),
        }
    }
}
