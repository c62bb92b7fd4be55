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

//! POP3 login used to unlock SMTP relaying on servers that require
//! POP3-before-SMTP.

use std::time::Duration;

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    net::TcpStream,
};

use crate::config::PopBeforeSmtp;

/// Logs into the POP3 server and closes the session right away.
pub async fn login(settings: &PopBeforeSmtp, timeout: Duration) -> crate::Result<()> {
    tokio::time::timeout(timeout, async {
        let stream = TcpStream::connect((settings.host.as_str(), settings.port)).await?;
        let mut session = Pop3Session::new(stream);

        session.read_ok().await?;
        session.cmd(&format!("USER {}", settings.username)).await?;
        session.cmd(&format!("PASS {}", settings.password)).await?;
        session.cmd("QUIT").await?;

        log::debug!(
            "POP3 login as {} on {}:{} succeeded",
            settings.username,
            settings.host,
            settings.port
        );
        Ok::<_, crate::Error>(())
    })
    .await
    .map_err(|_| crate::Error::Timeout)?
}

struct Pop3Session<T> {
    stream: BufReader<T>,
    line: String,
}

impl<T: AsyncRead + AsyncWrite + Unpin> Pop3Session<T> {
    fn new(stream: T) -> Self {
        Pop3Session {
            stream: BufReader::new(stream),
            line: String::with_capacity(128),
        }
    }

    async fn cmd(&mut self, cmd: &str) -> crate::Result<()> {
        let stream = self.stream.get_mut();
        stream.write_all(cmd.as_bytes()).await?;
        stream.write_all(b"\r\n").await?;
        stream.flush().await?;
        self.read_ok().await
    }

    async fn read_ok(&mut self) -> crate::Result<()> {
        self.line.clear();
        if self.stream.read_line(&mut self.line).await? == 0 {
            return Err(crate::Error::Pop3("connection closed".to_string()));
        }

        let line = self.line.trim_end();
        if line.starts_with("+OK") {
            Ok(())
        } else {
            Err(crate::Error::Pop3(line.to_string()))
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use tokio::{
        io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
        net::TcpListener,
    };

    use crate::{config::PopBeforeSmtp, Error};

    use super::login;

    // Minimal POP3 server accepting a single session.
    async fn spawn_server(password: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut lines = BufReader::new(reader).lines();

            writer.write_all(b"+OK POP3 ready\r\n").await.unwrap();
            while let Some(line) = lines.next_line().await.unwrap() {
                let reply = match line.split_once(' ') {
                    Some(("USER", "john")) => "+OK\r\n",
                    Some(("PASS", pass)) if pass == password => "+OK logged in\r\n",
                    Some(("PASS", _)) => "-ERR invalid password\r\n",
                    _ if line == "QUIT" => "+OK bye\r\n",
                    _ => "-ERR unknown command\r\n",
                };
                writer.write_all(reply.as_bytes()).await.unwrap();
                if line == "QUIT" || reply.starts_with("-ERR") {
                    break;
                }
            }
        });

        port
    }

    fn settings(port: u16, password: &str) -> PopBeforeSmtp {
        PopBeforeSmtp {
            host: "127.0.0.1".to_string(),
            port,
            username: "john".to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn pop3_login() {
        let port = spawn_server("secret").await;
        login(&settings(port, "secret"), Duration::from_secs(5))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn pop3_rejected() {
        let port = spawn_server("secret").await;
        match login(&settings(port, "wrong"), Duration::from_secs(5)).await {
            Err(Error::Pop3(reply)) => assert_eq!(reply, "-ERR invalid password"),
            other => panic!("Unexpected result {:?}", other),
        }
    }
}
