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

use mail_compose::{Account, AttachmentProbe, MessageComposer, MessageIntent, SmtpTransport};

#[tokio::main]
async fn main() {
    env_logger::init();

    // Plaintext submission preceded by a POP3 login, bounces are
    // returned to the sender address.
    let account = Account::new("mail.example.com")
        .port(25)
        .bounce(true)
        .from("john@example.com", "John Doe")
        .pop_before_smtp("pop.example.com", "john", "p4ssw0rd");

    // The attachment is checked with a HEAD request before anything is
    // sent. Failed checks are reported instead of treated as missing files.
    let message_id = MessageComposer::new(SmtpTransport::new().timeout(Duration::from_secs(30)))
        .attachment_probe(AttachmentProbe::new().timeout(Duration::from_secs(5)))
        .strict_attachment_probe(true)
        .send(
            Some(&account),
            MessageIntent::file(
                "Report",
                "See the attached report.",
                "https://example.com/report.pdf",
            )
            .to(["jane@example.com"]),
        )
        .await
        .unwrap();

    println!("Sent {}", message_id);
}
