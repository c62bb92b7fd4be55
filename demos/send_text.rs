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

use mail_compose::{Account, MessageComposer, MessageIntent, SmtpTransport};

#[tokio::main]
async fn main() {
    env_logger::init();

    // Submit over implicit TLS on port 465 and authenticate
    // using the provided credentials.
    let account = Account::new("smtp.gmail.com")
        .ssl(true)
        .credentials("john", "p4ssw0rd")
        .from("john@example.com", "John Doe");

    // Recipients with a blank address are dropped, at least one
    // To recipient has to remain.
    let message_id = MessageComposer::new(SmtpTransport::new())
        .send(
            Some(&account),
            MessageIntent::html("Hi!", "<h1>Hello, world!</h1>")
                .alternative_text("Hello world!")
                .to([("Jane Doe", "jane@example.com"), ("James Smith", "james@test.com")])
                .bcc(["archive@example.com"]),
        )
        .await
        .unwrap();

    println!("Sent {}", message_id);
}
