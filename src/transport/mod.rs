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

use crate::{compose::ComposedMessage, config::TransportConfig};

pub mod mime;
pub mod smtp;

/// Delivers composed messages.
///
/// Errors are returned to the caller as they are, they are never retried.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Submits `message` and returns the identifier assigned to it.
    async fn send(&self, message: ComposedMessage, config: TransportConfig) -> crate::Result<String>;
}

#[async_trait::async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn send(&self, message: ComposedMessage, config: TransportConfig) -> crate::Result<String> {
        (**self).send(message, config).await
    }
}

#[async_trait::async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(&self, message: ComposedMessage, config: TransportConfig) -> crate::Result<String> {
        (**self).send(message, config).await
    }
}
