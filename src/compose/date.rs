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

use chrono::{DateTime, Utc};

/// Clamps a scheduled send date to the current instant.
pub fn normalize(date: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    normalize_at(date, Utc::now())
}

/// Same as [`normalize`] with an explicit clock reading.
pub fn normalize_at(date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    date.map(|date| if date < now { now } else { date })
}
