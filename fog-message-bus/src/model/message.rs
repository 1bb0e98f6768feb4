/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

const SEQUENCE_MAX: u32 = 0x00ff_ffff;

/// Immutable message moving through the bus.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct Message {
    pub id: String,
    pub tag: String,
    pub timestamp: i64,
    pub bytes: Vec<u8>,
}

impl Message {
    pub fn new(id: impl Into<String>, tag: impl Into<String>, timestamp: i64, bytes: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            tag: tag.into(),
            timestamp,
            bytes,
        }
    }

    /// Encodes the whole message for archive storage.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Generates strictly increasing message IDs for one process lifetime.
///
/// IDs are a fixed-width hex millisecond prefix followed by a fixed-width hex
/// sequence, so string order and generation order agree. A clock that moves
/// backwards keeps the last prefix and keeps counting.
#[derive(Default)]
pub struct MessageIdGenerator {
    last: Mutex<(u64, u32)>,
}

impl MessageIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> String {
        let now = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default();
        self.next_id_at(now)
    }

    pub(crate) fn next_id_at(&self, now_millis: u64) -> String {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let (last_millis, last_sequence) = *last;

        let next = if now_millis > last_millis {
            (now_millis, 0)
        } else if last_sequence < SEQUENCE_MAX {
            (last_millis, last_sequence + 1)
        } else {
            (last_millis + 1, 0)
        };
        *last = next;

        format!("{:012x}{:06x}", next.0, next.1)
    }
}

#[cfg(test)]
mod tests {
    use super::{Message, MessageIdGenerator, SEQUENCE_MAX};

    #[test]
    fn ids_increase_within_one_millisecond() {
        let generator = MessageIdGenerator::new();

        let first = generator.next_id_at(1_000);
        let second = generator.next_id_at(1_000);
        let third = generator.next_id_at(1_001);

        assert!(first < second);
        assert!(second < third);
    }

    #[test]
    fn ids_keep_increasing_when_clock_regresses() {
        let generator = MessageIdGenerator::new();

        let before = generator.next_id_at(5_000);
        let after = generator.next_id_at(4_000);

        assert!(before < after);
    }

    #[test]
    fn sequence_overflow_rolls_into_next_prefix() {
        let generator = MessageIdGenerator::new();
        *generator.last.lock().unwrap() = (10, SEQUENCE_MAX);

        let rolled = generator.next_id_at(10);

        assert_eq!(rolled, format!("{:012x}{:06x}", 11, 0));
    }

    #[test]
    fn encoded_message_decodes_to_same_value() {
        let message = Message::new("id-1", "tag", 42, vec![0, 1, 255]);

        let decoded = Message::decode(&message.encode().unwrap()).unwrap();

        assert_eq!(decoded, message);
    }
}
