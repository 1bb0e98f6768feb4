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

//! Bounded, checksum-backed store of a publisher's recent messages.

use crate::config::ArchiveConfig;
use crate::model::message::Message;
use crate::observability::events;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{Display, Formatter};
use tracing::{debug, warn};

const COMPONENT: &str = "message_archive";

#[derive(Debug)]
pub enum ArchiveError {
    Closed,
    EntryTooLarge { size: u64, max_bytes: u64 },
    Encode(serde_json::Error),
}

impl Display for ArchiveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveError::Closed => write!(f, "archive is closed"),
            ArchiveError::EntryTooLarge { size, max_bytes } => write!(
                f,
                "archive entry of {size} bytes exceeds archive capacity of {max_bytes} bytes"
            ),
            ArchiveError::Encode(err) => write!(f, "failed to encode archive entry: {err}"),
        }
    }
}

impl Error for ArchiveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ArchiveError::Encode(err) => Some(err),
            _ => None,
        }
    }
}

struct ArchiveEntry {
    timestamp: i64,
    bytes: Vec<u8>,
    checksum: String,
}

fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Entries are kept ordered by timestamp; eviction always removes the oldest.
pub struct MessageArchive {
    owner: String,
    config: ArchiveConfig,
    entries: VecDeque<ArchiveEntry>,
    total_bytes: u64,
    closed: bool,
}

impl MessageArchive {
    pub fn new(owner: &str, config: ArchiveConfig) -> Self {
        Self {
            owner: owner.to_string(),
            config,
            entries: VecDeque::new(),
            total_bytes: 0,
            closed: false,
        }
    }

    pub fn save(&mut self, message: &Message) -> Result<(), ArchiveError> {
        if self.closed {
            return Err(ArchiveError::Closed);
        }

        let bytes = message.encode().map_err(ArchiveError::Encode)?;
        let size = bytes.len() as u64;
        if size > self.config.max_bytes {
            return Err(ArchiveError::EntryTooLarge {
                size,
                max_bytes: self.config.max_bytes,
            });
        }

        let entry = ArchiveEntry {
            timestamp: message.timestamp,
            checksum: checksum(&bytes),
            bytes,
        };
        let position = self
            .entries
            .iter()
            .rposition(|existing| existing.timestamp <= entry.timestamp)
            .map_or(0, |index| index + 1);
        self.entries.insert(position, entry);
        self.total_bytes += size;

        self.evict();
        Ok(())
    }

    /// Messages with `from <= timestamp <= to`, oldest first.
    pub fn query(&self, from: i64, to: i64) -> Vec<Message> {
        if from > to {
            return Vec::new();
        }

        self.entries
            .iter()
            .filter(|entry| entry.timestamp >= from && entry.timestamp <= to)
            .filter_map(|entry| self.restore(entry))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Drops every entry. Later saves fail with [`ArchiveError::Closed`].
    pub fn close(&mut self) {
        self.closed = true;
        self.entries.clear();
        self.total_bytes = 0;
    }

    fn restore(&self, entry: &ArchiveEntry) -> Option<Message> {
        if checksum(&entry.bytes) != entry.checksum {
            warn!(
                event = events::ARCHIVE_CHECKSUM_MISMATCH,
                component = COMPONENT,
                producer_id = self.owner.as_str(),
                timestamp = entry.timestamp,
                "skipping archive entry with bad checksum"
            );
            return None;
        }

        match Message::decode(&entry.bytes) {
            Ok(message) => Some(message),
            Err(err) => {
                warn!(
                    event = events::ARCHIVE_DECODE_FAILED,
                    component = COMPONENT,
                    producer_id = self.owner.as_str(),
                    timestamp = entry.timestamp,
                    err = %err,
                    "skipping undecodable archive entry"
                );
                None
            }
        }
    }

    fn evict(&mut self) {
        let newest = match self.entries.back() {
            Some(entry) => entry.timestamp,
            None => return,
        };
        let oldest_allowed = self
            .config
            .max_age_ms
            .map(|max_age| newest.saturating_sub(i64::try_from(max_age).unwrap_or(i64::MAX)));

        let mut evicted = 0usize;
        while let Some(front) = self.entries.front() {
            let too_old = oldest_allowed.is_some_and(|oldest| front.timestamp < oldest);
            if !too_old && self.total_bytes <= self.config.max_bytes {
                break;
            }
            if let Some(entry) = self.entries.pop_front() {
                self.total_bytes -= entry.bytes.len() as u64;
                evicted += 1;
            }
        }

        if evicted > 0 {
            debug!(
                event = events::ARCHIVE_EVICT,
                component = COMPONENT,
                producer_id = self.owner.as_str(),
                evicted,
                remaining = self.entries.len(),
                "evicted oldest archive entries"
            );
        }
    }
}
