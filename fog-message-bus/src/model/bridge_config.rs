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
use std::fmt::{Debug, Formatter};

/// Connector client settings identifying one remote bridge and logical endpoint.
///
/// Two configs are equal only when every field matches, so a rotated
/// `auth_token` is treated as a configuration change.
#[derive(Clone, Eq, Hash, PartialEq, PartialOrd, Ord, Deserialize, Serialize)]
pub struct BridgeConfig {
    #[serde(rename = "connectorId")]
    pub bridge_id: i32,
    #[serde(rename = "publisherId")]
    pub endpoint_id: String,
    #[serde(rename = "passKey")]
    pub auth_token: String,
}

impl BridgeConfig {
    pub fn new(bridge_id: i32, endpoint_id: &str, auth_token: &str) -> Self {
        Self {
            bridge_id,
            endpoint_id: endpoint_id.to_string(),
            auth_token: auth_token.to_string(),
        }
    }
}

impl Debug for BridgeConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("bridge_id", &self.bridge_id)
            .field("endpoint_id", &self.endpoint_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::BridgeConfig;

    #[test]
    fn equality_includes_auth_token() {
        let a = BridgeConfig::new(1, "endpoint", "token-a");
        let b = BridgeConfig::new(1, "endpoint", "token-b");

        assert_ne!(a, b);
        assert_eq!(a, BridgeConfig::new(1, "endpoint", "token-a"));
    }

    #[test]
    fn debug_output_hides_auth_token() {
        let config = BridgeConfig::new(7, "endpoint", "secret-token");

        let rendered = format!("{config:?}");
        assert!(rendered.contains("endpoint"));
        assert!(!rendered.contains("secret-token"));
    }
}
