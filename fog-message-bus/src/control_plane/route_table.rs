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

//! Route-table data model and the controller's JSON wire format.

use crate::model::bridge_config::BridgeConfig;
use crate::model::route::{Producer, Receiver, RemoteReceiverKey, Route, CHANNEL_SEPARATOR};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Corrupt or unreadable routing configuration.
#[derive(Debug)]
pub enum RouteTableError {
    Io(std::io::Error),
    Json(serde_json::Error),
    DuplicateProducer(String),
    MissingBridgeConfig { microservice_id: String },
    InvalidMicroserviceId(String),
}

impl Display for RouteTableError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteTableError::Io(err) => write!(f, "failed to read route table: {err}"),
            RouteTableError::Json(err) => write!(f, "failed to parse route table: {err}"),
            RouteTableError::DuplicateProducer(id) => {
                write!(f, "route table lists producer {id} more than once")
            }
            RouteTableError::MissingBridgeConfig { microservice_id } => write!(
                f,
                "remote endpoint {microservice_id} has no bridge config"
            ),
            RouteTableError::InvalidMicroserviceId(id) => write!(
                f,
                "microservice id {id} contains the reserved character '{CHANNEL_SEPARATOR}'"
            ),
        }
    }
}

impl Error for RouteTableError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RouteTableError::Io(err) => Some(err),
            RouteTableError::Json(err) => Some(err),
            _ => None,
        }
    }
}

fn check_microservice_id(id: &str) -> Result<(), RouteTableError> {
    if id.contains(CHANNEL_SEPARATOR) {
        return Err(RouteTableError::InvalidMicroserviceId(id.to_string()));
    }
    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EndpointWire {
    microservice_uuid: String,
    is_local: bool,
    #[serde(default)]
    config: Option<BridgeConfig>,
}

impl EndpointWire {
    fn bridge_config(self) -> Result<(String, Option<BridgeConfig>), RouteTableError> {
        if self.is_local {
            return Ok((self.microservice_uuid, None));
        }
        match self.config {
            Some(config) => Ok((self.microservice_uuid, Some(config))),
            None => Err(RouteTableError::MissingBridgeConfig {
                microservice_id: self.microservice_uuid,
            }),
        }
    }

    fn into_producer(self) -> Result<Producer, RouteTableError> {
        Ok(match self.bridge_config()? {
            (id, None) => Producer::local(&id),
            (id, Some(config)) => Producer::remote(&id, config),
        })
    }

    fn into_receiver(self) -> Result<Receiver, RouteTableError> {
        Ok(match self.bridge_config()? {
            (id, None) => Receiver::local(&id),
            (id, Some(config)) => Receiver::remote(&id, config),
        })
    }
}

#[derive(Deserialize)]
struct RouteWire {
    #[serde(flatten)]
    producer: EndpointWire,
    #[serde(default)]
    receivers: Vec<EndpointWire>,
}

/// Routes keyed by producer ID. Never holds two routes for one producer.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RouteTable {
    routes: BTreeMap<String, Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from routes, rejecting a producer listed twice and any
    /// microservice ID that contains the remote channel separator.
    pub fn from_routes(routes: impl IntoIterator<Item = Route>) -> Result<Self, RouteTableError> {
        let mut table = Self::new();
        for route in routes {
            check_microservice_id(route.producer_id())?;
            for receiver in &route.receivers {
                check_microservice_id(&receiver.microservice_id)?;
            }
            let producer_id = route.producer_id().to_string();
            if table.routes.insert(producer_id.clone(), route).is_some() {
                return Err(RouteTableError::DuplicateProducer(producer_id));
            }
        }
        Ok(table)
    }

    /// Parses the controller's JSON array of routes.
    ///
    /// `config` is required on remote endpoints and ignored on local ones.
    pub fn from_json(json: &str) -> Result<Self, RouteTableError> {
        let wire: Vec<RouteWire> = serde_json::from_str(json).map_err(RouteTableError::Json)?;

        let routes = wire
            .into_iter()
            .map(|route| {
                let producer = route.producer.into_producer()?;
                let receivers = route
                    .receivers
                    .into_iter()
                    .map(EndpointWire::into_receiver)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Route::new(producer, receivers))
            })
            .collect::<Result<Vec<_>, RouteTableError>>()?;

        Self::from_routes(routes)
    }

    pub fn get(&self, producer_id: &str) -> Option<&Route> {
        self.routes.get(producer_id)
    }

    pub fn contains(&self, producer_id: &str) -> bool {
        self.routes.contains_key(producer_id)
    }

    pub fn remove(&mut self, producer_id: &str) -> Option<Route> {
        self.routes.remove(producer_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> + '_ {
        self.routes.values()
    }

    pub fn producer_ids(&self) -> BTreeSet<String> {
        self.routes.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Local receiver microservice IDs across all routes, deduplicated.
    pub fn local_receiver_ids(&self) -> BTreeSet<String> {
        self.iter()
            .flat_map(|route| route.receivers.iter())
            .filter(|receiver| receiver.is_local())
            .map(|receiver| receiver.microservice_id.clone())
            .collect()
    }

    /// Remote receivers keyed by `(producer, receiver)`. When one route names
    /// the same remote microservice twice, the first entry wins.
    pub fn remote_receivers(&self) -> BTreeMap<RemoteReceiverKey, Receiver> {
        let mut remote = BTreeMap::new();
        for route in self.iter() {
            for receiver in route.receivers.iter().filter(|receiver| !receiver.is_local()) {
                remote
                    .entry(RemoteReceiverKey::new(
                        route.producer_id(),
                        &receiver.microservice_id,
                    ))
                    .or_insert_with(|| receiver.clone());
            }
        }
        remote
    }
}

impl FromIterator<Route> for RouteTable {
    /// Later routes replace earlier ones with the same producer ID.
    fn from_iter<I: IntoIterator<Item = Route>>(iter: I) -> Self {
        Self {
            routes: iter
                .into_iter()
                .map(|route| (route.producer_id().to_string(), route))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RouteTable, RouteTableError};
    use crate::model::bridge_config::BridgeConfig;
    use crate::model::route::{Producer, Receiver, RemoteReceiverKey, Route};

    const ROUTES_JSON: &str = r#"[
        {
            "microserviceUuid": "producer-a",
            "isLocal": true,
            "receivers": [
                { "microserviceUuid": "local-1", "isLocal": true },
                {
                    "microserviceUuid": "remote-1",
                    "isLocal": false,
                    "config": { "connectorId": 3, "publisherId": "edge-7", "passKey": "secret" }
                }
            ]
        },
        {
            "microserviceUuid": "producer-b",
            "isLocal": false,
            "config": { "connectorId": 4, "publisherId": "edge-8", "passKey": "key" },
            "receivers": [ { "microserviceUuid": "local-1", "isLocal": true } ]
        }
    ]"#;

    #[test]
    fn parses_controller_wire_format() {
        let table = RouteTable::from_json(ROUTES_JSON).unwrap();

        assert_eq!(
            table.get("producer-a"),
            Some(&Route::new(
                Producer::local("producer-a"),
                vec![
                    Receiver::local("local-1"),
                    Receiver::remote("remote-1", BridgeConfig::new(3, "edge-7", "secret")),
                ],
            ))
        );
        assert_eq!(
            table.get("producer-b").map(|route| route.producer.clone()),
            Some(Producer::remote(
                "producer-b",
                BridgeConfig::new(4, "edge-8", "key")
            ))
        );
    }

    #[test]
    fn local_endpoint_config_is_ignored() {
        let table = RouteTable::from_json(
            r#"[{ "microserviceUuid": "p", "isLocal": true,
                  "config": { "connectorId": 1, "publisherId": "x", "passKey": "y" },
                  "receivers": [] }]"#,
        )
        .unwrap();

        assert_eq!(table.get("p").map(|route| route.producer.is_local()), Some(true));
    }

    #[test]
    fn remote_endpoint_without_config_is_rejected() {
        let result = RouteTable::from_json(
            r#"[{ "microserviceUuid": "p", "isLocal": true,
                  "receivers": [ { "microserviceUuid": "r", "isLocal": false } ] }]"#,
        );

        assert!(matches!(
            result,
            Err(RouteTableError::MissingBridgeConfig { microservice_id }) if microservice_id == "r"
        ));
    }

    #[test]
    fn duplicate_producer_is_rejected() {
        let result = RouteTable::from_routes(vec![
            Route::new(Producer::local("p"), vec![Receiver::local("a")]),
            Route::new(Producer::local("p"), vec![Receiver::local("b")]),
        ]);

        assert!(matches!(result, Err(RouteTableError::DuplicateProducer(id)) if id == "p"));
    }

    #[test]
    fn microservice_id_with_channel_separator_is_rejected() {
        let result = RouteTable::from_json(
            r#"[{ "microserviceUuid": "p1", "isLocal": true,
                  "receivers": [ { "microserviceUuid": "p1:r1", "isLocal": true } ] }]"#,
        );
        assert!(matches!(
            result,
            Err(RouteTableError::InvalidMicroserviceId(id)) if id == "p1:r1"
        ));

        let result = RouteTable::from_routes(vec![Route::new(
            Producer::local("p1:r1"),
            vec![Receiver::local("r1")],
        )]);
        assert!(matches!(result, Err(RouteTableError::InvalidMicroserviceId(_))));
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(matches!(
            RouteTable::from_json("{ not json"),
            Err(RouteTableError::Json(_))
        ));
    }

    #[test]
    fn receiver_views_deduplicate_and_key_by_producer() {
        let table = RouteTable::from_json(ROUTES_JSON).unwrap();

        assert_eq!(
            table.local_receiver_ids().into_iter().collect::<Vec<_>>(),
            vec!["local-1".to_string()]
        );
        assert_eq!(
            table.remote_receivers().keys().cloned().collect::<Vec<_>>(),
            vec![RemoteReceiverKey::new("producer-a", "remote-1")]
        );
    }
}
