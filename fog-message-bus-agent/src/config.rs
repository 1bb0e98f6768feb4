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

use fog_message_bus::MessageBusConfig;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    pub(crate) node_name: String,
    pub(crate) routes_file: PathBuf,
    #[serde(default)]
    pub(crate) message_bus: MessageBusConfig,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, json5::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, err) => {
                write!(f, "unable to read config file {}: {err}", path.display())
            }
            ConfigError::Parse(path, err) => {
                write!(f, "unable to parse config file {}: {err}", path.display())
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Io(_, err) => Some(err),
            ConfigError::Parse(_, err) => Some(err),
        }
    }
}

impl AgentConfig {
    /// Reads a JSON5 agent config. A relative `routes_file` is resolved
    /// against the config file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        let mut config: AgentConfig = json5::from_str(&contents)
            .map_err(|err| ConfigError::Parse(path.to_path_buf(), err))?;

        if config.routes_file.is_relative() {
            if let Some(dir) = path.parent() {
                config.routes_file = dir.join(&config.routes_file);
            }
        }
        Ok(config)
    }
}
