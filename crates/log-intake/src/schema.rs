// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! JSON schemas keyed by the `type` of a payload.
//!
//! The registry is compiled once from the configured schema files and is only
//! read afterwards, so parse tasks share it through an `Arc` without locking.

use std::collections::HashMap;
use std::path::PathBuf;

use jsonschema::Validator;
use serde_json::Value;
use tracing::info;

use crate::errors::ConfigError;

#[derive(Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Validator>,
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("types", &self.schemas.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SchemaRegistry {
    /// Reads and compiles every schema file of the mapping.
    pub fn load(paths: &HashMap<String, PathBuf>) -> Result<Self, ConfigError> {
        let mut schemas = HashMap::with_capacity(paths.len());
        for (name, path) in paths {
            info!("Loading JSON schema {} from {}", name, path.display());
            let content =
                std::fs::read_to_string(path).map_err(|source| ConfigError::SchemaRead {
                    name: name.clone(),
                    path: path.clone(),
                    source,
                })?;
            let schema: Value =
                serde_json::from_str(&content).map_err(|source| ConfigError::SchemaParse {
                    name: name.clone(),
                    path: path.clone(),
                    source,
                })?;
            schemas.insert(name.clone(), compile(name, &schema)?);
        }
        Ok(Self { schemas })
    }

    /// Builds a registry from in-memory schema documents.
    pub fn from_schemas<I>(schemas: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let schemas = schemas
            .into_iter()
            .map(|(name, schema)| compile(&name, &schema).map(|validator| (name, validator)))
            .collect::<Result<_, _>>()?;
        Ok(Self { schemas })
    }

    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.schemas.contains_key(type_name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Validates `document` against the schema registered for `type_name`.
    ///
    /// Returns `None` when no schema is registered, otherwise the list of
    /// validation errors (empty when the document is valid).
    #[must_use]
    pub fn validate(&self, type_name: &str, document: &Value) -> Option<Vec<String>> {
        let validator = self.schemas.get(type_name)?;
        Some(
            validator
                .iter_errors(document)
                .map(|e| format!("{}: {}", e.instance_path, e))
                .collect(),
        )
    }
}

fn compile(name: &str, schema: &Value) -> Result<Validator, ConfigError> {
    jsonschema::validator_for(schema).map_err(|e| ConfigError::SchemaCompile {
        name: name.to_string(),
        reason: e.to_string(),
    })
}
