// SPDX-License-Identifier: Apache-2.0

//! Storage configuration string parser: `key=value` pairs separated by
//! `;`, e.g. `path=/var/idx; metadata=year UINT16, rank FLOAT32; acl=yes`.

use crate::error::{ErrorKind, Result};
use crate::metadata::{ColumnType, MetaDataSchema};

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub path: String,
    pub metadata: MetaDataSchema,
    pub acl: bool,
    pub max_positions: u16,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            path: String::new(),
            metadata: MetaDataSchema::new(),
            acl: false,
            max_positions: crate::MAX_POSITION,
        }
    }
}

impl StorageConfig {
    pub fn parse(text: &str) -> Result<Self> {
        let mut config = StorageConfig::default();
        for clause in text.split(';') {
            let clause = clause.trim();
            if clause.is_empty() {
                continue;
            }
            let (key, value) = clause.split_once('=').ok_or_else(|| {
                ErrorKind::InvalidArgument(format!("malformed config clause '{clause}'"))
            })?;
            let key = key.trim();
            let value = value.trim();
            match key {
                "path" => config.path = value.to_string(),
                "metadata" => config.metadata = parse_metadata(value)?,
                "acl" => config.acl = parse_bool(value)?,
                "max_positions" => {
                    config.max_positions = value.parse().map_err(|_| {
                        ErrorKind::InvalidArgument(format!("invalid max_positions '{value}'"))
                    })?;
                }
                other => {
                    return Err(ErrorKind::InvalidArgument(format!(
                        "unknown config key '{other}'"
                    )))
                }
            }
        }
        if config.path.is_empty() {
            return Err(ErrorKind::InvalidArgument(
                "config requires a 'path' clause".into(),
            ));
        }
        Ok(config)
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value {
        "yes" | "true" | "1" => Ok(true),
        "no" | "false" | "0" => Ok(false),
        other => Err(ErrorKind::InvalidArgument(format!(
            "expected yes/no, got '{other}'"
        ))),
    }
}

fn parse_metadata(value: &str) -> Result<MetaDataSchema> {
    let mut schema = MetaDataSchema::new();
    for decl in value.split(',') {
        let decl = decl.trim();
        if decl.is_empty() {
            continue;
        }
        let mut parts = decl.split_whitespace();
        let name = parts.next().ok_or_else(|| {
            ErrorKind::InvalidArgument(format!("malformed metadata declaration '{decl}'"))
        })?;
        let type_name = parts.next().ok_or_else(|| {
            ErrorKind::InvalidArgument(format!("metadata declaration '{decl}' missing a type"))
        })?;
        if parts.next().is_some() {
            return Err(ErrorKind::InvalidArgument(format!(
                "metadata declaration '{decl}' has trailing tokens"
            )));
        }
        schema.add_column(name, ColumnType::parse(type_name)?)?;
    }
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let config =
            StorageConfig::parse("path=/var/idx; metadata=year UINT16, rank FLOAT32; acl=yes")
                .unwrap();
        assert_eq!(config.path, "/var/idx");
        assert!(config.acl);
        assert_eq!(config.metadata.columns().len(), 2);
    }

    #[test]
    fn requires_path() {
        assert!(StorageConfig::parse("acl=yes").is_err());
    }

    #[test]
    fn rejects_unknown_key() {
        assert!(StorageConfig::parse("path=/x; bogus=1").is_err());
    }
}
