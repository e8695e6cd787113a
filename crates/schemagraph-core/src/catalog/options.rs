//! Typed backend-specific options for tables and indexes.
//!
//! Each backend gets its own struct; all of them are checked when the owning
//! item attaches to a registry.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// PostgreSQL table options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostgresTableOptions {
    /// TABLESPACE name.
    pub tablespace: Option<String>,
    /// INHERITS parent tables.
    pub inherits: Vec<String>,
    /// PARTITION BY clause.
    pub partition_by: Option<String>,
}

/// MySQL table options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MysqlTableOptions {
    /// Storage engine.
    pub engine: Option<String>,
    /// Default character set.
    pub charset: Option<String>,
    /// Default collation.
    pub collate: Option<String>,
}

/// SQLite table options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteTableOptions {
    /// WITHOUT ROWID. Requires a primary key.
    pub without_rowid: bool,
    /// STRICT typing.
    pub strict: bool,
}

/// Per-backend table options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableOptions {
    /// PostgreSQL options.
    pub postgres: Option<PostgresTableOptions>,
    /// MySQL options.
    pub mysql: Option<MysqlTableOptions>,
    /// SQLite options.
    pub sqlite: Option<SqliteTableOptions>,
}

impl TableOptions {
    /// Check if no backend options are set.
    pub fn is_empty(&self) -> bool {
        self.postgres.is_none() && self.mysql.is_none() && self.sqlite.is_none()
    }

    /// Validate option values. `has_primary_key` reflects the attached table.
    pub fn validate(&self, table: &str, has_primary_key: bool) -> Result<()> {
        if let Some(pg) = &self.postgres {
            non_blank(pg.tablespace.as_deref(), "postgres tablespace", table)?;
            non_blank(pg.partition_by.as_deref(), "postgres partition_by", table)?;
            for parent in &pg.inherits {
                non_blank(Some(parent), "postgres inherits entry", table)?;
            }
        }
        if let Some(my) = &self.mysql {
            non_blank(my.engine.as_deref(), "mysql engine", table)?;
            non_blank(my.charset.as_deref(), "mysql charset", table)?;
            non_blank(my.collate.as_deref(), "mysql collate", table)?;
        }
        if let Some(lite) = &self.sqlite {
            if lite.without_rowid && !has_primary_key {
                return Err(Error::argument(format!(
                    "sqlite WITHOUT ROWID table '{}' requires a primary key",
                    table
                )));
            }
        }
        Ok(())
    }
}

/// PostgreSQL index access method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexMethod {
    /// B-tree.
    Btree,
    /// Hash.
    Hash,
    /// GiST.
    Gist,
    /// GIN.
    Gin,
    /// BRIN.
    Brin,
    /// SP-GiST.
    Spgist,
}

/// PostgreSQL index options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostgresIndexOptions {
    /// USING method.
    pub using: Option<IndexMethod>,
    /// Partial index predicate.
    pub where_clause: Option<String>,
    /// INCLUDE column keys.
    pub include: Vec<String>,
    /// CREATE INDEX CONCURRENTLY.
    pub concurrently: bool,
}

/// MySQL index options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MysqlIndexOptions {
    /// Prefix length per column key.
    pub prefix_lengths: BTreeMap<String, u32>,
    /// USING BTREE / HASH.
    pub using: Option<String>,
}

/// Per-backend index options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOptions {
    /// PostgreSQL options.
    pub postgres: Option<PostgresIndexOptions>,
    /// MySQL options.
    pub mysql: Option<MysqlIndexOptions>,
}

impl IndexOptions {
    /// Validate option values against the index and its table.
    pub fn validate(
        &self,
        index: &str,
        index_columns: &[String],
        has_column: impl Fn(&str) -> bool,
    ) -> Result<()> {
        if let Some(pg) = &self.postgres {
            non_blank(pg.where_clause.as_deref(), "postgres where clause", index)?;
            if let Some(missing) = pg.include.iter().find(|c| !has_column(c)) {
                return Err(Error::argument(format!(
                    "index '{}' includes unknown column '{}'",
                    index, missing
                )));
            }
        }
        if let Some(my) = &self.mysql {
            for (column, length) in &my.prefix_lengths {
                if !index_columns.contains(column) {
                    return Err(Error::argument(format!(
                        "index '{}' has a prefix length for '{}', which it does not cover",
                        index, column
                    )));
                }
                if *length == 0 {
                    return Err(Error::argument(format!(
                        "index '{}' prefix length for '{}' must be positive",
                        index, column
                    )));
                }
            }
            if let Some(using) = &my.using {
                if !matches!(using.to_ascii_uppercase().as_str(), "BTREE" | "HASH") {
                    return Err(Error::argument(format!(
                        "index '{}' has unsupported mysql method '{}'",
                        index, using
                    )));
                }
            }
        }
        Ok(())
    }
}

fn non_blank(value: Option<&str>, what: &str, owner: &str) -> Result<()> {
    match value {
        Some(v) if v.trim().is_empty() => Err(Error::argument(format!(
            "{} on '{}' must not be blank",
            what, owner
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_options_validation() {
        let opts = TableOptions {
            sqlite: Some(SqliteTableOptions {
                without_rowid: true,
                strict: false,
            }),
            ..Default::default()
        };
        assert!(opts.validate("t", false).is_err());
        assert!(opts.validate("t", true).is_ok());

        let opts = TableOptions {
            mysql: Some(MysqlTableOptions {
                engine: Some(" ".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(opts.validate("t", true).is_err());
        assert!(TableOptions::default().is_empty());
    }

    #[test]
    fn test_index_options_validation() {
        let cols = vec!["name".to_string()];
        let mut prefix = BTreeMap::new();
        prefix.insert("name".to_string(), 10);
        let opts = IndexOptions {
            mysql: Some(MysqlIndexOptions {
                prefix_lengths: prefix,
                using: Some("hash".into()),
            }),
            postgres: Some(PostgresIndexOptions {
                using: Some(IndexMethod::Gin),
                include: vec!["email".into()],
                ..Default::default()
            }),
        };
        assert!(opts.validate("ix", &cols, |c| c == "email").is_ok());
        assert!(opts.validate("ix", &cols, |_| false).is_err());
    }

    #[test]
    fn test_index_method_serde() {
        let json = serde_json::to_string(&IndexMethod::Spgist).unwrap();
        assert_eq!(json, "\"spgist\"");
    }
}
