//! Naming conventions for unnamed constraints and indexes.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Templates applied to unnamed items when they attach.
///
/// Supported tokens: `{table}`, `{column_0}`, `{column_0_label}`,
/// `{referred_table}`, `{referred_column_0}` and `{constraint}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingConvention {
    /// Index template.
    pub ix: Option<String>,
    /// Unique constraint template.
    pub uq: Option<String>,
    /// Check constraint template.
    pub ck: Option<String>,
    /// Foreign key template.
    pub fk: Option<String>,
    /// Primary key template.
    pub pk: Option<String>,
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self {
            ix: Some("ix_{column_0_label}".to_string()),
            uq: None,
            ck: None,
            fk: None,
            pk: None,
        }
    }
}

/// Values available to a template.
#[derive(Debug, Clone, Default)]
pub struct NameContext<'a> {
    /// Table name.
    pub table: &'a str,
    /// Column keys of the item.
    pub columns: &'a [String],
    /// Referred table name, for foreign keys.
    pub referred_table: Option<&'a str>,
    /// Referred column keys, for foreign keys.
    pub referred_columns: &'a [String],
    /// Explicit name of the item.
    pub constraint: Option<&'a str>,
}

impl NamingConvention {
    /// A convention with no templates.
    pub fn empty() -> Self {
        Self {
            ix: None,
            uq: None,
            ck: None,
            fk: None,
            pk: None,
        }
    }

    /// Set the index template.
    pub fn with_ix(mut self, template: impl Into<String>) -> Self {
        self.ix = Some(template.into());
        self
    }

    /// Set the unique constraint template.
    pub fn with_uq(mut self, template: impl Into<String>) -> Self {
        self.uq = Some(template.into());
        self
    }

    /// Set the check constraint template.
    pub fn with_ck(mut self, template: impl Into<String>) -> Self {
        self.ck = Some(template.into());
        self
    }

    /// Set the foreign key template.
    pub fn with_fk(mut self, template: impl Into<String>) -> Self {
        self.fk = Some(template.into());
        self
    }

    /// Set the primary key template.
    pub fn with_pk(mut self, template: impl Into<String>) -> Self {
        self.pk = Some(template.into());
        self
    }

    /// Template for a kind label (`ix`, `uq`, `ck`, `fk`, `pk`).
    pub fn template(&self, label: &str) -> Option<&str> {
        match label {
            "ix" => self.ix.as_deref(),
            "uq" => self.uq.as_deref(),
            "ck" => self.ck.as_deref(),
            "fk" => self.fk.as_deref(),
            "pk" => self.pk.as_deref(),
            _ => None,
        }
    }

    /// Compute the name for an item of the given kind.
    ///
    /// Returns `Ok(None)` when the item keeps its current name: no template,
    /// or an explicit name with a template that does not use `{constraint}`.
    pub fn apply(&self, label: &str, ctx: &NameContext<'_>) -> Result<Option<String>> {
        let Some(template) = self.template(label) else {
            return Ok(None);
        };
        let uses_constraint = template.contains("{constraint}");
        match (ctx.constraint, uses_constraint) {
            (Some(_), false) => Ok(None),
            (None, true) => Ok(None),
            _ => render(template, ctx).map(Some),
        }
    }
}

/// Expand a template against a context.
pub fn render(template: &str, ctx: &NameContext<'_>) -> Result<String> {
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find('}').ok_or_else(|| {
            Error::argument(format!("Unterminated token in naming template '{}'", template))
        })?;
        out.push_str(&token_value(&after[..end], template, ctx)?);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn token_value(token: &str, template: &str, ctx: &NameContext<'_>) -> Result<String> {
    let first_column = || {
        ctx.columns.first().ok_or_else(|| {
            Error::argument(format!(
                "Naming template '{}' needs a column but the item on '{}' has none",
                template, ctx.table
            ))
        })
    };
    match token {
        "table" => Ok(ctx.table.to_string()),
        "column_0" => first_column().cloned(),
        "column_0_label" => Ok(format!("{}_{}", ctx.table, first_column()?)),
        "referred_table" => ctx.referred_table.map(str::to_string).ok_or_else(|| {
            Error::argument(format!("Naming template '{}' needs a referred table", template))
        }),
        "referred_column_0" => ctx.referred_columns.first().cloned().ok_or_else(|| {
            Error::argument(format!("Naming template '{}' needs a referred column", template))
        }),
        "constraint" => ctx.constraint.map(str::to_string).ok_or_else(|| {
            Error::argument(format!("Naming template '{}' needs an explicit name", template))
        }),
        other => Err(Error::argument(format!(
            "Unknown token '{{{}}}' in naming template '{}'",
            other, template
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_default_index_name() {
        let columns = cols(&["email"]);
        let ctx = NameContext {
            table: "users",
            columns: &columns,
            ..Default::default()
        };
        let name = NamingConvention::default().apply("ix", &ctx).unwrap();
        assert_eq!(name.as_deref(), Some("ix_users_email"));
        assert_eq!(NamingConvention::default().apply("uq", &ctx).unwrap(), None);
    }

    #[test]
    fn test_foreign_key_template() {
        let columns = cols(&["user_id"]);
        let referred = cols(&["id"]);
        let ctx = NameContext {
            table: "orders",
            columns: &columns,
            referred_table: Some("users"),
            referred_columns: &referred,
            constraint: None,
        };
        let conv = NamingConvention::empty()
            .with_fk("fk_{table}_{column_0}_{referred_table}_{referred_column_0}");
        assert_eq!(
            conv.apply("fk", &ctx).unwrap().as_deref(),
            Some("fk_orders_user_id_users_id")
        );
    }

    #[test]
    fn test_constraint_token_only_for_named_items() {
        let columns = cols(&["qty"]);
        let conv = NamingConvention::empty().with_ck("ck_{table}_{constraint}");
        let unnamed = NameContext {
            table: "items",
            columns: &columns,
            ..Default::default()
        };
        assert_eq!(conv.apply("ck", &unnamed).unwrap(), None);

        let named = NameContext {
            constraint: Some("positive"),
            ..unnamed
        };
        assert_eq!(
            conv.apply("ck", &named).unwrap().as_deref(),
            Some("ck_items_positive")
        );
    }

    #[test]
    fn test_render_errors() {
        let ctx = NameContext {
            table: "t",
            ..Default::default()
        };
        assert!(render("ix_{column_0}", &ctx).is_err());
        assert!(render("ix_{bogus}", &ctx).is_err());
        assert!(render("ix_{table", &ctx).is_err());
        assert_eq!(render("plain_{table}", &ctx).unwrap(), "plain_t");
    }
}
