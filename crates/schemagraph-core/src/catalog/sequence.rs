//! Sequence definitions.

use super::item::ColumnRef;
use crate::error::{Error, Result};
use crate::identifier::Identifier;

/// A named, independently creatable value generator.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    /// Sequence name.
    pub name: Identifier,
    /// Schema name.
    pub schema: Option<Identifier>,
    /// First value.
    pub start: Option<i64>,
    /// Step between values.
    pub increment: Option<i64>,
    /// Lower bound.
    pub min_value: Option<i64>,
    /// Upper bound.
    pub max_value: Option<i64>,
    /// Render NO MINVALUE.
    pub no_min_value: bool,
    /// Render NO MAXVALUE.
    pub no_max_value: bool,
    /// Wrap around at the bounds.
    pub cycle: Option<bool>,
    /// Number of values to preallocate.
    pub cache: Option<i64>,
    /// Guarantee values in request order.
    pub order: Option<bool>,
    /// Skip on backends that treat sequences as optional.
    pub optional: bool,
    /// Column this sequence generates defaults for.
    pub(crate) column: Option<ColumnRef>,
}

impl Sequence {
    /// Create a sequence with backend defaults for every parameter.
    pub fn new(name: impl Into<Identifier>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            start: None,
            increment: None,
            min_value: None,
            max_value: None,
            no_min_value: false,
            no_max_value: false,
            cycle: None,
            cache: None,
            order: None,
            optional: false,
            column: None,
        }
    }

    /// Set the schema.
    pub fn with_schema(mut self, schema: impl Into<Identifier>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Set the start value.
    pub fn start(mut self, start: i64) -> Self {
        self.start = Some(start);
        self
    }

    /// Set the increment.
    pub fn increment(mut self, increment: i64) -> Self {
        self.increment = Some(increment);
        self
    }

    /// Set the lower bound.
    pub fn min_value(mut self, value: i64) -> Self {
        self.min_value = Some(value);
        self
    }

    /// Set the upper bound.
    pub fn max_value(mut self, value: i64) -> Self {
        self.max_value = Some(value);
        self
    }

    /// Render NO MINVALUE / NO MAXVALUE.
    pub fn unbounded(mut self) -> Self {
        self.no_min_value = true;
        self.no_max_value = true;
        self
    }

    /// Enable wrap-around.
    pub fn cycle(mut self, cycle: bool) -> Self {
        self.cycle = Some(cycle);
        self
    }

    /// Set the cache size.
    pub fn cache(mut self, cache: i64) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Require ordered generation.
    pub fn order(mut self, order: bool) -> Self {
        self.order = Some(order);
        self
    }

    /// Mark the sequence optional.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Registry key: `schema.name` or `name`.
    pub fn key(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.to_string(),
        }
    }

    /// Column this sequence is bound to, if any.
    pub fn column(&self) -> Option<ColumnRef> {
        self.column
    }

    /// Check the generation parameters for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_blank() {
            return Err(Error::argument("Sequence must have a non-blank name"));
        }
        if self.increment == Some(0) {
            return Err(Error::argument(format!(
                "Sequence '{}' increment must not be zero",
                self.name
            )));
        }
        if let (Some(min), Some(max)) = (self.min_value, self.max_value) {
            if min > max {
                return Err(Error::argument(format!(
                    "Sequence '{}' minvalue {} exceeds maxvalue {}",
                    self.name, min, max
                )));
            }
        }
        if let Some(start) = self.start {
            let below = self.min_value.is_some_and(|min| start < min);
            let above = self.max_value.is_some_and(|max| start > max);
            if below || above {
                return Err(Error::argument(format!(
                    "Sequence '{}' start value {} is outside its bounds",
                    self.name, start
                )));
            }
        }
        if self.cache.is_some_and(|cache| cache < 1) {
            return Err(Error::argument(format!(
                "Sequence '{}' cache must be at least 1",
                self.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_builder() {
        let seq = Sequence::new("order_id_seq")
            .with_schema("sales")
            .start(100)
            .increment(5)
            .cache(10);

        assert_eq!(seq.key(), "sales.order_id_seq");
        assert_eq!(seq.start, Some(100));
        assert!(seq.validate().is_ok());
        assert!(seq.column().is_none());
    }

    #[test]
    fn test_sequence_validation() {
        assert!(Sequence::new("s").increment(0).validate().is_err());
        assert!(Sequence::new("s").min_value(10).max_value(1).validate().is_err());
        assert!(Sequence::new("s").min_value(1).start(0).validate().is_err());
        assert!(Sequence::new("s").cache(0).validate().is_err());
        assert!(Sequence::new(" ").validate().is_err());
    }
}
