//! Schema catalog: tables, columns, constraints, indexes and sequences, and
//! the registry that ties them together.

mod column;
mod constraint;
mod events;
mod foreign_key;
mod index;
mod item;
mod metadata;
mod naming;
mod options;
mod sequence;
mod table;
mod types;

pub use column::{Column, ColumnDefault, Computed, Identity, ServerDefault};
pub use constraint::{Constraint, ConstraintKind, ForeignKeyConstraint};
pub use events::{
    AttachEvent, DdlEvent, DdlEventKind, MemoryObserver, NullObserver, ObserverScope, Observers,
    RecordedEvent, SchemaObserver,
};
pub use foreign_key::{ColumnSpec, FkTarget, ForeignKey, MatchType, ReferentialAction};
pub use index::{Index, IndexElement};
pub use item::{
    ColumnRef, ConstraintId, ConstraintRef, ForeignKeyRef, IndexRef, SchemaItemRef, TableId,
    TableKey,
};
pub use metadata::MetaData;
pub use naming::{NameContext, NamingConvention};
pub use options::{
    IndexMethod, IndexOptions, MysqlIndexOptions, MysqlTableOptions, PostgresIndexOptions,
    PostgresTableOptions, SqliteTableOptions, TableOptions,
};
pub use sequence::Sequence;
pub use table::{DerivedKind, DerivedSource, Redefine, Table, TableDef};
pub use types::SqlType;
