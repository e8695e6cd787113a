//! Dependency ordering of tables.
//!
//! Tables are sorted so that every table comes after the tables it depends
//! on: foreign key targets, explicit extra dependencies, and the sources of
//! views and create-table-as tables. Ties keep the caller's input order.
//!
//! Foreign keys that close a cycle are moved to a residual list, to be
//! added with ALTER after every table exists.

use crate::catalog::{Constraint, ConstraintId, ConstraintRef, MetaData, Table, TableId, TableKey};
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, warn};

/// How the sorter may treat one foreign key constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FkDisposition {
    /// Always an ordering edge; never deferred to break a cycle.
    IncludeAlways,
    /// Never an ordering edge; always residual.
    Exclude,
    /// An ordering edge unless it closes a cycle.
    IncludeUnlessCyclic,
}

/// A dependency cycle that could not be broken.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "could not sort tables: unresolvable dependency cycle between tables {}",
    join_keys(.tables)
)]
pub struct CycleError {
    /// Tables on the cycle, in input order.
    pub tables: Vec<TableKey>,
    /// Edges among them, as `(required first, dependent)`.
    pub edges: Vec<(TableKey, TableKey)>,
}

fn join_keys(keys: &[TableKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result of a sort.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortedTables {
    /// Tables in creation order, each with the foreign keys it renders inline.
    pub tables: Vec<(TableId, Vec<ConstraintId>)>,
    /// Foreign keys to add after all tables exist.
    pub residual: Vec<ConstraintRef>,
    /// Cycles that were broken.
    pub diagnostics: Vec<Diagnostic>,
}

impl SortedTables {
    /// Tables in creation order.
    pub fn table_ids(&self) -> Vec<TableId> {
        self.tables.iter().map(|(id, _)| *id).collect()
    }

    /// Tables in drop order: the exact reverse of creation order.
    pub fn drop_order(&self) -> Vec<TableId> {
        self.tables.iter().rev().map(|(id, _)| *id).collect()
    }
}

type FkFilter<'a> = dyn Fn(&Table, ConstraintId, &Constraint) -> FkDisposition + 'a;

#[derive(Debug, Clone, Copy)]
struct CuttableEdge {
    parent: usize,
    child: usize,
    constraint: ConstraintId,
}

/// Edge multiset between node positions: `(parent, child) -> count`.
#[derive(Debug, Default)]
struct Graph {
    edges: BTreeMap<(usize, usize), usize>,
}

impl Graph {
    fn add(&mut self, parent: usize, child: usize) {
        *self.edges.entry((parent, child)).or_insert(0) += 1;
    }

    fn remove(&mut self, parent: usize, child: usize) {
        if let Some(count) = self.edges.get_mut(&(parent, child)) {
            *count -= 1;
            if *count == 0 {
                self.edges.remove(&(parent, child));
            }
        }
    }

    fn adjacency(&self, n: usize) -> Vec<Vec<usize>> {
        let mut adj = vec![Vec::new(); n];
        for &(parent, child) in self.edges.keys() {
            adj[parent].push(child);
        }
        adj
    }
}

/// Sorts a set of tables by dependency.
pub struct TableSorter<'a> {
    meta: &'a MetaData,
    tables: Vec<TableId>,
    filter: Option<Box<FkFilter<'a>>>,
    extra_edges: Vec<(TableId, TableId)>,
}

impl<'a> TableSorter<'a> {
    /// Sort `tables`, breaking ties by their order here.
    pub fn new(meta: &'a MetaData, tables: &[TableId]) -> Self {
        Self {
            meta,
            tables: tables.to_vec(),
            filter: None,
            extra_edges: Vec::new(),
        }
    }

    /// Decide per foreign key whether it may be deferred.
    ///
    /// Without a filter every foreign key is `IncludeUnlessCyclic`.
    pub fn with_filter(
        mut self,
        filter: impl Fn(&Table, ConstraintId, &Constraint) -> FkDisposition + 'a,
    ) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Add `(first, then)` ordering edges.
    pub fn with_extra_edges(mut self, edges: impl IntoIterator<Item = (TableId, TableId)>) -> Self {
        self.extra_edges.extend(edges);
        self
    }

    /// Compute the order.
    pub fn sort(&self) -> Result<SortedTables, CycleError> {
        let mut nodes: Vec<&Table> = Vec::new();
        let mut position: HashMap<TableId, usize> = HashMap::new();
        for id in &self.tables {
            if position.contains_key(id) {
                continue;
            }
            if let Some(table) = self.meta.table(*id) {
                position.insert(*id, nodes.len());
                nodes.push(table);
            }
        }
        let by_key: HashMap<&TableKey, usize> =
            nodes.iter().enumerate().map(|(i, t)| (t.key(), i)).collect();
        let n = nodes.len();

        let mut graph = Graph::default();
        for (child, table) in nodes.iter().enumerate() {
            let derived = table.derived().map(|d| d.sources.as_slice()).unwrap_or_default();
            for key in table.extra_dependencies().iter().chain(derived) {
                if let Some(&parent) = by_key.get(key) {
                    if parent != child {
                        graph.add(parent, child);
                    }
                }
            }
        }
        for (first, then) in &self.extra_edges {
            if let (Some(&parent), Some(&child)) = (position.get(first), position.get(then)) {
                if parent != child {
                    graph.add(parent, child);
                }
            }
        }

        let mut retained: Vec<Vec<ConstraintId>> = vec![Vec::new(); n];
        let mut residual = Vec::new();
        let mut cuttable = Vec::new();
        for (child, table) in nodes.iter().enumerate() {
            for (cid, constraint) in table.foreign_key_constraints() {
                let disposition = self
                    .filter
                    .as_ref()
                    .map_or(FkDisposition::IncludeUnlessCyclic, |f| f(table, cid, constraint));
                let cref = ConstraintRef {
                    table: table.id(),
                    constraint: cid,
                };
                if constraint.is_use_alter() || disposition == FkDisposition::Exclude {
                    residual.push(cref);
                    continue;
                }
                retained[child].push(cid);

                let parent = self
                    .meta
                    .referred_table(cref)
                    .and_then(|t| position.get(&t).copied());
                let Some(parent) = parent.filter(|p| *p != child) else {
                    continue;
                };
                graph.add(parent, child);
                if disposition == FkDisposition::IncludeUnlessCyclic {
                    cuttable.push(CuttableEdge {
                        parent,
                        child,
                        constraint: cid,
                    });
                }
            }
        }

        let mut diagnostics = Vec::new();
        let order = match layered_sort(n, &graph) {
            Some(order) => order,
            None => {
                let components = strongly_connected(n, &graph.adjacency(n));
                let cyclic: Vec<usize> = (0..n).filter(|&v| components.on_cycle(v)).collect();
                let keys: Vec<TableKey> = cyclic.iter().map(|&v| nodes[v].key().clone()).collect();
                let message = format!(
                    "cannot fully sort tables: dependency cycle between tables \"{}\"; \
                     foreign keys closing the cycle will be added separately with ALTER",
                    join_keys(&keys)
                );
                warn!(tables = %join_keys(&keys), "dependency cycle detected");
                diagnostics.push(Diagnostic::new(DiagnosticKind::CycleBroken, message, keys));

                for &node in &cyclic {
                    let current = strongly_connected(n, &graph.adjacency(n));
                    if !current.on_cycle(node) {
                        continue;
                    }
                    for edge in cuttable
                        .iter()
                        .filter(|e| e.child == node && current.same(e.parent, node))
                    {
                        graph.remove(edge.parent, edge.child);
                        retained[node].retain(|c| *c != edge.constraint);
                        residual.push(ConstraintRef {
                            table: nodes[node].id(),
                            constraint: edge.constraint,
                        });
                        debug!(table = %nodes[node].key(), referred = %nodes[edge.parent].key(), "foreign key deferred");
                    }
                }

                layered_sort(n, &graph).ok_or_else(|| cycle_error(&nodes, &graph))?
            }
        };

        Ok(SortedTables {
            tables: order
                .into_iter()
                .map(|v| (nodes[v].id(), std::mem::take(&mut retained[v])))
                .collect(),
            residual,
            diagnostics,
        })
    }
}

fn cycle_error(nodes: &[&Table], graph: &Graph) -> CycleError {
    let n = nodes.len();
    let components = strongly_connected(n, &graph.adjacency(n));
    let tables = (0..n)
        .filter(|&v| components.on_cycle(v))
        .map(|v| nodes[v].key().clone())
        .collect();
    let edges = graph
        .edges
        .keys()
        .filter(|(parent, child)| components.on_cycle(*parent) && components.same(*parent, *child))
        .map(|&(parent, child)| (nodes[parent].key().clone(), nodes[child].key().clone()))
        .collect();
    CycleError { tables, edges }
}

/// Layered topological sort.
///
/// Each layer holds the nodes whose parents are all in earlier layers, in
/// ascending position. Returns `None` when a cycle remains.
fn layered_sort(n: usize, graph: &Graph) -> Option<Vec<usize>> {
    let adj = graph.adjacency(n);
    let mut indegree = vec![0usize; n];
    for children in &adj {
        for &child in children {
            indegree[child] += 1;
        }
    }

    let mut layer: Vec<usize> = (0..n).filter(|&v| indegree[v] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while !layer.is_empty() {
        let mut next = Vec::new();
        for &v in &layer {
            order.push(v);
            for &child in &adj[v] {
                indegree[child] -= 1;
                if indegree[child] == 0 {
                    next.push(child);
                }
            }
        }
        next.sort_unstable();
        layer = next;
    }

    (order.len() == n).then_some(order)
}

struct Components {
    component: Vec<usize>,
    size: Vec<usize>,
}

impl Components {
    fn on_cycle(&self, v: usize) -> bool {
        self.size[self.component[v]] > 1
    }

    fn same(&self, a: usize, b: usize) -> bool {
        self.component[a] == self.component[b]
    }
}

/// Tarjan's strongly connected components, iterative.
fn strongly_connected(n: usize, adj: &[Vec<usize>]) -> Components {
    const UNVISITED: usize = usize::MAX;
    let mut index = vec![UNVISITED; n];
    let mut low = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack = Vec::new();
    let mut component = vec![UNVISITED; n];
    let mut size = Vec::new();
    let mut counter = 0;

    for root in 0..n {
        if index[root] != UNVISITED {
            continue;
        }
        index[root] = counter;
        low[root] = counter;
        counter += 1;
        stack.push(root);
        on_stack[root] = true;
        let mut frames: Vec<(usize, usize)> = vec![(root, 0)];

        while let Some(frame) = frames.last_mut() {
            let v = frame.0;
            if frame.1 < adj[v].len() {
                let w = adj[v][frame.1];
                frame.1 += 1;
                if index[w] == UNVISITED {
                    index[w] = counter;
                    low[w] = counter;
                    counter += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    frames.push((w, 0));
                } else if on_stack[w] {
                    low[v] = low[v].min(index[w]);
                }
                continue;
            }

            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                low[parent] = low[parent].min(low[v]);
            }
            if low[v] == index[v] {
                let id = size.len();
                let mut count = 0;
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component[w] = id;
                    count += 1;
                    if w == v {
                        break;
                    }
                }
                size.push(count);
            }
        }
    }

    Components { component, size }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, ForeignKey, Redefine, SqlType, TableDef};

    fn foo() -> Column {
        Column::new("foo", SqlType::Integer)
    }

    fn foo_ref(spec: &str) -> Column {
        foo().references(spec)
    }

    fn register(meta: &mut MetaData, defs: Vec<TableDef>) -> Vec<TableId> {
        defs.into_iter()
            .map(|d| meta.add_table(d, Redefine::Error).unwrap())
            .collect()
    }

    fn names(meta: &MetaData, ids: &[TableId]) -> Vec<String> {
        ids.iter()
            .map(|id| meta.table(*id).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn test_manual_dependencies() {
        let mut meta = MetaData::new();
        let ids = register(
            &mut meta,
            ["a", "b", "c", "d", "e"]
                .iter()
                .map(|n| TableDef::new(*n).column(foo()))
                .collect(),
        );
        let (a, b, c, d, e) = (ids[0], ids[1], ids[2], ids[3], ids[4]);
        meta.add_is_dependent_on(e, c).unwrap();
        meta.add_is_dependent_on(a, b).unwrap();
        meta.add_is_dependent_on(b, d).unwrap();
        meta.add_is_dependent_on(e, b).unwrap();
        meta.add_is_dependent_on(c, a).unwrap();

        let order = meta.sorted_tables().unwrap();
        assert_eq!(names(&meta, &order), vec!["d", "b", "a", "c", "e"]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let mut meta = MetaData::new();
        register(
            &mut meta,
            vec![
                TableDef::new("a").column(foo_ref("b.foo")),
                TableDef::new("b").column(foo()),
                TableDef::new("c").column(foo()),
                TableDef::new("d").column(foo()),
                TableDef::new("e").column(foo_ref("c.foo")),
            ],
        );
        let order = meta.sorted_tables().unwrap();
        assert_eq!(names(&meta, &order), vec!["b", "c", "d", "a", "e"]);
    }

    #[test]
    fn test_use_alter_is_residual_without_cycle() {
        let mut meta = MetaData::new();
        let ids = register(
            &mut meta,
            vec![
                TableDef::new("a").column(foo_ref("b.foo")),
                TableDef::new("b")
                    .column(foo().with_foreign_key(ForeignKey::new("d.foo").with_use_alter())),
                TableDef::new("c").column(foo_ref("b.foo")),
                TableDef::new("d").column(foo_ref("c.foo")),
                TableDef::new("e").column(foo()),
            ],
        );
        let sorted = TableSorter::new(&meta, &ids).sort().unwrap();
        assert_eq!(names(&meta, &sorted.table_ids()), vec!["b", "e", "a", "c", "d"]);
        assert_eq!(sorted.residual.len(), 1);
        assert_eq!(sorted.residual[0].table, ids[1]);
        assert!(sorted.diagnostics.is_empty());
    }

    #[test]
    fn test_cycle_defers_minimal_foreign_keys() {
        let mut meta = MetaData::new();
        let ids = register(
            &mut meta,
            vec![
                TableDef::new("a").column(foo_ref("b.foo")),
                TableDef::new("b").column(foo_ref("d.foo")),
                TableDef::new("c").column(foo_ref("b.foo")),
                TableDef::new("d").column(foo_ref("c.foo")),
                TableDef::new("e").column(foo()),
            ],
        );
        let sorted = TableSorter::new(&meta, &ids).sort().unwrap();
        assert_eq!(names(&meta, &sorted.table_ids()), vec!["b", "e", "a", "c", "d"]);
        assert_eq!(sorted.residual.len(), 1);
        assert_eq!(sorted.residual[0].table, ids[1]);

        assert_eq!(sorted.diagnostics.len(), 1);
        let diag = &sorted.diagnostics[0];
        assert_eq!(diag.kind, DiagnosticKind::CycleBroken);
        let cyclic: Vec<_> = diag.tables.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(cyclic, vec!["b", "c", "d"]);

        let retained: usize = sorted.tables.iter().map(|(_, fks)| fks.len()).sum();
        assert_eq!(retained + sorted.residual.len(), 4);
    }

    #[test]
    fn test_two_cycles_are_both_broken() {
        let mut meta = MetaData::new();
        let ids = register(
            &mut meta,
            vec![
                TableDef::new("a").column(foo_ref("b.foo")),
                TableDef::new("b").column(foo_ref("a.foo")),
                TableDef::new("c").column(foo_ref("d.foo")),
                TableDef::new("d").column(foo_ref("c.foo")),
            ],
        );
        let sorted = TableSorter::new(&meta, &ids).sort().unwrap();
        assert_eq!(sorted.residual.len(), 2);
        assert_eq!(names(&meta, &sorted.table_ids()), vec!["a", "c", "b", "d"]);
        assert_eq!(names(&meta, &sorted.drop_order()), vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn test_non_excludable_cycle_fails() {
        let mut meta = MetaData::new();
        let ids = register(
            &mut meta,
            vec![
                TableDef::new("x").column(foo_ref("y.foo")),
                TableDef::new("y").column(foo_ref("x.foo")),
            ],
        );
        let err = TableSorter::new(&meta, &ids)
            .with_filter(|_, _, _| FkDisposition::IncludeAlways)
            .sort()
            .unwrap_err();
        let tables: Vec<_> = err.tables.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(tables, vec!["x", "y"]);
        assert_eq!(err.edges.len(), 2);
        assert!(err.to_string().contains("x, y"));
    }

    #[test]
    fn test_exclude_filter_and_extra_edges() {
        let mut meta = MetaData::new();
        let ids = register(
            &mut meta,
            vec![
                TableDef::new("a").column(foo_ref("b.foo")),
                TableDef::new("b").column(foo()),
                TableDef::new("c").column(foo()),
            ],
        );
        let sorted = TableSorter::new(&meta, &ids)
            .with_filter(|_, _, _| FkDisposition::Exclude)
            .with_extra_edges([(ids[2], ids[0])])
            .sort()
            .unwrap();
        assert_eq!(names(&meta, &sorted.table_ids()), vec!["b", "c", "a"]);
        assert_eq!(sorted.residual.len(), 1);
        assert!(sorted.tables.iter().all(|(_, fks)| fks.is_empty()));
    }

    #[test]
    fn test_self_reference_and_outside_targets_stay_inline() {
        let mut meta = MetaData::new();
        let ids = register(
            &mut meta,
            vec![
                TableDef::new("node")
                    .column(Column::new("id", SqlType::Integer).primary_key())
                    .column(Column::new("parent_id", SqlType::Integer).references("node.id")),
                TableDef::new("leaf").column(foo_ref("elsewhere.foo")),
            ],
        );
        let sorted = TableSorter::new(&meta, &ids).sort().unwrap();
        assert_eq!(sorted.table_ids(), ids);
        assert!(sorted.residual.is_empty());
        assert_eq!(sorted.tables[0].1.len(), 1);
        assert_eq!(sorted.tables[1].1.len(), 1);
    }

    #[test]
    fn test_view_sorts_after_sources() {
        let mut meta = MetaData::new();
        let users = TableKey::new(None, "users");
        let ids = register(
            &mut meta,
            vec![
                TableDef::new("active_users").as_view("SELECT * FROM users", [users]),
                TableDef::new("users").column(foo()),
            ],
        );
        let sorted = TableSorter::new(&meta, &ids).sort().unwrap();
        assert_eq!(names(&meta, &sorted.table_ids()), vec!["users", "active_users"]);
    }

    #[test]
    fn test_components() {
        let adj = vec![vec![1], vec![2], vec![0], vec![0]];
        let c = strongly_connected(4, &adj);
        assert!(c.on_cycle(0) && c.on_cycle(1) && c.on_cycle(2));
        assert!(!c.on_cycle(3));
        assert!(c.same(0, 2));
        assert!(!c.same(0, 3));
    }
}
