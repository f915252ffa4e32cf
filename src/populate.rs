//! Populate tree merger.
//!
//! Folds tokenized path expressions into a forest of populate nodes, one node
//! per distinct relation name per level, and renders the forest as the nested
//! descriptor array the document database expects.

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::error::QueryResult;
use crate::parser::{self, PathExpression, Segment};

/// A single populate descriptor, as handed to the document fetch layer.
///
/// ```json
/// { "path": "createdBy", "select": "name email", "populate": [{ "path": "friends" }] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulateOptions {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub populate: Option<Vec<PopulateOptions>>,
}

/// Trait for rendering compiled populate trees as descriptors.
pub trait ToPopulate {
    fn to_populate(&self) -> Vec<PopulateOptions>;
}

/// One relation to hydrate, with its field restriction and nested relations.
///
/// Equality is order-sensitive: two nodes differing only in `select` or
/// child order are not equal.
#[derive(Debug, Clone)]
pub struct PopulateNode {
    path: String,
    select: IndexSet<String>,
    children: IndexMap<String, PopulateNode>,
}

impl PopulateNode {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            select: IndexSet::new(),
            children: IndexMap::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Selected fields in first-seen order. Empty means every field.
    pub fn select(&self) -> impl Iterator<Item = &str> {
        self.select.iter().map(String::as_str)
    }

    /// Space-joined field list, or `None` when nothing is restricted.
    pub fn select_string(&self) -> Option<String> {
        if self.select.is_empty() {
            None
        } else {
            Some(self.select().collect::<Vec<_>>().join(" "))
        }
    }

    pub fn children(&self) -> impl Iterator<Item = &PopulateNode> {
        self.children.values()
    }

    pub fn child(&self, path: &str) -> Option<&PopulateNode> {
        self.children.get(path)
    }

    fn depth(&self) -> usize {
        1 + self.children().map(PopulateNode::depth).max().unwrap_or(0)
    }

    fn to_options(&self) -> PopulateOptions {
        let populate = if self.children.is_empty() {
            None
        } else {
            Some(self.children().map(PopulateNode::to_options).collect())
        };
        PopulateOptions {
            path: self.path.clone(),
            select: self.select_string(),
            populate,
        }
    }

    fn write_expressions(&self, prefix: &str, out: &mut Vec<String>) {
        let path = if prefix.is_empty() {
            self.path.clone()
        } else {
            format!("{}:{}", prefix, self.path)
        };
        for field in &self.select {
            out.push(format!("{}.{}", path, field));
        }
        if self.select.is_empty() && self.children.is_empty() {
            out.push(path.clone());
        }
        for child in self.children() {
            child.write_expressions(&path, out);
        }
    }
}

impl PartialEq for PopulateNode {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
            && self.select.iter().eq(other.select.iter())
            && self.children.iter().eq(other.children.iter())
    }
}

impl Eq for PopulateNode {}

/// Ordered top-level populate nodes, keyed by relation name.
///
/// Equality compares nodes in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct PopulateForest {
    roots: IndexMap<String, PopulateNode>,
}

impl PartialEq for PopulateForest {
    fn eq(&self, other: &Self) -> bool {
        self.roots.iter().eq(other.roots.iter())
    }
}

impl Eq for PopulateForest {}

impl PopulateForest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold expressions into a new forest in the order given.
    pub fn from_expressions(exprs: &[PathExpression]) -> Self {
        let mut forest = Self::new();
        for expr in exprs {
            forest.insert(expr);
        }
        tracing::debug!(
            "Merged {} populate expression(s) into {} top-level node(s)",
            exprs.len(),
            forest.len()
        );
        forest
    }

    /// Merge one expression into the forest.
    pub fn insert(&mut self, expr: &PathExpression) {
        insert_segments(&mut self.roots, expr.segments());
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&PopulateNode> {
        self.roots.get(path)
    }

    /// Top-level nodes in first-seen order.
    pub fn nodes(&self) -> impl Iterator<Item = &PopulateNode> {
        self.roots.values()
    }

    pub fn paths(&self) -> Vec<&str> {
        self.roots.keys().map(String::as_str).collect()
    }

    /// Longest relation chain in the forest.
    pub fn depth(&self) -> usize {
        self.nodes().map(PopulateNode::depth).max().unwrap_or(0)
    }

    pub fn to_options(&self) -> Vec<PopulateOptions> {
        self.nodes().map(PopulateNode::to_options).collect()
    }
}

impl ToPopulate for PopulateForest {
    fn to_populate(&self) -> Vec<PopulateOptions> {
        self.to_options()
    }
}

impl fmt::Display for PopulateForest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut exprs = Vec::new();
        for node in self.nodes() {
            node.write_expressions("", &mut exprs);
        }
        write!(f, "{}", exprs.join(","))
    }
}

/// Walk `segments` against `level`, creating nodes that are missing.
fn insert_segments(level: &mut IndexMap<String, PopulateNode>, segments: &[Segment]) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    let node = level
        .entry(first.relation().to_string())
        .or_insert_with(|| PopulateNode::new(first.relation()));
    if let Some(field) = first.field() {
        node.select.insert(field.to_string());
    }
    insert_segments(&mut node.children, rest);
}

/// Compile a raw populate value into a forest.
pub fn compile(value: &str) -> QueryResult<PopulateForest> {
    let exprs = parser::split_expressions(value)?;
    Ok(PopulateForest::from_expressions(&exprs))
}
