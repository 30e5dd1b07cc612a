use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::{Map, Value};
use xreg_core_types::attrs::{META, REGISTRYID};

use super::parse::{Clause, Filter, Op};
use crate::codec::type_map::glob_match;
use crate::errors::Result;
use crate::model::{EntityKind, EntityPath};
use crate::render::Serializer;
use crate::tree::EntityTree;

const ID_ALIAS: &str = "id";
const LATEST_ID: &str = "latestid";
const NULL: &str = "null";

/// Entities that satisfied a filter
///
/// An entity is kept when it is a hit, lies beneath a hit, or is an
/// ancestor of one. Meta follows its resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    hits: Vec<EntityPath>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn hits(&self) -> &[EntityPath] {
        &self.hits
    }

    pub fn keeps(&self, path: &EntityPath) -> bool {
        let path = normalize(path);
        self.hits
            .iter()
            .any(|hit| path.is_ancestor_or_self_of(hit) || hit.is_ancestor_or_self_of(&path))
    }

    fn add(&mut self, path: EntityPath) {
        let path = normalize(&path);
        if !self.hits.contains(&path) {
            self.hits.push(path);
        }
    }
}

fn normalize(path: &EntityPath) -> EntityPath {
    if path.kind() == EntityKind::Meta {
        path.resource_path()
    } else {
        path.clone()
    }
}

/// Evaluate `filter` over the tree's scope
///
/// # Errors
///
/// Returns `NotFound` if the tree is inconsistent with its own child lists.
pub fn evaluate(filter: &Filter, tree: &EntityTree, view: &Serializer<'_>) -> Result<Selection> {
    let mut selection = Selection::default();
    let scope = tree.scope();
    for group in &filter.groups {
        let pending: Vec<(&Clause, usize)> = group.clauses.iter().map(|c| (c, 0)).collect();
        for path in &scope {
            if let Some(hits) = eval_node(tree, view, path, &pending)? {
                for hit in hits {
                    selection.add(hit);
                }
            }
        }
    }
    tracing::debug!(groups = filter.groups.len(), hits = selection.hits.len(), "filter evaluated");
    Ok(selection)
}

/// Match `clauses` at `path`; `Some(hits)` when every clause is satisfied
///
/// Clauses sharing their next collection step must be satisfied by the
/// same child; the deepest matching entities are the hits.
fn eval_node(
    tree: &EntityTree,
    view: &Serializer<'_>,
    path: &EntityPath,
    clauses: &[(&Clause, usize)],
) -> Result<Option<Vec<EntityPath>>> {
    let mut deeper: BTreeMap<&str, Vec<(&Clause, usize)>> = BTreeMap::new();
    let mut local = Vec::new();
    for (clause, depth) in clauses {
        match clause.steps.get(*depth) {
            Some(step) => deeper.entry(step.as_str()).or_default().push((*clause, depth + 1)),
            None => local.push(*clause),
        }
    }

    if !local.is_empty() {
        let attrs = view.attributes(path)?;
        for clause in local {
            let value = lookup(tree, path, &attrs, &clause.attr);
            if !matches(value.as_ref(), clause.op, &clause.value) {
                return Ok(None);
            }
        }
    }
    if deeper.is_empty() {
        return Ok(Some(vec![path.clone()]));
    }

    let mut hits = Vec::new();
    for (step, sub) in deeper {
        let children: Vec<EntityPath> = if step == META {
            let meta = path.meta();
            tree.get(&meta).map(|_| meta).into_iter().collect()
        } else {
            tree.children(path, step)
                .iter()
                .map(|id| path.child(step, id))
                .collect()
        };
        let mut matched = false;
        for child in &children {
            if let Some(found) = eval_node(tree, view, child, &sub)? {
                matched = true;
                hits.extend(found);
            }
        }
        if !matched {
            return Ok(None);
        }
    }
    Ok(Some(hits))
}

/// Value of `attr` on the entity, following `a.b` into maps
fn lookup(tree: &EntityTree, path: &EntityPath, attrs: &Map<String, Value>, attr: &str) -> Option<Value> {
    if attr == ID_ALIAS {
        return match path.kind() {
            EntityKind::Registry => attrs.get(REGISTRYID).cloned(),
            _ => Some(Value::String(path.id().to_string())),
        };
    }
    if attr == LATEST_ID && path.kind() == EntityKind::Resource {
        return tree
            .get(path)
            .and_then(|n| n.resource.as_ref())
            .and_then(|r| r.latest_vid.clone())
            .map(Value::String);
    }
    if let Some(v) = attrs.get(attr) {
        return Some(v.clone());
    }
    let mut parts = attr.split('.');
    let mut cur = attrs.get(parts.next()?)?;
    for part in parts {
        cur = cur.as_object()?.get(part)?;
    }
    Some(cur.clone())
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn numeric_order(a: &str, b: &str) -> Option<Ordering> {
    let a: f64 = a.parse().ok()?;
    let b: f64 = b.parse().ok()?;
    a.partial_cmp(&b)
}

fn equals(text: &str, expected: &str) -> bool {
    if expected.contains('*') {
        return glob_match(&expected.to_lowercase(), &text.to_lowercase());
    }
    match numeric_order(text, expected) {
        Some(order) => order == Ordering::Equal,
        None => text.eq_ignore_ascii_case(expected),
    }
}

/// Apply one operator; absent and `null` values only satisfy `=null`,
/// `!=` and `!=null`
pub fn matches(value: Option<&Value>, op: Op, expected: &str) -> bool {
    let present = value.filter(|v| !v.is_null());
    if expected == NULL {
        match op {
            Op::Eq => return present.is_none(),
            Op::Ne => return present.is_some(),
            _ => {}
        }
    }
    let text = present.and_then(scalar_text);
    match op {
        Op::Exists => present.is_some(),
        Op::Eq => text.is_some_and(|t| equals(&t, expected)),
        Op::Ne => !text.is_some_and(|t| equals(&t, expected)),
        Op::Lt | Op::Le | Op::Gt | Op::Ge => {
            let Some(t) = text else {
                return false;
            };
            let order = numeric_order(&t, expected).unwrap_or_else(|| t.as_str().cmp(expected));
            match op {
                Op::Lt => order == Ordering::Less,
                Op::Le => order != Ordering::Greater,
                Op::Gt => order == Ordering::Greater,
                _ => order != Ordering::Less,
            }
        }
    }
}
