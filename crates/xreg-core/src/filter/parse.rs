use xreg_core_types::attrs::META;

use crate::catalog::ModelCatalog;
use crate::errors::{RegistryError, Result};
use crate::model::{EntityKind, Target};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Bare path: the attribute is present
    Exists,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// One `path op value` test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    /// Collections walked from the scope level (`meta` counts as one)
    pub steps: Vec<String>,
    /// Attribute name, possibly dotted into a map (`tags.stage`)
    pub attr: String,
    pub op: Op,
    pub value: String,
}

/// Clauses that must all hold (one `filter` parameter)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterGroup {
    pub clauses: Vec<Clause>,
}

/// Groups of which at least one must hold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub groups: Vec<FilterGroup>,
}

/// Operators in match priority: two-character forms first
const OPERATORS: &[(&str, Op)] = &[
    ("!=", Op::Ne),
    ("<=", Op::Le),
    (">=", Op::Ge),
    ("=", Op::Eq),
    ("<", Op::Lt),
    (">", Op::Gt),
];

impl Filter {
    /// Parse repeated `filter` parameters relative to `target`
    ///
    /// # Errors
    ///
    /// Returns `InvalidFilter` for empty clauses, a dangling operator, or
    /// a path that names the target's own collection again.
    pub fn parse<S: AsRef<str>>(exprs: &[S], model: &dyn ModelCatalog, target: &Target) -> Result<Self> {
        let mut groups = Vec::new();
        for expr in exprs {
            let expr = expr.as_ref();
            let clauses = expr
                .split(',')
                .map(|c| parse_clause(c.trim(), model, target))
                .collect::<Result<Vec<_>>>()?;
            groups.push(FilterGroup { clauses });
        }
        Ok(Self { groups })
    }
}

fn invalid(reason: impl Into<String>) -> RegistryError {
    RegistryError::InvalidFilter {
        reason: reason.into(),
    }
}

fn split_operator(clause: &str) -> Result<(&str, Op, &str)> {
    let Some(pos) = clause.find(['=', '!', '<', '>']) else {
        return Ok((clause, Op::Exists, ""));
    };
    let rest = &clause[pos..];
    let (token, op) = OPERATORS
        .iter()
        .find(|(token, _)| rest.starts_with(token))
        .ok_or_else(|| invalid(format!("unknown operator in \"{}\"", clause)))?;
    Ok((&clause[..pos], *op, &rest[token.len()..]))
}

fn parse_clause(clause: &str, model: &dyn ModelCatalog, target: &Target) -> Result<Clause> {
    let (path, op, value) = split_operator(clause)?;
    let segments: Vec<&str> = path.split('.').collect();
    if path.is_empty() || segments.iter().any(|s| s.is_empty()) {
        return Err(invalid(format!("missing attribute name in \"{}\"", clause)));
    }

    if let Target::Collection { collection, .. } = target {
        if segments.len() > 1 && segments[0] == collection.as_str() {
            return Err(invalid(format!(
                "\"{}\" names the requested collection \"{}\" again",
                clause, collection
            )));
        }
    }

    let mut level = target.member_level();
    let mut steps = Vec::new();
    let mut rest = segments.as_slice();
    while rest.len() > 1 {
        let seg = rest[0];
        let next = if model.is_known_collection(&level, seg) {
            level.child(seg, "_")
        } else if seg == META && level.kind() == EntityKind::Resource {
            level.meta()
        } else {
            break;
        };
        steps.push(seg.to_string());
        level = next;
        rest = &rest[1..];
    }

    Ok(Clause {
        steps,
        attr: rest.join("."),
        op,
        value: value.to_string(),
    })
}
