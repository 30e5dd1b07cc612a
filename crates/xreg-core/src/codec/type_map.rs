//! Content-type pattern map selecting a document rendering

use std::collections::BTreeMap;

use crate::errors::{RegistryError, Result};

/// How a document body is embedded in JSON output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rendering {
    /// Parsed JSON under `<singular>`
    Json,
    /// UTF-8 text under `<singular>`
    String,
    /// Base64 under `<singular>base64`
    Binary,
}

impl Rendering {
    /// # Errors
    ///
    /// Returns `InvalidData` for anything but `json`, `string`, `binary`.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(Rendering::Json),
            "string" => Ok(Rendering::String),
            "binary" => Ok(Rendering::Binary),
            other => Err(RegistryError::invalid_data(format!(
                "Invalid typemap value \"{}\"",
                other
            ))),
        }
    }
}

/// Media type without parameters, lower-cased
pub fn media_type(contenttype: &str) -> String {
    contenttype
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// `application/json` or any `+json` structured suffix
pub fn is_json_type(contenttype: &str) -> bool {
    let mt = media_type(contenttype);
    mt == "application/json" || mt.ends_with("+json")
}

/// Glob match where `*` spans any run of characters
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while ti < t.len() {
        if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if pi < p.len() && p[pi] == t[ti] {
            pi += 1;
            ti += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == '*')
}

/// Pick the rendering forced by `typemap` for `contenttype`, if any
///
/// Among matching patterns, fewer wildcards wins, then the longer pattern,
/// then the lexicographically smaller one.
///
/// # Errors
///
/// Returns `InvalidData` when the winning entry has an unknown rendering.
pub fn lookup(typemap: &BTreeMap<String, String>, contenttype: &str) -> Result<Option<Rendering>> {
    let mt = media_type(contenttype);
    let best = typemap
        .iter()
        .filter(|(pattern, _)| glob_match(&pattern.to_ascii_lowercase(), &mt))
        .min_by(|(a, _), (b, _)| {
            let wildcards = |s: &str| s.matches('*').count();
            wildcards(a)
                .cmp(&wildcards(b))
                .then(b.len().cmp(&a.len()))
                .then(a.cmp(b))
        });
    best.map(|(_, r)| Rendering::parse(r)).transpose()
}
