//! Registry facade: the operations the HTTP layer calls
//!
//! Every request gets its own [`RequestContext`] carrying the configured
//! deadline. Reads load one entity tree from a single transaction; writes
//! plan first, then apply the whole plan in one transaction that is
//! committed only when every command succeeded.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use xreg_core::commands::Command;
use xreg_core::ops::init_registry;
use xreg_core::render::to_json_bytes;
use xreg_core::xreg_core_types::{RequestContext, RequestId};
use xreg_core::{
    apply_all, log_op_end, log_op_error, log_op_start, plan_write, CapabilitySet, EntityKind,
    EntityPath, EntityTree, Filter, Inline, MemoryStore, Model, OpContext, ParsedPath,
    PropertyStore, RegistryError, Result, ResultRef, Selection, Serializer, Target, WriteBody,
    WriteMethod, WriteRequest,
};
use xreg_store::SqliteStore;

use crate::config::RegistryConfig;
use crate::errors::EngineError;
use crate::http::{HttpRequest, HttpResponse, Method, LOCATION, REQUEST_ID};
use crate::query::RequestOptions;
use crate::raw::{attrs_from_headers, is_raw_form, RawDocument};

const EPOCH_KEY: &str = "epoch";

pub struct Registry {
    store: Box<dyn PropertyStore>,
    model: Model,
    capabilities: CapabilitySet,
    base_url: String,
    request_timeout: Option<Duration>,
}

/// A parsed path and the subtree it addresses
pub struct Resolved {
    pub parsed: ParsedPath,
    pub tree: EntityTree,
}

/// What a write produced
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    Json(Value),
    Document(RawDocument),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome {
    /// The single addressed entity did not exist before
    pub created: bool,
    /// URL of the created entity
    pub location: Option<String>,
    pub rendered: Rendered,
}

impl WriteOutcome {
    /// `201` with `Location` for a creation, `200` otherwise
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the JSON cannot be encoded.
    pub fn into_response(self) -> Result<HttpResponse> {
        let status = if self.created { 201 } else { 200 };
        let mut resp = match self.rendered {
            Rendered::Json(value) => HttpResponse::json(status, to_json_bytes(&value)?),
            Rendered::Document(doc) => doc.into_response(status),
        };
        if let Some(location) = self.location {
            resp = resp.with_header(LOCATION, location);
        }
        Ok(resp)
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

impl Registry {
    /// Wrap a store, creating the registry entity on first use
    ///
    /// # Errors
    ///
    /// Returns `Persistence` when the store cannot be initialized.
    pub fn new(store: Box<dyn PropertyStore>, model: Model, config: &RegistryConfig) -> Result<Self> {
        {
            let mut tx = store.begin_tx()?;
            if init_registry(tx.as_mut(), &config.registry_id)? {
                tracing::info!(registry_id = %config.registry_id, "registry initialized");
            }
            tx.commit()?;
        }
        Ok(Self {
            store,
            model,
            capabilities: config.capabilities,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout(),
        })
    }

    /// Build the store and model named by `config`
    ///
    /// # Errors
    ///
    /// Returns `Io` when the model file cannot be read, and `Registry` when
    /// the model is invalid or the database cannot be opened.
    pub fn open(config: &RegistryConfig) -> std::result::Result<Self, EngineError> {
        let model = match &config.model_path {
            Some(path) => {
                let bytes = std::fs::read(path).map_err(|source| EngineError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                Model::from_json(&bytes)?
            }
            None => Model::default(),
        };
        let store: Box<dyn PropertyStore> = if config.is_in_memory() {
            Box::new(MemoryStore::new())
        } else {
            Box::new(SqliteStore::open(&config.database)?)
        };
        Ok(Self::new(store, model, config)?)
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Fresh context with the configured deadline
    pub fn request_context(&self) -> RequestContext {
        self.context_for(RequestId::generate())
    }

    fn context_for(&self, id: RequestId) -> RequestContext {
        let request = RequestContext::with_request_id(id);
        match self.request_timeout {
            Some(timeout) => request.with_timeout(timeout),
            None => request,
        }
    }

    fn view<'a>(&'a self, tree: &'a EntityTree) -> Serializer<'a> {
        Serializer::new(tree, &self.model, &self.capabilities, &self.base_url)
    }

    fn url(&self, path: &EntityPath) -> String {
        format!("{}{}", self.base_url, path.key())
    }

    // ===== Reads =====

    /// Parse `path` and load the subtree it addresses
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `Timeout` or store errors.
    pub fn resolve(&self, path: &str, request: &RequestContext) -> Result<Resolved> {
        let start = Instant::now();
        log_op_start!("resolve", path = path);

        match self.resolve_inner(path, request) {
            Ok(resolved) => {
                log_op_end!("resolve", duration_ms = elapsed_ms(start));
                Ok(resolved)
            }
            Err(e) => {
                log_op_error!("resolve", e.clone(), duration_ms = elapsed_ms(start));
                Err(e)
            }
        }
    }

    fn resolve_inner(&self, path: &str, request: &RequestContext) -> Result<Resolved> {
        let deadline = || RegistryError::Timeout {
            op: "resolve".to_string(),
        };
        if request.is_expired() {
            return Err(deadline());
        }
        let parsed = ParsedPath::parse(path, &self.model)?;
        let tx = self.store.begin_tx()?;
        let tree = EntityTree::load(tx.as_ref(), &self.model, &parsed.target)?;
        if request.is_expired() {
            return Err(deadline());
        }
        Ok(Resolved { parsed, tree })
    }

    /// Evaluate `filters` (OR'd groups) over a resolved subtree
    ///
    /// Returns `None` when nothing under the registry root matched. Any
    /// other target yields a selection, possibly empty, which renders as
    /// `{}`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFilter` for a malformed expression.
    pub fn apply_filter<S: AsRef<str>>(&self, resolved: &Resolved, filters: &[S]) -> Result<Option<Selection>> {
        let target = &resolved.parsed.target;
        let filter = Filter::parse(filters, &self.model, target)?;
        let selection = xreg_core::filter::evaluate(&filter, &resolved.tree, &self.view(&resolved.tree))?;
        tracing::debug!(scope = %target.display_path(), hits = selection.hits().len(), "filter applied");
        if selection.is_empty() && *target == Target::Entity(EntityPath::root()) {
            return Ok(None);
        }
        Ok(Some(selection))
    }

    /// Serialize a resolved subtree to JSON bytes
    ///
    /// `export` takes precedence over `inline`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInline` for a malformed directive.
    pub fn render(
        &self,
        resolved: &Resolved,
        selection: Option<&Selection>,
        inline: Option<&str>,
        export: bool,
    ) -> Result<Vec<u8>> {
        let start = Instant::now();
        log_op_start!("render", export = export);

        match self.render_inner(resolved, selection, inline, export) {
            Ok(bytes) => {
                log_op_end!("render", duration_ms = elapsed_ms(start), bytes = bytes.len());
                Ok(bytes)
            }
            Err(e) => {
                log_op_error!("render", e.clone(), duration_ms = elapsed_ms(start));
                Err(e)
            }
        }
    }

    fn render_inner(
        &self,
        resolved: &Resolved,
        selection: Option<&Selection>,
        inline: Option<&str>,
        export: bool,
    ) -> Result<Vec<u8>> {
        let target = &resolved.parsed.target;
        let inline = if export {
            Inline::export(target)
        } else {
            match inline {
                Some(value) => Inline::parse(value, &self.model, target)?,
                None => Inline::none(),
            }
        };
        let view = self.view(&resolved.tree);
        let view = match selection {
            Some(selection) => view.with_selection(selection),
            None => view,
        };
        to_json_bytes(&view.render(&inline)?)
    }

    fn get(&self, req: &HttpRequest, opts: &RequestOptions, request: &RequestContext) -> Result<HttpResponse> {
        let resolved = self.resolve(&req.path, request)?;

        if !opts.export && is_raw_form(&self.model, &resolved.parsed) {
            if let Target::Entity(path) = &resolved.parsed.target {
                let view = self.view(&resolved.tree);
                let doc = RawDocument::load(&view, &resolved.tree, &self.model, path)?;
                return Ok(doc.into_get_response());
            }
        }

        let selection = if opts.filters.is_empty() {
            None
        } else {
            match self.apply_filter(&resolved, &opts.filters)? {
                Some(selection) => Some(selection),
                None => return Err(RegistryError::not_found(req.path.as_str())),
            }
        };
        let bytes = self.render(&resolved, selection.as_ref(), opts.inline.as_deref(), opts.export)?;
        Ok(HttpResponse::json(200, bytes))
    }

    // ===== Writes =====

    /// Create or update whatever `req` addresses
    ///
    /// The body is JSON, or for the raw document form the document bytes
    /// with attributes in `xRegistry-*` headers.
    ///
    /// # Errors
    ///
    /// Returns the first planning, validation, concurrency, deadline or
    /// store error; nothing is committed in that case.
    pub fn write(&self, req: &HttpRequest, opts: &RequestOptions, request: &RequestContext) -> Result<WriteOutcome> {
        let start = Instant::now();
        log_op_start!("write", method = req.method.as_str(), path = req.path.as_str());

        match self.write_inner(req, opts, request) {
            Ok(outcome) => {
                log_op_end!("write", duration_ms = elapsed_ms(start), created = outcome.created);
                Ok(outcome)
            }
            Err(e) => {
                log_op_error!("write", e.clone(), duration_ms = elapsed_ms(start));
                Err(e)
            }
        }
    }

    fn write_inner(&self, req: &HttpRequest, opts: &RequestOptions, request: &RequestContext) -> Result<WriteOutcome> {
        let method = match req.method {
            Method::Put => WriteMethod::Put,
            Method::Patch => WriteMethod::Patch,
            Method::Post => WriteMethod::Post,
            Method::Get | Method::Delete => {
                return Err(RegistryError::MethodNotAllowed {
                    method: req.method.to_string(),
                    path: req.path.clone(),
                })
            }
        };
        let parsed = ParsedPath::parse(&req.path, &self.model)?;
        let raw = is_raw_form(&self.model, &parsed);
        let body = if raw {
            WriteBody::Raw {
                bytes: req.body.clone(),
                attrs: attrs_from_headers(&req.headers)?,
            }
        } else {
            WriteBody::Json(json_body(&req.body)?)
        };
        let write = WriteRequest {
            target: parsed.target.clone(),
            structure: parsed.structure,
            method,
            body,
            nested: opts.nested,
            set_default: opts.set_default.clone(),
        };
        let plan = plan_write(&self.model, &write)?;
        tracing::debug!(commands = plan.commands.len(), "write planned");

        let mut ctx = OpContext::new(self.store.begin_tx()?, &self.model, request);
        apply_all(&mut ctx, &plan.commands)?;

        let mut results = Vec::with_capacity(plan.results.len());
        for result in &plan.results {
            let path = match result {
                ResultRef::Entity(path) => path.clone(),
                ResultRef::LastVersion(resource) => match ctx.last_version(resource) {
                    Some(vid) => resource.version(vid),
                    None => resource.clone(),
                },
            };
            results.push(path);
        }
        let created = !plan.collection
            && results.first().is_some_and(|path| match path.kind() {
                EntityKind::Resource => ctx.was_created(&path.meta()),
                _ => ctx.was_created(path),
            });
        ctx.commit()?;

        let tx = self.store.begin_tx()?;
        let render_one = |path: &EntityPath| -> Result<(EntityTree, EntityPath)> {
            let tree = EntityTree::load(tx.as_ref(), &self.model, &Target::Entity(path.clone()))?;
            Ok((tree, path.clone()))
        };

        let rendered = if plan.collection {
            let mut members = BTreeMap::new();
            for path in &results {
                let (tree, path) = render_one(path)?;
                members.insert(path.id().to_string(), self.view(&tree).render(&Inline::none())?);
            }
            Rendered::Json(Value::Object(members.into_iter().collect()))
        } else {
            let first = results
                .first()
                .ok_or_else(|| RegistryError::Internal {
                    message: "write produced no result".to_string(),
                })?;
            let (tree, path) = render_one(first)?;
            let view = self.view(&tree);
            if raw {
                Rendered::Document(RawDocument::load(&view, &tree, &self.model, &path)?)
            } else {
                Rendered::Json(view.render(&Inline::none())?)
            }
        };

        let location = match results.first() {
            Some(path) if created => Some(self.url(path)),
            _ => None,
        };
        Ok(WriteOutcome {
            created,
            location,
            rendered,
        })
    }

    // ===== Deletes =====

    /// Delete an entity, or members of a collection
    ///
    /// On a collection, `body` (when non-empty) is a map of member ids to
    /// `null` or `{"epoch": n}`; listed ids that do not exist are skipped.
    /// Without a body every member is deleted.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `MethodNotAllowed`, `EpochMismatch`,
    /// `InvalidData` for a malformed body, and deadline or store errors.
    pub fn delete(&self, path: &str, opts: &RequestOptions, body: &[u8], request: &RequestContext) -> Result<()> {
        let start = Instant::now();
        log_op_start!("delete", path = path);

        match self.delete_inner(path, opts, body, request) {
            Ok(count) => {
                log_op_end!("delete", duration_ms = elapsed_ms(start), entities = count);
                Ok(())
            }
            Err(e) => {
                log_op_error!("delete", e.clone(), duration_ms = elapsed_ms(start));
                Err(e)
            }
        }
    }

    fn delete_inner(&self, path: &str, opts: &RequestOptions, body: &[u8], request: &RequestContext) -> Result<usize> {
        let parsed = ParsedPath::parse(path, &self.model)?;
        let mut ctx = OpContext::new(self.store.begin_tx()?, &self.model, request);

        let commands = match &parsed.target {
            Target::Entity(entity) => vec![Command::DeleteEntity {
                path: entity.clone(),
                epoch: opts.epoch,
                set_default: opts.set_default.clone(),
                must_exist: true,
            }],
            Target::Collection { parent, collection } => {
                if ctx.load(parent)?.is_none() {
                    return Err(RegistryError::not_found(path));
                }
                let members = match delete_body(body)? {
                    Some(members) => members,
                    None => ctx
                        .children(parent, collection)?
                        .into_iter()
                        .map(|id| (id, None))
                        .collect(),
                };
                members
                    .into_iter()
                    .map(|(id, epoch)| Command::DeleteEntity {
                        path: parent.child(collection, &id),
                        epoch,
                        set_default: opts.set_default.clone(),
                        must_exist: false,
                    })
                    .collect()
            }
        };

        apply_all(&mut ctx, &commands)?;
        ctx.commit()?;
        Ok(commands.len())
    }

    // ===== Dispatch =====

    /// Run one request end to end; errors become their mapped response
    pub fn handle(&self, req: &HttpRequest) -> HttpResponse {
        let id = req
            .header(REQUEST_ID)
            .filter(|v| !v.trim().is_empty())
            .map(RequestId::from)
            .unwrap_or_else(RequestId::generate);
        let request = self.context_for(id);
        let span = tracing::info_span!("request", request_id = %request.request_id);
        let _entered = span.enter();

        let resp = match self.dispatch(req, &request) {
            Ok(resp) => resp,
            Err(e) => HttpResponse::from_error(&e),
        };
        resp.with_header(REQUEST_ID, request.request_id.as_str())
    }

    fn dispatch(&self, req: &HttpRequest, request: &RequestContext) -> Result<HttpResponse> {
        let opts = RequestOptions::from_query(&req.query, &self.capabilities)?;
        match req.method {
            Method::Get => self.get(req, &opts, request),
            Method::Put | Method::Patch | Method::Post => {
                self.write(req, &opts, request)?.into_response()
            }
            Method::Delete => {
                self.delete(&req.path, &opts, &req.body, request)?;
                Ok(HttpResponse::no_content())
            }
        }
    }
}

/// Parse a JSON write body; an empty body is `{}`
fn json_body(bytes: &[u8]) -> Result<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(bytes)
        .map_err(|e| RegistryError::invalid_data(format!("Error parsing request body: {}", e)))
}

/// Members named by a collection DELETE body, with optional epochs
fn delete_body(bytes: &[u8]) -> Result<Option<Vec<(String, Option<i64>)>>> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let body = json_body(bytes)?;
    let map = body
        .as_object()
        .ok_or_else(|| RegistryError::invalid_data("DELETE body must be a JSON object"))?;
    let mut members = Vec::with_capacity(map.len());
    for (id, entry) in map {
        let epoch = match entry {
            Value::Null => None,
            Value::Object(fields) => match fields.get(EPOCH_KEY) {
                None | Some(Value::Null) => None,
                Some(v) => Some(v.as_i64().ok_or_else(|| {
                    RegistryError::invalid_data(format!("Invalid \"epoch\" for \"{}\": {}", id, v))
                })?),
            },
            other => {
                return Err(RegistryError::invalid_data(format!(
                    "DELETE entry \"{}\" must be an object, not {}",
                    id, other
                )))
            }
        };
        members.push((id.clone(), epoch));
    }
    Ok(Some(members))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_bodies() {
        assert_eq!(json_body(b"").unwrap(), json!({}));
        assert_eq!(json_body(b"  \n").unwrap(), json!({}));
        assert_eq!(delete_body(b"").unwrap(), None);
    }

    #[test]
    fn test_bad_json_is_invalid_data() {
        let err = json_body(b"{nope").unwrap_err();
        assert!(matches!(err, RegistryError::InvalidData { .. }));
    }

    #[test]
    fn test_delete_body_members() {
        let members = delete_body(br#"{"a": null, "b": {}, "c": {"epoch": 3}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            members,
            vec![
                ("a".to_string(), None),
                ("b".to_string(), None),
                ("c".to_string(), Some(3))
            ]
        );
        assert!(delete_body(b"[1]").is_err());
        assert!(delete_body(br#"{"a": {"epoch": "x"}}"#).is_err());
    }
}
