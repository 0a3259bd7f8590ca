//! Protocol dispatch.
//!
//! Every request to the registry endpoint is either an XML-RPC call, recognized by its
//! `text/xml` content type, or a form request routed by its `:action` field. Requests without
//! an action go to the configured fallback handler.

use std::{
    collections::BTreeMap,
    path::{Component, Path, PathBuf},
};

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use quick_xml::escape::escape;
use serde_json::Value as JsonValue;
use tracing::{debug, error, info, warn};
use wheelhouse_core::{
    error::RegistryError,
    publish::{Artifact, PublishOutcome, PublishRequest},
};
use wheelhouse_db::{
    models::registry::{Distribution, User},
    repository::{distribution::DistributionRepository, package::PackageRepository},
};
use wheelhouse_package::{is_multi_valued, Descriptor};
use wheelhouse_utils::string::normalize_name;

use crate::{
    context::RegistryContext,
    error::OperationError,
    query,
    routes::{ActionHandler, FallbackHandler, RpcHandler},
    users,
    xmlrpc::{self, Fault, MethodCall, Value},
    Method, ReleaseData, ReleaseUrl, Request, Response,
};

pub const AUTH_REALM: &str = "wheelhouse";

/// Characters escaped in file links.
const LINK_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?');

/// Routes protocol requests to registry operations.
#[derive(Clone)]
pub struct Dispatcher {
    ctx: RegistryContext,
}

impl Dispatcher {
    pub fn new(ctx: RegistryContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &RegistryContext {
        &self.ctx
    }

    /// Handles one request to the registry endpoint.
    pub fn handle(&self, request: &Request) -> Response {
        if request.is_xmlrpc() {
            return self.handle_xmlrpc(request);
        }

        let action = match request.method {
            Method::Post => request.form_value(":action"),
            _ => request.query_value(":action"),
        };
        let Some(action) = action.map(str::trim).filter(|action| !action.is_empty()) else {
            return self.fallback();
        };

        let Some(handler) = self.ctx.routes().action(action) else {
            warn!(action, "unknown action");
            return Response::not_allowed(&self.ctx.routes().action_names());
        };
        debug!(action, handler = handler.as_str(), "dispatching action");

        match handler {
            ActionHandler::Publish => self.publish(request),
            ActionHandler::ListClassifiers => self.list_classifiers(),
        }
    }

    fn fallback(&self) -> Response {
        match self.ctx.routes().fallback() {
            FallbackHandler::Index => self.package_index(),
        }
    }

    fn handle_xmlrpc(&self, request: &Request) -> Response {
        let body = match xmlrpc::parse_method_call(&request.body).and_then(|call| self.call(&call))
        {
            Ok(value) => xmlrpc::write_response(&value),
            Err(fault) => {
                warn!(code = fault.code, message = fault.message.as_str(), "xml-rpc fault");
                xmlrpc::write_fault(&fault)
            }
        };
        Response::xml(body)
    }

    /// Executes a decoded XML-RPC call.
    pub fn call(&self, call: &MethodCall) -> Result<Value, Fault> {
        let Some(handler) = self.ctx.routes().rpc_method(&call.method) else {
            return Err(Fault::unknown_method(
                &call.method,
                &self.ctx.routes().rpc_method_names(),
            ));
        };
        debug!(method = call.method.as_str(), handler = handler.as_str(), "xml-rpc call");

        let result = match handler {
            RpcHandler::ListPackages => query::list_packages(&self.ctx).map(Value::from),
            RpcHandler::PackageReleases => {
                let name = string_param(&call.params, 0, "name")?;
                let show_hidden = match call.params.get(1) {
                    Some(value) => value
                        .as_bool()
                        .ok_or_else(|| Fault::invalid_params("`show_hidden` must be a boolean"))?,
                    None => false,
                };
                query::package_releases(&self.ctx, name, show_hidden).map(Value::from)
            }
            RpcHandler::ReleaseUrls => {
                let name = string_param(&call.params, 0, "name")?;
                let version = string_param(&call.params, 1, "version")?;
                query::release_urls(&self.ctx, name, version)
                    .map(|urls| Value::Array(urls.into_iter().map(release_url_value).collect()))
            }
            RpcHandler::ReleaseData => {
                let name = string_param(&call.params, 0, "name")?;
                let version = string_param(&call.params, 1, "version")?;
                query::release_data(&self.ctx, name, version)
                    .map(release_data_value)
            }
        };

        result.map_err(|err| {
            error!(method = call.method.as_str(), "xml-rpc call failed: {err}");
            Fault::server_error(err.to_string())
        })
    }

    fn publish(&self, request: &Request) -> Response {
        if request.method != Method::Post {
            return Response::text(400, "Uploads must be sent with POST\n");
        }

        let user = match self.authenticate(request) {
            Ok(Some(user)) => user,
            Ok(None) => return Response::unauthorized(AUTH_REALM),
            Err(err) => return operation_failure(err),
        };

        let descriptor = request.form_value("name").is_some().then(|| {
            Descriptor::from_form(
                request
                    .form
                    .iter()
                    .map(|(key, value)| (key.as_str(), value.as_str())),
            )
        });
        let artifact = request
            .file("content")
            .map(|file| Artifact::new(&file.path, file.filename.as_str()));
        let form_value = |name: &str| request.form_value(name).map(str::to_string);

        let publish = PublishRequest {
            descriptor,
            artifact,
            owner: None,
            uploader: Some(user.id),
            md5_digest: form_value("md5_digest"),
            filetype: form_value("filetype"),
            pyversion: form_value("pyversion"),
            comment: form_value("comment"),
            signature: form_value("gpg_signature"),
        };

        match self.ctx.publisher().publish(&publish) {
            Ok(PublishOutcome::Published(release)) => {
                Response::text(200, format!("{}-{} added\n", release.name, release.version))
            }
            Ok(PublishOutcome::AlreadyPublished { name, version }) => {
                Response::text(200, format!("{name}-{version} already added\n"))
            }
            Err(err) => registry_failure(err, &user),
        }
    }

    fn authenticate(&self, request: &Request) -> crate::Result<Option<User>> {
        let Some((username, password)) = request
            .authorization
            .as_deref()
            .and_then(users::parse_basic_auth)
        else {
            debug!("upload without credentials");
            return Ok(None);
        };
        let user = users::authenticate(&self.ctx, &username, &password)?;
        if user.is_none() {
            warn!(username = username.as_str(), "rejected upload credentials");
        }
        Ok(user)
    }

    fn list_classifiers(&self) -> Response {
        match query::list_classifiers(&self.ctx) {
            Ok(classifiers) => {
                let mut body = classifiers.join("\n");
                body.push('\n');
                Response::text(200, body)
            }
            Err(err) => operation_failure(err),
        }
    }

    fn package_index(&self) -> Response {
        let names = match query::list_packages(&self.ctx) {
            Ok(names) => names,
            Err(err) => return operation_failure(err),
        };

        let mut body = String::from("<!DOCTYPE html>\n<html><head><title>Packages</title></head>\n<body>\n<h1>Packages</h1>\n<ul>\n");
        for name in &names {
            body.push_str(&format!(
                "<li><a href=\"/simple/{}/\">{}</a></li>\n",
                normalize_name(name),
                escape(name.as_str())
            ));
        }
        body.push_str("</ul>\n</body></html>\n");
        Response::html(200, body)
    }

    /// The simple index root, linking every project page.
    pub fn simple_index(&self) -> Response {
        let names = match query::list_packages(&self.ctx) {
            Ok(names) => names,
            Err(err) => return operation_failure(err),
        };

        let mut body =
            String::from("<!DOCTYPE html>\n<html><head><title>Simple index</title></head>\n<body>\n");
        for name in &names {
            body.push_str(&format!(
                "<a href=\"{}/\">{}</a><br/>\n",
                normalize_name(name),
                escape(name.as_str())
            ));
        }
        body.push_str("</body></html>\n");
        Response::html(200, body)
    }

    /// The simple index page of one project, listing its files with `#md5=` fragments.
    ///
    /// Unknown projects redirect to the upstream index when `proxy_missing` is enabled.
    pub fn simple_project(&self, name: &str) -> Response {
        let files = match self.project_files(name) {
            Ok(files) => files,
            Err(err) => return operation_failure(err),
        };

        let Some((package, files)) = files else {
            if self.ctx.config().proxy_missing() {
                let location = format!(
                    "{}/{}/",
                    self.ctx.config().proxy_base_url().trim_end_matches('/'),
                    normalize_name(name)
                );
                info!(name, location = location.as_str(), "redirecting to upstream index");
                return Response::redirect(&location);
            }
            return Response::not_found(format!("Package `{name}` not found\n"));
        };

        let mut body = format!(
            "<!DOCTYPE html>\n<html><head><title>Links for {0}</title></head>\n<body>\n<h1>Links for {0}</h1>\n",
            escape(package.as_str())
        );
        for (_, file) in &files {
            let url = self.ctx.media_url(&file.content);
            body.push_str(&format!(
                "<a href=\"{}#md5={}\">{}</a><br/>\n",
                utf8_percent_encode(&url, LINK_ENCODE_SET),
                file.md5_digest,
                escape(file.filename.as_str())
            ));
        }
        body.push_str("</body></html>\n");
        Response::html(200, body)
    }

    /// Finds a package by exact or normalized name along with its files.
    fn project_files(
        &self,
        name: &str,
    ) -> crate::Result<Option<(String, Vec<(String, Distribution)>)>> {
        let normalized = normalize_name(name);
        Ok(self.ctx.db().with_conn(|conn| {
            let package = match PackageRepository::find_by_name(conn, name)? {
                Some(package) => Some(package),
                None => {
                    let matched = PackageRepository::list_names(conn)?
                        .into_iter()
                        .find(|candidate| normalize_name(candidate) == normalized);
                    match matched {
                        Some(candidate) => PackageRepository::find_by_name(conn, &candidate)?,
                        None => None,
                    }
                }
            };
            let Some(package) = package else {
                return Ok(None);
            };
            let files = DistributionRepository::list_for_package(conn, package.id)?;
            Ok(Some((package.name, files)))
        })?)
    }

    /// Resolves a path below the media URL to a stored file.
    ///
    /// Returns `None` for paths escaping the storage root, for hidden entries such as staged
    /// uploads and replaced artifacts, and for missing files.
    pub fn media_path(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        let is_contained = relative.components().all(|component| {
            match component {
                Component::Normal(name) => !name.as_encoded_bytes().starts_with(b"."),
                _ => false,
            }
        });
        if !is_contained || relative.as_os_str().is_empty() {
            return None;
        }

        let resolved = self.ctx.store().root().join(relative);
        resolved.is_file().then_some(resolved)
    }
}

fn string_param<'a>(params: &'a [Value], index: usize, name: &str) -> Result<&'a str, Fault> {
    params
        .get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| Fault::invalid_params(format!("missing string parameter `{name}`")))
}

fn release_url_value(url: ReleaseUrl) -> Value {
    Value::Struct(BTreeMap::from([
        ("url".to_string(), Value::from(url.url)),
        ("packagetype".to_string(), Value::from(url.packagetype)),
        ("filename".to_string(), Value::from(url.filename)),
        ("size".to_string(), Value::from(url.size)),
        ("md5_digest".to_string(), Value::from(url.md5_digest)),
        ("has_sig".to_string(), Value::from(url.has_sig)),
        ("python_version".to_string(), Value::from(url.python_version)),
        ("comment_text".to_string(), Value::from(url.comment_text)),
    ]))
}

/// Flattens stored release metadata into the `release_data` struct.
///
/// Single-valued fields become strings, list fields stay arrays. Missing releases produce an
/// empty struct.
fn release_data_value(data: Option<ReleaseData>) -> Value {
    let Some(data) = data else {
        return Value::Struct(BTreeMap::new());
    };

    let mut members = BTreeMap::new();
    if let JsonValue::Object(info) = &data.package_info {
        for (field, values) in info {
            let values: Vec<String> = match values {
                JsonValue::Array(values) => values
                    .iter()
                    .filter_map(|value| value.as_str().map(str::to_string))
                    .collect(),
                JsonValue::String(value) => vec![value.clone()],
                _ => Vec::new(),
            };
            let value = if is_multi_valued(field) {
                Value::from(values)
            } else {
                Value::from(values.into_iter().next().unwrap_or_default())
            };
            members.insert(field.clone(), value);
        }
    }

    let package_url = format!("/simple/{}/", normalize_name(&data.name));
    members.insert("name".to_string(), Value::from(data.name));
    members.insert("version".to_string(), Value::from(data.version.as_str()));
    members.insert(
        "metadata_version".to_string(),
        Value::from(data.metadata_version),
    );
    members.insert("classifiers".to_string(), Value::from(data.classifiers));
    members.insert(
        "release_url".to_string(),
        Value::from(format!("{package_url}#{}", data.version)),
    );
    members.insert("package_url".to_string(), Value::from(package_url));
    Value::Struct(members)
}

fn registry_failure(err: RegistryError, user: &User) -> Response {
    let username = user.username.as_str();
    if err.is_ownership_error() {
        warn!(username, "upload rejected: {err}");
        Response::text(403, format!("{err}\n"))
    } else if err.is_client_error() {
        warn!(username, "upload rejected: {err}");
        Response::text(400, format!("{err}\n"))
    } else {
        error!(username, "upload failed: {err}");
        Response::text(500, "Internal server error\n")
    }
}

fn operation_failure(err: OperationError) -> Response {
    error!("request failed: {err}");
    Response::text(500, "Internal server error\n")
}
