//! Typed helpers over the generic client
//!
//! Objects are returned as raw JSON; fields the library does not interpret
//! pass through untouched.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::{Map, Value, json};

use super::client::ApiClient;
use super::error::{ApiError, ApiResult};
use super::pagination::FetchOptions;
use super::query::Query;
use super::sideload::Sideload;
use super::transport::{HttpMethod, HttpTransport, MultipartPart, RequestBody};

/// Default extraction engine endpoint for new queues
pub const DEFAULT_RIR_URL: &str = "https://all.rir.rossum.ai";

/// Collections exposed by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Organizations,
    Workspaces,
    Queues,
    Schemas,
    Connectors,
    Hooks,
    Inboxes,
    Users,
    Groups,
    Annotations,
    Documents,
    Pages,
    Modifiers,
}

impl Resource {
    pub fn plural(&self) -> &'static str {
        match self {
            Resource::Organizations => "organizations",
            Resource::Workspaces => "workspaces",
            Resource::Queues => "queues",
            Resource::Schemas => "schemas",
            Resource::Connectors => "connectors",
            Resource::Hooks => "hooks",
            Resource::Inboxes => "inboxes",
            Resource::Users => "users",
            Resource::Groups => "groups",
            Resource::Annotations => "annotations",
            Resource::Documents => "documents",
            Resource::Pages => "pages",
            Resource::Modifiers => "modifiers",
        }
    }

    pub fn singular(&self) -> &'static str {
        match self {
            Resource::Inboxes => "inbox",
            Resource::Modifiers => "modifier",
            other => other.plural().trim_end_matches('s'),
        }
    }

    /// Endpoint of one object
    pub fn item(&self, id: u64) -> String {
        format!("{}/{}", self.plural(), id)
    }

    pub fn sideload(&self) -> Sideload {
        Sideload::with_singular(self.plural(), self.singular())
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.plural())
    }
}

impl From<Resource> for Sideload {
    fn from(resource: Resource) -> Self {
        resource.sideload()
    }
}

/// Filters for listing queues
#[derive(Debug, Clone, Default)]
pub struct QueueFilter {
    pub ids: Vec<u64>,
    pub workspace: Option<u64>,
    pub users: Vec<u64>,
    pub hooks: Vec<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewQueue {
    pub name: String,
    pub workspace: String,
    pub schema: String,
    pub rir_url: String,
    pub rir_params: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hooks: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl NewQueue {
    pub fn new(
        name: impl Into<String>,
        workspace_url: impl Into<String>,
        schema_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            workspace: workspace_url.into(),
            schema: schema_url.into(),
            rir_url: DEFAULT_RIR_URL.to_string(),
            rir_params: String::new(),
            connector: None,
            hooks: None,
            locale: None,
        }
    }

    pub fn with_connector(mut self, connector_url: impl Into<String>) -> Self {
        self.connector = Some(connector_url.into());
        self
    }

    pub fn with_hooks(mut self, hook_urls: Vec<String>) -> Self {
        self.hooks = Some(hook_urls);
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_rir(mut self, url: impl Into<String>, params: impl Into<String>) -> Self {
        self.rir_url = url.into();
        self.rir_params = params.into();
        self
    }
}

/// Email inbox feeding one queue; needs an email prefix or a full address
#[derive(Debug, Clone, Default)]
pub struct NewInbox {
    pub name: String,
    pub queue_url: String,
    pub email_prefix: Option<String>,
    pub email: Option<String>,
    pub bounce_email: Option<String>,
}

impl NewInbox {
    fn to_json(&self) -> ApiResult<Value> {
        if self.email_prefix.is_none() && self.email.is_none() {
            return Err(ApiError::InvalidArgument(
                "an inbox needs an email prefix or an email address".to_string(),
            ));
        }
        let mut data = json!({
            "name": self.name,
            "email_prefix": self.email_prefix,
            "bounce_email_to": self.bounce_email,
            "bounce_unprocessable_attachments": self.bounce_email.is_some(),
            "queues": [self.queue_url],
        });
        if let Some(email) = &self.email {
            data["email"] = json!(email);
        }
        Ok(data)
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    /// Also used as the email address
    pub username: String,
    pub organization_url: String,
    pub queue_urls: Vec<String>,
    pub password: Option<String>,
    /// Group name, resolved to its URL before creation
    pub group: Option<String>,
    pub locale: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewConnector {
    pub name: String,
    pub queues: Vec<String>,
    pub service_url: String,
    pub authorization_token: Option<String>,
    pub params: Option<String>,
    pub asynchronous: bool,
}

impl NewConnector {
    pub fn new(name: impl Into<String>, queues: Vec<String>, service_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            queues,
            service_url: service_url.into(),
            authorization_token: None,
            params: None,
            asynchronous: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewHook {
    pub name: String,
    #[serde(rename = "type")]
    pub hook_type: String,
    pub queues: Vec<String>,
    pub active: bool,
    pub events: Vec<String>,
    pub sideload: Vec<String>,
    pub config: Value,
    pub metadata: Value,
    pub run_after: Vec<String>,
    pub test: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_owner: Option<String>,
    /// Any further hook fields, sent as is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NewHook {
    pub fn new(name: impl Into<String>, hook_type: impl Into<String>, config: Value) -> Self {
        Self {
            name: name.into(),
            hook_type: hook_type.into(),
            queues: Vec::new(),
            active: true,
            events: Vec::new(),
            sideload: Vec::new(),
            config,
            metadata: json!({}),
            run_after: Vec::new(),
            test: json!({}),
            token_owner: None,
            extra: Map::new(),
        }
    }
}

/// Partial update of a hook; fields left `None` are not sent
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HookUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub hook_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queues: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sideload: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

impl HookUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Outcome of [`ApiClient::delete_objects`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteReport {
    pub deleted: Vec<String>,
    /// Objects the server refused to delete, by id
    pub failed: Vec<(String, ApiError)>,
}

impl DeleteReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Optional parts of a document upload
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Initial datapoint values, keyed by schema id
    pub values: Option<Value>,
    pub metadata: Option<Value>,
}

impl<T: HttpTransport> ApiClient<T> {
    fn list(&mut self, resource: Resource, query: &Query) -> ApiResult<Vec<Value>> {
        Ok(self.get_paginated(resource.plural(), query)?.results)
    }

    /// Organization by id, or the current user's organization
    pub fn get_organization(&mut self, id: Option<u64>) -> ApiResult<Value> {
        match id {
            Some(id) => self.get(&Resource::Organizations.item(id), &Query::new()),
            None => {
                let mut user = self.get_user(None)?;
                if user.get(Resource::Organizations.singular()).is_none()
                    && let Some(url) = user.get("url").and_then(Value::as_str).map(str::to_string)
                {
                    user = self.get(&url, &Query::new())?;
                }
                let url = user
                    .get(Resource::Organizations.singular())
                    .and_then(Value::as_str)
                    .ok_or_else(|| ApiError::Protocol {
                        endpoint: "auth/user".to_string(),
                        message: "user has no organization".to_string(),
                    })?
                    .to_string();
                self.get(&url, &Query::new())
            }
        }
    }

    pub fn get_workspaces(&mut self, organization: Option<u64>) -> ApiResult<Vec<Value>> {
        let query = Query::new().with_opt(Resource::Organizations.singular(), organization);
        self.list(Resource::Workspaces, &query)
    }

    /// Workspace by id; without one, the only workspace there is
    pub fn get_workspace(&mut self, id: Option<u64>) -> ApiResult<Value> {
        match id {
            Some(id) => self.get(&Resource::Workspaces.item(id), &Query::new()),
            None => single(self.get_workspaces(None)?, "Workspace"),
        }
    }

    pub fn get_queues(
        &mut self,
        filter: &QueueFilter,
        sideloads: &[Sideload],
    ) -> ApiResult<Vec<Value>> {
        let mut query = Query::new();
        if !filter.ids.is_empty() {
            query.set("id", join_ids(&filter.ids));
        }
        if let Some(workspace) = filter.workspace {
            query.set(Resource::Workspaces.singular(), workspace);
        }
        if !filter.users.is_empty() {
            query.set(Resource::Users.plural(), filter.users.clone());
        }
        if !filter.hooks.is_empty() {
            query.set(Resource::Hooks.plural(), filter.hooks.clone());
        }
        let queues = self.list(Resource::Queues, &query)?;
        self.sideload(queues, sideloads)
    }

    /// Queue by id; without one, the only queue there is
    pub fn get_queue(&mut self, id: Option<u64>) -> ApiResult<Value> {
        match id {
            Some(id) => self.get(&Resource::Queues.item(id), &Query::new()),
            None => single(self.get_queues(&QueueFilter::default(), &[])?, "Queue"),
        }
    }

    pub fn get_schemas(&mut self) -> ApiResult<Vec<Value>> {
        self.list(Resource::Schemas, &Query::new())
    }

    pub fn get_schema(&mut self, id: u64) -> ApiResult<Value> {
        self.get(&Resource::Schemas.item(id), &Query::new())
    }

    pub fn get_users(
        &mut self,
        username: Option<&str>,
        is_active: Option<bool>,
    ) -> ApiResult<Vec<Value>> {
        let query = Query::new()
            .with_opt("username", username)
            .with_opt("is_active", is_active);
        self.list(Resource::Users, &query)
    }

    /// User by id; without one, the logged-in user
    pub fn get_user(&mut self, id: Option<u64>) -> ApiResult<Value> {
        match id {
            Some(id) => self.get(&Resource::Users.item(id), &Query::new()),
            None => self.get("auth/user", &Query::new()),
        }
    }

    pub fn get_groups(&mut self, name: Option<&str>) -> ApiResult<Vec<Value>> {
        let Some(name) = name else {
            return Ok(Vec::new());
        };
        self.list(Resource::Groups, &Query::new().with("name", name))
    }

    pub fn get_connectors(&mut self) -> ApiResult<Vec<Value>> {
        self.list(Resource::Connectors, &Query::new())
    }

    pub fn get_hooks(&mut self, query: &Query) -> ApiResult<Vec<Value>> {
        self.list(Resource::Hooks, query)
    }

    pub fn get_inboxes(&mut self) -> ApiResult<Vec<Value>> {
        self.list(Resource::Inboxes, &Query::new())
    }

    pub fn get_annotation(&mut self, id: u64) -> ApiResult<Value> {
        self.get(&Resource::Annotations.item(id), &Query::new())
    }

    /// Annotations, filtered by queue and status, with server-side sideloads
    pub fn get_annotations(
        &mut self,
        queue: Option<u64>,
        statuses: &[&str],
        sideloads: &[Sideload],
    ) -> ApiResult<Vec<Value>> {
        let mut query = Query::new().with_opt("queue", queue);
        if !statuses.is_empty() {
            query.set("status", statuses.join(","));
        }
        Ok(self
            .get_paginated_with(
                Resource::Annotations.plural(),
                &query,
                sideloads,
                &FetchOptions::default(),
            )?
            .results)
    }

    /// Re-read an annotation until `done` accepts it
    pub fn poll_annotation(
        &mut self,
        id: u64,
        interval: Duration,
        timeout: Duration,
        done: impl Fn(&Value) -> bool,
    ) -> ApiResult<Value> {
        let deadline = Instant::now() + timeout;
        let mut polls = 0;
        loop {
            let annotation = self.get_annotation(id)?;
            polls += 1;
            if done(&annotation) {
                return Ok(annotation);
            }
            let status = annotation
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("?");
            tracing::debug!("Annotation {} is {}", id, status);
            if Instant::now() + interval > deadline {
                return Err(ApiError::DeadlineExceeded { pages: polls });
            }
            thread::sleep(interval);
        }
    }

    pub fn create_workspace(
        &mut self,
        name: &str,
        organization_url: &str,
        metadata: Option<&Value>,
    ) -> ApiResult<Value> {
        let mut data = json!({ "name": name, "organization": organization_url });
        if let Some(metadata) = metadata {
            data["metadata"] = metadata.clone();
        }
        self.post(Resource::Workspaces.plural(), &data)
    }

    /// Create a schema from its JSON content (an array of root nodes)
    pub fn create_schema(&mut self, name: &str, content: &Value) -> ApiResult<Value> {
        self.post(
            Resource::Schemas.plural(),
            &json!({ "name": name, "content": content }),
        )
    }

    pub fn update_schema_content(&mut self, id: u64, content: &Value) -> ApiResult<Value> {
        self.patch(&Resource::Schemas.item(id), &json!({ "content": content }))
    }

    pub fn create_queue(&mut self, queue: &NewQueue) -> ApiResult<Value> {
        self.post(Resource::Queues.plural(), &to_value(queue)?)
    }

    pub fn create_inbox(&mut self, inbox: &NewInbox) -> ApiResult<Value> {
        let data = inbox.to_json()?;
        self.post(Resource::Inboxes.plural(), &data)
    }

    pub fn create_user(&mut self, user: &NewUser) -> ApiResult<Value> {
        let groups: Vec<Value> = self
            .get_groups(user.group.as_deref())?
            .into_iter()
            .filter_map(|group| group.get("url").cloned())
            .collect();
        let data = json!({
            "username": user.username,
            "email": user.username,
            "organization": user.organization_url,
            "password": user.password,
            "groups": groups,
            "queues": user.queue_urls,
            "ui_settings": { "locale": user.locale },
        });
        self.post(Resource::Users.plural(), &data)
    }

    /// Change the logged-in user's password
    pub fn change_password(&mut self, new_password: &str) -> ApiResult<Value> {
        let old_password = self
            .config()
            .password()
            .ok_or_else(|| {
                ApiError::InvalidArgument(
                    "changing the password requires password login".to_string(),
                )
            })?
            .to_string();
        self.post(
            "auth/password/change",
            &json!({
                "new_password1": new_password,
                "new_password2": new_password,
                "old_password": old_password,
            }),
        )
    }

    pub fn reset_password(&mut self, email: &str) -> ApiResult<Value> {
        self.post("auth/password/reset", &json!({ "email": email }))
    }

    pub fn create_connector(&mut self, connector: &NewConnector) -> ApiResult<Value> {
        self.post(Resource::Connectors.plural(), &to_value(connector)?)
    }

    pub fn create_hook(&mut self, hook: &NewHook) -> ApiResult<Value> {
        self.post(Resource::Hooks.plural(), &to_value(hook)?)
    }

    /// PATCH the given fields of a hook
    pub fn update_hook(&mut self, id: u64, update: &HookUpdate) -> ApiResult<Value> {
        self.patch(&Resource::Hooks.item(id), &to_value(update)?)
    }

    pub fn delete_hook(&mut self, id: u64) -> ApiResult<()> {
        self.delete(&Resource::Hooks.item(id)).map(|_| ())
    }

    /// Delete objects given as `(id, url)` pairs, in order
    ///
    /// An object the server refuses to delete is recorded in the report and
    /// the run goes on. Any other failure (network, authentication) stops the
    /// run and is returned.
    pub fn delete_objects(
        &mut self,
        item: &str,
        to_delete: &[(String, String)],
    ) -> ApiResult<DeleteReport> {
        let mut report = DeleteReport::default();
        for (id, url) in to_delete {
            match self.delete(url) {
                Ok(_) => {
                    tracing::debug!("Deleted {} {}", item, id);
                    report.deleted.push(id.clone());
                }
                Err(err @ ApiError::Request { .. }) => {
                    tracing::warn!("Deleting {} {} failed: {}", item, id, err);
                    report.failed.push((id.clone(), err));
                }
                Err(err) => return Err(err),
            }
        }
        Ok(report)
    }

    /// Upload a document into a queue; `filename` is sent verbatim
    pub fn upload_document(
        &mut self,
        queue_id: u64,
        file_bytes: &[u8],
        filename: &str,
    ) -> ApiResult<Value> {
        self.upload_document_with(queue_id, file_bytes, filename, &UploadOptions::default())
    }

    pub fn upload_document_with(
        &mut self,
        queue_id: u64,
        file_bytes: &[u8],
        filename: &str,
        options: &UploadOptions,
    ) -> ApiResult<Value> {
        if filename.is_empty() {
            return Err(ApiError::InvalidArgument(
                "a file name is required for the uploaded document".to_string(),
            ));
        }

        let mut parts = vec![MultipartPart::file("content", filename, file_bytes.to_vec())];
        if let Some(values) = &options.values {
            parts.push(MultipartPart::text("values", values.to_string()));
        }
        if let Some(metadata) = &options.metadata {
            parts.push(MultipartPart::text("metadata", metadata.to_string()));
        }

        tracing::info!(
            "Uploading {} ({} bytes) to queue {}",
            filename,
            file_bytes.len(),
            queue_id
        );
        self.send_json(
            HttpMethod::Post,
            &format!("{}/upload", Resource::Queues.item(queue_id)),
            RequestBody::Multipart(parts),
        )
    }

    pub fn set_metadata(
        &mut self,
        resource: Resource,
        id: u64,
        metadata: &Value,
    ) -> ApiResult<Value> {
        self.patch(&resource.item(id), &json!({ "metadata": metadata }))
    }

    /// Exported annotations in the given format (`json`, `csv`, `xml`, ...)
    pub fn export_data(
        &mut self,
        queue_id: u64,
        annotation_ids: &[u64],
        format: &str,
    ) -> ApiResult<Vec<u8>> {
        let query = Query::new()
            .with("id", join_ids(annotation_ids))
            .with("format", format);
        self.get_bytes(&format!("{}/export", Resource::Queues.item(queue_id)), &query)
    }
}

fn join_ids(ids: &[u64]) -> String {
    ids.iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn single(mut items: Vec<Value>, what: &str) -> ApiResult<Value> {
    if items.len() == 1 {
        Ok(items.remove(0))
    } else {
        Err(ApiError::InvalidArgument(format!(
            "{} ID must be specified ({} found)",
            what,
            items.len()
        )))
    }
}

fn to_value(payload: &impl Serialize) -> ApiResult<Value> {
    serde_json::to_value(payload).map_err(|e| ApiError::InvalidArgument(e.to_string()))
}
