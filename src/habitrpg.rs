//! Typed client for the HabitRPG v1 API.
//!
//! Every operation builds the resource URL, hands it to [`RestClient`] with
//! the caller's handler and returns the request's [`Cancellable`].

use tokio::runtime::Handle;
use url::Url;

use crate::adapter::{RestError, RestRequest, RestResult, RestTransport};
use crate::client::{Cancellable, HeaderSet, RestClient};
use crate::config::{AuthenticationInfo, ClientError, HabitRpgConfig};
use crate::resource::{
    NewTask, ScoreDirection, ScoreResult, ServerStatus, Task, TaskType, TaskUpdate, User,
};

pub const API_PREFIX: &str = "/api/v1";

pub const HEADER_API_USER: &str = "x-api-user";
pub const HEADER_API_KEY: &str = "x-api-key";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";

#[derive(Clone, Debug)]
pub struct HabitRpgClient {
    api_root: Url,
    rest: RestClient,
}

impl HabitRpgClient {
    /// Client for the default server over reqwest.
    pub fn new(runtime: Handle, auth: AuthenticationInfo) -> Result<Self, ClientError> {
        Self::from_config(runtime, HabitRpgConfig::new(auth))
    }

    pub fn from_config(runtime: Handle, config: HabitRpgConfig) -> Result<Self, ClientError> {
        let api_root = api_root(&config.base_url)?;
        let rest = RestClient::new(runtime, auth_headers(&config.auth));
        Ok(Self::assemble(api_root, rest, &config))
    }

    /// Client over a caller-supplied transport.
    pub fn with_transport<T>(
        transport: T,
        runtime: Handle,
        config: HabitRpgConfig,
    ) -> Result<Self, ClientError>
    where
        T: RestTransport + 'static,
    {
        let api_root = api_root(&config.base_url)?;
        let rest = RestClient::with_transport(transport, runtime, auth_headers(&config.auth));
        Ok(Self::assemble(api_root, rest, &config))
    }

    fn assemble(api_root: Url, rest: RestClient, config: &HabitRpgConfig) -> Self {
        let rest = match config.request_timeout {
            Some(timeout) => rest.with_timeout(timeout),
            None => rest,
        };
        tracing::debug!(api_root = %api_root, "habitrpg client ready");
        Self { api_root, rest }
    }

    pub fn headers(&self) -> &HeaderSet {
        self.rest.headers()
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    /// Absolute URL of `resource` under the versioned API root.
    pub fn api(&self, resource: &str) -> String {
        format!("{}{resource}", self.api_root)
    }

    pub fn tasks_url(&self, filter: Option<TaskType>) -> String {
        let url = self.api("/user/tasks");
        match filter {
            Some(task_type) => format!("{url}?type={task_type}"),
            None => url,
        }
    }

    /// URL of one task, with `id` escaped as a single path segment.
    fn task_url(&self, id: &str, direction: Option<ScoreDirection>) -> RestResult<String> {
        if matches!(id, "" | "." | "..") {
            return Err(RestError::invalid_request(format!("invalid task id {id:?}")));
        }
        let mut url = self.api_root.clone();
        url.path_segments_mut()
            .map_err(|()| RestError::invalid_request(format!("{} has no path", self.api_root)))?
            .extend(["user", "tasks", id])
            .extend(direction.map(ScoreDirection::as_str));
        Ok(url.into())
    }

    pub fn get_status<F>(&self, handler: F) -> Cancellable
    where
        F: FnOnce(RestResult<ServerStatus>) + Send + 'static,
    {
        self.rest.get(self.api("/status"), handler)
    }

    pub fn get_user<F>(&self, handler: F) -> Cancellable
    where
        F: FnOnce(RestResult<User>) + Send + 'static,
    {
        self.rest.get(self.api("/user"), handler)
    }

    /// Fetches the user's tasks; `None` returns every type.
    pub fn get_tasks<F>(&self, handler: F, filter: Option<TaskType>) -> Cancellable
    where
        F: FnOnce(RestResult<Vec<Task>>) + Send + 'static,
    {
        self.rest.get_all(self.tasks_url(filter), handler)
    }

    pub fn create_task<F>(&self, task: &NewTask, handler: F) -> Cancellable
    where
        F: FnOnce(RestResult<Task>) + Send + 'static,
    {
        self.rest.post_json(self.api("/user/tasks"), task, handler)
    }

    pub fn update_task(&self, id: &str, update: &TaskUpdate) -> Cancellable {
        let request = self
            .task_url(id, None)
            .and_then(|url| RestRequest::put(url).with_json(update));
        self.rest.send_detached(request)
    }

    pub fn delete_task<F>(&self, id: &str, handler: F) -> Cancellable
    where
        F: FnOnce(RestResult<()>) + Send + 'static,
    {
        let request = self.task_url(id, None).map(RestRequest::delete);
        self.rest.send(request, handler)
    }

    pub fn score_task<F>(&self, id: &str, direction: ScoreDirection, handler: F) -> Cancellable
    where
        F: FnOnce(RestResult<ScoreResult>) + Send + 'static,
    {
        let request = self.task_url(id, Some(direction)).map(RestRequest::post);
        self.rest.send(request, handler)
    }
}

/// Validates `base_url` and appends the API prefix to its path. A trailing
/// slash on the base is dropped.
fn api_root(base_url: &str) -> Result<Url, ClientError> {
    let mut url = Url::parse(base_url).map_err(|source| ClientError::InvalidBaseUrl {
        url: base_url.to_string(),
        source,
    })?;
    let unsupported = |reason| ClientError::UnsupportedBaseUrl {
        url: base_url.to_string(),
        reason,
    };
    if url.query().is_some() {
        return Err(unsupported("query strings are not allowed"));
    }
    if url.fragment().is_some() {
        return Err(unsupported("fragments are not allowed"));
    }
    url.path_segments_mut()
        .map_err(|()| unsupported("url cannot carry a path"))?
        .pop_if_empty()
        .extend(API_PREFIX.split('/').filter(|segment| !segment.is_empty()));
    Ok(url)
}

fn auth_headers(auth: &AuthenticationInfo) -> HeaderSet {
    let mut headers = HeaderSet::new();
    headers.insert(HEADER_API_USER.to_string(), auth.api_user.clone());
    headers.insert(HEADER_API_KEY.to_string(), auth.api_key.clone());
    headers.insert(HEADER_CONTENT_TYPE.to_string(), "application/json".to_string());
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_root_appends_prefix_to_host() {
        assert_eq!(
            api_root("https://example.com").expect("valid url").as_str(),
            "https://example.com/api/v1"
        );
    }

    #[test]
    fn api_root_strips_trailing_slash() {
        assert_eq!(
            api_root("http://localhost:3000/").expect("valid url").as_str(),
            "http://localhost:3000/api/v1"
        );
    }

    #[test]
    fn api_root_rejects_malformed_url() {
        let err = api_root("not a url").expect_err("url is malformed");
        assert!(matches!(err, ClientError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn api_root_keeps_a_base_path() {
        assert_eq!(
            api_root("https://example.com/habit/").expect("valid url").as_str(),
            "https://example.com/habit/api/v1"
        );
    }

    #[test]
    fn api_root_rejects_query_fragment_and_pathless_urls() {
        for base_url in [
            "https://example.com/?a=1",
            "https://example.com/#top",
            "mailto:someone@example.com",
        ] {
            let err = api_root(base_url).expect_err("base url should be refused");
            assert!(
                matches!(err, ClientError::UnsupportedBaseUrl { ref url, .. } if url == base_url),
                "unexpected error for {base_url}: {err}"
            );
        }
    }

    #[test]
    fn default_base_url_parses() {
        assert_eq!(
            api_root(crate::config::DEFAULT_BASE_URL)
                .expect("default url is valid")
                .as_str(),
            "https://www.habitrpg.com/api/v1"
        );
    }

    #[test]
    fn auth_headers_hold_credentials_and_content_type() {
        let headers = auth_headers(&AuthenticationInfo::new("user-1", "key-1"));
        assert_eq!(headers.len(), 3);
        assert_eq!(headers.get(HEADER_API_USER).map(String::as_str), Some("user-1"));
        assert_eq!(headers.get(HEADER_API_KEY).map(String::as_str), Some("key-1"));
        assert_eq!(
            headers.get(HEADER_CONTENT_TYPE).map(String::as_str),
            Some("application/json")
        );
    }
}
