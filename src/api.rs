use crate::model::{
    Category, CategoryCreate, Credentials, Task, TaskCreate, TaskId, TaskUpdate, TokenResponse,
};
use log::{debug, info};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 10;
const USERNAME_TAKEN_DETAIL: &str = "Username already registered";

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("username already registered")]
    UsernameTaken,
    #[error("incorrect username or password")]
    InvalidCredentials,
    #[error("session expired or invalid, log in again")]
    Unauthorized,
    #[error("not logged in")]
    NotLoggedIn,
    #[error("{0} not found")]
    NotFound(String),
    #[error("server responded {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Register,
    Login,
    Collection,
    Task(TaskId),
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(ApiClient {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn register(&self, credentials: &Credentials) -> Result<TokenResponse, ApiError> {
        let req = self.request(Method::POST, "/register").json(credentials);
        self.send(req, Endpoint::Register)
    }

    pub fn login(&self, credentials: &Credentials) -> Result<TokenResponse, ApiError> {
        let req = self.request(Method::POST, "/login").json(credentials);
        self.send(req, Endpoint::Login)
    }

    pub fn list_tasks(&self) -> Result<Vec<Task>, ApiError> {
        let req = self.authorized(Method::GET, "/tasks")?;
        let tasks: Vec<Task> = self.send(req, Endpoint::Collection)?;
        info!("event=tasks_fetched module=api count={}", tasks.len());
        Ok(tasks)
    }

    pub fn create_task(&self, task: &TaskCreate) -> Result<Task, ApiError> {
        let req = self.authorized(Method::POST, "/tasks")?.json(task);
        let created: Task = self.send(req, Endpoint::Collection)?;
        info!("event=task_created module=api id={}", created.id);
        Ok(created)
    }

    pub fn update_task(&self, id: TaskId, update: &TaskUpdate) -> Result<Task, ApiError> {
        let req = self
            .authorized(Method::PUT, &format!("/tasks/{id}"))?
            .json(update);
        let updated: Task = self.send(req, Endpoint::Task(id))?;
        info!("event=task_updated module=api id={}", id);
        Ok(updated)
    }

    pub fn delete_task(&self, id: TaskId) -> Result<(), ApiError> {
        let req = self.authorized(Method::DELETE, &format!("/tasks/{id}"))?;
        let _: serde_json::Value = self.send(req, Endpoint::Task(id))?;
        info!("event=task_deleted module=api id={}", id);
        Ok(())
    }

    pub fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        let req = self.authorized(Method::GET, "/categories")?;
        let categories: Vec<Category> = self.send(req, Endpoint::Collection)?;
        info!("event=categories_fetched module=api count={}", categories.len());
        Ok(categories)
    }

    pub fn create_category(&self, category: &CategoryCreate) -> Result<Category, ApiError> {
        let req = self.authorized(Method::POST, "/categories")?.json(category);
        self.send(req, Endpoint::Collection)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        debug!("event=request module=api method={} path={}", method, path);
        self.http.request(method, format!("{}{}", self.base_url, path))
    }

    fn authorized(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let token = self.token.as_deref().ok_or(ApiError::NotLoggedIn)?;
        Ok(self.request(method, path).bearer_auth(token))
    }

    fn send<T: DeserializeOwned>(&self, req: RequestBuilder, endpoint: Endpoint) -> Result<T, ApiError> {
        let resp = req.send()?;
        if resp.status().is_success() {
            return Ok(resp.json()?);
        }
        Err(error_from_response(resp, endpoint))
    }
}

fn error_from_response(resp: Response, endpoint: Endpoint) -> ApiError {
    let status = resp.status().as_u16();
    let body = resp.text().unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&body)
        .map(|err| match err.detail {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
        .unwrap_or(body);
    debug!(
        "event=request_failed module=api status={} detail={:?}",
        status, detail
    );
    classify(endpoint, status, detail)
}

fn classify(endpoint: Endpoint, status: u16, detail: String) -> ApiError {
    match (endpoint, status) {
        (Endpoint::Register, 400) if detail == USERNAME_TAKEN_DETAIL => ApiError::UsernameTaken,
        (Endpoint::Login, 401) => ApiError::InvalidCredentials,
        (_, 401) => ApiError::Unauthorized,
        (Endpoint::Task(id), 404) => ApiError::NotFound(format!("task {id}")),
        _ => ApiError::Status { status, detail },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_registration_is_recognized() {
        let err = classify(Endpoint::Register, 400, USERNAME_TAKEN_DETAIL.into());
        assert!(matches!(err, ApiError::UsernameTaken));
    }

    #[test]
    fn other_registration_failures_keep_detail() {
        let err = classify(Endpoint::Register, 400, "bad".into());
        assert!(matches!(err, ApiError::Status { status: 400, ref detail } if detail == "bad"));
    }

    #[test]
    fn unauthorized_depends_on_endpoint() {
        assert!(matches!(
            classify(Endpoint::Login, 401, String::new()),
            ApiError::InvalidCredentials
        ));
        assert!(matches!(
            classify(Endpoint::Collection, 401, String::new()),
            ApiError::Unauthorized
        ));
    }

    #[test]
    fn missing_task_names_the_id() {
        let err = classify(Endpoint::Task(TaskId(12)), 404, "Task not found".into());
        assert_eq!(err.to_string(), "task 12 not found");
    }

    #[test]
    fn authenticated_calls_require_a_token() {
        let client = ApiClient::new("http://localhost:8000/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert!(matches!(client.list_tasks(), Err(ApiError::NotLoggedIn)));
    }
}
