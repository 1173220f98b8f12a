use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::task::{Task, TaskBody};

const SIGNUP_MARKER: &str = "User signed up successfully";
const SIGNIN_MARKER: &str = "User Signed in succesfully";
const LIST_MARKER: &str = "Fetched tasks successfully";
const CREATE_MARKER: &str = "Task created successfully";

/// A call that hit its success marker.
#[derive(Debug)]
pub struct Reply<T> {
    pub message: &'static str,
    pub data: T,
}

/// A call that did not. The error is kept for logging, the message is for the user.
#[derive(Debug)]
pub struct Failure {
    pub message: &'static str,
    pub error: ApiError,
}

pub type Outcome<T> = Result<Reply<T>, Failure>;

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

/// Every endpoint answers with some subset of these fields.
#[derive(Debug, Default, Deserialize)]
struct Envelope {
    message: Option<String>,
    token: Option<String>,
    tasks: Option<Vec<Task>>,
    status: Option<u16>,
}

impl Envelope {
    fn expect_message(&self, marker: &str) -> Result<(), ApiError> {
        match self.message.as_deref() {
            Some(message) if message == marker => Ok(()),
            other => Err(ApiError::UnexpectedResponse(format!(
                "expected message {marker:?}, got {other:?}"
            ))),
        }
    }

    fn expect_ok_status(&self) -> Result<(), ApiError> {
        match self.status {
            Some(200) => Ok(()),
            other => Err(ApiError::UnexpectedResponse(format!(
                "expected status 200, got {other:?}"
            ))),
        }
    }
}

/// Thin client for the task service. One attempt per call; failures are folded
/// into [`Failure`] instead of being returned as errors.
#[derive(Debug, Clone)]
pub struct TaskClient {
    http: Client,
    base_url: String,
}

impl TaskClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn exchange(&self, op: &str, request: RequestBuilder) -> Result<Envelope, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        debug!(op, %status, "response received");
        if !status.is_success() {
            return Err(ApiError::Status(status));
        }
        response
            .json::<Envelope>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub async fn signup(&self, email: &str, password: &str) -> Outcome<()> {
        let request = self
            .http
            .post(self.url("/api/user/signup"))
            .json(&Credentials { email, password });
        let result = self
            .exchange("signup", request)
            .await
            .and_then(|envelope| envelope.expect_message(SIGNUP_MARKER));
        settle("signup", result, "Signup successful", "Failed to Signup")
    }

    /// Returns the issued credential on success.
    pub async fn signin(&self, email: &str, password: &str) -> Outcome<String> {
        let request = self
            .http
            .post(self.url("/api/user/signin"))
            .json(&Credentials { email, password });
        let result = self.exchange("signin", request).await.and_then(|envelope| {
            envelope.expect_message(SIGNIN_MARKER)?;
            envelope
                .token
                .ok_or_else(|| ApiError::UnexpectedResponse("no token in signin response".into()))
        });
        settle("signin", result, "Signin successful", "Failed to Signin")
    }

    pub async fn list(&self, token: &str) -> Outcome<Vec<Task>> {
        let request = self.http.get(self.url("/api/task")).bearer_auth(token);
        let result = self.exchange("list", request).await.and_then(|envelope| {
            envelope.expect_message(LIST_MARKER)?;
            Ok(envelope.tasks.unwrap_or_default())
        });
        settle(
            "list",
            result,
            "Tasks fetched successfully",
            "Failed to fetch tasks",
        )
    }

    pub async fn create(&self, token: &str, body: &TaskBody) -> Outcome<()> {
        let request = self
            .http
            .post(self.url("/api/task"))
            .bearer_auth(token)
            .json(body);
        let result = self
            .exchange("create", request)
            .await
            .and_then(|envelope| envelope.expect_message(CREATE_MARKER));
        settle(
            "create",
            result,
            "Task created successfully",
            "Failed to create task",
        )
    }

    pub async fn update(&self, token: &str, id: &str, body: &TaskBody) -> Outcome<()> {
        let request = self
            .http
            .put(self.url(&format!("/api/task/{id}")))
            .bearer_auth(token)
            .json(body);
        let result = self
            .exchange("update", request)
            .await
            .and_then(|envelope| envelope.expect_ok_status());
        settle(
            "update",
            result,
            "Task updated successfully",
            "Failed to update task",
        )
    }

    pub async fn delete(&self, token: &str, id: &str) -> Outcome<()> {
        let request = self
            .http
            .delete(self.url(&format!("/api/task/{id}")))
            .bearer_auth(token);
        let result = self
            .exchange("delete", request)
            .await
            .and_then(|envelope| envelope.expect_ok_status());
        settle(
            "delete",
            result,
            "Task deleted successfully",
            "Failed to delete task",
        )
    }
}

fn settle<T>(
    op: &str,
    result: Result<T, ApiError>,
    success: &'static str,
    failure: &'static str,
) -> Outcome<T> {
    match result {
        Ok(data) => {
            debug!(op, "remote call succeeded");
            Ok(Reply {
                message: success,
                data,
            })
        }
        Err(error) => {
            warn!(op, %error, "remote call failed");
            Err(Failure {
                message: failure,
                error,
            })
        }
    }
}
