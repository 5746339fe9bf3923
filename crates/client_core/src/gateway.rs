//! HTTP access to the projects/tasks/collaborators API.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Project, ProjectId, ProjectSummary, TaskId, UserId},
    error::ApiErrorBody,
    protocol::{
        AddCollaboratorResponse, CollaboratorEmailRequest, CollaboratorSearchResponse,
        CompleteTaskResponse, CreateProjectResponse, MessageResponse, ProjectInput, TaskInput,
        TaskResponse, UpdateProjectResponse,
    },
};
use tracing::debug;

use crate::error::GatewayError;

/// Bearer token for the signed-in user, passed explicitly to every call.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn list_projects(
        &self,
        credential: &Credential,
    ) -> Result<Vec<ProjectSummary>, GatewayError>;
    async fn get_project(
        &self,
        credential: &Credential,
        id: &ProjectId,
    ) -> Result<Project, GatewayError>;
    async fn create_project(
        &self,
        credential: &Credential,
        input: &ProjectInput,
    ) -> Result<CreateProjectResponse, GatewayError>;
    async fn update_project(
        &self,
        credential: &Credential,
        id: &ProjectId,
        input: &ProjectInput,
    ) -> Result<UpdateProjectResponse, GatewayError>;
    async fn delete_project(
        &self,
        credential: &Credential,
        id: &ProjectId,
    ) -> Result<MessageResponse, GatewayError>;
    async fn create_task(
        &self,
        credential: &Credential,
        input: &TaskInput,
    ) -> Result<TaskResponse, GatewayError>;
    async fn update_task(
        &self,
        credential: &Credential,
        id: &TaskId,
        input: &TaskInput,
    ) -> Result<TaskResponse, GatewayError>;
    async fn delete_task(
        &self,
        credential: &Credential,
        id: &TaskId,
    ) -> Result<TaskResponse, GatewayError>;
    async fn complete_task(
        &self,
        credential: &Credential,
        id: &TaskId,
    ) -> Result<CompleteTaskResponse, GatewayError>;
    async fn search_collaborator(
        &self,
        credential: &Credential,
        email: &str,
    ) -> Result<CollaboratorSearchResponse, GatewayError>;
    async fn add_collaborator(
        &self,
        credential: &Credential,
        project_id: &ProjectId,
        email: &str,
    ) -> Result<AddCollaboratorResponse, GatewayError>;
    async fn remove_collaborator(
        &self,
        credential: &Credential,
        project_id: &ProjectId,
        collaborator_id: &UserId,
    ) -> Result<MessageResponse, GatewayError>;
}

pub struct HttpGateway {
    http: Client,
    api_url: String,
}

impl HttpGateway {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), api_url)
    }

    pub fn with_client(http: Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { http, api_url }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn request(&self, method: Method, path: &str, credential: &Credential) -> RequestBuilder {
        debug!("gateway: {method} {path}");
        self.http
            .request(method, format!("{}{path}", self.api_url))
            .bearer_auth(credential.token())
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, GatewayError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.json::<ApiErrorBody>().await.unwrap_or_default();
            debug!(
                "gateway: request failed status={} msg={:?}",
                status.as_u16(),
                body.msg
            );
            return Err(GatewayError::Api {
                status: status.as_u16(),
                msg: body.msg,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|err| GatewayError::Decode(err.to_string()))
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn list_projects(
        &self,
        credential: &Credential,
    ) -> Result<Vec<ProjectSummary>, GatewayError> {
        self.send(self.request(Method::GET, "/proyectos", credential))
            .await
    }

    async fn get_project(
        &self,
        credential: &Credential,
        id: &ProjectId,
    ) -> Result<Project, GatewayError> {
        self.send(self.request(Method::GET, &format!("/proyectos/{id}"), credential))
            .await
    }

    async fn create_project(
        &self,
        credential: &Credential,
        input: &ProjectInput,
    ) -> Result<CreateProjectResponse, GatewayError> {
        self.send(
            self.request(Method::POST, "/proyectos", credential)
                .json(input),
        )
        .await
    }

    async fn update_project(
        &self,
        credential: &Credential,
        id: &ProjectId,
        input: &ProjectInput,
    ) -> Result<UpdateProjectResponse, GatewayError> {
        self.send(
            self.request(Method::PUT, &format!("/proyectos/{id}"), credential)
                .json(input),
        )
        .await
    }

    async fn delete_project(
        &self,
        credential: &Credential,
        id: &ProjectId,
    ) -> Result<MessageResponse, GatewayError> {
        self.send(self.request(Method::DELETE, &format!("/proyectos/{id}"), credential))
            .await
    }

    async fn create_task(
        &self,
        credential: &Credential,
        input: &TaskInput,
    ) -> Result<TaskResponse, GatewayError> {
        self.send(self.request(Method::POST, "/tareas", credential).json(input))
            .await
    }

    async fn update_task(
        &self,
        credential: &Credential,
        id: &TaskId,
        input: &TaskInput,
    ) -> Result<TaskResponse, GatewayError> {
        self.send(
            self.request(Method::PUT, &format!("/tareas/{id}"), credential)
                .json(input),
        )
        .await
    }

    async fn delete_task(
        &self,
        credential: &Credential,
        id: &TaskId,
    ) -> Result<TaskResponse, GatewayError> {
        self.send(self.request(Method::DELETE, &format!("/tareas/{id}"), credential))
            .await
    }

    async fn complete_task(
        &self,
        credential: &Credential,
        id: &TaskId,
    ) -> Result<CompleteTaskResponse, GatewayError> {
        self.send(
            self.request(Method::POST, &format!("/tareas/estado/{id}"), credential)
                .json(&serde_json::json!({})),
        )
        .await
    }

    async fn search_collaborator(
        &self,
        credential: &Credential,
        email: &str,
    ) -> Result<CollaboratorSearchResponse, GatewayError> {
        self.send(
            self.request(Method::POST, "/proyectos/colaboradores", credential)
                .json(&CollaboratorEmailRequest {
                    email: email.to_string(),
                }),
        )
        .await
    }

    async fn add_collaborator(
        &self,
        credential: &Credential,
        project_id: &ProjectId,
        email: &str,
    ) -> Result<AddCollaboratorResponse, GatewayError> {
        self.send(
            self.request(
                Method::POST,
                &format!("/proyectos/colaboradores/{project_id}"),
                credential,
            )
            .json(&CollaboratorEmailRequest {
                email: email.to_string(),
            }),
        )
        .await
    }

    async fn remove_collaborator(
        &self,
        credential: &Credential,
        project_id: &ProjectId,
        collaborator_id: &UserId,
    ) -> Result<MessageResponse, GatewayError> {
        self.send(self.request(
            Method::DELETE,
            &format!("/proyectos/colaboradores/{project_id}/{collaborator_id}"),
            credential,
        ))
        .await
    }
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
