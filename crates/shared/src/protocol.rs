use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Collaborator, ProjectId, ProjectSummary, Task, TaskId, TaskPriority};

/// Body for `POST /proyectos` and `PUT /proyectos/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInput {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "fechaEntrega", default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(rename = "cliente")]
    pub client: String,
}

/// Body for `POST /tareas` and `PUT /tareas/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInput {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "fechaEntrega", default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(rename = "prioridad")]
    pub priority: TaskPriority,
    #[serde(rename = "proyecto")]
    pub project: ProjectId,
}

/// What the task form submits: a new task, or edits to an existing one.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskIntent {
    Create(TaskInput),
    Update { id: TaskId, input: TaskInput },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaboratorEmailRequest {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateProjectResponse {
    #[serde(rename = "proyecto")]
    pub project: ProjectSummary,
    #[serde(default)]
    pub msg: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateProjectResponse {
    #[serde(rename = "proyectoActualizado")]
    pub project: ProjectSummary,
    #[serde(default)]
    pub msg: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub msg: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResponse {
    #[serde(rename = "tarea")]
    pub task: Task,
    #[serde(default)]
    pub msg: String,
}

/// `POST /tareas/estado/{id}` answers with a loosely shaped document that is
/// forwarded to peers untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompleteTaskResponse(pub Value);

impl CompleteTaskResponse {
    pub fn msg(&self) -> Option<&str> {
        self.0.get("msg").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaboratorSearchResponse {
    #[serde(flatten)]
    pub collaborator: Collaborator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddCollaboratorResponse {
    #[serde(rename = "usuario")]
    pub user: Collaborator,
    #[serde(default)]
    pub msg: String,
}

/// Announcements this client pushes to the realtime channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum RealtimeEvent {
    #[serde(rename = "abrir-proyecto")]
    OpenProject(ProjectId),
    #[serde(rename = "nueva-tarea")]
    NewTask(Task),
    #[serde(rename = "actualizar-tarea")]
    UpdateTask(Task),
    #[serde(rename = "eliminar-tarea")]
    DeleteTask(Task),
    #[serde(rename = "completar-tarea")]
    CompleteTask(Value),
}

impl RealtimeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RealtimeEvent::OpenProject(_) => "abrir-proyecto",
            RealtimeEvent::NewTask(_) => "nueva-tarea",
            RealtimeEvent::UpdateTask(_) => "actualizar-tarea",
            RealtimeEvent::DeleteTask(_) => "eliminar-tarea",
            RealtimeEvent::CompleteTask(_) => "completar-tarea",
        }
    }
}

/// Events the server relays from other clients viewing the same project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum PeerEvent {
    #[serde(rename = "tarea-agregada")]
    TaskAdded(Task),
    #[serde(rename = "tarea-actualizada")]
    TaskUpdated(Task),
    #[serde(rename = "tarea-eliminada")]
    TaskDeleted(Task),
    #[serde(rename = "nuevo-estado")]
    TaskStatusChanged(Task),
}

impl PeerEvent {
    pub fn task(&self) -> &Task {
        match self {
            PeerEvent::TaskAdded(task)
            | PeerEvent::TaskUpdated(task)
            | PeerEvent::TaskDeleted(task)
            | PeerEvent::TaskStatusChanged(task) => task,
        }
    }
}
