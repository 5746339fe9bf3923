use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(ProjectId);
id_newtype!(TaskId);
id_newtype!(UserId);

/// Full detail record of a project, as returned by `GET /proyectos/{id}`.
///
/// `tareas` and `colaboradores` are `None` when the server did not send the
/// collection at all, which is different from an empty collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(rename = "_id")]
    pub id: ProjectId,
    #[serde(rename = "nombre", default)]
    pub name: String,
    #[serde(rename = "descripcion", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "fechaEntrega", default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(rename = "cliente", default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    #[serde(rename = "creador", default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<UserId>,
    #[serde(rename = "tareas", default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Task>>,
    #[serde(rename = "colaboradores", default, skip_serializing_if = "Option::is_none")]
    pub collaborators: Option<Vec<Collaborator>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// List-view record held in the project collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    #[serde(rename = "_id")]
    pub id: ProjectId,
    #[serde(rename = "nombre", default)]
    pub name: String,
    #[serde(rename = "descripcion", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "fechaEntrega", default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(rename = "cliente", default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    #[serde(rename = "creador", default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<UserId>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<Project> for ProjectSummary {
    fn from(project: Project) -> Self {
        Self {
            id: project.id,
            name: project.name,
            description: project.description,
            deadline: project.deadline,
            client: project.client,
            creator: project.creator,
            extra: project.extra,
        }
    }
}

impl From<ProjectSummary> for Project {
    fn from(summary: ProjectSummary) -> Self {
        Self {
            id: summary.id,
            name: summary.name,
            description: summary.description,
            deadline: summary.deadline,
            client: summary.client,
            creator: summary.creator,
            tasks: None,
            collaborators: None,
            extra: summary.extra,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskPriority {
    #[serde(rename = "Baja")]
    Low,
    #[serde(rename = "Media")]
    Medium,
    #[serde(rename = "Alta")]
    High,
}

/// A task's owning project. The API sends either the bare id or the
/// populated project document depending on the endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProjectRef {
    Id(ProjectId),
    Embedded(Box<ProjectSummary>),
}

impl ProjectRef {
    pub fn id(&self) -> &ProjectId {
        match self {
            ProjectRef::Id(id) => id,
            ProjectRef::Embedded(project) => &project.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserRef {
    Id(UserId),
    User(Collaborator),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "_id")]
    pub id: TaskId,
    #[serde(rename = "nombre", default)]
    pub name: String,
    #[serde(rename = "descripcion", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "estado", default)]
    pub completed: bool,
    #[serde(rename = "fechaEntrega", default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(rename = "prioridad", default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    #[serde(rename = "proyecto", default, skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectRef>,
    #[serde(rename = "completado", default, skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<UserRef>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Task {
    pub fn project_id(&self) -> Option<&ProjectId> {
        self.project.as_ref().map(ProjectRef::id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaborator {
    #[serde(rename = "_id")]
    pub id: UserId,
    #[serde(rename = "nombre", default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// Short-lived banner shown to the user. At most one is visible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub msg: String,
    pub error: bool,
}

impl Alert {
    pub fn info(msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            error: false,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            error: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_without_nested_collections_keeps_them_absent() {
        let project: Project = serde_json::from_value(serde_json::json!({
            "_id": "p1",
            "nombre": "Tienda",
            "cliente": "ACME",
            "__v": 0
        }))
        .expect("project");

        assert_eq!(project.id, ProjectId::new("p1"));
        assert!(project.tasks.is_none());
        assert!(project.collaborators.is_none());
        assert_eq!(project.extra.get("__v"), Some(&serde_json::json!(0)));
    }

    #[test]
    fn task_project_reference_accepts_id_or_document() {
        let by_id: Task = serde_json::from_value(serde_json::json!({
            "_id": "t1",
            "nombre": "Login",
            "estado": false,
            "prioridad": "Alta",
            "proyecto": "p1"
        }))
        .expect("task by id");
        assert_eq!(by_id.project_id(), Some(&ProjectId::new("p1")));
        assert_eq!(by_id.priority, Some(TaskPriority::High));

        let embedded: Task = serde_json::from_value(serde_json::json!({
            "_id": "t2",
            "nombre": "Logout",
            "estado": true,
            "proyecto": { "_id": "p2", "nombre": "Blog" },
            "completado": { "_id": "u1", "nombre": "Ana", "email": "ana@example.com" }
        }))
        .expect("embedded task");
        assert_eq!(embedded.project_id(), Some(&ProjectId::new("p2")));
        assert!(embedded.completed);
        assert!(matches!(embedded.completed_by, Some(UserRef::User(_))));
    }

    #[test]
    fn project_deadline_parses_api_timestamps() {
        let summary: ProjectSummary = serde_json::from_value(serde_json::json!({
            "_id": "p1",
            "nombre": "Tienda",
            "fechaEntrega": "2024-03-01T00:00:00.000Z"
        }))
        .expect("summary");
        assert!(summary.deadline.is_some());
    }
}
