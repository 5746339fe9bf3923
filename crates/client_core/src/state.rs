//! Snapshot of everything the client mirrors from the API, plus the named
//! transitions that are the only way to move from one snapshot to the next.

use std::sync::Arc;

use shared::domain::{Alert, Collaborator, Project, ProjectId, ProjectSummary, Task, TaskId, UserId};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

/// A task or collaborator transition ran against a project that is not there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PreconditionGap {
    #[error("no active project is open")]
    NoActiveProject,
    #[error("active project has no task collection loaded")]
    MissingTasks,
    #[error("active project has no collaborator collection loaded")]
    MissingCollaborators,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectsState {
    pub projects: Vec<ProjectSummary>,
    pub active_project: Option<Project>,
    pub project_search_modal_visible: bool,
    pub editing_task: Option<Task>,
    pub alert: Option<Alert>,
    pub task_modal_visible: bool,
    pub collaborator_candidate: Option<Collaborator>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    SetProjectList(Vec<ProjectSummary>),
    AppendProject(ProjectSummary),
    SetActiveProject(Option<Project>),
    RemoveProjectById(ProjectId),
    ReplaceProjectById(ProjectSummary),
    SetAlert(Option<Alert>),
    SetTaskModalVisible(bool),
    SetProjectSearchModalVisible(bool),
    AppendTask(Task),
    SetEditingTask(Option<Task>),
    ReplaceTaskById(Task),
    RemoveTaskById(TaskId),
    SetCollaboratorCandidate(Option<Collaborator>),
    RemoveCollaboratorById(UserId),
    ReplaceCollaboratorById(Collaborator),
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::SetProjectList(_) => "set_project_list",
            Transition::AppendProject(_) => "append_project",
            Transition::SetActiveProject(_) => "set_active_project",
            Transition::RemoveProjectById(_) => "remove_project_by_id",
            Transition::ReplaceProjectById(_) => "replace_project_by_id",
            Transition::SetAlert(_) => "set_alert",
            Transition::SetTaskModalVisible(_) => "set_task_modal_visible",
            Transition::SetProjectSearchModalVisible(_) => "set_project_search_modal_visible",
            Transition::AppendTask(_) => "append_task",
            Transition::SetEditingTask(_) => "set_editing_task",
            Transition::ReplaceTaskById(_) => "replace_task_by_id",
            Transition::RemoveTaskById(_) => "remove_task_by_id",
            Transition::SetCollaboratorCandidate(_) => "set_collaborator_candidate",
            Transition::RemoveCollaboratorById(_) => "remove_collaborator_by_id",
            Transition::ReplaceCollaboratorById(_) => "replace_collaborator_by_id",
        }
    }
}

impl ProjectsState {
    /// Computes the snapshot that follows `transition`. `self` is left as is.
    pub fn apply(&self, transition: Transition) -> Result<ProjectsState, PreconditionGap> {
        let mut next = self.clone();
        match transition {
            Transition::SetProjectList(projects) => next.projects = projects,
            Transition::AppendProject(project) => next.projects.push(project),
            Transition::SetActiveProject(project) => next.active_project = project,
            Transition::RemoveProjectById(id) => next.projects.retain(|p| p.id != id),
            Transition::ReplaceProjectById(project) => {
                if let Some(slot) = next.projects.iter_mut().find(|p| p.id == project.id) {
                    *slot = project;
                }
            }
            Transition::SetAlert(alert) => next.alert = alert,
            Transition::SetTaskModalVisible(visible) => next.task_modal_visible = visible,
            Transition::SetProjectSearchModalVisible(visible) => {
                next.project_search_modal_visible = visible
            }
            Transition::AppendTask(task) => tasks_mut(&mut next)?.push(task),
            Transition::SetEditingTask(task) => next.editing_task = task,
            Transition::ReplaceTaskById(task) => {
                if let Some(slot) = tasks_mut(&mut next)?.iter_mut().find(|t| t.id == task.id) {
                    *slot = task;
                }
            }
            Transition::RemoveTaskById(id) => tasks_mut(&mut next)?.retain(|t| t.id != id),
            Transition::SetCollaboratorCandidate(candidate) => {
                next.collaborator_candidate = candidate
            }
            Transition::RemoveCollaboratorById(id) => {
                collaborators_mut(&mut next)?.retain(|c| c.id != id);
                next.collaborator_candidate = None;
            }
            Transition::ReplaceCollaboratorById(collaborator) => {
                if let Some(slot) = collaborators_mut(&mut next)?
                    .iter_mut()
                    .find(|c| c.id == collaborator.id)
                {
                    *slot = collaborator;
                }
                next.collaborator_candidate = None;
            }
        }
        Ok(next)
    }

    pub fn active_project_id(&self) -> Option<&ProjectId> {
        self.active_project.as_ref().map(|p| &p.id)
    }
}

fn tasks_mut(state: &mut ProjectsState) -> Result<&mut Vec<Task>, PreconditionGap> {
    state
        .active_project
        .as_mut()
        .ok_or(PreconditionGap::NoActiveProject)?
        .tasks
        .as_mut()
        .ok_or(PreconditionGap::MissingTasks)
}

fn collaborators_mut(state: &mut ProjectsState) -> Result<&mut Vec<Collaborator>, PreconditionGap> {
    state
        .active_project
        .as_mut()
        .ok_or(PreconditionGap::NoActiveProject)?
        .collaborators
        .as_mut()
        .ok_or(PreconditionGap::MissingCollaborators)
}

/// Published after every transition that was applied.
#[derive(Debug, Clone)]
pub struct StateChange {
    pub transition: &'static str,
    pub snapshot: Arc<ProjectsState>,
}

/// Holds the current snapshot and swaps it whole on every dispatch.
pub struct StateStore {
    current: Mutex<Arc<ProjectsState>>,
    changes: broadcast::Sender<StateChange>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(ProjectsState::default())
    }
}

impl StateStore {
    pub fn new(initial: ProjectsState) -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            current: Mutex::new(Arc::new(initial)),
            changes,
        }
    }

    pub async fn snapshot(&self) -> Arc<ProjectsState> {
        Arc::clone(&*self.current.lock().await)
    }

    /// Applies `transition`. On a precondition gap the stored snapshot is
    /// not touched and the gap is returned.
    pub async fn dispatch(&self, transition: Transition) -> Result<Arc<ProjectsState>, PreconditionGap> {
        let name = transition.name();
        let snapshot = {
            let mut guard = self.current.lock().await;
            let next = Arc::new(guard.apply(transition)?);
            *guard = Arc::clone(&next);
            next
        };
        debug!("state: applied transition={name}");
        let _ = self.changes.send(StateChange {
            transition: name,
            snapshot: Arc::clone(&snapshot),
        });
        Ok(snapshot)
    }

    /// Derives a transition from the current snapshot and applies it while
    /// holding the store, so no other dispatch can interleave in between.
    pub async fn dispatch_derived(
        &self,
        derive: impl FnOnce(&ProjectsState) -> Option<Transition>,
    ) -> Result<Option<Arc<ProjectsState>>, PreconditionGap> {
        let (name, snapshot) = {
            let mut guard = self.current.lock().await;
            let Some(transition) = derive(&guard) else {
                return Ok(None);
            };
            let name = transition.name();
            let next = Arc::new(guard.apply(transition)?);
            *guard = Arc::clone(&next);
            (name, next)
        };
        debug!("state: applied derived transition={name}");
        let _ = self.changes.send(StateChange {
            transition: name,
            snapshot: Arc::clone(&snapshot),
        });
        Ok(Some(snapshot))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod tests;
