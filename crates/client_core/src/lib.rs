use std::{sync::Arc, time::Duration};

use shared::{
    domain::{Alert, ProjectId, ProjectSummary, Task, TaskId, UserId},
    protocol::{PeerEvent, ProjectInput, RealtimeEvent, TaskIntent},
};
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{info, warn};

pub mod alert;
pub mod config;
pub mod error;
pub mod gateway;
pub mod peer;
pub mod realtime;
pub mod state;

pub use alert::{AlertClearPolicy, AlertTimer, DEFAULT_ALERT_DELAY};
pub use config::{load_settings, ClientSettings};
pub use error::{ClientError, GatewayError};
pub use gateway::{Credential, HttpGateway, RemoteGateway};
pub use realtime::{DisconnectedRealtimeChannel, RealtimeChannel, WsRealtimeChannel};
pub use state::{PreconditionGap, ProjectsState, StateChange, StateStore, Transition};

/// How a routine ended. Failures have already been shown as an error alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutineOutcome {
    Succeeded,
    Failed { message: String },
}

impl RoutineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RoutineOutcome::Succeeded)
    }
}

/// Keeps the local mirror of projects, tasks and collaborators in step with
/// the API and with the realtime channel.
///
/// Every routine issues at most one API request, applies the confirmed
/// result to the store, announces task changes to peers and reports the
/// outcome through an alert. Routines never return errors; a failed routine
/// leaves entity state exactly as it found it.
pub struct ProjectsClient {
    store: Arc<StateStore>,
    alerts: AlertTimer,
    gateway: Arc<dyn RemoteGateway>,
    realtime: Arc<dyn RealtimeChannel>,
}

impl ProjectsClient {
    pub fn new(gateway: Arc<dyn RemoteGateway>, realtime: Arc<dyn RealtimeChannel>) -> Arc<Self> {
        Self::new_with_alert_settings(
            gateway,
            realtime,
            DEFAULT_ALERT_DELAY,
            AlertClearPolicy::default(),
        )
    }

    pub fn new_with_alert_settings(
        gateway: Arc<dyn RemoteGateway>,
        realtime: Arc<dyn RealtimeChannel>,
        alert_delay: Duration,
        alert_clear_policy: AlertClearPolicy,
    ) -> Arc<Self> {
        let store = Arc::new(StateStore::default());
        Arc::new(Self {
            alerts: AlertTimer::new(Arc::clone(&store), alert_delay, alert_clear_policy),
            store,
            gateway,
            realtime,
        })
    }

    pub async fn snapshot(&self) -> Arc<ProjectsState> {
        self.store.snapshot().await
    }

    pub fn subscribe_state(&self) -> broadcast::Receiver<StateChange> {
        self.store.subscribe()
    }

    pub async fn raise_alert(&self, alert: Alert) {
        self.alerts.raise(alert).await;
    }

    async fn succeed(&self, routine: &'static str, msg: String) -> RoutineOutcome {
        info!("routine: {routine} succeeded");
        self.alerts.raise(Alert::info(msg)).await;
        RoutineOutcome::Succeeded
    }

    async fn fail(&self, routine: &'static str, err: ClientError) -> RoutineOutcome {
        warn!("routine: {routine} failed: {err}");
        let message = err.alert_message();
        self.alerts.raise(Alert::error(message.clone())).await;
        RoutineOutcome::Failed { message }
    }

    /// Applies a transition for a result the server already confirmed. A
    /// precondition gap here is logged only: the server-side change stands.
    async fn apply_confirmed(&self, routine: &'static str, transition: Transition) {
        let name = transition.name();
        if let Err(gap) = self.store.dispatch(transition).await {
            warn!("routine: {routine} confirmed but {name} skipped: {gap}");
        }
    }

    async fn announce(&self, event: RealtimeEvent) {
        let name = event.name();
        if let Err(err) = self.realtime.emit(event).await {
            warn!("realtime: emit failed event={name}: {err}");
        }
    }

    async fn active_project_id(&self) -> Result<ProjectId, PreconditionGap> {
        self.store
            .snapshot()
            .await
            .active_project_id()
            .cloned()
            .ok_or(PreconditionGap::NoActiveProject)
    }

    pub async fn list_projects(&self, credential: &Credential) -> RoutineOutcome {
        match self.gateway.list_projects(credential).await {
            Ok(projects) => {
                info!("routine: list_projects loaded count={}", projects.len());
                self.apply_confirmed("list_projects", Transition::SetProjectList(projects))
                    .await;
                RoutineOutcome::Succeeded
            }
            Err(err) => self.fail("list_projects", err.into()).await,
        }
    }

    pub async fn open_project(&self, credential: &Credential, id: &ProjectId) -> RoutineOutcome {
        match self.gateway.get_project(credential, id).await {
            Ok(project) => {
                info!("routine: open_project loaded id={id}");
                self.apply_confirmed("open_project", Transition::SetActiveProject(Some(project)))
                    .await;
                self.announce(RealtimeEvent::OpenProject(id.clone())).await;
                RoutineOutcome::Succeeded
            }
            Err(err) => self.fail("open_project", err.into()).await,
        }
    }

    pub async fn create_project(
        &self,
        credential: &Credential,
        input: &ProjectInput,
    ) -> RoutineOutcome {
        match self.gateway.create_project(credential, input).await {
            Ok(created) => {
                self.apply_confirmed("create_project", Transition::AppendProject(created.project))
                    .await;
                self.succeed("create_project", created.msg).await
            }
            Err(err) => self.fail("create_project", err.into()).await,
        }
    }

    /// Applies a confirmed transition derived from the snapshot it will be
    /// applied to, so the decision and the swap cannot be interleaved.
    async fn apply_confirmed_derived(
        &self,
        routine: &'static str,
        derive: impl FnOnce(&ProjectsState) -> Option<Transition>,
    ) {
        if let Err(gap) = self.store.dispatch_derived(derive).await {
            warn!("routine: {routine} confirmed but derived transition skipped: {gap}");
        }
    }

    /// Replaces the list entry and, when it is the open project, the active
    /// detail as well. The API answers with the bare project document, so
    /// the open project's tasks and collaborators count as not loaded until
    /// it is opened again; see [`ProjectsClient::update_open_project`].
    pub async fn update_project(
        &self,
        credential: &Credential,
        id: &ProjectId,
        input: &ProjectInput,
    ) -> RoutineOutcome {
        match self.gateway.update_project(credential, id, input).await {
            Ok(updated) => {
                let summary = updated.project;
                self.apply_confirmed(
                    "update_project",
                    Transition::ReplaceProjectById(summary.clone()),
                )
                .await;
                self.apply_confirmed_derived("update_project", |state| {
                    let open = state.active_project_id() == Some(&summary.id);
                    open.then(|| Transition::SetActiveProject(Some(summary.into())))
                })
                .await;
                self.succeed("update_project", updated.msg).await
            }
            Err(err) => self.fail("update_project", err.into()).await,
        }
    }

    /// Updates a project and, when it was the open one, loads its detail
    /// again so task and collaborator routines have collections to work on.
    pub async fn update_open_project(
        &self,
        credential: &Credential,
        id: &ProjectId,
        input: &ProjectInput,
    ) -> RoutineOutcome {
        let outcome = self.update_project(credential, id, input).await;
        let stale = self
            .store
            .snapshot()
            .await
            .active_project
            .as_ref()
            .is_some_and(|p| p.id == *id && p.tasks.is_none());
        if !outcome.is_success() || !stale {
            return outcome;
        }
        self.open_project(credential, id).await
    }

    pub async fn delete_project(&self, credential: &Credential, id: &ProjectId) -> RoutineOutcome {
        match self.gateway.delete_project(credential, id).await {
            Ok(deleted) => {
                self.apply_confirmed("delete_project", Transition::RemoveProjectById(id.clone()))
                    .await;
                self.apply_confirmed_derived("delete_project", |state| {
                    let open = state.active_project_id() == Some(id);
                    open.then_some(Transition::SetActiveProject(None))
                })
                .await;
                self.succeed("delete_project", deleted.msg).await
            }
            Err(err) => self.fail("delete_project", err.into()).await,
        }
    }

    pub async fn submit_task(&self, credential: &Credential, intent: TaskIntent) -> RoutineOutcome {
        match intent {
            TaskIntent::Create(input) => match self.gateway.create_task(credential, &input).await {
                Ok(created) => {
                    self.apply_confirmed("create_task", Transition::AppendTask(created.task.clone()))
                        .await;
                    self.announce(RealtimeEvent::NewTask(created.task)).await;
                    self.succeed("create_task", created.msg).await
                }
                Err(err) => self.fail("create_task", err.into()).await,
            },
            TaskIntent::Update { id, input } => {
                match self.gateway.update_task(credential, &id, &input).await {
                    Ok(updated) => {
                        self.apply_confirmed(
                            "update_task",
                            Transition::ReplaceTaskById(updated.task.clone()),
                        )
                        .await;
                        self.announce(RealtimeEvent::UpdateTask(updated.task)).await;
                        self.succeed("update_task", updated.msg).await
                    }
                    Err(err) => self.fail("update_task", err.into()).await,
                }
            }
        }
    }

    pub async fn delete_task(&self, credential: &Credential, id: &TaskId) -> RoutineOutcome {
        match self.gateway.delete_task(credential, id).await {
            Ok(deleted) => {
                self.apply_confirmed("delete_task", Transition::RemoveTaskById(id.clone()))
                    .await;
                self.announce(RealtimeEvent::DeleteTask(deleted.task)).await;
                self.succeed("delete_task", deleted.msg).await
            }
            Err(err) => self.fail("delete_task", err.into()).await,
        }
    }

    /// Only announces the new status; the task itself is updated when the
    /// server relays it back as a peer event.
    pub async fn complete_task(&self, credential: &Credential, id: &TaskId) -> RoutineOutcome {
        match self.gateway.complete_task(credential, id).await {
            Ok(completed) => {
                let msg = completed.msg().unwrap_or_default().to_string();
                self.announce(RealtimeEvent::CompleteTask(completed.0)).await;
                self.succeed("complete_task", msg).await
            }
            Err(err) => self.fail("complete_task", err.into()).await,
        }
    }

    pub async fn search_collaborator(&self, credential: &Credential, email: &str) -> RoutineOutcome {
        match self.gateway.search_collaborator(credential, email).await {
            Ok(found) => {
                self.apply_confirmed(
                    "search_collaborator",
                    Transition::SetCollaboratorCandidate(Some(found.collaborator)),
                )
                .await;
                self.succeed("search_collaborator", found.msg.unwrap_or_default())
                    .await
            }
            Err(err) => {
                self.clear_candidate().await;
                self.fail("search_collaborator", err.into()).await
            }
        }
    }

    pub async fn add_collaborator(&self, credential: &Credential, email: &str) -> RoutineOutcome {
        let project_id = match self.active_project_id().await {
            Ok(id) => id,
            Err(gap) => {
                self.clear_candidate().await;
                return self.fail("add_collaborator", gap.into()).await;
            }
        };

        match self
            .gateway
            .add_collaborator(credential, &project_id, email)
            .await
        {
            Ok(added) => {
                if let Err(gap) = self
                    .store
                    .dispatch(Transition::ReplaceCollaboratorById(added.user))
                    .await
                {
                    warn!("routine: add_collaborator confirmed but collaborators not updated: {gap}");
                    self.clear_candidate().await;
                }
                self.succeed("add_collaborator", added.msg).await
            }
            Err(err) => {
                self.clear_candidate().await;
                self.fail("add_collaborator", err.into()).await
            }
        }
    }

    pub async fn remove_collaborator(
        &self,
        credential: &Credential,
        collaborator_id: &UserId,
    ) -> RoutineOutcome {
        let project_id = match self.active_project_id().await {
            Ok(id) => id,
            Err(gap) => return self.fail("remove_collaborator", gap.into()).await,
        };

        match self
            .gateway
            .remove_collaborator(credential, &project_id, collaborator_id)
            .await
        {
            Ok(removed) => {
                self.apply_confirmed(
                    "remove_collaborator",
                    Transition::RemoveCollaboratorById(collaborator_id.clone()),
                )
                .await;
                self.succeed("remove_collaborator", removed.msg).await
            }
            Err(err) => self.fail("remove_collaborator", err.into()).await,
        }
    }

    async fn clear_candidate(&self) {
        let _ = self
            .store
            .dispatch(Transition::SetCollaboratorCandidate(None))
            .await;
    }

    /// Flushes pending realtime announcements and ends the realtime session.
    pub async fn close_realtime(&self) {
        self.realtime.close().await;
    }

    /// Forgets every project the signed-out user could see.
    pub async fn close_session(&self) {
        self.apply_confirmed("close_session", Transition::SetProjectList(Vec::new()))
            .await;
        self.apply_confirmed("close_session", Transition::SetActiveProject(None))
            .await;
        info!("routine: close_session cleared projects");
    }

    pub async fn show_task_modal(&self) {
        let _ = self.store.dispatch(Transition::SetTaskModalVisible(true)).await;
        let _ = self.store.dispatch(Transition::SetEditingTask(None)).await;
    }

    pub async fn close_task_modal(&self) {
        let _ = self.store.dispatch(Transition::SetTaskModalVisible(false)).await;
        let _ = self.store.dispatch(Transition::SetEditingTask(None)).await;
    }

    pub async fn edit_task(&self, task: Task) {
        let _ = self.store.dispatch(Transition::SetEditingTask(Some(task))).await;
        let _ = self.store.dispatch(Transition::SetTaskModalVisible(true)).await;
    }

    pub async fn show_project_search(&self) {
        let _ = self
            .store
            .dispatch(Transition::SetProjectSearchModalVisible(true))
            .await;
    }

    pub async fn close_project_search(&self) {
        let _ = self
            .store
            .dispatch(Transition::SetProjectSearchModalVisible(false))
            .await;
    }

    /// Applies a task change relayed from another client. Returns whether
    /// local state changed.
    pub async fn apply_peer_event(&self, event: PeerEvent) -> bool {
        match self
            .store
            .dispatch_derived(|state| peer::peer_transition(state, event))
            .await
        {
            Ok(applied) => applied.is_some(),
            Err(gap) => {
                warn!("realtime: peer event skipped: {gap}");
                false
            }
        }
    }

    pub fn spawn_peer_sync(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<PeerEvent>,
    ) -> JoinHandle<()> {
        let client = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        client.apply_peer_event(event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("realtime: peer sync lagged skipped={skipped}");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Project list as last loaded, for callers that only need summaries.
    pub async fn projects(&self) -> Vec<ProjectSummary> {
        self.store.snapshot().await.projects.clone()
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
