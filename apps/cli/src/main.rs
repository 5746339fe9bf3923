use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use client_core::{
    load_settings, ClientSettings, Credential, DisconnectedRealtimeChannel, HttpGateway, ProjectsClient,
    ProjectsState, RealtimeChannel, RoutineOutcome, WsRealtimeChannel,
};
use shared::{
    domain::{ProjectId, TaskId, TaskPriority, UserId},
    protocol::{PeerEvent, ProjectInput, TaskInput, TaskIntent},
};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    /// Overrides `api_url` from client.toml / the environment.
    #[arg(long)]
    api_url: Option<String>,
    /// Overrides the token from client.toml / the environment.
    #[arg(long)]
    token: Option<String>,
    /// Skip the realtime channel; task announcements are dropped.
    #[arg(long)]
    offline: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct ProjectFields {
    #[arg(long)]
    name: String,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long)]
    client: String,
    /// RFC 3339 timestamp, e.g. 2024-03-01T00:00:00Z
    #[arg(long)]
    deadline: Option<DateTime<Utc>>,
}

impl From<ProjectFields> for ProjectInput {
    fn from(fields: ProjectFields) -> Self {
        ProjectInput {
            name: fields.name,
            description: fields.description,
            deadline: fields.deadline,
            client: fields.client,
        }
    }
}

#[derive(Args, Debug)]
struct TaskFields {
    #[arg(long)]
    project: String,
    #[arg(long)]
    name: String,
    #[arg(long, default_value = "")]
    description: String,
    /// baja, media or alta
    #[arg(long, default_value = "baja", value_parser = parse_priority)]
    priority: TaskPriority,
    #[arg(long)]
    deadline: Option<DateTime<Utc>>,
}

impl From<TaskFields> for TaskInput {
    fn from(fields: TaskFields) -> Self {
        TaskInput {
            name: fields.name,
            description: fields.description,
            deadline: fields.deadline,
            priority: fields.priority,
            project: ProjectId::new(fields.project),
        }
    }
}

fn parse_priority(raw: &str) -> Result<TaskPriority, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "baja" | "low" => Ok(TaskPriority::Low),
        "media" | "medium" => Ok(TaskPriority::Medium),
        "alta" | "high" => Ok(TaskPriority::High),
        other => Err(format!("unknown priority: {other}")),
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    ListProjects,
    OpenProject {
        id: String,
    },
    CreateProject(ProjectFields),
    UpdateProject {
        id: String,
        #[command(flatten)]
        fields: ProjectFields,
    },
    DeleteProject {
        id: String,
    },
    CreateTask(TaskFields),
    UpdateTask {
        id: String,
        #[command(flatten)]
        fields: TaskFields,
    },
    DeleteTask {
        id: String,
        /// Open this project first so the local task list is updated too.
        #[arg(long)]
        project: Option<String>,
    },
    CompleteTask {
        id: String,
    },
    SearchCollaborator {
        email: String,
    },
    AddCollaborator {
        project: String,
        email: String,
    },
    RemoveCollaborator {
        project: String,
        collaborator_id: String,
    },
    /// Open a project and print task changes relayed from other clients.
    Watch {
        project: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(api_url) = cli.api_url {
        settings.api_url = api_url;
    }
    if let Some(token) = cli.token {
        settings.token = Some(token);
    }
    let credential = settings
        .token
        .clone()
        .map(Credential::new)
        .ok_or_else(|| anyhow!("no token configured; set UPTASK_TOKEN or pass --token"))?;

    let (realtime, peer_events) = connect_realtime(cli.offline, &settings).await?;
    let client = ProjectsClient::new_with_alert_settings(
        Arc::new(HttpGateway::new(settings.api_url.clone())),
        realtime,
        settings.alert_delay,
        settings.alert_clear_policy,
    );

    let result = run(&client, &credential, cli.command, peer_events).await;
    client.close_realtime().await;

    let Some(outcome) = result? else {
        return Ok(());
    };
    print_state(&*client.snapshot().await)?;
    if let RoutineOutcome::Failed { message } = outcome {
        bail!("{message}");
    }
    Ok(())
}

/// Runs one command. `None` means the command printed its own output.
async fn run(
    client: &Arc<ProjectsClient>,
    credential: &Credential,
    command: Command,
    peer_events: Option<broadcast::Receiver<PeerEvent>>,
) -> Result<Option<RoutineOutcome>> {
    let outcome = match command {
        Command::ListProjects => client.list_projects(credential).await,
        Command::OpenProject { id } => client.open_project(credential, &ProjectId::new(id)).await,
        Command::CreateProject(fields) => client.create_project(credential, &fields.into()).await,
        Command::UpdateProject { id, fields } => {
            open_first(client, credential, &id).await?;
            client
                .update_open_project(credential, &ProjectId::new(id), &fields.into())
                .await
        }
        Command::DeleteProject { id } => {
            client.delete_project(credential, &ProjectId::new(id)).await
        }
        Command::CreateTask(fields) => {
            open_first(client, credential, &fields.project).await?;
            client
                .submit_task(credential, TaskIntent::Create(fields.into()))
                .await
        }
        Command::UpdateTask { id, fields } => {
            open_first(client, credential, &fields.project).await?;
            let intent = TaskIntent::Update {
                id: TaskId::new(id),
                input: fields.into(),
            };
            client.submit_task(credential, intent).await
        }
        Command::DeleteTask { id, project } => {
            if let Some(project) = project {
                open_first(client, credential, &project).await?;
            }
            client.delete_task(credential, &TaskId::new(id)).await
        }
        Command::CompleteTask { id } => client.complete_task(credential, &TaskId::new(id)).await,
        Command::SearchCollaborator { email } => {
            client.search_collaborator(credential, &email).await
        }
        Command::AddCollaborator { project, email } => {
            open_first(client, credential, &project).await?;
            client.add_collaborator(credential, &email).await
        }
        Command::RemoveCollaborator {
            project,
            collaborator_id,
        } => {
            open_first(client, credential, &project).await?;
            client
                .remove_collaborator(credential, &UserId::new(collaborator_id))
                .await
        }
        Command::Watch { project } => {
            let Some(peer_events) = peer_events else {
                bail!("watch needs the realtime channel; drop --offline");
            };
            open_first(client, credential, &project).await?;
            watch(client, peer_events).await?;
            return Ok(None);
        }
    };
    Ok(Some(outcome))
}

/// The websocket URL is only derived when a connection is attempted.
async fn connect_realtime(
    offline: bool,
    settings: &ClientSettings,
) -> Result<(Arc<dyn RealtimeChannel>, Option<broadcast::Receiver<PeerEvent>>)> {
    if offline {
        return Ok((Arc::new(DisconnectedRealtimeChannel), None));
    }
    let ws_url = settings.realtime_url()?;
    match WsRealtimeChannel::connect(&ws_url).await {
        Ok(channel) => {
            let events = channel.subscribe_peer_events();
            let channel: Arc<dyn RealtimeChannel> = channel;
            Ok((channel, Some(events)))
        }
        Err(err) => {
            warn!("realtime unavailable, continuing without it: {err:#}");
            Ok((Arc::new(DisconnectedRealtimeChannel), None))
        }
    }
}

async fn open_first(client: &ProjectsClient, credential: &Credential, project: &str) -> Result<()> {
    match client.open_project(credential, &ProjectId::new(project)).await {
        RoutineOutcome::Succeeded => Ok(()),
        RoutineOutcome::Failed { message } => {
            Err(anyhow!(message)).with_context(|| format!("could not open project {project}"))
        }
    }
}

async fn watch(
    client: &Arc<ProjectsClient>,
    peer_events: broadcast::Receiver<PeerEvent>,
) -> Result<()> {
    let mut changes = client.subscribe_state();
    let sync = client.spawn_peer_sync(peer_events);
    info!("watching for task changes; ctrl-c to stop");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            change = changes.recv() => match change {
                Ok(change) => {
                    println!("{}", change.transition);
                    print_state(&change.snapshot)?;
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    sync.abort();
    Ok(())
}

fn print_state(state: &ProjectsState) -> Result<()> {
    if let Some(alert) = &state.alert {
        let level = if alert.error { "error" } else { "ok" };
        println!("[{level}] {}", alert.msg);
    }
    if let Some(project) = &state.active_project {
        println!("{}", serde_json::to_string_pretty(project)?);
    } else if !state.projects.is_empty() {
        println!("{}", serde_json::to_string_pretty(&state.projects)?);
    }
    Ok(())
}
