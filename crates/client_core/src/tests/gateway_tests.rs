use super::*;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone, Default)]
struct Recorded {
    authorization: Arc<Mutex<Option<String>>>,
    body: Arc<Mutex<Option<Value>>>,
    path_ids: Arc<Mutex<Vec<String>>>,
}

async fn handle_list(State(state): State<Recorded>, headers: HeaderMap) -> Json<Value> {
    *state.authorization.lock().await = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    Json(json!([
        { "_id": "p1", "nombre": "Tienda", "cliente": "ACME" },
        { "_id": "p2", "nombre": "Blog" }
    ]))
}

async fn handle_missing_project(Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "msg": format!("Proyecto {id} no encontrado") })),
    )
}

async fn handle_complete_fails() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn handle_add_collaborator(
    State(state): State<Recorded>,
    Path(project_id): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.path_ids.lock().await.push(project_id);
    *state.body.lock().await = Some(body);
    Json(json!({
        "usuario": { "_id": "u9", "nombre": "Eva", "email": "eva@example.com" },
        "msg": "Colaborador agregado correctamente"
    }))
}

async fn handle_remove_collaborator(
    State(state): State<Recorded>,
    Path((project_id, collaborator_id)): Path<(String, String)>,
) -> Json<Value> {
    state
        .path_ids
        .lock()
        .await
        .extend([project_id, collaborator_id]);
    Json(json!({ "msg": "Colaborador eliminado correctamente" }))
}

async fn spawn_api_server() -> (String, Recorded) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let state = Recorded::default();
    let app = Router::new()
        .route("/proyectos", get(handle_list))
        .route(
            "/proyectos/colaboradores/:project_id",
            post(handle_add_collaborator),
        )
        .route(
            "/proyectos/colaboradores/:project_id/:collaborator_id",
            delete(handle_remove_collaborator),
        )
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), state)
}

async fn spawn_failing_server() -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new()
        .route("/proyectos/:id", get(handle_missing_project))
        .route("/tareas/estado/:id", post(handle_complete_fails));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn list_projects_sends_bearer_credential() {
    let (api_url, recorded) = spawn_api_server().await;
    let gateway = HttpGateway::new(format!("{api_url}/"));

    let projects = gateway
        .list_projects(&Credential::new("tok-123"))
        .await
        .expect("list");

    assert_eq!(projects.len(), 2);
    assert_eq!(projects[0].id, ProjectId::new("p1"));
    assert_eq!(projects[0].client.as_deref(), Some("ACME"));
    assert_eq!(
        recorded.authorization.lock().await.as_deref(),
        Some("Bearer tok-123")
    );
}

#[tokio::test]
async fn error_envelope_message_is_surfaced() {
    let api_url = spawn_failing_server().await;
    let gateway = HttpGateway::new(api_url);

    let err = gateway
        .get_project(&Credential::new("tok"), &ProjectId::new("nope"))
        .await
        .expect_err("must fail");

    assert_eq!(
        err,
        GatewayError::Api {
            status: 404,
            msg: Some("Proyecto nope no encontrado".to_string()),
        }
    );
    assert_eq!(err.alert_message(), "Proyecto nope no encontrado");
}

#[tokio::test]
async fn error_without_body_falls_back_to_status_text() {
    let api_url = spawn_failing_server().await;
    let gateway = HttpGateway::new(api_url);

    let err = gateway
        .complete_task(&Credential::new("tok"), &TaskId::new("t1"))
        .await
        .expect_err("must fail");

    assert_eq!(
        err,
        GatewayError::Api {
            status: 500,
            msg: None
        }
    );
    assert_eq!(err.alert_message(), "Request failed with status code 500");
}

#[tokio::test]
async fn unreachable_api_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");

    let gateway = HttpGateway::new(format!("http://{addr}"));
    let err = gateway
        .list_projects(&Credential::new("tok"))
        .await
        .expect_err("must fail");

    assert!(matches!(err, GatewayError::Transport(_)), "got {err:?}");
    assert!(!err.alert_message().is_empty());
}

#[tokio::test]
async fn collaborator_routes_carry_project_and_collaborator_ids() {
    let (api_url, recorded) = spawn_api_server().await;
    let gateway = HttpGateway::new(api_url);
    let credential = Credential::new("tok");

    let added = gateway
        .add_collaborator(&credential, &ProjectId::new("p1"), "eva@example.com")
        .await
        .expect("add");
    assert_eq!(added.user.id, UserId::new("u9"));
    assert_eq!(
        recorded.body.lock().await.clone(),
        Some(json!({ "email": "eva@example.com" }))
    );

    let removed = gateway
        .remove_collaborator(&credential, &ProjectId::new("p1"), &UserId::new("u9"))
        .await
        .expect("remove");
    assert_eq!(removed.msg, "Colaborador eliminado correctamente");
    assert_eq!(
        recorded.path_ids.lock().await.clone(),
        vec!["p1".to_string(), "p1".to_string(), "u9".to_string()]
    );
}

#[test]
fn credential_debug_output_is_redacted() {
    let credential = Credential::new("secret-token");
    assert!(!format!("{credential:?}").contains("secret-token"));
}
