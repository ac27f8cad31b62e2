use crate::api::auth::{AuthUser, IdentityProvider};
use crate::api::error::{ApiError, ApiResult};
use crate::api::types::*;
use crate::backup::BackupInfo;
use crate::service::{SaveSyncService, StagedUpload, SyncOutcome};
use crate::sync::SyncRequest;
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Redirect, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Largest accepted upload request
pub const MAX_UPLOAD_BYTES: usize = 1024 * 1024 * 1024;

pub struct AppState {
    pub service: SaveSyncService,
    pub identities: Arc<dyn IdentityProvider>,
}

pub struct RestApi {
    state: Arc<AppState>,
}

impl RestApi {
    pub fn new(service: SaveSyncService, identities: Arc<dyn IdentityProvider>) -> Self {
        Self {
            state: Arc::new(AppState {
                service,
                identities,
            }),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/files/check_files", post(check_files))
            .route(
                "/files/upload_data",
                post(upload_data).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
            )
            .route("/files/download_data", get(download_data))
            .route("/files/get_backups_data", get(get_backups_data))
            .route("/files/restore_backup", post(restore_backup))
            .route("/files/delete_backup", delete(delete_backup))
            .route("/manage/get_games_data", get(get_games_data))
            .route("/manage/delete/game/:game_name", delete(delete_game))
            .route("/manage/update_game/:game_name", patch(rename_game))
            .route("/manage/check_x_token", get(check_x_token))
            .route("/manage/health", get(health_check))
            .with_state(self.state.clone())
    }
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "server online".to_string(),
    })
}

async fn check_x_token(AuthUser(_identity): AuthUser) -> Json<TokenStatusResponse> {
    Json(TokenStatusResponse { token_status: true })
}

async fn check_files(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Json(request): Json<SyncRequest>,
) -> ApiResult<Response> {
    let game_name = request.game_name.clone();

    match state.service.check_files(&identity, request).await? {
        SyncOutcome::Report(report) => {
            Ok(Json(FilesDataResponse { files_data: report }).into_response())
        }
        SyncOutcome::PullRequired { .. } => {
            let query = serde_urlencoded::to_string([("game_name", game_name.as_str())])
                .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
            Ok(Redirect::to(&format!("/files/download_data?{query}")).into_response())
        }
    }
}

async fn upload_data(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut game_name: Option<String> = None;
    let mut staged: Option<StagedUpload> = None;
    let mut outcome = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(format!("Failed to read multipart field: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();

        if name == "game_name" {
            let text = field
                .text()
                .await
                .map_err(|e| ApiError::InvalidRequest(format!("Failed to read game_name: {e}")))?;
            game_name = Some(text);
        } else if name == "file" {
            // The game may only be named after the file; stage it until then
            match &game_name {
                Some(game) => {
                    outcome = Some(state.service.receive_upload(&identity, game, field).await?);
                }
                None => {
                    staged = Some(state.service.stage_upload(&identity, field).await?);
                }
            }
        }
    }

    let game_name =
        game_name.ok_or_else(|| ApiError::InvalidRequest("game_name is required".to_string()))?;

    let outcome = match (outcome, staged) {
        (Some(outcome), _) => outcome,
        (None, Some(staged)) => {
            state
                .service
                .apply_upload(&identity, &game_name, staged)
                .await?
        }
        (None, None) => return Err(ApiError::InvalidRequest("No file uploaded".to_string())),
    };

    Ok(Json(UploadResponse {
        status: "success".to_string(),
        extracted_to: format!("saves/{}/{}", identity.username(), outcome.game_name),
        files_extracted: outcome.files_extracted,
        backup: outcome.backup,
        evicted_backups: outcome.evicted_backups,
    }))
}

async fn download_data(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Query(query): Query<DownloadQuery>,
) -> ApiResult<Response> {
    let stream = state.service.download(&identity, &query.game_name).await?;

    let disposition = format!(
        "attachment; filename={}",
        SaveSyncService::download_file_name(&query.game_name)
    );
    let disposition = HeaderValue::from_bytes(disposition.as_bytes())
        .map_err(|e| ApiError::InvalidRequest(format!("Unusable game name: {e}")))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/gzip")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

async fn get_backups_data(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
) -> ApiResult<Json<BTreeMap<String, Vec<BackupInfo>>>> {
    Ok(Json(state.service.list_backups(&identity).await?))
}

async fn restore_backup(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Json(req): Json<BackupRequest>,
) -> ApiResult<Json<RestoreResponse>> {
    let summary = state
        .service
        .restore_backup(&identity, &req.game_name, &req.backup_name)
        .await?;

    Ok(Json(RestoreResponse {
        msg: format!(
            "Backup '{}' for game '{}' has been restored!",
            req.backup_name, req.game_name
        ),
        files_restored: summary.files,
    }))
}

async fn delete_backup(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Json(req): Json<BackupRequest>,
) -> ApiResult<Json<MsgResponse>> {
    state
        .service
        .delete_backup(&identity, &req.game_name, &req.backup_name)
        .await?;

    Ok(Json(MsgResponse {
        msg: format!(
            "Backup '{}' for game '{}' has been deleted",
            req.backup_name, req.game_name
        ),
    }))
}

async fn get_games_data(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
) -> ApiResult<Json<GamesListResponse>> {
    Ok(Json(GamesListResponse {
        games_list: state.service.list_games(&identity).await?,
    }))
}

async fn delete_game(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Path(game_name): Path<String>,
    Query(query): Query<DeleteGameQuery>,
) -> ApiResult<Json<MessageResponse>> {
    let deletion = state
        .service
        .delete_game(&identity, &game_name, query.delete_backups)
        .await?;

    let message = if deletion.backups_deleted {
        "Game successfully deleted with all backups!"
    } else {
        "Game successfully deleted!"
    };
    Ok(Json(MessageResponse {
        message: message.to_string(),
    }))
}

async fn rename_game(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Path(game_name): Path<String>,
    Query(query): Query<RenameGameQuery>,
) -> ApiResult<Json<RenameGameResponse>> {
    let renamed = state
        .service
        .rename_game(&identity, &game_name, &query.new_game_name)
        .await?;

    Ok(Json(RenameGameResponse {
        message: format!(
            "Game {} successfully renamed to {}!",
            renamed.old_name, renamed.new_name
        ),
        renamed_paths: renamed.renamed_paths,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::{StaticTokens, API_TOKEN_HEADER};
    use crate::archive::ArchiveProducer;
    use crate::config::{ServerConfig, SharedConfig};
    use crate::integrity::{FileHashMap, HashScanner};
    use crate::ledger::SyncLedger;
    use crate::sync::SyncReport;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use std::fs;
    use tempfile::TempDir;
    use tower::Service;

    const TOKEN: &str = "token-alice";
    const BOUNDARY: &str = "savesync-test-boundary";

    async fn create_test_api(temp: &TempDir) -> RestApi {
        let config = SharedConfig::new(ServerConfig {
            data_root: temp.path().to_path_buf(),
            backups_limit: 2,
            ..Default::default()
        });
        let ledger = SyncLedger::new_in_memory().await.unwrap();
        let service = SaveSyncService::new(config, ledger);
        service.layout().ensure_roots().unwrap();

        RestApi::new(service, Arc::new(StaticTokens::default().with_token(TOKEN, "alice")))
    }

    fn authed(method: &str, uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(API_TOKEN_HEADER, TOKEN)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    async fn archive_with(name: &str, data: &[u8]) -> Vec<u8> {
        let source = TempDir::new().unwrap();
        fs::write(source.path().join(name), data).unwrap();
        ArchiveProducer::default()
            .stream(source.path().to_path_buf())
            .unwrap()
            .collect_bytes()
            .await
            .unwrap()
    }

    fn multipart_body(game: &str, archive: &[u8], file_first: bool) -> Vec<u8> {
        let game_part = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"game_name\"\r\n\r\n{game}\r\n"
        );
        let mut file_part = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"saves.tar.gz\"\r\nContent-Type: application/gzip\r\n\r\n"
        )
        .into_bytes();
        file_part.extend_from_slice(archive);
        file_part.extend_from_slice(b"\r\n");

        let mut body = Vec::new();
        if file_first {
            body.extend_from_slice(&file_part);
            body.extend_from_slice(game_part.as_bytes());
        } else {
            body.extend_from_slice(game_part.as_bytes());
            body.extend_from_slice(&file_part);
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    async fn upload(app: &mut Router, game: &str, archive: &[u8], file_first: bool) -> Response {
        let request = authed("POST", "/files/upload_data")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(game, archive, file_first)))
            .unwrap();
        app.call(request).await.unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let temp = TempDir::new().unwrap();
        let mut app = create_test_api(&temp).await.router();

        let request = Request::builder()
            .uri("/manage/health")
            .body(Body::empty())
            .unwrap();
        let response = app.call(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "server online");
    }

    #[tokio::test]
    async fn test_token_checks() {
        let temp = TempDir::new().unwrap();
        let mut app = create_test_api(&temp).await.router();

        let request = Request::builder()
            .uri("/manage/check_x_token")
            .body(Body::empty())
            .unwrap();
        let response = app.call(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let request = Request::builder()
            .uri("/manage/check_x_token")
            .header(API_TOKEN_HEADER, "wrong")
            .body(Body::empty())
            .unwrap();
        let response = app.call(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let request = authed("GET", "/manage/check_x_token")
            .body(Body::empty())
            .unwrap();
        let response = app.call(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["token_status"], true);
    }

    #[tokio::test]
    async fn test_check_files_report() {
        let temp = TempDir::new().unwrap();
        let mut app = create_test_api(&temp).await.router();

        let mut files = FileHashMap::new();
        files.insert(
            "/save0.celeste".to_string(),
            HashScanner::default().hash_bytes(b"berries"),
        );
        let request = SyncRequest {
            game_name: "celeste".to_string(),
            files_data: files,
            last_sync_date: None,
        };

        let request = authed("POST", "/files/check_files")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&request).unwrap()))
            .unwrap();
        let response = app.call(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["files_data"]["missing_on_server"][0], "/save0.celeste");
        assert_eq!(json["files_data"]["needs_update"], 1);
        assert!(json["files_data"]["mismatched_hashes"].as_array().unwrap().is_empty());

        let report: SyncReport = serde_json::from_value(json["files_data"].clone()).unwrap();
        assert!(!report.is_up_to_date);
    }

    #[tokio::test]
    async fn test_check_files_stale_redirects() {
        let temp = TempDir::new().unwrap();
        let api = create_test_api(&temp).await;
        api.state
            .service
            .ledger()
            .touch("alice", "Hollow Knight")
            .await
            .unwrap();
        let mut app = api.router();

        let body = serde_json::json!({
            "game_name": "Hollow Knight",
            "files_data": {},
            "last_sync_date": "2001-01-01T00:00:00Z",
        });
        let request = authed("POST", "/files/check_files")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.call(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/files/download_data?game_name=Hollow+Knight"
        );
    }

    #[tokio::test]
    async fn test_download_missing_game() {
        let temp = TempDir::new().unwrap();
        let mut app = create_test_api(&temp).await.router();

        let request = authed("GET", "/files/download_data?game_name=ghost")
            .body(Body::empty())
            .unwrap();
        let response = app.call(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["kind"], "NotFoundError");
        assert!(json["message"].as_str().unwrap().contains("ghost"));
    }

    #[tokio::test]
    async fn test_upload_then_download() {
        let temp = TempDir::new().unwrap();
        let mut app = create_test_api(&temp).await.router();
        let archive = archive_with("run.sav", b"run 7").await;

        let response = upload(&mut app, "Dead Cells", &archive, false).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "success");
        assert_eq!(json["extracted_to"], "saves/alice/Dead Cells");

        let request = authed("GET", "/files/download_data?game_name=Dead%20Cells")
            .body(Body::empty())
            .unwrap();
        let response = app.call(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/gzip");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=Dead_Cells-saves.tar.gz"
        );

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let downloaded = temp.path().join("downloaded.tar.gz");
        fs::write(&downloaded, &bytes).unwrap();
        let out = temp.path().join("out");
        crate::archive::ArchiveExtractor::extract(&downloaded, &out).unwrap();
        assert_eq!(fs::read(out.join("run.sav")).unwrap(), b"run 7");
    }

    #[tokio::test]
    async fn test_upload_file_before_game_name() {
        let temp = TempDir::new().unwrap();
        let mut app = create_test_api(&temp).await.router();
        let archive = archive_with("a.sav", b"a").await;

        let response = upload(&mut app, "celeste", &archive, true).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(temp.path().join("saves/alice/celeste/a.sav").is_file());

        let staging = temp.path().join("tmp_data/alice");
        assert_eq!(fs::read_dir(staging).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_upload_garbage_is_bad_request() {
        let temp = TempDir::new().unwrap();
        let mut app = create_test_api(&temp).await.router();

        let response = upload(&mut app, "celeste", b"garbage bytes", false).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["kind"], "ExtractionError");
    }

    #[tokio::test]
    async fn test_backups_restore_and_delete() {
        let temp = TempDir::new().unwrap();
        let mut app = create_test_api(&temp).await.router();
        let archive = archive_with("a.sav", b"original").await;
        let response = upload(&mut app, "celeste", &archive, false).await;
        let backup = body_json(response).await["backup"]
            .as_str()
            .unwrap()
            .to_string();

        let request = authed("GET", "/files/get_backups_data")
            .body(Body::empty())
            .unwrap();
        let json = body_json(app.call(request).await.unwrap()).await;
        assert_eq!(json["celeste"][0]["filename"], backup.as_str());

        fs::write(temp.path().join("saves/alice/celeste/a.sav"), b"broken").unwrap();

        let payload = serde_json::json!({"game_name": "celeste", "backup_name": backup});
        let request = authed("POST", "/files/restore_backup")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap();
        let response = app.call(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            fs::read(temp.path().join("saves/alice/celeste/a.sav")).unwrap(),
            b"original"
        );

        let request = authed("DELETE", "/files/delete_backup")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap();
        assert_eq!(app.call(request).await.unwrap().status(), StatusCode::OK);

        let request = authed("DELETE", "/files/delete_backup")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap();
        assert_eq!(
            app.call(request).await.unwrap().status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_manage_games() {
        let temp = TempDir::new().unwrap();
        let mut app = create_test_api(&temp).await.router();
        for game in ["celeste", "hades"] {
            let archive = archive_with("a.sav", game.as_bytes()).await;
            upload(&mut app, game, &archive, false).await;
        }

        let request = authed("GET", "/manage/get_games_data")
            .body(Body::empty())
            .unwrap();
        let json = body_json(app.call(request).await.unwrap()).await;
        assert_eq!(json["games_list"], serde_json::json!(["celeste", "hades"]));

        let request = authed("PATCH", "/manage/update_game/celeste?new_game_name=hades")
            .body(Body::empty())
            .unwrap();
        let response = app.call(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["kind"], "ConflictError");

        let request = authed("PATCH", "/manage/update_game/celeste?new_game_name=Celeste%20DX")
            .body(Body::empty())
            .unwrap();
        let response = app.call(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(temp.path().join("saves/alice/Celeste DX").is_dir());

        let request = authed("DELETE", "/manage/delete/game/hades?delete_backups=true")
            .body(Body::empty())
            .unwrap();
        let response = app.call(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await["message"],
            "Game successfully deleted with all backups!"
        );
        assert!(!temp.path().join("backups/alice/hades").exists());

        let request = authed("DELETE", "/manage/delete/game/hades")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            app.call(request).await.unwrap().status(),
            StatusCode::NOT_FOUND
        );
    }
}
