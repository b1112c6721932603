//! HTTP API for the assistant.
//!
//! Exposes the question-answering and document-lifecycle endpoints over
//! axum, with JSON error bodies and CORS open for the web frontend.

use crate::answer::{self, LlmProvider, WebLookup};
use crate::config::Settings;
use crate::error::{AssistError, AssistResult};
use crate::lifecycle::{IndexLifecycleManager, PdfRetriever};
use crate::store::StoreError;
use crate::vector::IndexId;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

/// Shared state behind every handler.
pub struct AppState {
    pub lifecycle: Arc<IndexLifecycleManager>,
    /// Reference-corpus retriever, absent when no source had one at startup.
    pub corpus: Option<Arc<PdfRetriever>>,
    pub llm: Arc<dyn LlmProvider>,
    pub web: Arc<dyn WebLookup>,
    pub settings: Settings,
}

/// Build the application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.settings.uploads.max_body_bytes;

    Router::new()
        .route("/health", get(health))
        .route("/api/ask", post(ask))
        .route("/api/upload-pdf", post(upload_pdf))
        .route("/api/delete-pdf/{id}", delete(delete_pdf))
        .route("/api/pdfs", get(list_pdfs))
        .route("/api/ask-pdf/{id}", post(ask_pdf))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the server until ctrl-c.
pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let bind = state.settings.server.bind.clone();
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("listening on http://{bind}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to install shutdown handler");
    }
    info!("shutdown signal received");
}

// ---------------------------------------------------------------------------
// Request/response bodies

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AskRequest {
    #[serde(default)]
    question: String,
    #[serde(default = "default_true")]
    web_search_enabled: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Serialize)]
struct AnswerResponse {
    answer: String,
    sources: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PdfSummary {
    id: String,
    filename: String,
    page_count: usize,
}

#[derive(Serialize)]
struct PdfListResponse {
    pdfs: Vec<PdfSummary>,
}

#[derive(Serialize)]
struct DeleteResponse {
    success: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PdfAnswerResponse {
    answer: String,
    sources: Vec<String>,
    pdf: PdfRef,
}

#[derive(Serialize)]
struct PdfRef {
    id: String,
    filename: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: String,
}

// ---------------------------------------------------------------------------
// Error mapping

impl IntoResponse for AssistError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation { .. }
            | Self::EmptyDocument
            | Self::CapacityExceeded { .. }
            | Self::PdfExtraction(_) => StatusCode::BAD_REQUEST,
            Self::IndexNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        let body = ErrorBody {
            error: self.to_string(),
            code: self.status_code(),
        };
        (status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers

async fn health() -> &'static str {
    "OK"
}

async fn ask(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AskRequest>,
) -> AssistResult<Json<AnswerResponse>> {
    if request.question.trim().is_empty() {
        return Err(AssistError::Validation {
            reason: "No question provided".to_string(),
        });
    }

    let top_k = state.settings.semantic_search.top_k;
    let hits = match &state.corpus {
        Some(corpus) => corpus.retrieve(&request.question, top_k).await?,
        None => Vec::new(),
    };

    let snippets = if request.web_search_enabled {
        state.web.lookup(&request.question).await
    } else {
        Vec::new()
    };

    let document_name = state
        .corpus
        .as_ref()
        .map_or("reference corpus", |c| c.record().filename.as_str());

    let composed = answer::compose_answer(
        &request.question,
        document_name,
        &hits,
        &snippets,
        state.llm.as_ref(),
    )
    .await;

    Ok(Json(AnswerResponse {
        answer: composed.answer,
        sources: composed.sources,
    }))
}

async fn upload_pdf(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> AssistResult<Json<PdfSummary>> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AssistError::Validation {
            reason: format!("Malformed multipart body: {e}"),
        }
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(sanitize_filename)
            .ok_or_else(|| AssistError::Validation {
                reason: "No filename in upload".to_string(),
            })?;

        let bytes = field.bytes().await.map_err(|e| AssistError::Validation {
            reason: format!("Failed to read upload: {e}"),
        })?;

        upload = Some((filename, bytes.to_vec()));
        break;
    }

    let (filename, bytes) = upload.ok_or_else(|| AssistError::Validation {
        reason: "No file part in request".to_string(),
    })?;

    validate_extension(&filename, &state.settings.uploads.allowed_extensions)?;

    if bytes.is_empty() {
        return Err(AssistError::Validation {
            reason: "Uploaded file is empty".to_string(),
        });
    }

    let record = state.lifecycle.register_document(&filename, bytes).await?;

    Ok(Json(PdfSummary {
        id: record.id.to_string(),
        filename: record.filename,
        page_count: record.page_count,
    }))
}

async fn delete_pdf(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AssistResult<Json<DeleteResponse>> {
    let id = parse_id(&id)?;

    if state.lifecycle.delete(&id).await? {
        Ok(Json(DeleteResponse { success: true }))
    } else {
        Err(AssistError::IndexNotFound { id })
    }
}

async fn list_pdfs(
    State(state): State<Arc<AppState>>,
) -> AssistResult<Json<PdfListResponse>> {
    let records = state.lifecycle.list().await?;
    let pdfs = records
        .into_iter()
        .map(|r| PdfSummary {
            id: r.id.to_string(),
            filename: r.filename,
            page_count: r.page_count,
        })
        .collect();
    Ok(Json(PdfListResponse { pdfs }))
}

async fn ask_pdf(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<AskRequest>,
) -> AssistResult<Json<PdfAnswerResponse>> {
    if request.question.trim().is_empty() {
        return Err(AssistError::Validation {
            reason: "No question provided".to_string(),
        });
    }

    let id = parse_id(&id)?;
    let retriever = state.lifecycle.resolve(&id).await?;

    let top_k = state.settings.semantic_search.top_k;
    let hits = retriever.retrieve(&request.question, top_k).await?;

    // Per-document questions stay grounded in the document, no web context
    let composed = answer::compose_answer(
        &request.question,
        &retriever.record().filename,
        &hits,
        &[],
        state.llm.as_ref(),
    )
    .await;

    Ok(Json(PdfAnswerResponse {
        answer: composed.answer,
        sources: composed.sources,
        pdf: PdfRef {
            id: id.to_string(),
            filename: retriever.record().filename.clone(),
        },
    }))
}

// ---------------------------------------------------------------------------
// Validation helpers

fn parse_id(token: &str) -> AssistResult<IndexId> {
    IndexId::parse(token).ok_or_else(|| AssistError::Validation {
        reason: format!("'{token}' is not a valid document id"),
    })
}

fn sanitize_filename(name: &str) -> String {
    name.rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .to_string()
}

fn validate_extension(filename: &str, allowed: &[String]) -> AssistResult<()> {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase());

    match extension {
        Some(ext) if allowed.iter().any(|a| a == &ext) => Ok(()),
        _ => Err(AssistError::Validation {
            reason: format!(
                "Only {} files are allowed",
                allowed
                    .iter()
                    .map(|a| format!(".{a}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_validation() {
        let allowed = vec!["pdf".to_string()];
        assert!(validate_extension("report.pdf", &allowed).is_ok());
        assert!(validate_extension("REPORT.PDF", &allowed).is_ok());
        assert!(validate_extension("notes.txt", &allowed).is_err());
        assert!(validate_extension("no_extension", &allowed).is_err());
    }

    #[test]
    fn test_filename_sanitization() {
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("../../etc/report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename(r"C:\docs\report.pdf"), "report.pdf");
    }
}
