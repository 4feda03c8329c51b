use crate::batch::{combine_successful_text, PageSource};
use crate::config::Config;
use crate::engine::DocumentImage;
use crate::engines::{EngineInfo, EngineRegistry};
use crate::error::OcrError;
use crate::fields::{extract_structured_data, StructuredData};
use crate::forms::{process_form, FormExtraction, FormType};
use crate::orchestrator::{HealthStatus, Orchestrator};
use crate::result::{Method, PageResult, RecognitionResult};
use axum::{
    body::Bytes,
    extract::{multipart::Field, DefaultBodyLimit, Multipart, State},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub config: Arc<Config>,
}

/// OCR response
#[derive(Serialize)]
pub struct OcrResponse {
    #[serde(flatten)]
    pub result: RecognitionResult,
    pub processing_time_ms: u64,
}

/// Batch OCR response
#[derive(Serialize)]
pub struct BatchResponse {
    pub pages: Vec<PageResult>,
    /// Text of the successful pages, blank-line separated
    pub text: String,
    pub processing_time_ms: u64,
}

#[derive(Deserialize)]
pub struct ExtractRequest {
    pub text: Option<String>,
}

#[derive(Deserialize)]
pub struct FormRequest {
    pub text: String,
    pub form_type: Option<FormType>,
}

/// Server info response
#[derive(Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub default_engine: Option<String>,
    pub available_engines: Vec<EngineInfo>,
    pub strategies: Vec<Method>,
    pub max_file_size_bytes: usize,
    pub max_batch_pages: usize,
    pub strategy_timeout_secs: u64,
    pub default_language: String,
}

/// Build the HTTP router
pub fn router(state: AppState) -> Router {
    let max_file_size = state.config.max_file_size;
    let max_batch_size = max_file_size.saturating_mul(state.config.max_batch_pages.max(1));

    Router::new()
        .route(
            "/ocr",
            post(handle_ocr).layer(DefaultBodyLimit::max(max_file_size)),
        )
        .route(
            "/ocr/batch",
            post(handle_batch).layer(DefaultBodyLimit::max(max_batch_size)),
        )
        .route("/extract", post(handle_extract))
        .route("/forms/extract", post(handle_form_extract))
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(config: Config) -> anyhow::Result<()> {
    let registry = Arc::new(EngineRegistry::new(&config));
    let orchestrator = Orchestrator::new(registry, &config);
    let addr = format!("{}:{}", config.host, config.port);

    let app = router(AppState {
        orchestrator: Arc::new(orchestrator),
        config: Arc::new(config),
    });

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// One uploaded file part
struct Upload {
    name: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

async fn read_upload(field: Field<'_>, max_file_size: usize) -> Result<Upload, OcrError> {
    let name = field.file_name().map(|s| s.to_string());
    let content_type = field.content_type().map(|s| s.to_string());
    let data = field
        .bytes()
        .await
        .map_err(|e| OcrError::InvalidRequest(format!("Failed to read file data: {}", e)))?;

    if data.len() > max_file_size {
        return Err(OcrError::ImageTooLarge {
            size: data.len(),
            max: max_file_size,
        });
    }

    Ok(Upload {
        name,
        content_type,
        data,
    })
}

impl Upload {
    fn into_image(self) -> DocumentImage {
        let mime = self
            .content_type
            .unwrap_or_else(|| "application/octet-stream".to_string());
        if !mime.starts_with("image/") && mime != "application/pdf" {
            tracing::warn!("Received file with content type: {}", mime);
        }
        DocumentImage::new(self.name, mime, self.data.to_vec())
    }
}

async fn next_field(multipart: &mut Multipart) -> Result<Option<Field<'_>>, OcrError> {
    multipart
        .next_field()
        .await
        .map_err(|e| OcrError::InvalidRequest(format!("Failed to parse multipart: {}", e)))
}

/// Handle OCR requests
async fn handle_ocr(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<OcrResponse>, OcrError> {
    let start = Instant::now();

    let mut upload: Option<Upload> = None;
    let mut language: Option<String> = None;

    while let Some(field) = next_field(&mut multipart).await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => upload = Some(read_upload(field, state.config.max_file_size).await?),
            "language" | "languages" => {
                language =
                    Some(field.text().await.map_err(|e| {
                        OcrError::InvalidRequest(format!("Invalid language: {}", e))
                    })?);
            }
            _ => {}
        }
    }

    let image = upload.ok_or(OcrError::MissingFile)?.into_image();

    let mut result = state.orchestrator.process_image(&image, None).await;
    if let Some(language) = language.filter(|l| *l != state.config.default_language) {
        result.warnings.push(format!(
            "Requested language '{}' ignored, server recognizes '{}'",
            language, state.config.default_language
        ));
    }

    let processing_time_ms = start.elapsed().as_millis() as u64;

    tracing::info!(
        "OCR completed in {}ms via {}, confidence: {:.2}, text length: {}",
        processing_time_ms,
        result.method,
        result.confidence,
        result.text.len()
    );

    Ok(Json(OcrResponse {
        result,
        processing_time_ms,
    }))
}

/// Handle multi-page OCR requests, one `file` part per page
async fn handle_batch(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<BatchResponse>, OcrError> {
    let start = Instant::now();
    let max_pages = state.config.max_batch_pages;
    let mut pages = Vec::new();

    while let Some(field) = next_field(&mut multipart).await? {
        if field.name() != Some("file") {
            continue;
        }
        if pages.len() == max_pages {
            return Err(OcrError::TooManyPages {
                count: pages.len() + 1,
                max: max_pages,
            });
        }
        let upload = read_upload(field, state.config.max_file_size).await?;
        pages.push(PageSource::Image(upload.into_image()));
    }

    if pages.is_empty() {
        return Err(OcrError::MissingFile);
    }

    let pages = state.orchestrator.process_multiple_pages(pages, None).await;
    let text = combine_successful_text(&pages);
    let processing_time_ms = start.elapsed().as_millis() as u64;

    tracing::info!(
        "Batch of {} pages completed in {}ms, {} succeeded",
        pages.len(),
        processing_time_ms,
        pages.iter().filter(|p| p.result.success).count()
    );

    Ok(Json(BatchResponse {
        pages,
        text,
        processing_time_ms,
    }))
}

async fn handle_extract(Json(request): Json<ExtractRequest>) -> Json<StructuredData> {
    Json(extract_structured_data(request.text.as_deref()))
}

async fn handle_form_extract(
    Json(request): Json<FormRequest>,
) -> Result<Json<FormExtraction>, OcrError> {
    if request.text.trim().is_empty() {
        return Err(OcrError::InvalidRequest("text must not be empty".to_string()));
    }
    Ok(Json(process_form(&request.text, request.form_type)))
}

/// Handle health check requests
async fn handle_health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(state.orchestrator.health_check().await)
}

/// Handle info requests
async fn handle_info(State(state): State<AppState>) -> impl IntoResponse {
    let registry = state.orchestrator.registry();
    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        default_engine: registry.default_engine().map(|e| e.name().to_string()),
        available_engines: registry.info(),
        strategies: vec![
            Method::Direct,
            Method::Worker,
            Method::Heuristic,
            Method::Placeholder,
        ],
        max_file_size_bytes: state.config.max_file_size,
        max_batch_pages: state.config.max_batch_pages,
        strategy_timeout_secs: state.config.strategy_timeout.as_secs(),
        default_language: state.config.default_language.clone(),
    })
}
