//! Actix Web HTTP server.
//!
//! Exposes OpenAI-compatible endpoints:
//! - `POST /v1/chat/completions`
//! - `GET /v1/models`
//! - `GET /health`

use crate::{
    attachment::AttachmentResolver,
    cleanup::{SessionCleanup, SessionReaper},
    completion::collect_completion,
    config::ProxyConfig,
    decoder::decode_events,
    error::ProxyError,
    streaming::{translate_stream, StreamTranslator},
    translation::build_ask_request,
    types::{ChatCompletionRequest, ModelList},
    upstream::UpstreamClient,
};
use actix_cors::Cors;
use actix_web::{http::header::CACHE_CONTROL, web, App, HttpResponse, HttpServer};
use anyhow::{Context, Result};
use tracing::{debug, error, info};

/// Inbound JSON limit. Attachments arrive inline as base64.
pub const MAX_REQUEST_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: ProxyConfig,
    pub upstream: UpstreamClient,
    pub reaper: SessionReaper,
}

impl AppState {
    /// Build shared state. Spawns the session reaper, so this must run
    /// inside a Tokio runtime.
    pub fn new(config: ProxyConfig) -> Result<Self> {
        let upstream = UpstreamClient::new(&config).context("failed to build upstream client")?;
        let reaper = SessionReaper::spawn(upstream.clone());
        Ok(Self {
            config,
            upstream,
            reaper,
        })
    }
}

/// Register routes and the JSON extractor config.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(MAX_REQUEST_BYTES)
            .error_handler(|err, _req| ProxyError::InvalidRequest(err.to_string()).into()),
    )
    .route("/health", web::get().to(health_check))
    .route("/v1/models", web::get().to(list_models))
    .route("/v1/chat/completions", web::post().to(chat_completions));
}

pub async fn serve(config: ProxyConfig) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.port);

    if config.cookies.is_empty() {
        error!("no session cookies configured, completions will fail until GS_COOKIE is set");
    }
    info!(
        addr = %addr,
        upstream = %config.base_url_trimmed(),
        cookies = config.cookies.len(),
        auto_delete_chat = config.auto_delete_chat,
        "genspark-proxy listening"
    );

    let state = web::Data::new(AppState::new(config)?);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Cors::permissive())
            .configure(routes)
    })
    .bind(&addr)
    .with_context(|| format!("failed to bind {}", addr))?
    .run()
    .await
    .context("server error")?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

async fn list_models(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ModelList::from_ids(state.config.models.iter().cloned()))
}

async fn chat_completions(
    state: web::Data<AppState>,
    body: web::Json<ChatCompletionRequest>,
) -> Result<HttpResponse, ProxyError> {
    let req = body.into_inner();
    let cookie = state.config.cookies.pick().ok_or(ProxyError::NoCredentials)?;

    let messages = AttachmentResolver::new(&state.upstream, &cookie)
        .resolve(req.messages)
        .await;
    let payload = serde_json::to_vec(&build_ask_request(&req.model, messages))?;

    debug!(
        model = %req.model,
        stream = req.stream,
        payload_bytes = payload.len(),
        "forwarding ask"
    );

    let upstream = match state.upstream.ask(&cookie, payload, req.stream).await {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, model = %req.model, "Genspark ask failed");
            return Err(e);
        }
    };

    if req.stream {
        let cleanup = state
            .config
            .auto_delete_chat
            .then(|| SessionCleanup::new(state.reaper.clone(), cookie.clone()));
        let events = decode_events(upstream.bytes_stream());
        let frames = translate_stream(events, StreamTranslator::new(req.model), cleanup);

        return Ok(HttpResponse::Ok()
            .content_type("text/event-stream")
            .insert_header((CACHE_CONTROL, "no-cache"))
            .streaming(frames));
    }

    let body = upstream.text().await?;
    let completion = collect_completion(&body, &req.model).inspect_err(|e| {
        error!(error = %e, model = %req.model, "upstream answer had no result");
    })?;

    Ok(HttpResponse::Ok().json(completion))
}
