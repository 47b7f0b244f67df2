use std::{path::PathBuf, sync::Mutex};

use actix_web::{HttpResponse, Responder, get, post, web};
use adsweep::{
    Config, DetailMerger, EnrichCount, HttpFetcher, ScrapeSession, TracingSink,
    diagnostics::ChannelSink,
};
use bytes::Bytes;
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

pub struct AppState {
    pub config: Config,
    pub fetcher: HttpFetcher,
    stop: Mutex<CancellationToken>,
}

impl AppState {
    pub fn new(config: Config, fetcher: HttpFetcher) -> Self {
        Self {
            config,
            fetcher,
            stop: Mutex::new(CancellationToken::new()),
        }
    }

    /// Token for a new job; cancelled by the next `/stop`.
    fn job_token(&self) -> CancellationToken {
        match self.stop.lock() {
            Ok(token) => token.child_token(),
            Err(poisoned) => poisoned.into_inner().child_token(),
        }
    }

    /// Cancel running jobs and arm a fresh token for the next ones.
    fn stop_all(&self) {
        let mut guard = match self.stop.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.cancel();
        *guard = CancellationToken::new();
    }
}

// -------------------------
// Request Types
// -------------------------

#[derive(Deserialize)]
struct SweepReq {
    /// Search URL of page one; may omit the page segment.
    first_url: String,
    /// Search URL of the following page.
    second_url: String,
    /// How many pages to generate after the second URL.
    pages: usize,
}

#[derive(Deserialize)]
struct EnrichReq {
    /// Record-set file; relative paths resolve against the output directory.
    path: PathBuf,
    count: EnrichCount,
}

fn error_json(e: impl std::fmt::Display) -> HttpResponse {
    let err = serde_json::json!({ "error": e.to_string() });
    HttpResponse::BadRequest().json(err)
}

// -------------------------
// HTTP Handlers
// -------------------------

#[get("/")]
pub async fn index() -> impl Responder {
    HttpResponse::Ok().body(
        "adsweep online.\n\
         Sweep:\n  POST /sweep {\"first_url\":\"https://www.kleinanzeigen.de/s-fahrrad/k0\",\"second_url\":\"https://www.kleinanzeigen.de/s-seite:2/fahrrad/k0\",\"pages\":5}\n\
         Stream:\n  GET  /sweep/stream?first_url=...&second_url=...&pages=5 (SSE)\n\
         Enrich:\n  POST /enrich {\"path\":\"fahrrad_20240512_090307_p7.json\",\"count\":\"all\"}\n\
         Stop:\n  POST /stop",
    )
}

#[get("/healthz")]
pub async fn healthz() -> impl Responder {
    HttpResponse::Ok().body("ok")
}

#[post("/sweep")]
pub async fn sweep_endpoint(
    state: web::Data<AppState>,
    body: web::Json<SweepReq>,
) -> impl Responder {
    let sink = TracingSink;
    let session = ScrapeSession::new(&state.config, &state.fetcher, &sink, state.job_token());
    match session
        .run(&body.first_url, &body.second_url, body.pages)
        .await
    {
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(e) => error_json(e),
    }
}

#[post("/enrich")]
pub async fn enrich_endpoint(
    state: web::Data<AppState>,
    body: web::Json<EnrichReq>,
) -> impl Responder {
    let path = if body.path.is_relative() {
        state.config.output_dir.join(&body.path)
    } else {
        body.path.clone()
    };
    let sink = TracingSink;
    let merger = DetailMerger::new(&state.config, &state.fetcher, &sink, state.job_token());
    match merger.run(path, body.count).await {
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(e) => error_json(e),
    }
}

#[post("/stop")]
pub async fn stop_endpoint(state: web::Data<AppState>) -> impl Responder {
    state.stop_all();
    tracing::info!("stop requested");
    HttpResponse::Ok().json(serde_json::json!({ "stopping": true }))
}

// --------------
// SSE streaming
// --------------

#[derive(Deserialize)]
struct StreamParams {
    first_url: String,
    second_url: String,
    pages: usize,
}

fn sse_event(event: &str, data_json: &str) -> Bytes {
    let payload = format!("event: {}\ndata: {}\n\n", event, data_json);
    Bytes::from(payload)
}

#[get("/sweep/stream")]
pub async fn sweep_stream(
    state: web::Data<AppState>,
    q: web::Query<StreamParams>,
) -> impl Responder {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (done_tx, done_rx) = oneshot::channel();
    let params = q.into_inner();
    let stop = state.job_token();

    actix_web::rt::spawn(async move {
        let sink = ChannelSink::new(tx);
        let session = ScrapeSession::new(&state.config, &state.fetcher, &sink, stop);
        let result = session
            .run(&params.first_url, &params.second_url, params.pages)
            .await;
        let _ = done_tx.send(result);
    });

    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            let json = serde_json::to_string(&event).unwrap_or_default();
            yield Ok::<Bytes, actix_web::Error>(sse_event("diagnostic", &json));
        }
        match done_rx.await {
            Ok(Ok(outcome)) => {
                let json = serde_json::to_string(&outcome).unwrap_or_default();
                yield Ok(sse_event("done", &json));
            }
            Ok(Err(e)) => {
                let json = serde_json::json!({ "error": e.to_string() }).to_string();
                yield Ok(sse_event("error", &json));
            }
            Err(_) => {
                yield Ok(sse_event("error", r#"{"error":"sweep task ended unexpectedly"}"#));
            }
        }
    };

    HttpResponse::Ok()
        .insert_header(("Content-Type", "text/event-stream"))
        .insert_header(("Cache-Control", "no-cache"))
        .insert_header(("Connection", "keep-alive"))
        .streaming(stream)
}
