use crossbeam_channel::Sender;
use rocket::{
    data::{ByteUnit, Data},
    http::Status,
    request::{FromRequest, Outcome, Request},
    serde::json::{json, Json, Value as JsonValue},
    Build, Rocket, Shutdown, State,
};

use crate::{
    config::Config,
    core::{
        pipeline::{submit_payload, IndexerCommand, PayloadReport},
        protocol::inscription_parsing::parse_payload_bytes,
    },
    error::IndexerError,
    utils::Context,
};

use super::build_rocket_config;

pub struct IngestionState {
    pub commands_tx: Sender<IndexerCommand>,
    pub auth_token: String,
    pub body_limit: u64,
    pub ctx: Context,
}

/// Requests carrying `Authorization: Bearer <auth_token>`.
pub struct AuthorizedRequest;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthorizedRequest {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(state) = req.rocket().state::<IngestionState>() else {
            return Outcome::Error((Status::InternalServerError, ()));
        };
        let expected = format!("Bearer {}", state.auth_token);
        match req.headers().get_one("Authorization") {
            Some(header) if header == expected => Outcome::Success(AuthorizedRequest),
            _ => {
                try_warn!(state.ctx, "Rejecting unauthorized payload from {:?}", req.client_ip());
                Outcome::Error((Status::Unauthorized, ()))
            }
        }
    }
}

fn error_status(error: &IndexerError) -> Status {
    match error {
        IndexerError::MalformedEvent(_) => Status::BadRequest,
        IndexerError::OutOfSequence { .. } | IndexerError::UnknownInscription { .. } => {
            Status::Conflict
        }
        IndexerError::Storage(_) | IndexerError::InvariantViolation(_) => {
            Status::InternalServerError
        }
    }
}

fn report_response(report: PayloadReport) -> (Status, Json<JsonValue>) {
    match report.error {
        None => (
            Status::Ok,
            Json(json!({
                "status": 200,
                "result": report.outcomes,
            })),
        ),
        Some(error) => {
            let status = error_status(&error);
            (
                status,
                Json(json!({
                    "status": status.code,
                    "result": report.outcomes,
                    "error": {
                        "kind": error.kind(),
                        "message": error.to_string(),
                        "retryable": error.is_retryable(),
                    },
                })),
            )
        }
    }
}

#[get("/ping")]
fn handle_ping(state: &State<IngestionState>) -> Json<JsonValue> {
    try_debug!(state.ctx, "Handling HTTP GET /ping");
    Json(json!({
        "status": 200,
        "result": "ordledger event server up and running",
    }))
}

#[post("/payload", data = "<body>")]
async fn handle_payload(
    _auth: AuthorizedRequest,
    body: Data<'_>,
    state: &State<IngestionState>,
) -> (Status, Json<JsonValue>) {
    let bytes = match body.open(ByteUnit::from(state.body_limit)).into_bytes().await {
        Ok(bytes) if bytes.is_complete() => bytes.into_inner(),
        Ok(_) => {
            try_warn!(state.ctx, "Rejecting payload larger than {} bytes", state.body_limit);
            return (
                Status::PayloadTooLarge,
                Json(json!({ "status": 413, "error": "payload too large" })),
            );
        }
        Err(e) => {
            return (
                Status::BadRequest,
                Json(json!({ "status": 400, "error": e.to_string() })),
            )
        }
    };
    let payload = match parse_payload_bytes(&bytes) {
        Ok(payload) => payload,
        Err(e) => {
            try_warn!(state.ctx, "Rejecting payload: {}", e);
            return report_response(PayloadReport {
                outcomes: vec![],
                error: Some(e),
            });
        }
    };
    try_debug!(
        state.ctx,
        "Handling HTTP POST /payload ({} blocks to apply, {} to roll back)",
        payload.apply.len(),
        payload.rollback.len()
    );

    let commands_tx = state.commands_tx.clone();
    let submitted =
        rocket::tokio::task::spawn_blocking(move || submit_payload(&commands_tx, payload)).await;
    match submitted {
        Ok(Ok(report)) => report_response(report),
        Ok(Err(e)) => {
            try_error!(state.ctx, "Unable to submit payload: {}", e);
            (
                Status::ServiceUnavailable,
                Json(json!({ "status": 503, "error": e })),
            )
        }
        Err(e) => (
            Status::InternalServerError,
            Json(json!({ "status": 500, "error": e.to_string() })),
        ),
    }
}

pub fn build_ingestion_server(
    rocket_config: rocket::Config,
    state: IngestionState,
) -> Rocket<Build> {
    rocket::custom(rocket_config)
        .manage(state)
        .mount("/", routes![handle_ping, handle_payload])
}

pub async fn start_ingestion_server(
    config: &Config,
    commands_tx: Sender<IndexerCommand>,
    ctx: &Context,
) -> Result<Shutdown, String> {
    let rocket_config = build_rocket_config(
        &config.ingestion.host,
        config.ingestion.port,
        1,
        config.logs.http_internals,
    )?;
    let state = IngestionState {
        commands_tx,
        auth_token: config.ingestion.auth_token.clone(),
        body_limit: config.ingestion.body_limit,
        ctx: ctx.clone(),
    };
    let ignite = build_ingestion_server(rocket_config, state)
        .ignite()
        .await
        .map_err(|e| format!("unable to start event server: {}", e))?;
    let shutdown = ignite.shutdown();
    let moved_ctx = ctx.clone();
    let _ = std::thread::spawn(move || {
        if let Err(e) = hiro_system_kit::nestable_block_on(ignite.launch()) {
            try_error!(moved_ctx, "Event server stopped: {}", e);
        }
    });
    try_info!(
        ctx,
        "Listening for inscription events on {}:{}",
        config.ingestion.host,
        config.ingestion.port
    );
    Ok(shutdown)
}
