//! Read API over the ledger.
//!
//! Each request opens its own read-only connection, so reads run on a WAL
//! snapshot and never wait on the writer. Responses carry the fingerprint of
//! the data they were built from as their `ETag`.

use std::{path::PathBuf, str::FromStr};

use rocket::{
    fairing::AdHoc,
    http::{ContentType, Header, Status},
    request::{self, FromRequest, Outcome, Request},
    response::{self, Responder, Response},
    serde::json::{json, Json, Value as JsonValue},
    Build, Rocket, Shutdown, State,
};
use rusqlite::Connection;
use serde::Serialize;

use crate::{
    config::Config,
    db::{
        fingerprint::Fingerprint,
        open_readonly_ordledger_db_conn,
        queries::{
            find_block_transfers, find_inscription, find_inscription_content,
            find_inscriptions_per_block, find_location_history, find_sat, find_status,
            list_inscriptions, BlockSelector, InscriptionFilters, InscriptionLookup, Order,
            OrderBy, Page,
        },
    },
    ord::rarity::Rarity,
    utils::Context,
};

use super::build_rocket_config;

pub const CACHE_CONTROL: &str = "public, max-age=0, must-revalidate";

pub struct ApiState {
    pub db_path: PathBuf,
    pub ctx: Context,
}

/// Entity tags listed by the client in `If-None-Match`.
pub struct IfNoneMatch(Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for IfNoneMatch {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        Outcome::Success(IfNoneMatch(
            req.headers().get_one("If-None-Match").map(String::from),
        ))
    }
}

impl IfNoneMatch {
    pub fn matches(&self, fingerprint: &Fingerprint) -> bool {
        match &self.0 {
            None => false,
            Some(header) => header
                .split(',')
                .any(|tag| tag.trim() == "*" || fingerprint.matches_entity_tag(tag)),
        }
    }
}

pub enum ApiResponse {
    NotModified(Fingerprint),
    Json(Fingerprint, JsonValue),
    Content(Fingerprint, ContentType, Vec<u8>),
    Error(Status, String),
}

impl ApiResponse {
    fn bad_request<E: ToString>(e: E) -> ApiResponse {
        ApiResponse::Error(Status::BadRequest, e.to_string())
    }

    fn not_found() -> ApiResponse {
        ApiResponse::Error(Status::NotFound, "Not found".into())
    }

    fn internal_error(ctx: &Context, e: String) -> ApiResponse {
        try_error!(ctx, "Unable to serve request: {}", e);
        ApiResponse::Error(Status::InternalServerError, e)
    }

    fn found<T: Serialize>(
        data: (T, Fingerprint),
        if_none_match: &IfNoneMatch,
        ctx: &Context,
    ) -> ApiResponse {
        let (data, fingerprint) = data;
        if if_none_match.matches(&fingerprint) {
            return ApiResponse::NotModified(fingerprint);
        }
        match serde_json::to_value(&data) {
            Ok(value) => ApiResponse::Json(fingerprint, value),
            Err(e) => ApiResponse::internal_error(ctx, e.to_string()),
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiResponse {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        match self {
            ApiResponse::NotModified(fingerprint) => Response::build()
                .status(Status::NotModified)
                .raw_header("ETag", format!("\"{}\"", fingerprint))
                .raw_header("Cache-Control", CACHE_CONTROL)
                .ok(),
            ApiResponse::Json(fingerprint, value) => Response::build_from(Json(value).respond_to(req)?)
                .raw_header("ETag", format!("\"{}\"", fingerprint))
                .raw_header("Cache-Control", CACHE_CONTROL)
                .ok(),
            ApiResponse::Content(fingerprint, content_type, bytes) => {
                Response::build_from(bytes.respond_to(req)?)
                    .header(content_type)
                    .raw_header("ETag", format!("\"{}\"", fingerprint))
                    .raw_header("Cache-Control", CACHE_CONTROL)
                    .ok()
            }
            ApiResponse::Error(status, message) => {
                Response::build_from(Json(json!({ "error": message })).respond_to(req)?)
                    .status(status)
                    .ok()
            }
        }
    }
}

fn open_conn(state: &ApiState) -> Result<Connection, ApiResponse> {
    open_readonly_ordledger_db_conn(&state.db_path, &state.ctx)
        .map_err(|e| ApiResponse::internal_error(&state.ctx, e))
}

fn parse_param<T: FromStr>(name: &str, value: &Option<String>) -> Result<Option<T>, ApiResponse> {
    match value {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ApiResponse::bad_request(format!("invalid {}: {}", name, raw))),
    }
}

fn parse_page(offset: &Option<String>, limit: &Option<String>) -> Result<Page, ApiResponse> {
    let offset = parse_param::<u64>("offset", offset)?;
    let limit = parse_param::<u64>("limit", limit)?;
    Page::new(offset, limit).map_err(ApiResponse::bad_request)
}

fn parse_all<T: FromStr>(name: &str, values: &[String]) -> Result<Vec<T>, ApiResponse> {
    values
        .iter()
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|_| ApiResponse::bad_request(format!("invalid {}: {}", name, raw)))
        })
        .collect()
}

/// Query string of `GET /inscriptions`, kept as raw strings so that invalid
/// values are reported as 400 instead of falling through to another route.
#[derive(FromForm, Default)]
pub struct InscriptionsQuery {
    genesis_id: Vec<String>,
    number: Vec<String>,
    address: Vec<String>,
    genesis_address: Vec<String>,
    mime_type: Vec<String>,
    rarity: Vec<String>,
    from_genesis_block_height: Option<String>,
    to_genesis_block_height: Option<String>,
    from_number: Option<String>,
    to_number: Option<String>,
    cursed: Option<String>,
    order_by: Option<String>,
    order: Option<String>,
    offset: Option<String>,
    limit: Option<String>,
}

impl InscriptionsQuery {
    fn parse(&self) -> Result<(InscriptionFilters, OrderBy, Order, Page), ApiResponse> {
        let genesis_id = parse_all::<InscriptionLookup>("genesis_id", &self.genesis_id)?
            .into_iter()
            .map(|lookup| match lookup {
                InscriptionLookup::Id(id) => Ok(id),
                InscriptionLookup::Number(n) => {
                    Err(ApiResponse::bad_request(format!("invalid genesis_id: {}", n)))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        let filters = InscriptionFilters {
            genesis_id,
            number: parse_all::<i64>("number", &self.number)?,
            address: self.address.clone(),
            genesis_address: self.genesis_address.clone(),
            mime_type: self.mime_type.clone(),
            rarity: parse_all::<Rarity>("rarity", &self.rarity)?,
            from_genesis_block_height: parse_param("from_genesis_block_height", &self.from_genesis_block_height)?,
            to_genesis_block_height: parse_param("to_genesis_block_height", &self.to_genesis_block_height)?,
            from_number: parse_param("from_number", &self.from_number)?,
            to_number: parse_param("to_number", &self.to_number)?,
            cursed: parse_param("cursed", &self.cursed)?,
        };
        let order_by = parse_param::<OrderBy>("order_by", &self.order_by)?.unwrap_or_default();
        let order = parse_param::<Order>("order", &self.order)?.unwrap_or_default();
        let page = parse_page(&self.offset, &self.limit)?;
        Ok((filters, order_by, order, page))
    }
}

#[get("/")]
fn handle_get_status(if_none_match: IfNoneMatch, state: &State<ApiState>) -> ApiResponse {
    try_debug!(state.ctx, "Handling HTTP GET /");
    let conn = match open_conn(state) {
        Ok(conn) => conn,
        Err(response) => return response,
    };
    match find_status(&conn) {
        Ok(status) => ApiResponse::found(status, &if_none_match, &state.ctx),
        Err(e) => ApiResponse::internal_error(&state.ctx, e.to_string()),
    }
}

#[get("/inscriptions?<query..>")]
fn handle_get_inscriptions(
    query: InscriptionsQuery,
    if_none_match: IfNoneMatch,
    state: &State<ApiState>,
) -> ApiResponse {
    try_debug!(state.ctx, "Handling HTTP GET /inscriptions");
    let (filters, order_by, order, page) = match query.parse() {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };
    let conn = match open_conn(state) {
        Ok(conn) => conn,
        Err(response) => return response,
    };
    match list_inscriptions(&filters, order_by, order, &page, &conn) {
        Ok(listing) => ApiResponse::found(listing, &if_none_match, &state.ctx),
        Err(e) => ApiResponse::internal_error(&state.ctx, e.to_string()),
    }
}

#[get("/inscriptions/transfers?<block>&<offset>&<limit>")]
fn handle_get_block_transfers(
    block: Option<String>,
    offset: Option<String>,
    limit: Option<String>,
    if_none_match: IfNoneMatch,
    state: &State<ApiState>,
) -> ApiResponse {
    try_debug!(state.ctx, "Handling HTTP GET /inscriptions/transfers");
    let selector = match parse_param::<BlockSelector>("block", &block) {
        Ok(Some(selector)) => selector,
        Ok(None) => return ApiResponse::bad_request("missing block"),
        Err(response) => return response,
    };
    let page = match parse_page(&offset, &limit) {
        Ok(page) => page,
        Err(response) => return response,
    };
    let conn = match open_conn(state) {
        Ok(conn) => conn,
        Err(response) => return response,
    };
    match find_block_transfers(&selector, &page, &conn) {
        Ok(transfers) => ApiResponse::found(transfers, &if_none_match, &state.ctx),
        Err(e) => ApiResponse::internal_error(&state.ctx, e.to_string()),
    }
}

#[get("/inscriptions/<id>")]
fn handle_get_inscription(
    id: &str,
    if_none_match: IfNoneMatch,
    state: &State<ApiState>,
) -> ApiResponse {
    try_debug!(state.ctx, "Handling HTTP GET /inscriptions/{}", id);
    let lookup = match InscriptionLookup::from_str(id) {
        Ok(lookup) => lookup,
        Err(e) => return ApiResponse::bad_request(e),
    };
    let conn = match open_conn(state) {
        Ok(conn) => conn,
        Err(response) => return response,
    };
    match find_inscription(&lookup, &conn) {
        Ok(Some(inscription)) => ApiResponse::found(inscription, &if_none_match, &state.ctx),
        Ok(None) => ApiResponse::not_found(),
        Err(e) => ApiResponse::internal_error(&state.ctx, e.to_string()),
    }
}

#[get("/inscriptions/<id>/transfers?<offset>&<limit>")]
fn handle_get_inscription_transfers(
    id: &str,
    offset: Option<String>,
    limit: Option<String>,
    if_none_match: IfNoneMatch,
    state: &State<ApiState>,
) -> ApiResponse {
    try_debug!(state.ctx, "Handling HTTP GET /inscriptions/{}/transfers", id);
    let lookup = match InscriptionLookup::from_str(id) {
        Ok(lookup) => lookup,
        Err(e) => return ApiResponse::bad_request(e),
    };
    let page = match parse_page(&offset, &limit) {
        Ok(page) => page,
        Err(response) => return response,
    };
    let conn = match open_conn(state) {
        Ok(conn) => conn,
        Err(response) => return response,
    };
    match find_location_history(&lookup, &page, &conn) {
        Ok(Some(history)) => ApiResponse::found(history, &if_none_match, &state.ctx),
        Ok(None) => ApiResponse::not_found(),
        Err(e) => ApiResponse::internal_error(&state.ctx, e.to_string()),
    }
}

#[get("/inscriptions/<id>/content")]
fn handle_get_inscription_content(
    id: &str,
    if_none_match: IfNoneMatch,
    state: &State<ApiState>,
) -> ApiResponse {
    try_debug!(state.ctx, "Handling HTTP GET /inscriptions/{}/content", id);
    let lookup = match InscriptionLookup::from_str(id) {
        Ok(lookup) => lookup,
        Err(e) => return ApiResponse::bad_request(e),
    };
    let conn = match open_conn(state) {
        Ok(conn) => conn,
        Err(response) => return response,
    };
    match find_inscription_content(&lookup, &conn) {
        Ok(Some((_, fingerprint))) if if_none_match.matches(&fingerprint) => {
            ApiResponse::NotModified(fingerprint)
        }
        Ok(Some((content, fingerprint))) => {
            let content_type =
                ContentType::parse_flexible(&content.content_type).unwrap_or(ContentType::Binary);
            ApiResponse::Content(fingerprint, content_type, content.content)
        }
        Ok(None) => ApiResponse::not_found(),
        Err(e) => ApiResponse::internal_error(&state.ctx, e.to_string()),
    }
}

#[get("/sats/<ordinal>")]
fn handle_get_sat(ordinal: &str, if_none_match: IfNoneMatch, state: &State<ApiState>) -> ApiResponse {
    try_debug!(state.ctx, "Handling HTTP GET /sats/{}", ordinal);
    let Ok(ordinal) = ordinal.parse::<u64>() else {
        return ApiResponse::bad_request(format!("invalid ordinal: {}", ordinal));
    };
    let conn = match open_conn(state) {
        Ok(conn) => conn,
        Err(response) => return response,
    };
    match find_sat(ordinal, &conn) {
        Ok(Some(sat)) => ApiResponse::found(sat, &if_none_match, &state.ctx),
        Ok(None) => ApiResponse::bad_request(format!("invalid ordinal: {}", ordinal)),
        Err(e) => ApiResponse::internal_error(&state.ctx, e.to_string()),
    }
}

#[get("/stats/inscriptions?<from_block_height>&<to_block_height>&<offset>&<limit>")]
fn handle_get_inscription_stats(
    from_block_height: Option<String>,
    to_block_height: Option<String>,
    offset: Option<String>,
    limit: Option<String>,
    if_none_match: IfNoneMatch,
    state: &State<ApiState>,
) -> ApiResponse {
    try_debug!(state.ctx, "Handling HTTP GET /stats/inscriptions");
    let bounds = parse_param::<u64>("from_block_height", &from_block_height).and_then(|from| {
        parse_param::<u64>("to_block_height", &to_block_height).map(|to| (from, to))
    });
    let (from, to) = match bounds {
        Ok(bounds) => bounds,
        Err(response) => return response,
    };
    let page = match parse_page(&offset, &limit) {
        Ok(page) => page,
        Err(response) => return response,
    };
    let conn = match open_conn(state) {
        Ok(conn) => conn,
        Err(response) => return response,
    };
    match find_inscriptions_per_block(from, to, &page, &conn) {
        Ok(stats) => ApiResponse::found(stats, &if_none_match, &state.ctx),
        Err(e) => ApiResponse::internal_error(&state.ctx, e.to_string()),
    }
}

/// Lets browsers on any origin read the API, and the `ETag` it sends.
fn cors_headers() -> AdHoc {
    AdHoc::on_response("CORS", |_req, response| {
        Box::pin(async move {
            response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
            response.set_header(Header::new("Access-Control-Allow-Methods", "GET, HEAD"));
            response.set_header(Header::new("Access-Control-Expose-Headers", "ETag"));
        })
    })
}

pub fn build_api_server(rocket_config: rocket::Config, state: ApiState) -> Rocket<Build> {
    let routes = routes![
        handle_get_status,
        handle_get_inscriptions,
        handle_get_block_transfers,
        handle_get_inscription,
        handle_get_inscription_transfers,
        handle_get_inscription_content,
        handle_get_sat,
        handle_get_inscription_stats,
    ];
    rocket::custom(rocket_config)
        .manage(state)
        .attach(cors_headers())
        .mount("/ordinals/v1", routes.clone())
        .mount("/ordinals", routes)
}

pub async fn start_api_server(config: &Config, ctx: &Context) -> Result<Shutdown, String> {
    let rocket_config = build_rocket_config(
        &config.http_api.host,
        config.http_api.port,
        config.http_api.workers,
        config.logs.http_internals,
    )?;
    let state = ApiState {
        db_path: config.expected_db_path(),
        ctx: ctx.scoped(config.logs.http_internals),
    };
    let ignite = build_api_server(rocket_config, state)
        .ignite()
        .await
        .map_err(|e| format!("unable to start read api: {}", e))?;
    let shutdown = ignite.shutdown();
    let moved_ctx = ctx.clone();
    let _ = std::thread::spawn(move || {
        if let Err(e) = hiro_system_kit::nestable_block_on(ignite.launch()) {
            try_error!(moved_ctx, "Read API stopped: {}", e);
        }
    });
    try_info!(
        ctx,
        "Serving the ordinals API on {}:{}",
        config.http_api.host,
        config.http_api.port
    );
    Ok(shutdown)
}
