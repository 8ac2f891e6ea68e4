use crate::backend::BookingBackend;
use crate::configuration::Configuration;
use crate::error::BookingError;
use crate::types::{AppointmentView, Caller, Role, Slot};
use crate::AppState;
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Request};
use axum::http::HeaderMap;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{extract::State, Extension, Json};
use axum::{
    routing::{delete, get},
    Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;
use uuid::Uuid;
use validator::Validate;

pub const GATEWAY_SECRET_HEADER: &str = "x-gateway-secret";
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

lazy_static! {
    static ref DATE_PATTERN: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
    static ref TIME_PATTERN: Regex = Regex::new(r"^\d{2}:\d{2}(:\d{2})?$").unwrap();
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct BookingRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "name is required"))]
    name: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "contact is required"))]
    contact: String,
    #[serde(default)]
    slot_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct AddSlotRequest {
    #[serde(default)]
    #[validate(regex(path = *DATE_PATTERN, message = "date must be formatted YYYY-MM-DD"))]
    date: String,
    #[serde(default)]
    #[validate(regex(path = *TIME_PATTERN, message = "time must be formatted HH:MM"))]
    time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

pub fn create_app<T: BookingBackend, C: Configuration>(backend: T, configuration: C) -> Router {
    let state = AppState::new(backend, configuration);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/slots", get(get_slots::<T, C>).post(add_slot::<T, C>))
        .route(
            "/appointments",
            get(get_my_appointments::<T, C>).post(book_appointment::<T, C>),
        )
        .route("/appointments/all", get(get_all_appointments::<T, C>))
        .route("/appointments/:id", delete(cancel_appointment::<T, C>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            authenticate::<T, C>,
        ))
        .with_state(state)
        .layer(cors)
}

/// Turns the identity forwarded by the authenticating gateway into a [`Caller`].
async fn authenticate<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, BookingError> {
    let caller = caller_from_headers(request.headers(), &state.configuration.gateway_secret())
        .inspect_err(|err| warn!(%err, uri = %request.uri(), "Rejected request"))?;
    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn caller_from_headers(headers: &HeaderMap, gateway_secret: &str) -> Result<Caller, BookingError> {
    match header_value(headers, GATEWAY_SECRET_HEADER) {
        Some(secret) if secret == gateway_secret => {}
        Some(_) => return Err(BookingError::Unauthorized("invalid gateway credentials")),
        None => return Err(BookingError::Unauthorized("missing gateway credentials")),
    }

    let user_id = header_value(headers, USER_ID_HEADER)
        .ok_or(BookingError::Unauthorized("missing user id"))?
        .parse::<Uuid>()
        .map_err(|_| BookingError::Unauthorized("malformed user id"))?;

    let role = match header_value(headers, USER_ROLE_HEADER) {
        Some(role) => role
            .parse::<Role>()
            .map_err(|_| BookingError::Unauthorized("unknown role"))?,
        None => Role::User,
    };

    Ok(Caller { user_id, role })
}

/// Storage work blocks, keep it off the async workers.
async fn run_blocking<R, F>(work: F) -> Result<R, BookingError>
where
    F: FnOnce() -> Result<R, BookingError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| BookingError::Storage(format!("blocking task failed: {err}")))?
}

async fn get_slots<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
) -> Result<Json<Vec<Slot>>, BookingError> {
    let workflow = state.booking_workflow.clone();
    Ok(Json(run_blocking(move || workflow.available_slots()).await?))
}

async fn add_slot<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<AddSlotRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, BookingError> {
    // Role is checked before the body is parsed
    if !caller.is_admin() {
        warn!(user = %caller.user_id, "Non-admin tried to create a slot");
        return Err(BookingError::Forbidden);
    }
    let Json(slot) = payload?;
    slot.validate()?;

    let workflow = state.booking_workflow.clone();
    run_blocking(move || workflow.create_slot(&caller, &slot.date, &slot.time)).await?;
    Ok(MessageResponse::new("Slot created successfully"))
}

async fn book_appointment<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<BookingRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, BookingError> {
    let Json(booking) = payload?;
    booking.validate()?;
    let Some(slot_id) = booking.slot_id else {
        return Err(BookingError::Validation("slotId is required".into()));
    };

    let workflow = state.booking_workflow.clone();
    run_blocking(move || workflow.book(&caller, &booking.name, &booking.contact, slot_id)).await?;
    Ok(MessageResponse::new("Appointment booked successfully!"))
}

async fn get_my_appointments<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<AppointmentView>>, BookingError> {
    let workflow = state.booking_workflow.clone();
    Ok(Json(
        run_blocking(move || workflow.appointments_of(&caller)).await?,
    ))
}

async fn get_all_appointments<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<AppointmentView>>, BookingError> {
    let workflow = state.booking_workflow.clone();
    Ok(Json(
        run_blocking(move || workflow.all_appointments(&caller)).await?,
    ))
}

async fn cancel_appointment<T: BookingBackend, C: Configuration>(
    State(state): State<AppState<T, C>>,
    Extension(caller): Extension<Caller>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, BookingError> {
    let workflow = state.booking_workflow.clone();
    run_blocking(move || workflow.cancel(&caller, appointment_id)).await?;
    Ok(MessageResponse::new("Appointment canceled successfully!"))
}
