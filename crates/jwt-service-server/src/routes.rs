//! HTTP routes
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `GET /register/token` | account registration token |
//! | `GET /earn/token` | token paying a user for an earn offer |
//! | `GET /spend/token` | token charging a user for a spend offer |
//! | `GET /p2p/token` | peer-to-peer transfer token |
//! | `GET /offers` | offer catalog |
//! | `POST /sign` | token for an arbitrary subject and payload |
//! | `GET /validate` | token validation, always `200` |
//!
//! Request validation failures are `400 {"error": "<message>"}`. Query
//! parameters that are present but empty count as missing.

use crate::error::ApiError;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use jwt_service_auth::{
    ClaimPayload, Claims, EarnClaims, OfferCatalog, OfferClaim, OfferKind, OfferRecord, Party,
    PayToUserClaims, RegisterClaims, Signer, SpendClaims, ValidationResult, Verifier,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Shared request handler state
pub struct AppState {
    /// Token signer
    pub signer: Signer,
    /// Token verifier
    pub verifier: Verifier,
    /// Offer lookup
    pub offers: Arc<dyn OfferCatalog>,
}

// Manual Debug impl: the offer catalog is a trait object
impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("signer", &self.signer)
            .field("verifier", &self.verifier)
            .finish_non_exhaustive()
    }
}

/// Build the service router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/register/token", get(register_token))
        .route("/earn/token", get(earn_token))
        .route("/spend/token", get(spend_token))
        .route("/p2p/token", get(p2p_token))
        .route("/offers", get(list_offers))
        .route("/sign", post(sign))
        .route("/validate", get(validate))
        .with_state(state)
}

/// Issued token
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Signed token
    pub jwt: String,
}

/// Offer catalog listing
#[derive(Debug, Serialize, Deserialize)]
pub struct OffersResponse {
    /// All offers
    pub offers: Vec<OfferRecord>,
}

#[derive(Debug, Default, Deserialize)]
struct RegisterQuery {
    user_id: Option<String>,
    device_id: Option<String>,
    iat: Option<String>,
    exp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OfferQuery {
    offer_id: Option<String>,
    user_id: Option<String>,
    device_id: Option<String>,
    nonce: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PayToUserQuery {
    offer_id: Option<String>,
    amount: Option<String>,
    sender_title: Option<String>,
    sender_description: Option<String>,
    recipient_id: Option<String>,
    recipient_title: Option<String>,
    recipient_description: Option<String>,
    user_id: Option<String>,
    device_id: Option<String>,
    nonce: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ValidateQuery {
    jwt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SignRequest {
    subject: Option<Value>,
    payload: Option<Value>,
}

/// A query value, treating empty as absent
fn param(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn integer_param(name: &str, value: Option<String>) -> Result<Option<i64>, ApiError> {
    param(value)
        .map(|v| {
            v.parse::<i64>()
                .map_err(|_| ApiError::bad_request(format!("'{name}' query param must be an integer")))
        })
        .transpose()
}

fn sign_token(
    state: &AppState,
    payload: &ClaimPayload,
    nonce: Option<&str>,
) -> Result<Json<TokenResponse>, ApiError> {
    let jwt = state.signer.sign_payload(payload, nonce)?;
    Ok(Json(TokenResponse { jwt }))
}

fn find_offer(state: &AppState, offer_id: &str, kind: OfferKind) -> Result<OfferRecord, ApiError> {
    let offer = state
        .offers
        .get_offer(offer_id)
        .ok_or_else(|| ApiError::bad_request(format!("cannot find offer with id '{offer_id}'")))?;

    if offer.kind != kind {
        let name = match kind {
            OfferKind::Earn => "earn",
            OfferKind::Spend => "spend",
        };
        return Err(ApiError::bad_request(format!(
            "requested offer is not an {name} one"
        )));
    }

    Ok(offer)
}

async fn register_token(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RegisterQuery>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user_id = param(query.user_id)
        .ok_or_else(|| ApiError::bad_request("'user_id' query param is missing"))?;

    let claims = RegisterClaims {
        user_id,
        device_id: param(query.device_id),
        iat: integer_param("iat", query.iat)?,
        exp: integer_param("exp", query.exp)?,
    };

    sign_token(&state, &claims.into(), None)
}

async fn earn_token(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OfferQuery>,
) -> Result<Json<TokenResponse>, ApiError> {
    let (Some(offer_id), Some(user_id)) = (param(query.offer_id), param(query.user_id)) else {
        return Err(ApiError::bad_request(
            "'offer_id' and/or 'user_id' query param is missing",
        ));
    };

    let offer = find_offer(&state, &offer_id, OfferKind::Earn)?;
    let claims = EarnClaims::from_offer(&offer, user_id, param(query.device_id));

    debug!(offer_id = %offer.id, amount = offer.amount, "Issuing earn token");
    sign_token(&state, &claims.into(), param(query.nonce).as_deref())
}

async fn spend_token(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OfferQuery>,
) -> Result<Json<TokenResponse>, ApiError> {
    let offer_id = param(query.offer_id)
        .ok_or_else(|| ApiError::bad_request("'offer_id' query param is missing"))?;

    let offer = find_offer(&state, &offer_id, OfferKind::Spend)?;
    let claims = SpendClaims::from_offer(&offer, param(query.user_id), param(query.device_id));

    debug!(offer_id = %offer.id, amount = offer.amount, "Issuing spend token");
    sign_token(&state, &claims.into(), param(query.nonce).as_deref())
}

async fn p2p_token(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PayToUserQuery>,
) -> Result<Json<TokenResponse>, ApiError> {
    let required = [
        ("offer_id", param(query.offer_id)),
        ("amount", param(query.amount)),
        ("sender_title", param(query.sender_title)),
        ("sender_description", param(query.sender_description)),
        ("recipient_id", param(query.recipient_id)),
        ("recipient_title", param(query.recipient_title)),
        ("recipient_description", param(query.recipient_description)),
    ];

    let missing: Vec<&str> = required
        .iter()
        .filter(|(_, value)| value.is_none())
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(ApiError::bad_request(format!(
            "{} query params are missing",
            missing.join(", ")
        )));
    }

    let [
        offer_id,
        amount,
        sender_title,
        sender_description,
        recipient_id,
        recipient_title,
        recipient_description,
    ] = required.map(|(_, value)| value.unwrap_or_default());

    let amount: u64 = amount
        .parse()
        .map_err(|_| ApiError::bad_request("'amount' query param must be a non-negative integer"))?;

    let claims = PayToUserClaims {
        offer: OfferClaim {
            id: offer_id,
            amount,
        },
        sender: Party {
            user_id: param(query.user_id),
            device_id: param(query.device_id),
            title: Some(sender_title),
            description: Some(sender_description),
        },
        recipient: Party {
            user_id: Some(recipient_id),
            device_id: None,
            title: Some(recipient_title),
            description: Some(recipient_description),
        },
    };

    sign_token(&state, &claims.into(), param(query.nonce).as_deref())
}

async fn list_offers(State(state): State<Arc<AppState>>) -> Json<OffersResponse> {
    Json(OffersResponse {
        offers: state.offers.offers(),
    })
}

async fn sign(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<TokenResponse>, ApiError> {
    const MISSING: &str = "missing 'subject' and/or 'payload' in request body";

    let request: SignRequest =
        serde_json::from_slice(&body).map_err(|_| ApiError::bad_request(MISSING))?;

    let subject = match request.subject {
        Some(Value::String(subject)) if !subject.is_empty() => subject,
        _ => return Err(ApiError::bad_request(MISSING)),
    };
    let claims: Claims = match request.payload {
        Some(Value::Object(claims)) => claims,
        _ => return Err(ApiError::bad_request(MISSING)),
    };

    sign_token(&state, &ClaimPayload::Arbitrary { subject, claims }, None)
}

async fn validate(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ValidateQuery>,
) -> Json<ValidationResult> {
    let token = query.jwt.unwrap_or_default();
    Json(state.verifier.validate(&token).await)
}
