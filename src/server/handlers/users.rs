use axum::{extract::State, response::Json};
use serde::Deserialize;
use serde_json::{json, Value};
use utoipa::ToSchema;

use crate::auth::AuthUser;
use crate::errors::CoreResult;
use crate::server::app::AppState;

const VERIFICATION_SENT: &str = "Verification email sent successfully";

#[derive(Debug, Deserialize, ToSchema)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyOtpRequest {
    pub otp: String,
    pub otp_key: String,
}

fn detail(message: &str) -> Json<Value> {
    Json(json!({"detail": message}))
}

/// Unknown addresses get the same answer as known ones.
pub async fn resend_verification_email_anonymous(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> CoreResult<Json<Value>> {
    state
        .user_service()
        .resend_verification_for_email(&payload.email)
        .await?;
    Ok(detail(VERIFICATION_SENT))
}

pub async fn change_email(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<EmailRequest>,
) -> CoreResult<Json<Value>> {
    state
        .user_service()
        .change_email(&user, &payload.email)
        .await?;
    Ok(detail("Email updated successfully"))
}

pub async fn resend_verification_email(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Json(payload): Json<EmailRequest>,
) -> CoreResult<Json<Value>> {
    state
        .user_service()
        .resend_verification_for_linked_email(&payload.email)
        .await?;
    Ok(detail(VERIFICATION_SENT))
}

pub async fn resend_my_verification_email(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> CoreResult<Json<Value>> {
    state
        .user_service()
        .resend_my_verification_email(&user)
        .await?;
    Ok(detail(VERIFICATION_SENT))
}

pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> CoreResult<Json<Value>> {
    state.user_service().change_password(&user).await?;
    Ok(detail("Password change initiated"))
}

pub async fn init_otp(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> CoreResult<Json<Value>> {
    let enrollment = state.user_service().init_otp(&user).await?;
    Ok(Json(json!({
        "detail": "OTP initialized",
        "data": {
            "totp_secret": enrollment.totp_secret,
            "totp_uri": enrollment.totp_uri,
        },
    })))
}

pub async fn verify_otp(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<VerifyOtpRequest>,
) -> CoreResult<Json<Value>> {
    state
        .user_service()
        .verify_otp(&user, &payload.otp, &payload.otp_key)
        .await?;
    Ok(detail("OTP verified successfully"))
}

pub async fn disable_otp(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> CoreResult<Json<Value>> {
    state.user_service().disable_otp(&user).await?;
    Ok(detail("OTP disabled successfully"))
}
