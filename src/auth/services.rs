use axum::extract::FromRef;
use bytes::Bytes;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{
        AuthResponse, ChangePasswordRequest, LoginRequest, PublicUser, RegisterRequest,
        ResetPasswordRequest,
    },
    jwt::JwtKeys,
    password::{
        digest_reset_token, generate_reset_token, hash_password, normalize_email,
        validate_password, verify_password,
    },
    repo::{EmailTaken, ProfilePatch, User},
};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
    storage::{avatar_key, ext_from_mime, image_url},
};

pub async fn public_user(state: &AppState, user: &User) -> PublicUser {
    PublicUser {
        id: user.id,
        email: user.email.clone(),
        name: user.name.clone(),
        image_url: image_url(
            state.storage.as_ref(),
            user.image_key.as_deref(),
            state.config.storage.url_ttl_seconds,
        )
        .await,
        role: user.role.clone(),
        created_at: user.created_at,
    }
}

async fn session(state: &AppState, user: &User) -> AppResult<AuthResponse> {
    let keys = JwtKeys::from_ref(state);
    let tokens = keys.sign_pair(user.id, user.token_version)?;
    Ok(AuthResponse {
        tokens,
        user: public_user(state, user).await,
    })
}

async fn load_user(state: &AppState, user_id: Uuid) -> AppResult<User> {
    state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))
}

/// A concurrent writer can take the email between our lookup and the write.
fn email_conflict(e: anyhow::Error) -> AppError {
    if e.is::<EmailTaken>() {
        AppError::Conflict("Email already registered".into())
    } else {
        AppError::Internal(e)
    }
}

fn normalize_name(raw: &str) -> AppResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Name is required".into()));
    }
    Ok(name.to_string())
}

#[instrument(skip(state, req))]
pub async fn register(state: &AppState, req: RegisterRequest) -> AppResult<AuthResponse> {
    let email = normalize_email(&req.email)?;
    validate_password(&req.password)?;
    let name = normalize_name(&req.name)?;

    if state.users.find_by_email(&email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let hash = hash_password(&req.password)?;
    let user = state
        .users
        .create(&email, &hash, &name)
        .await
        .map_err(email_conflict)?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    session(state, &user).await
}

#[instrument(skip(state, req))]
pub async fn login(state: &AppState, req: LoginRequest) -> AppResult<AuthResponse> {
    let email = normalize_email(&req.email)?;
    if req.password.is_empty() {
        return Err(AppError::Validation("Password is required".into()));
    }

    let Some(user) = state.users.find_by_email(&email).await? else {
        warn!(%email, "login unknown email");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    };

    if !verify_password(&req.password, &user.password_hash)? {
        warn!(%email, user_id = %user.id, "login invalid password");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    info!(user_id = %user.id, email = %user.email, "user logged in");
    session(state, &user).await
}

#[instrument(skip_all)]
pub async fn refresh(state: &AppState, refresh_token: &str) -> AppResult<AuthResponse> {
    let keys = JwtKeys::from_ref(state);
    let claims = keys
        .verify_refresh(refresh_token)
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;

    let user = load_user(state, claims.sub).await?;
    if claims.ver != user.token_version {
        warn!(user_id = %user.id, "refresh with revoked token");
        return Err(AppError::Unauthorized("Refresh token revoked".into()));
    }
    session(state, &user).await
}

/// Revokes every refresh token issued so far. Access tokens run out on their own TTL.
#[instrument(skip(state))]
pub async fn logout(state: &AppState, user_id: Uuid) -> AppResult<()> {
    state.users.bump_token_version(user_id).await?;
    info!(%user_id, "user logged out");
    Ok(())
}

/// Always succeeds for well-formed addresses so callers cannot probe which
/// emails have accounts.
#[instrument(skip(state))]
pub async fn forgot_password(state: &AppState, email: &str) -> AppResult<()> {
    let email = normalize_email(email)?;
    let Some(user) = state.users.find_by_email(&email).await? else {
        info!(%email, "password reset requested for unknown email");
        return Ok(());
    };

    let token = generate_reset_token();
    let expires_at =
        OffsetDateTime::now_utc() + TimeDuration::minutes(state.config.reset.ttl_minutes);
    state
        .users
        .insert_reset_token(user.id, &digest_reset_token(&token), expires_at)
        .await?;

    let link = format!("{}?token={}", state.config.reset.link_base, token);
    state.mailer.send_password_reset(&user.email, &link).await?;
    info!(user_id = %user.id, "password reset issued");
    Ok(())
}

#[instrument(skip_all)]
pub async fn reset_password(state: &AppState, req: ResetPasswordRequest) -> AppResult<()> {
    validate_password(&req.new_password)?;
    let user_id = state
        .users
        .consume_reset_token(&digest_reset_token(&req.token), OffsetDateTime::now_utc())
        .await?
        .ok_or_else(|| AppError::Validation("Reset link is invalid or expired".into()))?;

    let hash = hash_password(&req.new_password)?;
    state.users.set_password(user_id, &hash).await?;
    info!(%user_id, "password reset completed");
    Ok(())
}

/// Returns a fresh session because the change revokes the caller's refresh token too.
#[instrument(skip(state, req))]
pub async fn change_password(
    state: &AppState,
    user_id: Uuid,
    req: ChangePasswordRequest,
) -> AppResult<AuthResponse> {
    validate_password(&req.new_password)?;
    let user = load_user(state, user_id).await?;
    if !verify_password(&req.old_password, &user.password_hash)? {
        warn!(%user_id, "change password with wrong current password");
        return Err(AppError::Unauthorized("Current password is incorrect".into()));
    }

    let hash = hash_password(&req.new_password)?;
    state.users.set_password(user_id, &hash).await?;
    info!(%user_id, "password changed");

    let user = load_user(state, user_id).await?;
    session(state, &user).await
}

#[instrument(skip(state))]
pub async fn get_me(state: &AppState, user_id: Uuid) -> AppResult<PublicUser> {
    let user = load_user(state, user_id).await?;
    Ok(public_user(state, &user).await)
}

#[instrument(skip(state))]
pub async fn update_profile(
    state: &AppState,
    user_id: Uuid,
    patch: ProfilePatch,
) -> AppResult<PublicUser> {
    let name = patch.name.as_deref().map(normalize_name).transpose()?;
    let email = patch.email.as_deref().map(normalize_email).transpose()?;
    if name.is_none() && email.is_none() {
        return Err(AppError::Validation("Nothing to update".into()));
    }

    if let Some(email) = email.as_deref() {
        if let Some(other) = state.users.find_by_email(email).await? {
            if other.id != user_id {
                warn!(%user_id, %email, "email already registered");
                return Err(AppError::Conflict("Email already registered".into()));
            }
        }
    }

    let user = state
        .users
        .update_profile(user_id, &ProfilePatch { name, email })
        .await
        .map_err(email_conflict)?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    info!(%user_id, "profile updated");
    Ok(public_user(state, &user).await)
}

#[instrument(skip(state, body), fields(size = body.len()))]
pub async fn set_avatar(
    state: &AppState,
    user_id: Uuid,
    body: Bytes,
    content_type: &str,
) -> AppResult<PublicUser> {
    if ext_from_mime(content_type).is_none() {
        return Err(AppError::Validation(format!(
            "Unsupported image type: {content_type}"
        )));
    }
    if body.is_empty() {
        return Err(AppError::Validation("Image is empty".into()));
    }

    let user = load_user(state, user_id).await?;
    let key = avatar_key(user_id, content_type);
    state
        .storage
        .put_object(&key, body, content_type)
        .await
        .map_err(AppError::Storage)?;

    let updated = state
        .users
        .set_image_key(user_id, &key)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    if let Some(old) = user.image_key.as_deref() {
        if let Err(e) = state.storage.delete_object(old).await {
            warn!(error = %e, key = %old, "failed to delete previous avatar");
        }
    }

    info!(%user_id, %key, "avatar updated");
    Ok(public_user(state, &updated).await)
}
