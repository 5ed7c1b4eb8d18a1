// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client-side input checks, run before anything is sent.

use crate::api::models::{CreatePollRequest, CreateUserRequest, LoginRequest, UpdatePollRequest};
use crate::error::ApiError;

/// Minimum number of non-blank options a poll must carry.
pub const MIN_POLL_OPTIONS: usize = 2;

pub fn create_poll(
    title: &str,
    description: Option<&str>,
    options: &[String],
) -> Result<CreatePollRequest, ApiError> {
    let title = required("title", title)?;
    let options = poll_options(options)?;
    let description = description.map(str::trim).filter(|d| !d.is_empty()).map(str::to_owned);
    Ok(CreatePollRequest { title, description, options })
}

pub fn update_poll(
    title: Option<&str>,
    description: Option<&str>,
    options: Option<&[String]>,
) -> Result<UpdatePollRequest, ApiError> {
    if title.is_none() && description.is_none() && options.is_none() {
        return Err(ApiError::validation("Provide at least one field to update"));
    }
    Ok(UpdatePollRequest {
        title: title.map(|t| required("title", t)).transpose()?,
        description: description.map(|d| d.trim().to_owned()),
        options: options.map(poll_options).transpose()?,
    })
}

/// Sent as typed. The backend matches options exactly.
pub fn vote_option(option: &str) -> Result<String, ApiError> {
    if option.trim().is_empty() {
        return Err(ApiError::validation("option is required"));
    }
    Ok(option.to_owned())
}

pub fn login(email: &str, password: &str) -> Result<LoginRequest, ApiError> {
    Ok(LoginRequest { email: required("email", email)?, password: secret(password)? })
}

pub fn signup(email: &str, username: &str, password: &str) -> Result<CreateUserRequest, ApiError> {
    Ok(CreateUserRequest {
        email: required("email", email)?,
        username: required("username", username)?,
        password: secret(password)?,
    })
}

/// Trimmed, blank entries dropped, at least [`MIN_POLL_OPTIONS`] left.
fn poll_options(options: &[String]) -> Result<Vec<String>, ApiError> {
    let kept: Vec<String> =
        options.iter().map(|o| o.trim()).filter(|o| !o.is_empty()).map(str::to_owned).collect();
    if kept.len() < MIN_POLL_OPTIONS {
        return Err(ApiError::validation("Please provide at least 2 options"));
    }
    Ok(kept)
}

fn required(field: &str, value: &str) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::validation(format!("{field} is required")));
    }
    Ok(value.to_owned())
}

/// Passwords are sent verbatim; only emptiness is rejected.
fn secret(password: &str) -> Result<String, ApiError> {
    if password.is_empty() {
        return Err(ApiError::validation("password is required"));
    }
    Ok(password.to_owned())
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
