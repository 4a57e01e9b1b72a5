//! Authentication-related models

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Sign-in request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 1, message = "password must not be empty"))]
    pub password: String,
}

/// Sign-out request
#[derive(Debug, Default, Deserialize)]
pub struct SignOutRequest {
    /// Page the operator was on, kept for the post-sign-in return
    pub current_path: Option<String>,
}

/// Sign-out response
#[derive(Debug, Serialize)]
pub struct SignOutResponse {
    pub signed_out: bool,
    pub redirect_to: String,
}
