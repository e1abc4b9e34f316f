//! Identifying the acting user.
//!
//! Authentication happens upstream of this service. Every user-facing route trusts the `X-USER-ID` header, which the
//! [`ActingUser`] extractor parses.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpRequest};
use log::*;
use order_engine::db_types::UserId;

use crate::errors::ServerError;

pub const USER_ID_HEADER: &str = "X-USER-ID";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActingUser(pub UserId);

impl ActingUser {
    pub fn id(&self) -> UserId {
        self.0
    }
}

impl FromRequest for ActingUser {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(acting_user(req))
    }
}

fn acting_user(req: &HttpRequest) -> Result<ActingUser, ServerError> {
    let value = req
        .headers()
        .get(USER_ID_HEADER)
        .ok_or_else(|| ServerError::InvalidUserHeader(format!("The {USER_ID_HEADER} header is required")))?;
    let value = value.to_str().map_err(|e| {
        debug!("💻️ {USER_ID_HEADER} header is not valid text. {e}");
        ServerError::InvalidUserHeader(format!("{USER_ID_HEADER} must be a numeric user id"))
    })?;
    value
        .trim()
        .parse::<UserId>()
        .map(ActingUser)
        .map_err(|_| ServerError::InvalidUserHeader(format!("{USER_ID_HEADER} must be a numeric user id, got '{value}'")))
}
