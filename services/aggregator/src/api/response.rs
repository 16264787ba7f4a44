//! Success envelope shared by the query endpoints.

use axum::{response::IntoResponse, Json};
use serde::Serialize;

/// `{"result": true, "msg": "...", "data": {...}}`
#[derive(Debug, Serialize)]
pub struct RestResponse<T> {
    pub result: bool,
    pub msg: String,
    pub data: T,
}

impl<T: Serialize> RestResponse<T> {
    pub fn ok(msg: impl Into<String>, data: T) -> Self {
        Self {
            result: true,
            msg: msg.into(),
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for RestResponse<T> {
    fn into_response(self) -> axum::response::Response {
        Json(self).into_response()
    }
}
