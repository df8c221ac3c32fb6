//! Request extractors whose rejections render as [`KnownErrors`], so a
//! malformed body, path or query string gets the same `{ "message": … }`
//! shape as every other failure.

use crate::known_errors::KnownErrors;
use axum::extract::FromRequest;
use axum::extract::FromRequestParts;

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(KnownErrors))]
pub struct AppJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(KnownErrors))]
pub struct AppPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(KnownErrors))]
pub struct AppQuery<T>(pub T);
