//! Request / response DTO (Data Transfer Object) types.
//!
//! These types are used by Axum handlers for JSON and form
//! (de)serialisation; the JSON ones carry [`utoipa`] attributes for the
//! OpenAPI document.

pub mod conversation;
pub mod ui;
