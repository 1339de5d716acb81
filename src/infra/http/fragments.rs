use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
};

use crate::{application::error::HttpError, cache::Section};

use super::{FRAGMENT_CACHE_HEADER, HttpState};

/// Query parameter naming the widget instance; every other parameter is
/// part of the fragment key.
const UID_PARAM: &str = "uid";

pub(super) async fn render_section(
    State(state): State<HttpState>,
    Path(section): Path<String>,
    Query(mut params): Query<BTreeMap<String, String>>,
) -> Result<Response, HttpError> {
    const SOURCE: &str = "infra::http::fragments::render_section";

    let section: Section = section.parse().map_err(|err| {
        HttpError::from_error(SOURCE, StatusCode::NOT_FOUND, "Unknown fragment section", &err)
    })?;

    let uid = params.remove(UID_PARAM).unwrap_or_default();
    let runtime = &state.runtime;
    let mut scope = runtime.scope(uid, params);

    runtime.widget.process(&mut scope).await;
    let outcome = match section {
        Section::Body => runtime.widget.body(&mut scope).await,
        Section::Header => runtime.widget.header(&mut scope).await,
    };

    let label = outcome.label();
    let mut response = Html(outcome.into_content()).into_response();
    response
        .headers_mut()
        .insert(FRAGMENT_CACHE_HEADER, HeaderValue::from_static(label));
    Ok(response)
}
