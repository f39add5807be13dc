//! HTTP client for the hosted data service's REST interface.
//!
//! Row sets are exposed at `{service_url}/rest/v1/{row_set}` and follow the
//! PostgREST conventions: filters and windows go in the query string, counts
//! come back in `Content-Range`, and `Prefer` selects the response shape.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder, Response};
use shared::{
    domain::{Task, TaskId},
    error::{ApiErrorBody, ErrorCode, ServiceError},
    protocol::{NewTaskRecord, TaskPatch, WindowQuery},
};
use tracing::debug;
use url::Url;

use crate::{config::Settings, DataService};

const REST_PREFIX: &str = "rest/v1/";
const PREFER: &str = "prefer";
const API_KEY: &str = "apikey";

pub struct RestDataService {
    http: Client,
    base: Url,
    api_key: Option<String>,
}

impl RestDataService {
    pub fn new(
        service_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let base = rest_base_url(service_url)?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ServiceError::transport(format!("failed to build http client: {err}")))?;
        Ok(Self {
            http,
            base,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ServiceError> {
        Self::new(
            &settings.service_url,
            settings.api_key.clone(),
            settings.request_timeout(),
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, row_set: &str) -> Result<Url, ServiceError> {
        if row_set.is_empty()
            || !row_set
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ServiceError::new(
                ErrorCode::NotFound,
                format!("invalid row set name '{row_set}'"),
            ));
        }
        self.base
            .join(row_set)
            .map_err(|err| ServiceError::new(ErrorCode::NotFound, err.to_string()))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.api_key {
            Some(key) => builder.header(API_KEY, key).bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl DataService for RestDataService {
    async fn count(&self, row_set: &str) -> Result<u64, ServiceError> {
        let url = self.endpoint(row_set)?;
        debug!(row_set, "rest: HEAD count");
        let response = self
            .request(Method::HEAD, url)
            .query(&[("select", "*")])
            .header(PREFER, "count=exact")
            .send()
            .await
            .map_err(transport_error)?;
        let response = ensure_success(response).await?;

        let range = response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ServiceError::decode("count response is missing Content-Range"))?;
        parse_content_range_total(range)
            .ok_or_else(|| ServiceError::decode(format!("unparseable Content-Range '{range}'")))
    }

    async fn query(&self, row_set: &str, window: &WindowQuery) -> Result<Vec<Task>, ServiceError> {
        let url = self.endpoint(row_set)?;
        debug!(
            row_set,
            order = window.order.as_order_param(),
            offset = window.offset,
            limit = window.limit,
            "rest: GET window"
        );
        let response = self
            .request(Method::GET, url)
            .query(&[
                ("select", "*".to_string()),
                ("order", window.order.as_order_param().to_string()),
                ("offset", window.offset.to_string()),
                ("limit", window.limit.to_string()),
            ])
            .send()
            .await
            .map_err(transport_error)?;
        let response = ensure_success(response).await?;
        response
            .json::<Vec<Task>>()
            .await
            .map_err(|err| ServiceError::decode(format!("invalid task rows: {err}")))
    }

    async fn insert(&self, row_set: &str, record: &NewTaskRecord) -> Result<Task, ServiceError> {
        let url = self.endpoint(row_set)?;
        debug!(row_set, "rest: POST insert");
        let response = self
            .request(Method::POST, url)
            .header(PREFER, "return=representation")
            .json(record)
            .send()
            .await
            .map_err(transport_error)?;
        let response = ensure_success(response).await?;
        let mut rows = response
            .json::<Vec<Task>>()
            .await
            .map_err(|err| ServiceError::decode(format!("invalid inserted row: {err}")))?;
        if rows.is_empty() {
            return Err(ServiceError::decode("insert returned no rows"));
        }
        Ok(rows.swap_remove(0))
    }

    async fn update(
        &self,
        row_set: &str,
        id: TaskId,
        patch: &TaskPatch,
    ) -> Result<(), ServiceError> {
        let url = self.endpoint(row_set)?;
        debug!(row_set, task_id = id.0, "rest: PATCH update");
        let response = self
            .request(Method::PATCH, url)
            .query(&[("id", format!("eq.{}", id.0))])
            .header(PREFER, "return=minimal")
            .json(patch)
            .send()
            .await
            .map_err(transport_error)?;
        ensure_success(response).await?;
        Ok(())
    }
}

fn rest_base_url(service_url: &str) -> Result<Url, ServiceError> {
    let trimmed = service_url.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ServiceError::transport(
            "service_url must start with http:// or https://",
        ));
    }
    Url::parse(&format!("{trimmed}/{REST_PREFIX}"))
        .map_err(|err| ServiceError::transport(format!("invalid service_url '{trimmed}': {err}")))
}

fn transport_error(err: reqwest::Error) -> ServiceError {
    if err.is_timeout() {
        ServiceError::transport(format!("request timed out: {err}"))
    } else {
        ServiceError::transport(err.to_string())
    }
}

async fn ensure_success(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(parsed) if parsed.message.is_some() => Err(parsed.into_service_error(status.as_u16())),
        _ if body.trim().is_empty() => {
            Err(ApiErrorBody::default().into_service_error(status.as_u16()))
        }
        _ => Err(ServiceError::new(
            ErrorCode::from_status(status.as_u16()),
            format!("{status}: {}", body.trim()),
        )),
    }
}

/// Total from `Content-Range: 0-9/1000` or `*/1000`.
pub fn parse_content_range_total(raw: &str) -> Option<u64> {
    let (_, total) = raw.trim().rsplit_once('/')?;
    total.trim().parse().ok()
}

#[cfg(test)]
#[path = "tests/rest_tests.rs"]
mod tests;
