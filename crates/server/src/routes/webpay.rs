//! Webpay return callback.
//!
//! Webpay sends the shopper's browser back here, either as a form post or a
//! GET, with `token_ws` for a completed payment form or `TBK_TOKEN` and
//! `TBK_ORDEN_COMPRA` when the shopper cancelled. The browser always ends up
//! on a frontend page, except when the callback is unusable or the gateway
//! cannot confirm, which render an HTML error page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{
        Query, State,
        rejection::{FormRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use crate::services::reconcile::{ReturnError, ReturnOutcome};
use crate::state::AppState;

/// Parameters Webpay may send back, in the body or the query string.
#[derive(Debug, Default, Deserialize)]
pub struct ReturnParams {
    pub token_ws: Option<String>,
    #[serde(rename = "TBK_TOKEN")]
    pub tbk_token: Option<String>,
    #[serde(rename = "TBK_ORDEN_COMPRA")]
    pub tbk_buy_order: Option<String>,
    #[serde(rename = "TBK_ID_SESION")]
    pub tbk_session_id: Option<String>,
}

impl ReturnParams {
    /// Merge body and query parameters, preferring the body.
    fn merge(body: Self, query: Self) -> Self {
        Self {
            token_ws: non_blank(body.token_ws).or_else(|| non_blank(query.token_ws)),
            tbk_token: non_blank(body.tbk_token).or_else(|| non_blank(query.tbk_token)),
            tbk_buy_order: non_blank(body.tbk_buy_order).or_else(|| non_blank(query.tbk_buy_order)),
            tbk_session_id: non_blank(body.tbk_session_id)
                .or_else(|| non_blank(query.tbk_session_id)),
        }
    }

    /// Webpay's cancel and timeout flows send `TBK_*` fields and no `token_ws`.
    const fn is_abort(&self) -> bool {
        self.token_ws.is_none() && (self.tbk_token.is_some() || self.tbk_buy_order.is_some())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Error page template.
#[derive(Template, WebTemplate)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub store_name: String,
    pub title: String,
    pub message: String,
    pub frontend_url: String,
}

/// Handle the Webpay return callback.
#[instrument(skip_all)]
pub async fn webpay_return(
    State(state): State<AppState>,
    query: Result<Query<ReturnParams>, QueryRejection>,
    form: Result<Form<ReturnParams>, FormRejection>,
) -> Response {
    let query = query.map(|Query(q)| q).unwrap_or_default();
    let body = form.map(|Form(f)| f).unwrap_or_default();
    let params = ReturnParams::merge(body, query);
    let frontend_url = &state.config().frontend_url;

    if params.is_abort() {
        tracing::info!(
            buy_order = params.tbk_buy_order.as_deref().unwrap_or_default(),
            session_id = params.tbk_session_id.as_deref().unwrap_or_default(),
            "Payment aborted on Webpay"
        );
        let outcome = ReturnOutcome::Aborted {
            buy_order: params.tbk_buy_order,
        };
        return Redirect::to(outcome.redirect_url(frontend_url).as_str()).into_response();
    }

    let token = params.token_ws.unwrap_or_default();

    match state.reconciler().reconcile(&token).await {
        Ok(outcome) => Redirect::to(outcome.redirect_url(frontend_url).as_str()).into_response(),
        Err(err) => error_page(&state, &err),
    }
}

fn error_page(state: &AppState, err: &ReturnError) -> Response {
    let (status, title, message) = match err {
        ReturnError::MissingToken => {
            tracing::warn!("Webpay callback without token_ws");
            (
                StatusCode::BAD_REQUEST,
                "Payment error",
                "The payment response from Webpay is missing its token.",
            )
        }
        ReturnError::Confirmation(_) => {
            let event_id = sentry::capture_error(err);
            tracing::error!(
                error = %err,
                sentry_event_id = %event_id,
                "Webpay confirmation failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Payment error",
                "We could not confirm your payment with Webpay. Please contact the store before retrying.",
            )
        }
    };

    let config = state.config();
    let page = ErrorTemplate {
        store_name: config.store_name.clone(),
        title: title.to_string(),
        message: message.to_string(),
        frontend_url: config.frontend_url.to_string(),
    };

    (status, page).into_response()
}
