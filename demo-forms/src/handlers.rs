use askama::Template;
use axum::{
    Form, Json,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};

use websession_axum::{CSRF_FORM_FIELD, CsrfToken, IntoResponseError, SessionHandle};

#[derive(Template)]
#[template(path = "index.j2")]
struct IndexTemplate<'a> {
    csrf_field: &'a str,
    csrf_token: &'a str,
    visits: i64,
    success: Option<String>,
    error: Option<String>,
    name: String,
    email: String,
    message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContactForm {
    name: String,
    email: String,
    message: String,
}

fn as_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub(crate) async fn index(session: SessionHandle, token: CsrfToken) -> Response {
    let mut session = session.lock().await;

    let visits = match session.increment("visits", 1).into_response_error() {
        Ok(visits) => visits,
        Err(err) => return err.into_response(),
    };
    let template = IndexTemplate {
        csrf_field: CSRF_FORM_FIELD,
        csrf_token: token.as_str(),
        visits,
        success: session.get_flash("success").map(as_text),
        error: session.get_flash("error").map(as_text),
        name: as_text(session.get_input("name", "")),
        email: as_text(session.get_input("email", "")),
        message: as_text(session.get_input("message", "")),
    };
    session.clear_input();

    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

fn validate(form: &ContactForm) -> Result<(), &'static str> {
    if form.name.trim().is_empty() {
        return Err("Please tell us your name.");
    }
    if !form.email.contains('@') {
        return Err("Please enter a valid email address.");
    }
    if form.message.trim().len() < 10 {
        return Err("The message must be at least 10 characters long.");
    }
    Ok(())
}

pub(crate) async fn contact(session: SessionHandle, Form(form): Form<ContactForm>) -> Redirect {
    let mut session = session.lock().await;

    match validate(&form) {
        Ok(()) => {
            tracing::info!(name = %form.name, "Contact form accepted");
            session.clear_input();
            session.set_flash("success", format!("Thanks {}, your message was sent.", form.name));
        }
        Err(reason) => {
            tracing::debug!("Contact form rejected: {}", reason);
            session.set_input("name", form.name);
            session.set_input("email", form.email);
            session.set_input("message", form.message);
            session.set_flash("error", reason);
        }
    }
    Redirect::to("/")
}

pub(crate) async fn logout(session: SessionHandle) -> Response {
    let mut session = session.lock().await;
    match session.destroy().into_response_error() {
        Ok(()) => Redirect::to("/").into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn webhook(Json(payload): Json<Value>) -> Json<Value> {
    tracing::info!("Webhook received: {}", payload);
    Json(json!({ "received": true }))
}
