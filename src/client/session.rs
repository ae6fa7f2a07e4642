//! Form-based portal login
//!
//! The portal authenticates through a single-sign-on form hosted on a
//! separate auth host: the home page seeds session cookies, an auth redirect
//! leads to the login form, the form's hidden fields are echoed back with
//! the credentials, and a validation endpoint confirms the session took.
//! The login form is a handful of hidden inputs, so they are pulled out with
//! regular expressions rather than a full HTML parse.

use regex::Regex;
use reqwest::header;
use url::Url;

use super::endpoints::Endpoints;
use crate::config::PortalConfig;
use crate::error::{Error, Result, SessionError};

/// Form field the portal expects the username under
const USERNAME_FIELD: &str = "USER";
/// Form field the portal expects the password under
const PASSWORD_FIELD: &str = "password";
/// Marker the auth host renders into a rejected login response
const BAD_LOGIN_MARKER: &str = "Bad Login";

/// Drive the full login flow, leaving the session cookies on `http`
pub(crate) async fn login(
    http: &reqwest::Client,
    endpoints: &Endpoints,
    portal: &PortalConfig,
) -> Result<()> {
    // The home page sets the cookies the auth redirect depends on.
    let _ = http.get(endpoints.home()).send().await?;

    let login_page = http.get(endpoints.login_redirect()?).send().await?;
    let landed = login_page.url().clone();
    check_login_redirect(&landed, &portal.login_page)?;

    let body = login_page.text().await?;
    let mut fields = extract_hidden_fields(&body)?;
    if fields.is_empty() {
        return Err(SessionError::LoginFormNotFound {
            url: landed.to_string(),
        }
        .into());
    }
    tracing::debug!(fields = fields.len(), "extracted hidden login form fields");
    fields.push((USERNAME_FIELD.to_string(), portal.username.clone()));
    fields.push((PASSWORD_FIELD.to_string(), portal.password.clone()));

    let response = http
        .post(landed.clone())
        .header(header::REFERER, landed.as_str())
        .header(header::ORIGIN, landed.origin().ascii_serialization())
        .form(&fields)
        .send()
        .await?;
    // A successful login redirects away from the form; landing back on it
    // (or seeing the marker) means the credentials were rejected.
    let final_url = response.url().clone();
    let text = response.text().await?;
    if text.contains(BAD_LOGIN_MARKER) || final_url == landed {
        return Err(SessionError::InvalidCredentials.into());
    }

    let validation = http.post(endpoints.auth_validate()?).send().await?;
    if !validation.status().is_success() {
        return Err(SessionError::NotAuthenticated.into());
    }
    Ok(())
}

/// The auth redirect must land on the configured login form URL (ignoring
/// its query string); anything else means the portal changed its flow.
fn check_login_redirect(landed: &Url, expected_login_page: &str) -> Result<()> {
    let expected = Url::parse(expected_login_page)?;
    if strip_query(landed) != strip_query(&expected) {
        return Err(SessionError::BadLoginRedirect {
            expected: expected_login_page.to_string(),
            actual: landed.to_string(),
        }
        .into());
    }
    Ok(())
}

fn strip_query(url: &Url) -> Url {
    let mut stripped = url.clone();
    stripped.set_query(None);
    stripped.set_fragment(None);
    stripped
}

/// Pull `name`/`value` pairs out of every hidden input on the page
fn extract_hidden_fields(html: &str) -> Result<Vec<(String, String)>> {
    let input_tag = compile(r"(?is)<input\b[^>]*>")?;
    let hidden_type = compile(r#"(?i)type\s*=\s*["']?hidden["']?"#)?;
    let name_attr = compile(r#"(?i)\bname\s*=\s*["']([^"']*)["']"#)?;
    let value_attr = compile(r#"(?i)\bvalue\s*=\s*["']([^"']*)["']"#)?;

    let mut fields = Vec::new();
    for tag in input_tag.find_iter(html) {
        let tag = tag.as_str();
        if !hidden_type.is_match(tag) {
            continue;
        }
        let Some(name) = name_attr.captures(tag).and_then(|c| c.get(1)) else {
            continue;
        };
        let value = value_attr
            .captures(tag)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        fields.push((name.as_str().to_string(), value));
    }
    Ok(fields)
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::Other(format!("bad field pattern: {e}")))
}
