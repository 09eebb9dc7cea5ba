//! `login` / `logout` / `whoami` (spec.md 4.4.3).

use crate::error::Result;
use crate::remote::{cloud, session};

fn cloud_base_url() -> Result<String> {
    std::env::var("ENVSYNC_CLOUD_URL").map_err(|_| {
        crate::error::Error::Other("ENVSYNC_CLOUD_URL must be set to log in".into())
    })
}

pub fn login(token: Option<String>) -> Result<()> {
    let base_url = cloud_base_url()?;
    let token = match token {
        Some(t) => t,
        None => dialoguer::Password::new()
            .with_prompt("Access token")
            .interact()
            .map_err(|e| crate::error::Error::Other(format!("failed to read token: {e}")))?,
    };

    let identity = cloud::validate_and_fetch_identity(&base_url, &token)?;
    let user_id = identity
        .get("user")
        .and_then(|u| u.get("id"))
        .and_then(|v| v.as_str())
        .map(str::to_string);
    let email = identity
        .get("user")
        .and_then(|u| u.get("email"))
        .and_then(|v| v.as_str())
        .map(str::to_string);

    session::save(&session::Session {
        access_token: token,
        refresh_token: None,
        expires_at: None,
        user_id,
        email: email.clone(),
    })?;

    crate::cli::output::success(&format!(
        "logged in as {}",
        email.unwrap_or_else(|| "<unknown>".to_string())
    ));
    Ok(())
}

pub fn logout() -> Result<()> {
    session::clear()?;
    crate::cli::output::success("logged out");
    Ok(())
}

pub fn whoami() -> Result<()> {
    let base_url = cloud_base_url()?;
    let session = session::load_valid()?;
    let identity = cloud::validate_and_fetch_identity(&base_url, &session.access_token)?;
    println!("{}", serde_json::to_string_pretty(&identity)?);
    Ok(())
}
