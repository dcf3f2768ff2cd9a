use super::{Context, print_suggestion};
use anyhow::Result;
use bb_auth::{LoginOptions, OAuthApp, oauth::DEFAULT_SCOPES};
use colored::Colorize;
use std::time::Duration;

pub async fn setup(
    client_id: String,
    client_secret: Option<String>,
    redirect_uri: String,
    scopes: Vec<String>,
) -> Result<()> {
    let ctx = Context::open(false)?;

    let client_secret = match client_secret {
        Some(s) => s,
        None => rpassword::prompt_password("Client secret: ")?,
    };
    if client_secret.is_empty() {
        anyhow::bail!("client secret must not be empty");
    }

    let scopes = if scopes.is_empty() {
        DEFAULT_SCOPES.iter().map(|s| (*s).to_owned()).collect()
    } else {
        scopes
    };

    ctx.oauth.setup(&OAuthApp {
        client_id,
        client_secret,
        redirect_uri,
        scopes,
    })?;
    println!("{} OAuth consumer registered", "✓".green());
    println!("  Run {} to authenticate", "bb oauth login".bold());
    Ok(())
}

pub async fn login(port: Option<u16>, no_browser: bool, timeout_secs: u64) -> Result<()> {
    let ctx = Context::open(no_browser)?;
    let opts = LoginOptions {
        port: port.unwrap_or(ctx.config.callback_port),
        timeout: Duration::from_secs(timeout_secs),
    };

    if !no_browser {
        println!("Opening your browser to authorize...");
    }
    let token = match ctx.oauth.login(&opts).await {
        Ok(token) => token,
        Err(err) => return Err(print_suggestion(err.into())),
    };
    println!("{} OAuth login successful", "✓".green());
    if let Some(at) = token.expires_at() {
        println!("  Token expires at {at}");
    }

    match ctx.api_client().current_user().await {
        Ok(user) => {
            let who = user.display_name.or(user.username).unwrap_or_default();
            println!("  Authenticated as {who}");
        }
        Err(err) => {
            eprintln!("{} identity check failed: {err}", "warning:".yellow());
        }
    }
    Ok(())
}

pub async fn client_credentials() -> Result<()> {
    let ctx = Context::open(true)?;
    let token = match ctx.oauth.client_credentials().await {
        Ok(token) => token,
        Err(err) => return Err(print_suggestion(err.into())),
    };
    println!("{} Obtained token via client credentials", "✓".green());
    if let Some(at) = token.expires_at() {
        println!("  Token expires at {at}");
    }
    Ok(())
}

pub async fn status() -> Result<()> {
    let ctx = Context::open(false)?;

    println!("{}", "OAuth status".bold());
    println!("  Storage: {}", ctx.store.available_backends().join(", "));

    match ctx.oauth.app()? {
        Some(app) => {
            println!("  Consumer: {}", app.client_id);
            println!("  Redirect URI: {}", app.redirect_uri);
            println!("  Scopes: {}", app.scope_param());
        }
        None => {
            println!("  Consumer: {}", "not configured".dimmed());
            println!("  Run {} first", "bb oauth setup".bold());
            return Ok(());
        }
    }

    match ctx.oauth.stored_token()? {
        Some(token) if !token.is_expired() => {
            println!("  Token: {}", "valid".green());
            if let Some(at) = token.expires_at() {
                println!("  Expires at: {at}");
            }
            if token.refresh_token.is_some() {
                println!("  Refresh: available");
            }
        }
        Some(token) => {
            if token.refresh_token.is_some() {
                println!("  Token: {} (will refresh on next use)", "expired".yellow());
            } else {
                println!("  Token: {} (re-run bb oauth login)", "expired".yellow());
            }
        }
        None => println!("  Token: {}", "none".dimmed()),
    }
    Ok(())
}

pub async fn logout() -> Result<()> {
    let ctx = Context::open(false)?;
    ctx.oauth.logout()?;
    println!("{} Removed OAuth app and token", "✓".green());
    Ok(())
}
