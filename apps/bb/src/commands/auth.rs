use super::{Context, print_suggestion};
use anyhow::Result;
use bb_auth::BasicCredentials;
use colored::Colorize;

pub async fn login_basic(username: String, app_password: Option<String>) -> Result<()> {
    let ctx = Context::open(false)?;

    let app_password = match app_password {
        Some(p) => p,
        None => rpassword::prompt_password("App password: ")?,
    };
    if app_password.is_empty() {
        anyhow::bail!("app password must not be empty");
    }

    ctx.basic.store_credentials(&BasicCredentials {
        username: username.clone(),
        app_password,
    })?;
    println!(
        "{} Stored app password for {}",
        "✓".green(),
        username.bold()
    );

    // Probe the API so a typo'd password fails now, not on first use.
    match ctx.api_client().current_user().await {
        Ok(user) => {
            let who = user.display_name.or(user.username).unwrap_or_default();
            println!("  Authenticated as {who}");
        }
        Err(err) => {
            eprintln!("{} credential check failed: {err}", "warning:".yellow());
            if let Some(hint) = err.suggestion() {
                eprintln!("{} {hint}", "hint:".yellow());
            }
        }
    }
    Ok(())
}

pub async fn status() -> Result<()> {
    let ctx = Context::open(false)?;

    println!("{}", "Credential status".bold());
    println!("  Storage: {}", ctx.store.available_backends().join(", "));

    match ctx.basic.credentials()? {
        Some(creds) => println!("  Basic auth: {} ({})", "configured".green(), creds.username),
        None => println!("  Basic auth: {}", "not configured".dimmed()),
    }
    match ctx.oauth.stored_token()? {
        Some(token) if !token.is_expired() => println!("  OAuth token: {}", "valid".green()),
        Some(_) => println!("  OAuth token: {}", "expired".yellow()),
        None => println!("  OAuth token: {}", "none".dimmed()),
    }

    match ctx.api_client().current_user().await {
        Ok(user) => {
            let who = user.display_name.or(user.username).unwrap_or_default();
            println!("  API check: {} (as {who})", "ok".green());
        }
        Err(err) => {
            println!("  API check: {} ({err})", "failed".red());
            if let Some(hint) = err.suggestion() {
                println!("  {} {hint}", "hint:".yellow());
            }
        }
    }
    Ok(())
}

/// Clears both Basic and OAuth data; logging out of nothing succeeds.
pub async fn logout() -> Result<()> {
    let ctx = Context::open(false)?;
    ctx.basic.delete()?;
    ctx.oauth.logout()?;
    println!("{} Removed all stored credentials", "✓".green());
    Ok(())
}

pub async fn whoami() -> Result<()> {
    let ctx = Context::open(false)?;
    let user = ctx.api_client().current_user().await.map_err(print_suggestion)?;

    if let Some(name) = &user.display_name {
        println!("{}", name.bold());
    }
    if let Some(username) = &user.username {
        println!("  username: {username}");
    }
    if let Some(uuid) = &user.uuid {
        println!("  uuid: {uuid}");
    }
    Ok(())
}
