//! Authentication commands.

use super::App;
use crate::output::{self, OutputFormat};
use anyhow::{bail, Result};
use furrow_auth::{AuthError, SessionUser};
use std::io::{self, Write};

/// Prompt for email and a hidden password.
fn prompt_credentials() -> Result<(String, String)> {
    print!("Email: ");
    io::stdout().flush()?;
    let mut email = String::new();
    io::stdin().read_line(&mut email)?;
    let email = email.trim().to_string();
    if email.is_empty() {
        bail!("Email is required");
    }

    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        bail!("Password is required");
    }

    Ok((email, password))
}

fn display_name(user: &SessionUser) -> &str {
    match user.display_name.as_deref() {
        Some(name) => name,
        None if !user.email.is_empty() => &user.email,
        None => &user.user_id,
    }
}

/// Returns true (after telling the user) if someone is already signed in.
fn already_logged_in(app: &App, format: &OutputFormat) -> bool {
    match app.session.current_user() {
        Some(user) => {
            output::print_success(
                &format!("Already logged in as {}", display_name(&user)),
                format,
            );
            true
        }
        None => false,
    }
}

fn report_auth_error(action: &str, err: &AuthError, format: &OutputFormat) {
    output::print_error(&format!("{} failed: {} ({})", action, err, err.code()), format);
}

/// Login with email and password.
pub async fn login(app: &App, format: &OutputFormat) -> Result<()> {
    if already_logged_in(app, format) {
        return Ok(());
    }

    let (email, password) = prompt_credentials()?;
    println!("Logging in...");

    match app.session.sign_in(&email, &password).await {
        Ok(user) => {
            output::print_success(&format!("Logged in as {}", display_name(&user)), format)
        }
        Err(e) => report_auth_error("Login", &e, format),
    }
    Ok(())
}

/// Create an account with email and password.
pub async fn signup(app: &App, format: &OutputFormat) -> Result<()> {
    if already_logged_in(app, format) {
        return Ok(());
    }

    let (email, password) = prompt_credentials()?;
    let confirm = rpassword::prompt_password("Confirm password: ")?;
    if confirm != password {
        output::print_error("Passwords do not match", format);
        return Ok(());
    }
    println!("Creating account...");

    match app.session.sign_up(&email, &password).await {
        Ok(user) => output::print_success(
            &format!("Account created. Logged in as {}", display_name(&user)),
            format,
        ),
        Err(e) => report_auth_error("Sign-up", &e, format),
    }
    Ok(())
}

/// Login through Google in the browser.
pub async fn login_google(app: &App, format: &OutputFormat) -> Result<()> {
    if already_logged_in(app, format) {
        return Ok(());
    }

    println!("Opening browser for Google sign-in...");
    match app.session.sign_in_with_google().await {
        Ok(user) => {
            output::print_success(&format!("Logged in as {}", display_name(&user)), format)
        }
        Err(e) => report_auth_error("Google sign-in", &e, format),
    }
    Ok(())
}

/// Logout and clear the stored session.
pub async fn logout(app: &App, format: &OutputFormat) -> Result<()> {
    if app.session.current_user().is_none() {
        output::print_success("Not logged in", format);
        return Ok(());
    }

    match app.session.sign_out().await {
        Ok(()) => output::print_success("Logged out successfully", format),
        Err(e) => report_auth_error("Logout", &e, format),
    }
    Ok(())
}

/// Show who is signed in.
pub async fn status(app: &App, format: &OutputFormat) -> Result<()> {
    let state = app.session.state();

    match format {
        OutputFormat::Text => match &state.user {
            Some(user) => {
                println!("Auth:     logged in");
                println!("User ID:  {}", user.user_id);
                println!("Email:    {}", user.email);
                if let Some(name) = &user.display_name {
                    println!("Name:     {}", name);
                }
            }
            None => println!("Auth:     not logged in"),
        },
        OutputFormat::Json => {
            let json = serde_json::json!({
                "logged_in": state.is_authenticated(),
                "phase": state.phase,
                "user": state.user,
                "error": state.error,
            });
            output::print_json(&json)?;
        }
    }
    Ok(())
}
