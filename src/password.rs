//! Password lookup: environment variable, else an interactive prompt.

use anyhow::{Context, Result};

pub fn lookup(env_var: &str, user: &str) -> Result<String> {
    resolve(std::env::var(env_var).ok(), || {
        rpassword::prompt_password(format!("Password for {}: ", user))
    })
    .with_context(|| format!("Could not read the password (set {} to skip the prompt)", env_var))
}

fn resolve<F>(from_env: Option<String>, prompt: F) -> std::io::Result<String>
where
    F: FnOnce() -> std::io::Result<String>,
{
    match from_env {
        Some(password) if !password.is_empty() => Ok(password),
        _ => prompt(),
    }
}
