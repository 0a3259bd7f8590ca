use nu_ansi_term::Color::{Blue, Cyan, Green, Red};
use tabled::{
    builder::Builder,
    settings::{themes::BorderCorrection, Panel, Style},
};
use tracing::info;
use wheelhouse_operations::{users, RegistryContext, Result};

use crate::utils::Colored;

pub fn add_user(
    ctx: &RegistryContext,
    username: &str,
    email: &str,
    password: Option<&str>,
) -> Result<()> {
    let user = users::add_user(ctx, username, email, password)?;
    info!(
        "Created user {} <{}>",
        Colored(Blue, &user.username),
        Colored(Cyan, &user.email)
    );
    if password.is_none() {
        info!("No password set; the user can own packages but not upload them");
    }
    Ok(())
}

pub fn set_password(ctx: &RegistryContext, username: &str, password: &str) -> Result<()> {
    users::set_password(ctx, username, password)?;
    info!("Password updated for {}", Colored(Blue, username));
    Ok(())
}

pub fn list_users(ctx: &RegistryContext) -> Result<()> {
    let users = users::list_users(ctx)?;
    if users.is_empty() {
        info!("No users");
        return Ok(());
    }

    let mut builder = Builder::new();
    builder.push_record(["Username", "Email", "Uploads", "Created"]);
    for user in &users {
        let uploads = if user.is_active && user.password_hash.is_some() {
            Colored(Green, "enabled").to_string()
        } else {
            Colored(Red, "disabled").to_string()
        };
        builder.push_record([
            Colored(Blue, &user.username).to_string(),
            user.email.clone(),
            uploads,
            user.created_at.clone(),
        ]);
    }

    let table = builder
        .build()
        .with(Panel::header("Users"))
        .with(Style::rounded())
        .with(BorderCorrection {})
        .to_string();

    info!("\n{table}");
    Ok(())
}
