//! Handlers behind each CLI command.
//!
//! Handlers write to `out` instead of stdout so they can be exercised
//! against mock adapters.

use std::io::Write;
use std::sync::Arc;

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;

use crate::auth::{Session, SessionManager, UserProfile};
use crate::bus::ChangeBus;
use crate::cache::{Record, ResourceRegistry};
use crate::config::ClientConfig;
use crate::traits::{HttpClient, Storage};

/// Everything a command needs, wired from one configuration.
#[derive(Debug)]
pub struct CliContext {
    pub session: SessionManager,
    pub registry: ResourceRegistry,
}

impl CliContext {
    pub fn new(
        config: &ClientConfig,
        http: Arc<dyn HttpClient>,
        storage: Arc<dyn Storage>,
        bus: ChangeBus,
    ) -> Self {
        let session = SessionManager::new(config, http, Arc::clone(&storage), bus);
        let registry = ResourceRegistry::new(session.client().clone(), storage, config);
        Self { session, registry }
    }
}

fn describe(profile: &UserProfile) -> String {
    let who = profile
        .email
        .clone()
        .or_else(|| profile.name.clone())
        .unwrap_or_else(|| format!("user #{}", profile.id));
    match &profile.role {
        Some(role) => format!("{} ({})", who, role),
        None => who,
    }
}

fn describe_session(session: &Session) -> String {
    match session.profile() {
        Some(profile) => describe(profile),
        None => "unknown user".to_string(),
    }
}

pub async fn login(ctx: &CliContext, identifier: &str, secret: &str, out: &mut impl Write) -> Result<()> {
    let session = ctx.session.login(identifier, secret).await?;
    writeln!(out, "Signed in as {}", describe_session(&session))?;
    Ok(())
}

pub async fn logout(ctx: &CliContext, out: &mut impl Write) -> Result<()> {
    ctx.session.restore().await;
    ctx.session.logout().await;
    writeln!(out, "Signed out")?;
    Ok(())
}

pub async fn whoami(ctx: &CliContext, out: &mut impl Write) -> Result<()> {
    let session = ctx.session.restore().await;
    if !session.is_authenticated() {
        return Err(eyre!("Not signed in. Run `sessionkit login <identifier>` first."));
    }
    writeln!(out, "{}", describe_session(&session))?;
    Ok(())
}

pub async fn list(ctx: &CliContext, resource: &str, out: &mut impl Write) -> Result<()> {
    ctx.session.restore().await;
    if let Err(err) = ctx.session.ensure_fresh().await {
        tracing::warn!(error = %err, "Could not refresh the bearer token");
    }

    let store = ctx.registry.open::<Record>(resource);
    let items = store
        .list()
        .await
        .wrap_err_with(|| format!("Failed to list {}", resource))?;

    writeln!(out, "{}", serde_json::to_string_pretty(&items)?)?;
    Ok(())
}
