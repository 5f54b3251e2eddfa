//! Configure command implementation

use clap::Args;

use super::Context;
use crate::api::ApiClient;
use crate::cli::config::Profile;
use crate::cli::error::CliError;

#[derive(Debug, Args)]
pub struct ConfigureArgs {
    /// API base URL
    #[arg(long)]
    pub url: String,
    #[arg(long)]
    pub username: String,
    #[arg(long)]
    pub password: String,
    /// Requested token lifetime in seconds
    #[arg(long)]
    pub max_token_lifetime: Option<u64>,
    /// Store the profile without logging in first
    #[arg(long)]
    pub skip_check: bool,
}

/// Handle the configure command
pub fn handle_configure(ctx: &Context, args: &ConfigureArgs) -> Result<(), CliError> {
    let profile = Profile {
        url: args.url.clone(),
        username: args.username.clone(),
        password: args.password.clone(),
        max_token_lifetime: args.max_token_lifetime,
    };

    if !args.skip_check {
        ApiClient::connect(profile.client_config())?.close()?;
    }

    let mut store = ctx.profile_store()?;
    store.set(ctx.profile.clone(), profile);
    store.save()?;
    println!(
        "Profile '{}' saved to {}",
        ctx.profile,
        store.path().display()
    );
    Ok(())
}
