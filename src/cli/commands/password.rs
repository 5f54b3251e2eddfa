//! Password commands

use clap::Subcommand;

use super::Context;
use crate::cli::error::CliError;
use crate::cli::output::cell;

#[derive(Debug, Subcommand)]
pub enum PasswordCommand {
    /// Change the password of the current user
    Change { new_password: String },
    /// Send a password reset email to another user
    Reset { email: String },
}

pub fn run(ctx: &Context, command: &PasswordCommand) -> Result<(), CliError> {
    let mut client = ctx.connect()?;
    let result = match command {
        PasswordCommand::Change { new_password } => client.change_password(new_password)?,
        PasswordCommand::Reset { email } => client.reset_password(email)?,
    };
    client.close()?;

    println!("{}", cell(result.get("detail")));
    if matches!(command, PasswordCommand::Change { .. }) {
        println!("Run 'docschema configure' to update the stored credentials.");
    }
    Ok(())
}
