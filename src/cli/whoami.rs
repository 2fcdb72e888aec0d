//! `whoami` command

use super::{print_json, CliError, OutputFormat};
use crate::api::Api;

/// Print the token's user id, email and scopes
pub async fn execute(api: &Api, format: OutputFormat) -> Result<(), CliError> {
    let user = api.whoami().await?;
    match format {
        OutputFormat::Json => print_json(&user)?,
        OutputFormat::Human => {
            println!("User:   {}", user.id);
            if let Some(email) = &user.email {
                println!("Email:  {email}");
            }
            println!("Scopes: {}", user.scopes.join(", "));
        }
    }
    Ok(())
}
