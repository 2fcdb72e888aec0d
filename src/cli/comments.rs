//! `comments` command

use clap::{Args, Subcommand};

use super::{print_json, CliError, OutputFormat};
use crate::api::Api;
use crate::types::Comment;

/// Comments subcommand
#[derive(Debug, Args)]
pub struct CommentsCommand {
    /// Base id (app...)
    #[arg(long)]
    pub base: String,

    /// Table name or id
    #[arg(long)]
    pub table: String,

    #[command(subcommand)]
    action: CommentsAction,
}

/// Comments actions
#[derive(Debug, Subcommand)]
enum CommentsAction {
    /// List every comment on a record
    List {
        /// Record id
        record_id: String,
    },

    /// Add a comment to a record
    Add {
        /// Record id
        record_id: String,

        /// Comment text
        text: String,
    },
}

fn print_comment(comment: &Comment) {
    let author = comment
        .author
        .name
        .as_deref()
        .or(comment.author.email.as_deref())
        .or(comment.author.id.as_deref())
        .unwrap_or("unknown");
    println!("[{}] {}: {}", comment.created_time, author, comment.text);
}

impl CommentsCommand {
    /// Execute the comments command
    pub async fn execute(&self, api: &Api, format: OutputFormat) -> Result<(), CliError> {
        let table = api.table(self.base.clone(), self.table.clone());
        match &self.action {
            CommentsAction::List { record_id } => {
                let comments = table.comments(record_id).await?;
                match format {
                    OutputFormat::Json => print_json(&comments)?,
                    OutputFormat::Human => {
                        println!("{} comments on {record_id}:", comments.len());
                        comments.iter().for_each(print_comment);
                    }
                }
            }
            CommentsAction::Add { record_id, text } => {
                if text.trim().is_empty() {
                    return Err(CliError::InvalidArgument("comment text is empty".into()));
                }
                let comment = table.add_comment(record_id, text).await?;
                match format {
                    OutputFormat::Json => print_json(&comment)?,
                    OutputFormat::Human => println!("Added comment {}", comment.id),
                }
            }
        }
        Ok(())
    }
}
