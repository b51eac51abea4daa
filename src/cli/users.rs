//! Users command implementation

use super::AppContext;
use crate::users::UserStore;
use clap::{Args, Subcommand};

#[derive(Args, Debug)]
pub struct UsersArgs {
    #[command(subcommand)]
    pub command: UsersCommand,
}

#[derive(Subcommand, Debug)]
pub enum UsersCommand {
    /// Add or replace a user
    Add { username: String, password: String },
    /// List users
    List,
}

impl UsersArgs {
    pub async fn execute(&self, ctx: &AppContext) -> anyhow::Result<()> {
        let store = UserStore::new(&ctx.config.users.file);
        match &self.command {
            UsersCommand::Add { username, password } => {
                store.add(username, password)?;
                println!("Saved {} to {}", username, store.path().display());
            }
            UsersCommand::List => {
                for (username, _) in store.list() {
                    println!("{}", username);
                }
            }
        }
        Ok(())
    }
}
