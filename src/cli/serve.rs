//! Serve command implementation

use super::AppContext;
use clap::Args;
use std::net::SocketAddr;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Override the listener bind address
    #[arg(long)]
    pub bind: Option<SocketAddr>,

    /// Override the delay between forwarded records, in milliseconds
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,
}

impl ServeArgs {
    pub async fn execute(&self, ctx: &AppContext) -> anyhow::Result<()> {
        let mut config = ctx.config.listener.clone();
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval_ms = ms;
        }

        let listener = ctx.listener(&config)?;
        tokio::select! {
            result = listener.run() => result?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
            }
        }
        Ok(())
    }
}
