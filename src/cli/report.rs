//! Report command implementation

use super::AppContext;
use crate::backtest::{extract_figure, extract_statistic};
use crate::tearsheet::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Result bundle written by `backtest --output`
    pub input: PathBuf,

    /// Write the chart JSON here
    #[arg(long)]
    pub chart: Option<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    pub width: u32,

    #[arg(long, default_value_t = DEFAULT_HEIGHT)]
    pub height: u32,
}

impl ReportArgs {
    pub async fn execute(&self, _ctx: &AppContext) -> anyhow::Result<()> {
        let bundle = match std::fs::read_to_string(&self.input) {
            Ok(bundle) => Some(bundle),
            Err(e) => {
                tracing::warn!(path = %self.input.display(), error = %e, "Cannot read result bundle");
                None
            }
        };

        println!("{}", extract_statistic(bundle.as_deref()).format_table());

        if let Some(path) = &self.chart {
            let Some(figure) = extract_figure(bundle.as_deref(), self.width, self.height) else {
                anyhow::bail!("No chart in {}", self.input.display());
            };
            std::fs::write(path, serde_json::to_string(&figure)?)?;
            println!("Chart '{}' written to {}", figure.title().unwrap_or_default(), path.display());
        }
        Ok(())
    }
}
