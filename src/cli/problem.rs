use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use greenfed::catalog::Catalog;
use tracing::{info, instrument};

#[derive(Parser)]
pub struct ProblemArgs {
    /// Problem document: the horizon, the power sources, the activities and the budgets.
    #[clap(long = "problem", env = "PROBLEM")]
    pub path: PathBuf,
}

impl ProblemArgs {
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub fn load(&self) -> Result<Catalog> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read `{}`", self.path.display()))?;
        let catalog: Catalog = toml::from_str(&text)
            .with_context(|| format!("failed to parse `{}`", self.path.display()))?;
        info!(
            n_slots = catalog.horizon.n_slots,
            n_power_sources = catalog.power_sources.len(),
            n_activities = catalog.activities.len(),
            "loaded",
        );
        Ok(catalog)
    }
}
