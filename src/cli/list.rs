use clap::Args;

use super::CommandError;
use crate::{
    config::Config,
    storage::Storage,
};

/// List stored videos
#[derive(Args, Debug)]
pub struct Command {
    /// Print a JSON array instead of one name per line
    #[arg(long)]
    pub json: bool,
}

impl Command {
    pub async fn run(&self, config: &Config) -> Result<(), CommandError> {
        print!("{}", self.render(config).await?);
        Ok(())
    }

    /// Renders the listing, newline terminated
    async fn render(&self, config: &Config) -> Result<String, CommandError> {
        let storage = Storage::open(&config.upload_dir).await?;
        let names = storage.list(&config.video_extension).await?;

        if self.json {
            return Ok(serde_json::to_string_pretty(&names)? + "\n");
        }

        Ok(names.iter().map(|n| format!("{n}\n")).collect())
    }
}
