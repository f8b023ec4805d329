use std::path::PathBuf;

use clap::Args;

use super::CommandError;
use crate::{
    config::Config,
    server,
};

/// Run the upload and gallery server
#[derive(Args, Debug, Default)]
pub struct Command {
    /// Address to listen on, overriding the config
    #[arg(long, short)]
    pub address: Option<String>,

    /// Directory to store uploads in, overriding the config
    #[arg(long)]
    pub upload_dir: Option<PathBuf>,

    /// Directory to serve public assets from, overriding the config
    #[arg(long)]
    pub public_dir: Option<PathBuf>,
}

impl Command {
    pub async fn run(&self, config: &Config) -> Result<(), CommandError> {
        let config = self.apply(config);
        Ok(server::core::serve(&config).await?)
    }

    fn apply(&self, config: &Config) -> Config {
        let mut config = config.clone();
        if let Some(address) = &self.address {
            config.server_address = address.clone();
        }
        if let Some(dir) = &self.upload_dir {
            config.upload_dir = dir.clone();
        }
        if let Some(dir) = &self.public_dir {
            config.public_dir = dir.clone();
        }
        config
    }
}
