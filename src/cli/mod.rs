macro_rules! command_boilerplate {
    ( $( $Variant:ident ),* $(,)? ) => {
        paste::paste! {
            $(
                pub mod [<$Variant:lower>];
            )*

            #[derive(Debug, clap::Subcommand)]
            #[non_exhaustive]
            pub enum Command {
                $(
                    $Variant([<$Variant:lower>]::Command),
                )*
            }

            impl Command {
                pub async fn run(&self, config: &Config) -> Result<(), CommandError> {
                    match self {
                        $(
                            | Command::$Variant(x) => x.run(config).await,
                        )*
                    }
                }
            }
        }
    };
}

use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use crate::{
    config::{
        Config,
        DEFAULT_CONFIG_PATH,
    },
    server::core::ServeError,
    storage::StorageError,
};

#[derive(Debug, Parser)]
#[command(name = "reelbox", version = env!("REELBOX_VERSION"), about)]
/// Upload dashcam videos and watch them in a browser
pub struct Cli {
    /// Path to the config file
    #[arg(long, short, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Defaults to `serve`
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    pub fn load_config(&self) -> Config { Config::load(&self.config) }

    pub async fn run(&self, config: &Config) -> Result<(), CommandError> {
        match &self.command {
            | Some(command) => command.run(config).await,
            | None => serve::Command::default().run(config).await,
        }
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Failed to run server: {0}")]
    ServeError(#[from] ServeError),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
}

command_boilerplate! {
    Serve,
    List,
}
