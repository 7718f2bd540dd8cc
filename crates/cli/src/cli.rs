use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "scrapefin")]
#[command(version, about = "Resolve a local episode library against a remote catalog")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Walk a library and resolve every episode file to its catalog key
    Scan {
        /// Library root (defaults to SCRAPEFIN_LIBRARY)
        library: Option<PathBuf>,
    },

    /// Download assets into the local cache, once per underlying URI
    Cache {
        /// Asset URIs, archive snapshot wrappers allowed
        #[arg(required = true)]
        uris: Vec<String>,
    },

    /// Clear the season scrape marker so the next scan fetches again
    Forget {
        /// Series catalog id
        series: String,
    },

    /// Delete a series with all its seasons, episodes and scrape markers
    Purge {
        /// Series catalog id
        series: String,
    },
}
