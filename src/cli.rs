mod help_text;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

/// Checksum inventories and verification for digital preservation
#[derive(Parser, Debug)]
#[command(name = "preserve", version, about, long_about = help_text::ROOT_LONG_ABOUT)]
pub struct Cli {
    /// Change to DIR before doing anything
    #[arg(short = 'C', value_name = "DIR", global = true)]
    pub directory: Option<PathBuf>,

    /// Increase verbosity (-v for info, -vv for debug). Takes precedence over RUST_LOG.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Set the log level explicitly. Takes precedence over RUST_LOG.
    #[arg(long, value_name = "LEVEL", global = true, conflicts_with = "verbose")]
    pub log_level: Option<Level>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build or resume a checksum inventory of a directory
    #[command(long_about = help_text::INVENTORY_LONG_ABOUT)]
    Inventory {
        /// Directory to inventory
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Value of the BATCH column for every new row
        #[arg(short, long, value_name = "NAME")]
        batch: String,

        /// Write a new inventory file (fails if it exists)
        #[arg(short, long, value_name = "FILE", conflicts_with = "existing")]
        output: Option<PathBuf>,

        /// Resume an existing, partially written inventory file
        #[arg(short, long, value_name = "FILE")]
        existing: Option<PathBuf>,

        /// Comma separated checksum algorithms
        #[arg(short, long, value_name = "ALGORITHMS", default_value = "md5,sha1,sha256")]
        algorithms: String,

        /// Drive label recorded in the storage columns
        #[arg(short, long, value_name = "LABEL")]
        label: Option<String>,

        /// Part size for multipart ETags
        #[arg(long, value_name = "BYTES", default_value_t = crate::checksum::DEFAULT_ETAG_CHUNK_SIZE)]
        etag_chunk_size: u64,
    },

    /// Reconcile two inventories or directories
    #[command(long_about = help_text::VERIFY_LONG_ABOUT)]
    Verify {
        /// First (older) collection
        #[arg(value_name = "FIRST")]
        first: PathBuf,

        /// Second (newer) collection
        #[arg(value_name = "SECOND")]
        second: PathBuf,

        /// Compare by checksum and size only
        #[arg(short, long)]
        checksums: bool,

        /// Compare by relative path only
        #[arg(short, long)]
        relpaths: bool,

        /// Compare by filename only
        #[arg(short, long)]
        filenames: bool,

        /// Exit with status 1 when the collections differ
        #[arg(long)]
        strict: bool,
    },

    /// List values common to several listings and unique to each
    Compare {
        /// First listing
        #[arg(value_name = "FIRST")]
        first: PathBuf,

        /// Further listings
        #[arg(value_name = "OTHER", required = true)]
        others: Vec<PathBuf>,

        /// Compare relative paths instead of filenames
        #[arg(short, long)]
        relpath: bool,
    },

    /// Check that every inventoried file is in a bag
    #[command(long_about = help_text::BAGCHECK_LONG_ABOUT)]
    Bagcheck {
        /// Inventory CSV or directory
        #[arg(short, long, value_name = "INVENTORY")]
        inventory: PathBuf,

        /// Bag directory, tar or tar.gz archive
        #[arg(short, long, value_name = "BAG")]
        bag: PathBuf,
    },

    /// Sort a flat directory into subdirectories by filename pattern
    #[command(long_about = help_text::PARTITION_LONG_ABOUT)]
    Partition {
        /// Directory holding the files
        #[arg(value_name = "SOURCE")]
        source: PathBuf,

        /// Missing or empty destination directory
        #[arg(value_name = "DEST")]
        destination: PathBuf,

        /// dryrun, copy or move
        #[arg(short, long, value_name = "MODE", default_value = "dryrun")]
        mode: String,
    },

    /// Locate inventoried files on disk and fill in missing checksums
    Annotate {
        /// Inventory to annotate
        #[arg(short, long, value_name = "INVENTORY")]
        inventory: PathBuf,

        /// New inventory file to write
        #[arg(short, long, value_name = "OUTPUT")]
        output: PathBuf,

        /// Directory to search for files
        #[arg(short, long, value_name = "ROOT")]
        root: PathBuf,
    },

    /// Inventory every subdirectory of a root, resumably
    #[command(long_about = help_text::BATCH_LONG_ABOUT)]
    Batch {
        /// TOML batch configuration
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
    },
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
