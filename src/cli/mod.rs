pub mod detect;
pub mod enrich;
pub mod init;
pub mod process;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "extracto",
    version,
    about = "Normalize bank statement spreadsheets and reconcile them against payment reports."
)]
pub struct Cli {
    /// Log debug detail (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Data directory for this run (default: from ~/.config/extracto/settings.json)
    #[arg(long = "data-dir", global = true)]
    pub data_dir: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up Extracto: save the data directory and create its folders and database.
    Init,
    /// Clean a statement or payment report and save it to the processed folder.
    Process {
        /// Spreadsheet or CSV to process (looked up in <data_dir>/raw if not found as given)
        file: String,
        /// Also store statement transactions in the SQLite database
        #[arg(long)]
        store: bool,
        /// Batch id to stamp on every transaction (default: generated)
        #[arg(long = "batch-id")]
        batch_id: Option<String>,
    },
    /// Identify a file's layout and account without processing it.
    Detect {
        /// Spreadsheet or CSV to inspect
        file: String,
    },
    /// Enrich a cleaned BCP statement with payment-report details.
    Enrich {
        /// Cleaned statement CSV (default: newest *_bcp_clean.csv)
        #[arg(long)]
        statement: Option<String>,
        /// Cleaned payment report CSV (default: newest *_payments_clean.csv)
        #[arg(long)]
        report: Option<String>,
    },
}
