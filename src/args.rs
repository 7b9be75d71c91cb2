use clap::Parser;

/// This program splits the bulk daily traffic counts of a month across the monitoring
/// checkpoints, using the day-of-week proportions of fully sampled weeks.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON file describing the run: input workbooks, checkpoints, class tables and rules.
    /// The paths it contains are relative to its own directory.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (DATE=PATH, repeatable) A workbook of a sampled day, with one sheet per checkpoint. The date is written
    /// dd-mm-YYYY, dd/mm/YYYY or YYYY-mm-dd. Setting this option replaces the weekly sources of the --config file.
    #[clap(short, long, value_parser)]
    pub weekly: Vec<String>,

    /// (file path) The monthly workbook, with one sheet per day of the month. Overrides the --config file.
    #[clap(short, long, value_parser)]
    pub monthly: Option<String>,

    /// The year of the monthly workbook.
    #[clap(long, value_parser)]
    pub year: Option<i32>,

    /// (1-12) The month of the monthly workbook.
    #[clap(long, value_parser)]
    pub month: Option<u32>,

    /// (default 1) The number of sampled weeks. With more than one week, the samples of the same weekday are averaged.
    #[clap(long, value_parser)]
    pub sampled_weeks: Option<u32>,

    /// (directory, optional) If specified, the CSV tables and the JSON summary are written to this directory.
    /// Otherwise the summary is printed to the standard output.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference summary in JSON format. If provided, volsplit will check that the computed
    /// summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
