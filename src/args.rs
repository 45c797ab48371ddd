use clap::Parser;

/// Imports a list of candidates, marks them per union and reports the candidates
/// marked under more than one union.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON configuration file with the list of unions, the column patterns and
    /// default values for the other options. Paths in this file are relative to its directory.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) The list of candidates to import. Supported formats: csv, json, xlsx, xls.
    /// Setting this option overrides the input that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (file path) The session file. Without --input, the session stored in this file is loaded.
    #[clap(short, long, value_parser)]
    pub session: Option<String>,

    /// (list of comma-separated values or not specified) The unions, in report order.
    #[clap(short, long, value_parser)]
    pub unions: Option<String>,

    /// (ROW:UNION, repeatable) Marks the row with the given index under a union.
    #[clap(short, long, value_parser)]
    pub mark: Vec<String>,

    /// If specified, prints the index and the identity of every row matching all the terms.
    #[clap(short, long, value_parser)]
    pub query: Option<String>,

    /// (file path, 'stdout' or empty) Where the summary is written in JSON format.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference summary in JSON format. If provided, uroster will
    /// check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (YYYY-MM-DD) The submission date of the lists.
    #[clap(long, value_parser)]
    pub submission_date: Option<String>,

    /// (YYYY-MM-DD) The voting date.
    #[clap(long, value_parser)]
    pub voting_date: Option<String>,

    /// If passed as an argument, writes the resulting session back to the session file.
    #[clap(long, takes_value = false)]
    pub save: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
