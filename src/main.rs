use std::error::Error;

use clap::{ArgAction, ArgGroup, Args, Parser, Subcommand};

use nyctaxi::ingest::{IngestJob, WriteMode};
use nyctaxi::report::TripReport;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None, disable_version_flag = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Show version
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    version: Option<bool>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download a delimited file and load it into a PostgreSQL table
    Ingest(IngestArgs),
    /// Print the answers to the six questions
    Answers(AnswersArgs),
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("mode").required(true)))]
struct IngestArgs {
    /// Insert new values into the existing table
    #[arg(long, group = "mode")]
    append: bool,

    /// Drop the table before inserting new values
    #[arg(long, group = "mode")]
    replace: bool,

    /// Comma-separated list of columns to convert to datetime
    #[arg(long, value_name = "col1,col2", value_delimiter = ',')]
    dt_columns: Vec<String>,

    /// Where downloaded files are stored
    #[arg(short, long = "download_dir", default_value = "data/raw")]
    download_dir: String,

    /// Chunk size to write to the database
    #[arg(short, long, default_value_t = 10_000)]
    chunksize: usize,

    /// Location of the source file
    url: String,

    /// Target database name
    database: String,

    /// Target table name
    table: String,
}

#[derive(Args, Debug)]
struct AnswersArgs {
    /// Database holding both tables
    database: String,

    /// Trips table, as loaded by the ingest command
    table_data: String,

    /// Taxi zone lookup table
    table_zones: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    dotenvy::dotenv().ok();

    match cli.command {
        Command::Ingest(args) => {
            let mode = if args.replace {
                WriteMode::Replace
            } else {
                WriteMode::Append
            };
            let job = IngestJob {
                url: args.url,
                database: args.database,
                table: args.table,
                mode,
                datetime_columns: datetime_columns(&args.dt_columns),
                download_dir: args.download_dir,
                chunk_size: args.chunksize,
            };
            let n = job.run()?;
            println!("{} rows successfully ingested to the table", n);
        }
        Command::Answers(args) => {
            let report = TripReport {
                database: args.database,
                trips_table: args.table_data,
                zones_table: args.table_zones,
            };
            report.print_answers()?;
        }
    }

    Ok(())
}

/// Strip the whitespace a user may leave around the commas.
fn datetime_columns(raw: &[String]) -> Vec<String> {
    raw.iter().map(|s| s.trim().to_owned()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn lowercase_v_shows_the_version() {
        use clap::error::ErrorKind;

        let err = Cli::try_parse_from(["nyctaxi", "-v"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);
        let err = Cli::try_parse_from(["nyctaxi", "--version"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);
    }

    #[test]
    fn ingest_parses_the_full_surface() {
        let cli = Cli::try_parse_from([
            "nyctaxi",
            "ingest",
            "--replace",
            "--dt-columns",
            "lpep_pickup_datetime, lpep_dropoff_datetime",
            "-d",
            "downloads",
            "-c",
            "500",
            "http://localhost/trips.csv",
            "ny_taxi",
            "green_taxi_data",
        ])
        .unwrap();
        let Command::Ingest(args) = cli.command else {
            panic!("expected the ingest subcommand")
        };
        assert!(args.replace);
        assert!(!args.append);
        assert_eq!(
            datetime_columns(&args.dt_columns),
            vec!["lpep_pickup_datetime", "lpep_dropoff_datetime"]
        );
        assert_eq!(args.download_dir, "downloads");
        assert_eq!(args.chunksize, 500);
        assert_eq!(args.url, "http://localhost/trips.csv");
        assert_eq!(args.database, "ny_taxi");
        assert_eq!(args.table, "green_taxi_data");
    }

    #[test]
    fn ingest_defaults() {
        let cli = Cli::try_parse_from([
            "nyctaxi",
            "ingest",
            "--append",
            "http://localhost/trips.csv",
            "ny_taxi",
            "green_taxi_data",
        ])
        .unwrap();
        let Command::Ingest(args) = cli.command else {
            panic!("expected the ingest subcommand")
        };
        assert!(args.append);
        assert_eq!(args.download_dir, "data/raw");
        assert_eq!(args.chunksize, 10_000);
        assert!(args.dt_columns.is_empty());
    }

    #[test]
    fn ingest_requires_a_mode() {
        let res = Cli::try_parse_from([
            "nyctaxi",
            "ingest",
            "http://localhost/trips.csv",
            "ny_taxi",
            "green_taxi_data",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn append_and_replace_exclude_each_other() {
        let res = Cli::try_parse_from([
            "nyctaxi",
            "ingest",
            "--append",
            "--replace",
            "http://localhost/trips.csv",
            "ny_taxi",
            "green_taxi_data",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn answers_takes_a_database_and_two_tables() {
        let cli = Cli::try_parse_from([
            "nyctaxi",
            "answers",
            "ny_taxi",
            "green_taxi_data",
            "zones",
        ])
        .unwrap();
        let Command::Answers(args) = cli.command else {
            panic!("expected the answers subcommand")
        };
        assert_eq!(args.database, "ny_taxi");
        assert_eq!(args.table_data, "green_taxi_data");
        assert_eq!(args.table_zones, "zones");
    }
}
