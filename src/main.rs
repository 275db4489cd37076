//! tabio - uniform record access for tabular data

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use tabio::config::OpenOptions;
use tabio::model::{CellValue, ColumnSpec, Key, Record, Table, TableLayout};
use tabio::output::{render_to_stdout, OutputFormat};
use tabio::{Reader, Writer};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliOutputFormat {
    Terminal,
    Json,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(f: CliOutputFormat) -> Self {
        match f {
            CliOutputFormat::Terminal => OutputFormat::Terminal,
            CliOutputFormat::Json => OutputFormat::Json,
        }
    }
}

/// Read, convert and edit tabular data (CSV, Excel, SQLite)
#[derive(Parser, Debug)]
#[command(name = "tabio")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Options selecting what to read from a resource
#[derive(clap::Args, Debug)]
struct SourceArgs {
    /// For Excel files: which sheet to read
    #[arg(long)]
    sheet: Option<String>,

    /// For SQLite files: which table to read
    #[arg(long)]
    table: Option<String>,

    /// For SQLite files: columns to read (comma-separated)
    #[arg(long, value_delimiter = ',')]
    columns: Vec<String>,

    /// For SQLite files: keep rows where COLUMN equals VALUE (repeatable)
    #[arg(long = "where", value_name = "COLUMN=VALUE")]
    filters: Vec<String>,
}

impl SourceArgs {
    fn open_options(&self) -> Result<OpenOptions> {
        let mut options = OpenOptions::new().with_columns(self.columns.iter().cloned());
        if let Some(sheet) = &self.sheet {
            options = options.with_sheet_name(sheet.clone());
        }
        if let Some(table) = &self.table {
            options = options.with_table(table.clone());
        }
        for filter in &self.filters {
            let (column, value) = filter
                .split_once('=')
                .with_context(|| format!("Filter must look like COLUMN=VALUE: {}", filter))?;
            options = options.with_select(column, CellValue::parse(value));
        }
        Ok(options)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the records of a file
    Show {
        /// File to read
        file: PathBuf,

        #[command(flatten)]
        source: SourceArgs,

        /// Print at most this many records
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "terminal")]
        format: CliOutputFormat,
    },

    /// Copy every record of one file into another, converting formats
    Convert {
        /// File to read
        input: PathBuf,

        /// File to create
        output: PathBuf,

        #[command(flatten)]
        source: SourceArgs,

        /// For SQLite output: table to write (defaults to --table)
        #[arg(long)]
        out_table: Option<String>,

        /// For Excel output: sheet to create
        #[arg(long)]
        out_sheet: Option<String>,

        /// For SQLite output: rows per commit
        #[arg(long, default_value_t = tabio::config::DEFAULT_COMMIT_INTERVAL)]
        commit_interval: usize,
    },

    /// Get, or set, a single cell
    Cell {
        /// File to read
        file: PathBuf,

        #[command(flatten)]
        source: SourceArgs,

        /// Row label or zero-based index
        #[arg(long)]
        row: Option<String>,

        /// Column name or zero-based index
        #[arg(long)]
        column: Option<String>,

        /// Use this column's values as row labels
        #[arg(long)]
        label_column: Option<String>,

        /// New value for the cell
        #[arg(long)]
        set: Option<String>,

        /// Write the modified table here
        #[arg(long, requires = "set")]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    init_tracing();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Show {
            file,
            source,
            limit,
            format,
        } => show(&file, &source, limit, format.into()),
        Command::Convert {
            input,
            output,
            source,
            out_table,
            out_sheet,
            commit_interval,
        } => {
            let read = source.open_options()?;
            let mut write = OpenOptions::new().with_commit_interval(commit_interval);
            if let Some(table) = out_table.or_else(|| source.table.clone()) {
                write = write.with_table(table);
            }
            if let Some(sheet) = out_sheet {
                write = write.with_sheet_name(sheet);
            }
            convert(&input, &output, &read, write)
        }
        Command::Cell {
            file,
            source,
            row,
            column,
            label_column,
            set,
            output,
        } => cell(
            &file,
            &source,
            row.as_deref(),
            column.as_deref(),
            label_column.as_deref(),
            set.as_deref(),
            output,
        ),
    }
}

fn show(
    file: &Path,
    source: &SourceArgs,
    limit: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let options = source.open_options()?;
    let mut reader = Reader::open(file, &options)
        .with_context(|| format!("Failed to open file: {}", file.display()))?;
    let columns = reader.columns().to_vec();

    let mut records: Vec<Record> = Vec::new();
    while let Some(record) = reader.next_record()? {
        if limit.is_some_and(|n| records.len() >= n) {
            break;
        }
        records.push(record);
    }
    reader.close()?;

    render_to_stdout(&columns, &records, format)
}

fn convert(input: &Path, output: &Path, read: &OpenOptions, write: OpenOptions) -> Result<()> {
    let mut reader = Reader::open(input, read)
        .with_context(|| format!("Failed to open input: {}", input.display()))?;
    let write = write.with_columns(reader.columns().iter().cloned().map(ColumnSpec::new));
    let mut writer = Writer::open(output, &write)
        .with_context(|| format!("Failed to open output: {}", output.display()))?;

    while let Some(record) = reader.next_record()? {
        writer.write(record)?;
    }
    reader.close()?;
    writer.close()?;

    eprintln!("Wrote {} records to {}", writer.written(), output.display());
    Ok(())
}

fn cell(
    file: &Path,
    source: &SourceArgs,
    row: Option<&str>,
    column: Option<&str>,
    label_column: Option<&str>,
    set: Option<&str>,
    output: Option<PathBuf>,
) -> Result<()> {
    let options = source.open_options()?;
    let mut table = Table::open(file, &options, TableLayout::default())
        .with_context(|| format!("Failed to load table: {}", file.display()))?;

    if let Some(label_column) = label_column {
        let labels: Vec<String> = table
            .get_col(label_column)?
            .values()
            .map(|v| v.display().into_owned())
            .collect();
        let columns = table.column_names().to_vec();
        let rows = table.rows().map(|r| r.to_vec()).collect();
        table = Table::from_rows(columns, rows, Some(labels))?;
    }

    let (r, c) = table.locate(row.map(Key::Name), column.map(Key::Name))?;

    match set {
        None => println!("{}", table.get_cell(r, c)?),
        Some(value) => {
            let written = table.set_cell(r, c, CellValue::parse(value))?;
            println!("{}", written);

            if let Some(output) = output {
                if output == *file {
                    bail!("Refusing to overwrite the input file: {}", file.display());
                }
                let write = OpenOptions {
                    columns: table
                        .column_names()
                        .iter()
                        .cloned()
                        .map(ColumnSpec::new)
                        .collect(),
                    ..options
                };
                let write = OpenOptions {
                    select: Default::default(),
                    ..write
                };
                let mut writer = Writer::open(&output, &write)
                    .with_context(|| format!("Failed to open output: {}", output.display()))?;
                table.write_to(&mut writer)?;
                writer.close()?;
            }
        }
    }
    Ok(())
}
