use std::error::Error;
use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use csv::StringRecord;
use flate2::read::GzDecoder;
use log::info;
use postgres::Client;

use crate::db;
use crate::download::download_source;
use crate::schema::{self, Column};

/// What to do when the target table already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Insert on top of whatever the table already holds.
    Append,
    /// Drop the table before the first chunk is written.
    Replace,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WriteMode::Append => write!(f, "append"),
            WriteMode::Replace => write!(f, "replace"),
        }
    }
}

/// One ingestion run: download a delimited source file and load it into a
/// PostgreSQL table in chunks of `chunk_size` rows.
pub struct IngestJob {
    pub url: String,
    pub database: String,
    pub table: String,
    pub mode: WriteMode,
    pub datetime_columns: Vec<String>,
    pub download_dir: String,
    pub chunk_size: usize,
}

impl IngestJob {
    /// Download (or reuse) the source file and load it.  Returns the number
    /// of rows inserted.
    pub fn run(&self) -> Result<u64, Box<dyn Error>> {
        if self.chunk_size == 0 {
            return Err("chunksize must be at least 1".into());
        }

        let path = download_source(&self.url, &self.download_dir)?;
        let mut client = db::connect(&self.database)?;

        if self.mode == WriteMode::Replace {
            info!("dropping table {} before the load", self.table);
            client.batch_execute(&format!(
                "DROP TABLE IF EXISTS {}",
                schema::quote_ident(&self.table)
            ))?;
        }

        info!(
            "launch data ingestion into {}.{} ({} mode)",
            self.database, self.table, self.mode
        );
        self.load_file(&mut client, &path)
    }

    /// Stream `path` into the target table.  The first chunk drives type
    /// inference and table creation; each chunk goes in with its own COPY,
    /// committed independently.
    fn load_file(&self, client: &mut Client, path: &Path) -> Result<u64, Box<dyn Error>> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(open_source(path)?);
        let headers = rdr.headers()?.clone();
        let mut records = rdr.records();

        let first = read_chunk(&mut records, self.chunk_size)?;
        if first.is_empty() {
            info!("{} has no data rows, nothing to insert", path.display());
            return Ok(0);
        }

        let columns = schema::infer_columns(&headers, &first, &self.datetime_columns)?;
        let payload = render_chunk(&columns, &first, 0)?;
        client.batch_execute(&schema::create_table_sql(&self.table, &columns))?;

        let copy_stmt = schema::copy_sql(&self.table, &columns);
        let mut total = copy_payload(client, &copy_stmt, &payload)?;
        let mut chunks = 1;
        info!("chunk {}: {} rows inserted ({} total)", chunks, total, total);

        loop {
            let chunk = read_chunk(&mut records, self.chunk_size)?;
            if chunk.is_empty() {
                break;
            }
            let payload = render_chunk(&columns, &chunk, total)?;
            let inserted = copy_payload(client, &copy_stmt, &payload)?;
            chunks += 1;
            total += inserted;
            info!(
                "chunk {}: {} rows inserted ({} total)",
                chunks, inserted, total
            );
        }

        Ok(total)
    }
}

/// Open a source file, decompressing transparently when it is gzipped.
fn open_source(path: &Path) -> Result<Box<dyn Read>, Box<dyn Error>> {
    let file = File::open(path)?;
    if path.extension().is_some_and(|e| e == "gz") {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

/// Read up to `n` records from the source.  An empty result means the end
/// of the file.
fn read_chunk<R: Read>(
    records: &mut csv::StringRecordsIter<'_, R>,
    n: usize,
) -> Result<Vec<StringRecord>, Box<dyn Error>> {
    let mut chunk = Vec::with_capacity(n);
    while chunk.len() < n {
        match records.next() {
            Some(record) => chunk.push(record?),
            None => break,
        }
    }
    Ok(chunk)
}

/// Render one chunk as the CSV payload of a COPY statement.  `offset` is
/// the number of rows already written, used to report source row numbers.
fn render_chunk(
    columns: &[Column],
    records: &[StringRecord],
    offset: u64,
) -> Result<Vec<u8>, Box<dyn Error>> {
    let mut buf = Vec::new();
    {
        let mut wtr = csv::Writer::from_writer(&mut buf);
        for (i, record) in records.iter().enumerate() {
            let row = offset + i as u64 + 1;
            if record.len() != columns.len() {
                return Err(format!(
                    "row {}: expected {} fields, found {}",
                    row,
                    columns.len(),
                    record.len()
                )
                .into());
            }
            let mut fields = Vec::with_capacity(columns.len());
            for (value, column) in record.iter().zip(columns) {
                let normalized = schema::normalize(value, column.ty)
                    .map_err(|e| format!("row {}, column {}: {}", row, column.name, e))?;
                fields.push(normalized);
            }
            wtr.write_record(&fields)?;
        }
        wtr.flush()?;
    }
    Ok(buf)
}

/// Append one rendered chunk, returning the rows COPY reports written.
fn copy_payload(
    client: &mut Client,
    copy_stmt: &str,
    payload: &[u8],
) -> Result<u64, Box<dyn Error>> {
    let mut writer = client.copy_in(copy_stmt)?;
    writer.write_all(payload)?;
    let inserted = writer.finish()?;
    Ok(inserted)
}
