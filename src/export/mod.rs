//! Incremental connection exports.
//!
//! Each trace chain owns two files in the export directory, keyed by the
//! chain's root session id: a tabular CSV (one row per connection,
//! stable header) and a structured JSON document whose connection array
//! grows as discoveries land. Connections are written the moment they
//! are found — a crash or cancel loses nothing already discovered.
//!
//! The JSON file is rewritten through temp-file-plus-rename on every
//! append, the same atomicity discipline as the checkpoint store.
//! Re-opening an existing pair (a resumed session) seeds the
//! `(source, target)` dedup set from the JSON document, so replaying
//! checkpoint connections is idempotent: resuming twice from one
//! checkpoint yields the same connection set, never duplicates.

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::engine::{Connection, TraceStatus};
use crate::sessions::TraceRequest;
use crate::types::Address;

const CSV_HEADER: [&str; 5] = ["source", "target", "path", "path_length", "discovered_at"];
const PATH_SEPARATOR: &str = "|";

/// Errors from export file handling.
#[derive(Debug, Error, Diagnostic)]
pub enum ExportError {
    #[error("export I/O failure at {path}: {source}")]
    #[diagnostic(
        code(chaintrace::export::io),
        help("Check that the export directory exists and is writable.")
    )]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV append failed: {source}")]
    #[diagnostic(code(chaintrace::export::csv))]
    Csv {
        #[source]
        source: csv::Error,
    },

    #[error("JSON encode failed: {source}")]
    #[diagnostic(code(chaintrace::export::json))]
    Json {
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, ExportError>;

/// Locations of a trace chain's export files.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportPaths {
    pub csv: PathBuf,
    pub json: PathBuf,
}

/// Trailer written when a session reaches a terminal status.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportSummary {
    pub status: String,
    pub total_connections: usize,
    pub addresses_examined: usize,
    pub search_depth: u32,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ExportDocument {
    session_id: String,
    request: TraceRequest,
    connections_found: Vec<Connection>,
    summary: Option<ExportSummary>,
}

/// Append-as-found exporter for one trace chain.
pub struct IncrementalExporter {
    paths: ExportPaths,
    document: ExportDocument,
    seen: FxHashSet<(Address, Address)>,
}

impl IncrementalExporter {
    /// Open the export pair for `export_root`, creating fresh files or
    /// adopting existing ones from an earlier run of the same chain.
    pub fn open(dir: &Path, export_root: &str, request: &TraceRequest) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|source| ExportError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let paths = ExportPaths {
            csv: dir.join(format!("connections_{export_root}.csv")),
            json: dir.join(format!("connections_{export_root}.json")),
        };

        let document = match fs::read(&paths.json) {
            Ok(bytes) => {
                let doc: ExportDocument =
                    serde_json::from_slice(&bytes).map_err(|source| ExportError::Json { source })?;
                info!(
                    root = %export_root,
                    existing = doc.connections_found.len(),
                    "adopting existing export files"
                );
                doc
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let doc = ExportDocument {
                    session_id: export_root.to_string(),
                    request: request.clone(),
                    connections_found: Vec::new(),
                    summary: None,
                };
                write_csv_header(&paths.csv)?;
                write_json_atomic(&paths.json, &doc)?;
                doc
            }
            Err(source) => {
                return Err(ExportError::Io {
                    path: paths.json.clone(),
                    source,
                });
            }
        };

        let seen = document
            .connections_found
            .iter()
            .map(Connection::key)
            .collect();

        Ok(Self {
            paths,
            document,
            seen,
        })
    }

    #[must_use]
    pub fn paths(&self) -> &ExportPaths {
        &self.paths
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.document.connections_found.len()
    }

    /// Append one connection to both files. Duplicate `(source, target)`
    /// pairs are ignored; returns whether anything was written.
    pub fn append(&mut self, connection: &Connection) -> Result<bool> {
        if !self.seen.insert(connection.key()) {
            debug!(
                source = connection.source.short(),
                target = connection.target.short(),
                "connection already exported, skipping"
            );
            return Ok(false);
        }

        append_csv_row(&self.paths.csv, connection)?;
        self.document.connections_found.push(connection.clone());
        write_json_atomic(&self.paths.json, &self.document)?;
        Ok(true)
    }

    /// Re-append connections recovered from a checkpoint. Idempotent;
    /// returns how many were actually new to the files.
    pub fn restore(&mut self, connections: &[Connection]) -> Result<usize> {
        let mut appended = 0;
        for connection in connections {
            if self.append(connection)? {
                appended += 1;
            }
        }
        if appended > 0 {
            info!(appended, "restored checkpoint connections into export files");
        }
        Ok(appended)
    }

    /// Write the summary trailer into the structured file.
    pub fn finalize(
        &mut self,
        status: TraceStatus,
        addresses_examined: usize,
        search_depth: u32,
    ) -> Result<ExportPaths> {
        self.document.summary = Some(ExportSummary {
            status: status.to_string(),
            total_connections: self.document.connections_found.len(),
            addresses_examined,
            search_depth,
            completed_at: Utc::now(),
        });
        write_json_atomic(&self.paths.json, &self.document)?;
        Ok(self.paths.clone())
    }
}

fn write_csv_header(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let mut writer = csv::Writer::from_writer(file);
    writer
        .write_record(CSV_HEADER)
        .and_then(|()| writer.flush().map_err(csv::Error::from))
        .map_err(|source| ExportError::Csv { source })
}

fn append_csv_row(path: &Path, connection: &Connection) -> Result<()> {
    let file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let mut writer = csv::Writer::from_writer(file);
    let path_cell = connection
        .path
        .iter()
        .map(Address::as_str)
        .collect::<Vec<_>>()
        .join(PATH_SEPARATOR);
    let path_length = connection.path_length.to_string();
    let discovered_at = connection.discovered_at.to_rfc3339();
    writer
        .write_record([
            connection.source.as_str(),
            connection.target.as_str(),
            path_cell.as_str(),
            path_length.as_str(),
            discovered_at.as_str(),
        ])
        .and_then(|()| writer.flush().map_err(csv::Error::from))
        .map_err(|source| ExportError::Csv { source })
}

fn write_json_atomic(path: &Path, document: &ExportDocument) -> Result<()> {
    let bytes =
        serde_json::to_vec_pretty(document).map_err(|source| ExportError::Json { source })?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &bytes).map_err(|source| ExportError::Io {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}
