use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use thiserror::Error;
use tracing::{info, warn};

use crate::availability::{
    time_string_to_minutes, BlockedDate, Commitment, CommitmentKind, CommitmentStatus, DayOfWeek, PlanType,
    ResourceAvailabilityWindow, ResourceKind,
};
use crate::error::AvailabilityError;
use crate::store::InMemoryStore;

pub const AVAILABILITY_FILE: &str = "availability.csv";
pub const BLOCKED_DATES_FILE: &str = "blocked_dates.csv";
pub const COMMITMENTS_FILE: &str = "commitments.csv";

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("line {line}: {message}")]
    Row { line: u64, message: String },
}

impl From<ParseError> for AvailabilityError {
    fn from(err: ParseError) -> Self {
        AvailabilityError::validation("snapshot", err.to_string())
    }
}

/// Rows of all three snapshot tables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotRows {
    pub windows: Vec<ResourceAvailabilityWindow>,
    pub blocked_dates: Vec<BlockedDate>,
    pub commitments: Vec<Commitment>,
}

impl SnapshotRows {
    pub fn into_store(self) -> InMemoryStore {
        InMemoryStore::with_rows(self.windows, self.blocked_dates, self.commitments)
    }
}

/// Parses a boolean value from various string representations
fn parse_bool(value: &str) -> bool {
    let lower = value.trim().to_lowercase();
    lower == "yes" || lower == "true" || lower == "1"
}

fn optional(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

struct Columns<'a> {
    headers: &'a StringRecord,
}

impl<'a> Columns<'a> {
    fn require(&self, name: &str) -> Result<usize, ParseError> {
        self.headers.iter().position(|h| h.eq_ignore_ascii_case(name)).ok_or_else(|| ParseError::Row {
            line: 1,
            message: format!("missing column '{}'", name),
        })
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.eq_ignore_ascii_case(name))
    }
}

/// One data row plus its source line for error messages
struct Row<'a> {
    record: &'a StringRecord,
    line: u64,
}

impl<'a> Row<'a> {
    fn get(&self, column: usize) -> &'a str {
        self.record.get(column).unwrap_or("")
    }

    fn get_opt(&self, column: Option<usize>) -> &'a str {
        column.map(|c| self.get(c)).unwrap_or("")
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::Row {
            line: self.line,
            message: message.into(),
        }
    }

    fn required(&self, column: usize, name: &str) -> Result<&'a str, ParseError> {
        optional(self.get(column)).ok_or_else(|| self.error(format!("{} is empty", name)))
    }

    fn parsed<T: FromStr>(&self, column: usize, name: &str) -> Result<T, ParseError>
    where
        T::Err: std::fmt::Display,
    {
        let raw = self.required(column, name)?;
        raw.parse()
            .map_err(|e: T::Err| self.error(format!("invalid {} '{}': {}", name, raw, e)))
    }

    /// The raw `HH:MM` text and its minutes since midnight
    fn time(&self, column: usize, name: &str) -> Result<(String, u32), ParseError> {
        let raw = self.required(column, name)?;
        let minutes = time_string_to_minutes(raw).map_err(|e| self.error(format!("{}: {}", name, e)))?;
        Ok((raw.to_string(), minutes))
    }
}

fn for_each_row<R, F>(reader: R, mut handle: F) -> Result<(), ParseError>
where
    R: Read,
    F: FnMut(&Columns<'_>, &Row<'_>) -> Result<(), ParseError>,
{
    let mut reader = ReaderBuilder::new().trim(Trim::All).flexible(true).from_reader(reader);
    let headers = reader.headers()?.clone();
    let columns = Columns { headers: &headers };

    for result in reader.records() {
        let record = result?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        handle(&columns, &Row { record: &record, line })?;
    }
    Ok(())
}

/// `resource_id,resource_kind,day_of_week,start_time,end_time[,is_blocked]`
pub fn read_windows<R: Read>(reader: R) -> Result<Vec<ResourceAvailabilityWindow>, ParseError> {
    let mut windows = Vec::new();
    for_each_row(reader, |columns, row| {
        let (start_time, start_minutes) = row.time(columns.require("start_time")?, "start_time")?;
        let (end_time, end_minutes) = row.time(columns.require("end_time")?, "end_time")?;
        if start_minutes >= end_minutes {
            return Err(row.error("start_time must be before end_time"));
        }
        windows.push(ResourceAvailabilityWindow {
            resource_id: row.required(columns.require("resource_id")?, "resource_id")?.to_string(),
            resource_kind: row.parsed::<ResourceKind>(columns.require("resource_kind")?, "resource_kind")?,
            day_of_week: row.parsed::<DayOfWeek>(columns.require("day_of_week")?, "day_of_week")?,
            start_time,
            end_time,
            is_blocked: parse_bool(row.get_opt(columns.find("is_blocked"))),
        });
        Ok(())
    })?;
    Ok(windows)
}

/// `resource_id,resource_kind,date[,reason]`
pub fn read_blocked_dates<R: Read>(reader: R) -> Result<Vec<BlockedDate>, ParseError> {
    let mut blocked = Vec::new();
    for_each_row(reader, |columns, row| {
        let raw_date = row.required(columns.require("date")?, "date")?;
        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
            .map_err(|e| row.error(format!("invalid date '{}': {}", raw_date, e)))?;
        blocked.push(BlockedDate {
            resource_id: row.required(columns.require("resource_id")?, "resource_id")?.to_string(),
            resource_kind: row.parsed::<ResourceKind>(columns.require("resource_kind")?, "resource_kind")?,
            date,
            reason: optional(row.get_opt(columns.find("reason"))).map(str::to_string),
        });
        Ok(())
    })?;
    Ok(blocked)
}

/// `id,kind,resource_id,time,status[,plan_type,unit_count]` with `time` in
/// RFC 3339 and an empty `resource_id` meaning unassigned
pub fn read_commitments<R: Read>(reader: R) -> Result<Vec<Commitment>, ParseError> {
    let mut commitments = Vec::new();
    for_each_row(reader, |columns, row| {
        let kind = match row.required(columns.require("kind")?, "kind")? {
            "booking" => CommitmentKind::Booking,
            "onfleet_task" => CommitmentKind::OnfleetTask,
            other => return Err(row.error(format!("unknown commitment kind '{}'", other))),
        };
        let status = match row.required(columns.require("status")?, "status")? {
            "scheduled" => CommitmentStatus::Scheduled,
            "confirmed" => CommitmentStatus::Confirmed,
            "in_transit" => CommitmentStatus::InTransit,
            "cancelled" => CommitmentStatus::Cancelled,
            "completed" => CommitmentStatus::Completed,
            other => return Err(row.error(format!("unknown status '{}'", other))),
        };
        let plan_type = optional(row.get_opt(columns.find("plan_type")))
            .map(|raw| raw.parse::<PlanType>().map_err(|e| row.error(e)))
            .transpose()?;
        let unit_count = optional(row.get_opt(columns.find("unit_count")))
            .map(|raw| {
                raw.parse::<u32>()
                    .map_err(|e| row.error(format!("invalid unit_count '{}': {}", raw, e)))
            })
            .transpose()?;

        commitments.push(Commitment {
            id: row.required(columns.require("id")?, "id")?.to_string(),
            kind,
            resource_id: optional(row.get(columns.require("resource_id")?)).map(str::to_string),
            time: row.parsed::<DateTime<Utc>>(columns.require("time")?, "time")?,
            status,
            plan_type,
            unit_count,
        });
        Ok(())
    })?;
    Ok(commitments)
}

/// Reads one snapshot file; a missing file is an empty table
fn load_table<T, F>(dir: &Path, file_name: &str, read: F) -> Result<Vec<T>, ParseError>
where
    F: FnOnce(File) -> Result<Vec<T>, ParseError>,
{
    let path = dir.join(file_name);
    match File::open(&path) {
        Ok(file) => read(file),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "snapshot file missing, treating as empty");
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}

/// Loads the three snapshot tables from a data directory
pub fn load_snapshot_dir<P: AsRef<Path>>(dir: P) -> Result<SnapshotRows, ParseError> {
    let dir = dir.as_ref();
    let rows = SnapshotRows {
        windows: load_table(dir, AVAILABILITY_FILE, read_windows)?,
        blocked_dates: load_table(dir, BLOCKED_DATES_FILE, read_blocked_dates)?,
        commitments: load_table(dir, COMMITMENTS_FILE, read_commitments)?,
    };
    info!(
        dir = %dir.display(),
        windows = rows.windows.len(),
        blocked_dates = rows.blocked_dates.len(),
        commitments = rows.commitments.len(),
        "snapshot loaded"
    );
    Ok(rows)
}
