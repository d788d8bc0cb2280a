//! DuckDB persistence for live and finalized conferences.

use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use dockcount_core::{
    ConferenceFilter, ConferenceGateway, ConferenceHeader, ConferenceId, ConferenceIdentity,
    CountLine, PersistedLine, Status, classify,
};
use duckdb::{Connection, Row, params, params_from_iter};
use tracing::{debug, info};

use crate::StoreError;

const SCHEMA: &str = "
CREATE SEQUENCE IF NOT EXISTS conferences_trip_id_seq START 1;

CREATE TABLE IF NOT EXISTS conferences_trip (
    id          BIGINT PRIMARY KEY DEFAULT nextval('conferences_trip_id_seq'),
    trip_id     VARCHAR,
    store_id    VARCHAR,
    trip_date   DATE,
    source_file VARCHAR,
    finalized   BOOLEAN NOT NULL DEFAULT false,
    created_at  TIMESTAMP NOT NULL
);

CREATE TABLE IF NOT EXISTS conference_items (
    conference_id BIGINT NOT NULL REFERENCES conferences_trip(id),
    code          VARCHAR NOT NULL,
    description   VARCHAR NOT NULL,
    expected_qty  BIGINT NOT NULL,
    counted_qty   BIGINT NOT NULL,
    difference    BIGINT NOT NULL,
    status        VARCHAR NOT NULL
);
";

const HEADER_COLUMNS: &str = "id, trip_id, store_id, CAST(trip_date AS VARCHAR), source_file, \
     finalized, strftime(created_at, '%Y-%m-%d %H:%M:%S.%f')";

const LINE_COLUMNS: &str =
    "conference_id, code, description, expected_qty, counted_qty, difference, status";

const TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M:%S%.f";
const DATE_FMT: &str = "%Y-%m-%d";

/// DuckDB store for conference headers (`conferences_trip`) and their lines
/// (`conference_items`).
///
/// A live conference is found by its `(trip_id, store_id, trip_date)`
/// identity and updated in place by every count. A finalized conference is a
/// one-shot snapshot: it gets a fresh id, its lines are bulk inserted, and
/// nothing writes to it afterwards. Live lookups ignore finalized headers.
///
/// Supports both in-memory (ephemeral) and persistent (file-backed) modes.
/// The schema is created on open if missing.
pub struct DuckStore {
    conn: Connection,
}

impl DuckStore {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Open or create a persistent DuckDB database at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let store = Self::init(Connection::open(path)?)?;
        info!(path = %path.display(), "opened conference store");
        Ok(store)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    // ── Counts ──

    /// Number of conference headers, live and finalized.
    pub fn conference_count(&self) -> Result<usize, StoreError> {
        self.count_table("conferences_trip")
    }

    /// Number of stored lines across all conferences.
    pub fn line_count(&self) -> Result<usize, StoreError> {
        self.count_table("conference_items")
    }

    fn count_table(&self, table: &str) -> Result<usize, StoreError> {
        let sql = format!("SELECT count(*)::BIGINT FROM {table}");
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Fetch one header by id.
    pub fn conference(&self, id: ConferenceId) -> Result<Option<ConferenceHeader>, StoreError> {
        let sql = format!("SELECT {HEADER_COLUMNS} FROM conferences_trip WHERE id = ?");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(header_from_row(row)?)),
            None => Ok(None),
        }
    }

    fn lines_where(&self, id: ConferenceId, order_by: &str) -> Result<Vec<PersistedLine>, StoreError> {
        let sql = format!(
            "SELECT {LINE_COLUMNS} FROM conference_items WHERE conference_id = ? ORDER BY {order_by}"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![id])?;
        let mut lines = Vec::new();
        while let Some(row) = rows.next()? {
            lines.push(line_from_row(row)?);
        }
        Ok(lines)
    }
}

fn insert_header(
    conn: &Connection,
    identity: &ConferenceIdentity,
    source_file: Option<&str>,
    finalized: bool,
) -> Result<ConferenceId, StoreError> {
    let trip_date = identity.trip_date.map(|d| d.format(DATE_FMT).to_string());
    let created_at = Utc::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string();
    let id: ConferenceId = conn.query_row(
        "INSERT INTO conferences_trip (trip_id, store_id, trip_date, source_file, finalized, created_at)
         VALUES (?, ?, CAST(? AS DATE), ?, ?, CAST(? AS TIMESTAMP))
         RETURNING id",
        params![
            identity.trip_id.as_deref(),
            identity.store_id.as_deref(),
            trip_date,
            source_file,
            finalized,
            created_at,
        ],
        |row| row.get(0),
    )?;
    Ok(id)
}

fn header_from_row(row: &Row<'_>) -> Result<ConferenceHeader, StoreError> {
    let trip_date: Option<String> = row.get(3)?;
    let created_at: String = row.get(6)?;
    let trip_date = trip_date
        .map(|d| NaiveDate::parse_from_str(&d, DATE_FMT).map_err(|_| StoreError::InvalidDate(d)))
        .transpose()?;
    let created_at = NaiveDateTime::parse_from_str(&created_at, TIMESTAMP_FMT)
        .map_err(|_| StoreError::InvalidDate(created_at.clone()))?;
    Ok(ConferenceHeader {
        id: row.get(0)?,
        trip_id: row.get(1)?,
        store_id: row.get(2)?,
        trip_date,
        source_file: row.get(4)?,
        finalized: row.get(5)?,
        created_at: DateTime::from_naive_utc_and_offset(created_at, Utc),
    })
}

fn line_from_row(row: &Row<'_>) -> Result<PersistedLine, StoreError> {
    let status: String = row.get(6)?;
    Ok(PersistedLine {
        conference_id: row.get(0)?,
        normalized_code: row.get(1)?,
        description: row.get(2)?,
        expected_qty: row.get(3)?,
        counted_qty: row.get(4)?,
        difference: row.get(5)?,
        status: status.parse::<Status>()?,
    })
}

impl ConferenceGateway for DuckStore {
    type Error = StoreError;

    fn get_or_create_live_conference(
        &mut self,
        identity: &ConferenceIdentity,
        source_file: Option<&str>,
    ) -> Result<ConferenceId, StoreError> {
        let trip_date = identity.trip_date.map(|d| d.format(DATE_FMT).to_string());
        let tx = self.conn.transaction()?;
        let existing: Option<ConferenceId> = {
            let mut stmt = tx.prepare(
                "SELECT id FROM conferences_trip
                 WHERE NOT finalized
                   AND trip_id IS NOT DISTINCT FROM ?
                   AND store_id IS NOT DISTINCT FROM ?
                   AND trip_date IS NOT DISTINCT FROM CAST(? AS DATE)
                 ORDER BY created_at DESC, id DESC
                 LIMIT 1",
            )?;
            let mut rows = stmt.query(params![
                identity.trip_id.as_deref(),
                identity.store_id.as_deref(),
                trip_date,
            ])?;
            match rows.next()? {
                Some(row) => Some(row.get(0)?),
                None => None,
            }
        };

        let id = match existing {
            Some(id) => {
                debug!(conference_id = id, "resuming live conference");
                id
            }
            None => {
                let id = insert_header(&tx, identity, source_file, false)?;
                info!(
                    conference_id = id,
                    trip = ?identity.trip_id,
                    store = ?identity.store_id,
                    "created live conference"
                );
                id
            }
        };
        tx.commit()?;
        Ok(id)
    }

    fn load_persisted_lines(
        &mut self,
        conference_id: ConferenceId,
    ) -> Result<Vec<PersistedLine>, StoreError> {
        self.lines_where(conference_id, "rowid")
    }

    fn upsert_add_count(
        &mut self,
        conference_id: ConferenceId,
        normalized_code: &str,
        description: &str,
        expected_qty: i64,
        qty_delta: i64,
    ) -> Result<(), StoreError> {
        if qty_delta <= 0 {
            return Err(StoreError::InvalidQuantity(qty_delta));
        }
        let tx = self.conn.transaction()?;
        let current: Option<i64> = {
            let mut stmt = tx.prepare(
                "SELECT counted_qty FROM conference_items
                 WHERE conference_id = ? AND code = ?
                 LIMIT 1",
            )?;
            let mut rows = stmt.query(params![conference_id, normalized_code])?;
            match rows.next()? {
                Some(row) => Some(row.get(0)?),
                None => None,
            }
        };

        let counted_qty = current.unwrap_or(0).checked_add(qty_delta).ok_or_else(|| {
            StoreError::QuantityOverflow {
                code: normalized_code.to_string(),
                delta: qty_delta,
            }
        })?;
        let difference = counted_qty - expected_qty;
        let status = classify(expected_qty, counted_qty);
        if current.is_some() {
            tx.execute(
                "UPDATE conference_items
                 SET counted_qty = ?, expected_qty = ?, difference = ?, status = ?
                 WHERE conference_id = ? AND code = ?",
                params![
                    counted_qty,
                    expected_qty,
                    difference,
                    status.as_str(),
                    conference_id,
                    normalized_code,
                ],
            )?;
        } else {
            tx.execute(
                &format!("INSERT INTO conference_items ({LINE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)"),
                params![
                    conference_id,
                    normalized_code,
                    description,
                    expected_qty,
                    counted_qty,
                    difference,
                    status.as_str(),
                ],
            )?;
        }
        tx.commit()?;
        debug!(conference_id, code = normalized_code, counted_qty, %status, "persisted count");
        Ok(())
    }

    fn insert_snapshot(
        &mut self,
        identity: &ConferenceIdentity,
        source_file: Option<&str>,
        lines: &[CountLine],
    ) -> Result<ConferenceId, StoreError> {
        let tx = self.conn.transaction()?;
        let id = insert_header(&tx, identity, source_file, true)?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO conference_items ({LINE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)"
            ))?;
            for line in lines {
                stmt.execute(params![
                    id,
                    line.normalized_code,
                    line.description,
                    line.expected_qty,
                    line.counted_qty,
                    line.difference(),
                    line.status().as_str(),
                ])?;
            }
        }
        tx.commit()?;
        info!(conference_id = id, lines = lines.len(), "wrote conference snapshot");
        Ok(id)
    }

    fn list_conferences(
        &mut self,
        filter: &ConferenceFilter,
    ) -> Result<Vec<ConferenceHeader>, StoreError> {
        let mut sql = format!("SELECT {HEADER_COLUMNS} FROM conferences_trip WHERE true");
        let mut args: Vec<String> = Vec::new();
        if let Some(store_id) = &filter.store_id {
            sql.push_str(" AND store_id = ?");
            args.push(store_id.clone());
        }
        if let Some(trip_id) = &filter.trip_id {
            sql.push_str(" AND trip_id = ?");
            args.push(trip_id.clone());
        }
        if let Some(from) = filter.created_from {
            sql.push_str(" AND created_at >= CAST(? AS TIMESTAMP)");
            args.push(from.format(DATE_FMT).to_string());
        }
        if let Some(to) = filter.created_to {
            let end = to
                .succ_opt()
                .ok_or_else(|| StoreError::InvalidDate(to.to_string()))?;
            sql.push_str(" AND created_at < CAST(? AS TIMESTAMP)");
            args.push(end.format(DATE_FMT).to_string());
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(args.iter()))?;
        let mut headers = Vec::new();
        while let Some(row) = rows.next()? {
            headers.push(header_from_row(row)?);
        }
        Ok(headers)
    }

    fn fetch_lines(&mut self, conference_id: ConferenceId) -> Result<Vec<PersistedLine>, StoreError> {
        self.lines_where(conference_id, "description, code")
    }
}
