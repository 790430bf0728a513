//! SQLite-based store implementation

use chrono::{DateTime, Local, NaiveDate};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use ronda_api::{
    AttendanceLocation, DutySchedule, FineFilter, FineRecord, FineSetting, FineType, Participant,
    PostLocation,
};
use ronda_util::{FineId, LocationId, ScheduleId, UnitId, UserId};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::{
    AuditEvent, AuditEventType, FineRepository, LocationRepository, ParticipantRepository,
    ScheduleRepository, Store, StoreError, StoreResult, StoreTx,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

const SCHEDULE_COLUMNS: &str = "id, unit_id, cycle_type, shift_label, start_date, end_date, \
     start_time, end_time, status, created_at, updated_at";

const PARTICIPANT_COLUMNS: &str = "schedule_id, user_id, status, attendance_at, clock_out_at, \
     attendance_location_json, notes, is_fined, fine_amount";

const LOCATION_COLUMNS: &str = "id, unit_id, name, latitude, longitude, radius_meters, \
     qr_token, token_expires_at, created_at";

const FINE_COLUMNS: &str =
    "id, unit_id, user_id, schedule_id, fine_type, amount, status, generated_at, paid_at";

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".into()))
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS schedules (
                id TEXT PRIMARY KEY,
                unit_id TEXT NOT NULL,
                cycle_type TEXT NOT NULL,
                shift_label TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS participants (
                schedule_id TEXT NOT NULL REFERENCES schedules(id),
                user_id TEXT NOT NULL,
                status TEXT NOT NULL,
                attendance_at TEXT,
                clock_out_at TEXT,
                attendance_location_json TEXT,
                notes TEXT,
                is_fined INTEGER NOT NULL DEFAULT 0,
                fine_amount TEXT NOT NULL DEFAULT '0',
                PRIMARY KEY (schedule_id, user_id)
            );

            CREATE TABLE IF NOT EXISTS locations (
                id TEXT PRIMARY KEY,
                unit_id TEXT NOT NULL,
                name TEXT NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                radius_meters INTEGER NOT NULL,
                qr_token TEXT NOT NULL UNIQUE,
                token_expires_at TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS fine_settings (
                unit_id TEXT NOT NULL,
                fine_type TEXT NOT NULL,
                amount TEXT NOT NULL,
                tolerance_minutes INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                PRIMARY KEY (unit_id, fine_type)
            );

            -- Fines outlive the schedule they were generated for
            CREATE TABLE IF NOT EXISTS fines (
                id TEXT PRIMARY KEY,
                unit_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                schedule_id TEXT NOT NULL,
                fine_type TEXT NOT NULL,
                amount TEXT NOT NULL,
                status TEXT NOT NULL,
                generated_at TEXT NOT NULL,
                paid_at TEXT
            );

            -- Audit log (append-only)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                unit_id TEXT NOT NULL,
                actor TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_schedules_unit ON schedules(unit_id, start_date);
            CREATE INDEX IF NOT EXISTS idx_participants_user ON participants(user_id);
            CREATE INDEX IF NOT EXISTS idx_locations_unit ON locations(unit_id);
            CREATE INDEX IF NOT EXISTS idx_fines_unit ON fines(unit_id, status);
            CREATE INDEX IF NOT EXISTS idx_audit_unit ON audit_log(unit_id, id);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

impl Store for SqliteStore {
    fn begin(&self) -> StoreResult<Box<dyn StoreTx + '_>> {
        let conn = self.lock()?;
        // IMMEDIATE takes the write lock up front so two read-modify-write
        // cycles can never interleave
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(Box::new(SqliteTx {
            conn,
            finished: false,
        }))
    }

    fn get_recent_audits(&self, unit_id: &UnitId, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, unit_id, actor, event_json FROM audit_log
             WHERE unit_id = ? ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map(params![unit_id.as_str(), limit], |row| {
            let id: i64 = row.get(0)?;
            let timestamp = get_instant(row, 1)?;
            let unit_id: String = row.get(2)?;
            let actor: String = row.get(3)?;
            let event_json: String = row.get(4)?;
            Ok((id, timestamp, unit_id, actor, event_json))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp, unit_id, actor, event_json) = row?;
            let event: AuditEventType = serde_json::from_str(&event_json)?;

            events.push(AuditEvent {
                id,
                timestamp,
                unit_id: UnitId::new(unit_id),
                actor: UserId::new(actor),
                event,
            });
        }

        Ok(events)
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}

/// An open `BEGIN IMMEDIATE` transaction holding the connection lock.
///
/// Rolled back on drop unless [`StoreTx::commit`] succeeded.
pub struct SqliteTx<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl Drop for SqliteTx<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!(error = %e, "Failed to roll back transaction");
            } else {
                debug!("Transaction rolled back");
            }
        }
    }
}

impl StoreTx for SqliteTx<'_> {
    fn append_audit(&self, event: &AuditEvent) -> StoreResult<i64> {
        let event_json = serde_json::to_string(&event.event)?;

        self.conn.execute(
            "INSERT INTO audit_log (timestamp, unit_id, actor, event_json) VALUES (?, ?, ?, ?)",
            params![
                event.timestamp.to_rfc3339(),
                event.unit_id.as_str(),
                event.actor.as_str(),
                event_json
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!(event_id = id, "Audit event appended");
        Ok(id)
    }

    fn commit(mut self: Box<Self>) -> StoreResult<()> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }
}

impl ScheduleRepository for SqliteTx<'_> {
    fn insert_schedule(&self, s: &DutySchedule) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO schedules (id, unit_id, cycle_type, shift_label, start_date, end_date,
                start_time, end_time, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                s.id.to_string(),
                s.unit_id.as_str(),
                s.cycle_type.as_str(),
                s.shift_label,
                format_date(s.start_date),
                format_date(s.end_date),
                s.start_time.to_string(),
                s.end_time.to_string(),
                s.status.as_str(),
                s.created_at.to_rfc3339(),
                s.updated_at.to_rfc3339(),
            ],
        )?;
        debug!(schedule_id = %s.id, "Schedule inserted");
        Ok(())
    }

    fn get_schedule(&self, id: ScheduleId) -> StoreResult<Option<DutySchedule>> {
        let sql = format!("SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE id = ?");
        Ok(self
            .conn
            .query_row(&sql, [id.to_string()], schedule_from_row)
            .optional()?)
    }

    fn update_schedule(&self, s: &DutySchedule) -> StoreResult<()> {
        self.conn.execute(
            "UPDATE schedules SET cycle_type = ?2, shift_label = ?3, start_date = ?4,
                end_date = ?5, start_time = ?6, end_time = ?7, status = ?8, updated_at = ?9
             WHERE id = ?1",
            params![
                s.id.to_string(),
                s.cycle_type.as_str(),
                s.shift_label,
                format_date(s.start_date),
                format_date(s.end_date),
                s.start_time.to_string(),
                s.end_time.to_string(),
                s.status.as_str(),
                s.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn delete_schedule(&self, id: ScheduleId) -> StoreResult<bool> {
        let n = self
            .conn
            .execute("DELETE FROM schedules WHERE id = ?", [id.to_string()])?;
        Ok(n > 0)
    }

    fn list_schedules(&self, unit_id: &UnitId) -> StoreResult<Vec<DutySchedule>> {
        let sql = format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE unit_id = ?
             ORDER BY start_date DESC, created_at DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([unit_id.as_str()], schedule_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn latest_schedule(&self, unit_id: &UnitId) -> StoreResult<Option<DutySchedule>> {
        let sql = format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE unit_id = ?
             ORDER BY start_date DESC, created_at DESC LIMIT 1"
        );
        Ok(self
            .conn
            .query_row(&sql, [unit_id.as_str()], schedule_from_row)
            .optional()?)
    }

    fn find_overlapping_active(
        &self,
        unit_id: &UnitId,
        shift_label: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        exclude: Option<ScheduleId>,
    ) -> StoreResult<Option<DutySchedule>> {
        let sql = format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules
             WHERE unit_id = ?1 AND shift_label = ?2 AND status = 'ACTIVE'
               AND start_date <= ?4 AND end_date >= ?3
               AND (?5 IS NULL OR id <> ?5)
             ORDER BY start_date LIMIT 1"
        );
        Ok(self
            .conn
            .query_row(
                &sql,
                params![
                    unit_id.as_str(),
                    shift_label,
                    format_date(start_date),
                    format_date(end_date),
                    exclude.map(|id| id.to_string()),
                ],
                schedule_from_row,
            )
            .optional()?)
    }

    fn deactivate_ended(
        &self,
        unit_id: &UnitId,
        today: NaiveDate,
        now: DateTime<Local>,
    ) -> StoreResult<usize> {
        let n = self.conn.execute(
            "UPDATE schedules SET status = 'INACTIVE', updated_at = ?3
             WHERE unit_id = ?1 AND status = 'ACTIVE' AND end_date < ?2",
            params![unit_id.as_str(), format_date(today), now.to_rfc3339()],
        )?;
        if n > 0 {
            debug!(unit_id = %unit_id, count = n, "Ended schedules deactivated");
        }
        Ok(n)
    }

    fn find_active_for_user(
        &self,
        unit_id: &UnitId,
        user_id: &UserId,
        today: NaiveDate,
    ) -> StoreResult<Option<DutySchedule>> {
        let sql = format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules s
             WHERE unit_id = ?1 AND status = 'ACTIVE'
               AND start_date <= ?3 AND end_date >= ?3
               AND EXISTS (
                   SELECT 1 FROM participants p
                   WHERE p.schedule_id = s.id AND p.user_id = ?2
               )
             ORDER BY start_date DESC, created_at DESC LIMIT 1"
        );
        Ok(self
            .conn
            .query_row(
                &sql,
                params![unit_id.as_str(), user_id.as_str(), format_date(today)],
                schedule_from_row,
            )
            .optional()?)
    }
}

impl ParticipantRepository for SqliteTx<'_> {
    fn insert_participant(&self, p: &Participant) -> StoreResult<()> {
        let location_json = p
            .attendance_location
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn.execute(
            "INSERT INTO participants (schedule_id, user_id, status, attendance_at, clock_out_at,
                attendance_location_json, notes, is_fined, fine_amount)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                p.schedule_id.to_string(),
                p.user_id.as_str(),
                p.status.as_str(),
                p.attendance_at.map(|t| t.to_rfc3339()),
                p.clock_out_at.map(|t| t.to_rfc3339()),
                location_json,
                p.notes,
                p.is_fined,
                p.fine_amount.to_string(),
            ],
        )?;
        Ok(())
    }

    fn get_participant(
        &self,
        schedule_id: ScheduleId,
        user_id: &UserId,
    ) -> StoreResult<Option<Participant>> {
        let sql = format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE schedule_id = ? AND user_id = ?"
        );
        Ok(self
            .conn
            .query_row(
                &sql,
                params![schedule_id.to_string(), user_id.as_str()],
                participant_from_row,
            )
            .optional()?)
    }

    fn update_participant(&self, p: &Participant) -> StoreResult<()> {
        let location_json = p
            .attendance_location
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn.execute(
            "UPDATE participants SET status = ?3, attendance_at = ?4, clock_out_at = ?5,
                attendance_location_json = ?6, notes = ?7, is_fined = ?8, fine_amount = ?9
             WHERE schedule_id = ?1 AND user_id = ?2",
            params![
                p.schedule_id.to_string(),
                p.user_id.as_str(),
                p.status.as_str(),
                p.attendance_at.map(|t| t.to_rfc3339()),
                p.clock_out_at.map(|t| t.to_rfc3339()),
                location_json,
                p.notes,
                p.is_fined,
                p.fine_amount.to_string(),
            ],
        )?;
        Ok(())
    }

    fn delete_participant(&self, schedule_id: ScheduleId, user_id: &UserId) -> StoreResult<bool> {
        let n = self.conn.execute(
            "DELETE FROM participants WHERE schedule_id = ? AND user_id = ?",
            params![schedule_id.to_string(), user_id.as_str()],
        )?;
        Ok(n > 0)
    }

    fn delete_participants(&self, schedule_id: ScheduleId) -> StoreResult<usize> {
        Ok(self.conn.execute(
            "DELETE FROM participants WHERE schedule_id = ?",
            [schedule_id.to_string()],
        )?)
    }

    fn list_participants(&self, schedule_id: ScheduleId) -> StoreResult<Vec<Participant>> {
        let sql = format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE schedule_id = ? ORDER BY rowid"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([schedule_id.to_string()], participant_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn participant_history(&self, user_id: &UserId) -> StoreResult<Vec<Participant>> {
        let sql = format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM participants p WHERE user_id = ?
             ORDER BY (SELECT start_date FROM schedules s WHERE s.id = p.schedule_id) DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([user_id.as_str()], participant_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

impl LocationRepository for SqliteTx<'_> {
    fn insert_location(&self, l: &PostLocation) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO locations (id, unit_id, name, latitude, longitude, radius_meters,
                qr_token, token_expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                l.id.to_string(),
                l.unit_id.as_str(),
                l.name,
                l.latitude,
                l.longitude,
                l.radius_meters,
                l.qr_token,
                l.token_expires_at.map(|t| t.to_rfc3339()),
                l.created_at.to_rfc3339(),
            ],
        )?;
        debug!(location_id = %l.id, "Location inserted");
        Ok(())
    }

    fn get_location(&self, id: LocationId) -> StoreResult<Option<PostLocation>> {
        let sql = format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE id = ?");
        Ok(self
            .conn
            .query_row(&sql, [id.to_string()], location_from_row)
            .optional()?)
    }

    fn find_location_by_token(&self, qr_token: &str) -> StoreResult<Option<PostLocation>> {
        let sql = format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE qr_token = ?");
        Ok(self
            .conn
            .query_row(&sql, [qr_token], location_from_row)
            .optional()?)
    }

    fn update_location(&self, l: &PostLocation) -> StoreResult<()> {
        self.conn.execute(
            "UPDATE locations SET name = ?2, latitude = ?3, longitude = ?4, radius_meters = ?5,
                qr_token = ?6, token_expires_at = ?7
             WHERE id = ?1",
            params![
                l.id.to_string(),
                l.name,
                l.latitude,
                l.longitude,
                l.radius_meters,
                l.qr_token,
                l.token_expires_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    fn delete_location(&self, id: LocationId) -> StoreResult<bool> {
        let n = self
            .conn
            .execute("DELETE FROM locations WHERE id = ?", [id.to_string()])?;
        Ok(n > 0)
    }

    fn list_locations(&self, unit_id: &UnitId) -> StoreResult<Vec<PostLocation>> {
        let sql = format!(
            "SELECT {LOCATION_COLUMNS} FROM locations WHERE unit_id = ? ORDER BY name, created_at"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([unit_id.as_str()], location_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

impl FineRepository for SqliteTx<'_> {
    fn get_fine_setting(
        &self,
        unit_id: &UnitId,
        fine_type: FineType,
    ) -> StoreResult<Option<FineSetting>> {
        Ok(self
            .conn
            .query_row(
                "SELECT unit_id, fine_type, amount, tolerance_minutes, is_active
                 FROM fine_settings WHERE unit_id = ? AND fine_type = ?",
                params![unit_id.as_str(), fine_type.as_str()],
                fine_setting_from_row,
            )
            .optional()?)
    }

    fn upsert_fine_setting(&self, s: &FineSetting) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO fine_settings (unit_id, fine_type, amount, tolerance_minutes, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(unit_id, fine_type) DO UPDATE SET
                amount = excluded.amount,
                tolerance_minutes = excluded.tolerance_minutes,
                is_active = excluded.is_active",
            params![
                s.unit_id.as_str(),
                s.fine_type.as_str(),
                s.amount.to_string(),
                s.tolerance_minutes,
                s.is_active,
            ],
        )?;
        Ok(())
    }

    fn list_fine_settings(&self, unit_id: &UnitId) -> StoreResult<Vec<FineSetting>> {
        let mut stmt = self.conn.prepare(
            "SELECT unit_id, fine_type, amount, tolerance_minutes, is_active
             FROM fine_settings WHERE unit_id = ? ORDER BY fine_type",
        )?;
        let rows = stmt.query_map([unit_id.as_str()], fine_setting_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn insert_fine(&self, f: &FineRecord) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO fines (id, unit_id, user_id, schedule_id, fine_type, amount, status,
                generated_at, paid_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                f.id.to_string(),
                f.unit_id.as_str(),
                f.user_id.as_str(),
                f.schedule_id.to_string(),
                f.fine_type.as_str(),
                f.amount.to_string(),
                f.status.as_str(),
                f.generated_at.to_rfc3339(),
                f.paid_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        debug!(fine_id = %f.id, user_id = %f.user_id, "Fine inserted");
        Ok(())
    }

    fn get_fine(&self, id: FineId) -> StoreResult<Option<FineRecord>> {
        let sql = format!("SELECT {FINE_COLUMNS} FROM fines WHERE id = ?");
        Ok(self
            .conn
            .query_row(&sql, [id.to_string()], fine_from_row)
            .optional()?)
    }

    fn update_fine(&self, f: &FineRecord) -> StoreResult<()> {
        self.conn.execute(
            "UPDATE fines SET amount = ?2, status = ?3, paid_at = ?4 WHERE id = ?1",
            params![
                f.id.to_string(),
                f.amount.to_string(),
                f.status.as_str(),
                f.paid_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    fn list_fines(&self, unit_id: &UnitId, filter: &FineFilter) -> StoreResult<Vec<FineRecord>> {
        let sql = format!(
            "SELECT {FINE_COLUMNS} FROM fines
             WHERE unit_id = ?1
               AND (?2 IS NULL OR user_id = ?2)
               AND (?3 IS NULL OR status = ?3)
             ORDER BY generated_at DESC, rowid DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                unit_id.as_str(),
                filter.user_id.as_ref().map(|u| u.as_str()),
                filter.status.map(|s| s.as_str()),
            ],
            fine_from_row,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

// Row mapping

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn get_parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let s: String = row.get(idx)?;
    s.parse().map_err(|e| conversion_error(idx, e))
}

fn get_date(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let s: String = row.get(idx)?;
    NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(|e| conversion_error(idx, e))
}

fn parse_instant(idx: usize, s: &str) -> rusqlite::Result<DateTime<Local>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Local))
        .map_err(|e| conversion_error(idx, e))
}

fn get_instant(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Local>> {
    let s: String = row.get(idx)?;
    parse_instant(idx, &s)
}

fn get_opt_instant(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Local>>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|s| parse_instant(idx, &s)).transpose()
}

fn schedule_from_row(row: &Row<'_>) -> rusqlite::Result<DutySchedule> {
    Ok(DutySchedule {
        id: get_parsed(row, 0)?,
        unit_id: UnitId::new(row.get::<_, String>(1)?),
        cycle_type: get_parsed(row, 2)?,
        shift_label: row.get(3)?,
        start_date: get_date(row, 4)?,
        end_date: get_date(row, 5)?,
        start_time: get_parsed(row, 6)?,
        end_time: get_parsed(row, 7)?,
        status: get_parsed(row, 8)?,
        created_at: get_instant(row, 9)?,
        updated_at: get_instant(row, 10)?,
    })
}

fn participant_from_row(row: &Row<'_>) -> rusqlite::Result<Participant> {
    let location_json: Option<String> = row.get(5)?;
    let attendance_location = location_json
        .map(|json| serde_json::from_str::<AttendanceLocation>(&json))
        .transpose()
        .map_err(|e| conversion_error(5, e))?;

    Ok(Participant {
        schedule_id: get_parsed(row, 0)?,
        user_id: UserId::new(row.get::<_, String>(1)?),
        status: get_parsed(row, 2)?,
        attendance_at: get_opt_instant(row, 3)?,
        clock_out_at: get_opt_instant(row, 4)?,
        attendance_location,
        notes: row.get(6)?,
        is_fined: row.get(7)?,
        fine_amount: get_parsed(row, 8)?,
    })
}

fn location_from_row(row: &Row<'_>) -> rusqlite::Result<PostLocation> {
    Ok(PostLocation {
        id: get_parsed(row, 0)?,
        unit_id: UnitId::new(row.get::<_, String>(1)?),
        name: row.get(2)?,
        latitude: row.get(3)?,
        longitude: row.get(4)?,
        radius_meters: row.get(5)?,
        qr_token: row.get(6)?,
        token_expires_at: get_opt_instant(row, 7)?,
        created_at: get_instant(row, 8)?,
    })
}

fn fine_setting_from_row(row: &Row<'_>) -> rusqlite::Result<FineSetting> {
    Ok(FineSetting {
        unit_id: UnitId::new(row.get::<_, String>(0)?),
        fine_type: get_parsed(row, 1)?,
        amount: get_parsed(row, 2)?,
        tolerance_minutes: row.get(3)?,
        is_active: row.get(4)?,
    })
}

fn fine_from_row(row: &Row<'_>) -> rusqlite::Result<FineRecord> {
    Ok(FineRecord {
        id: get_parsed(row, 0)?,
        unit_id: UnitId::new(row.get::<_, String>(1)?),
        user_id: UserId::new(row.get::<_, String>(2)?),
        schedule_id: get_parsed(row, 3)?,
        fine_type: get_parsed(row, 4)?,
        amount: get_parsed(row, 5)?,
        status: get_parsed(row, 6)?,
        generated_at: get_instant(row, 7)?,
        paid_at: get_opt_instant(row, 8)?,
    })
}
