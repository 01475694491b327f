use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::billing::{BillingCalculator, Receipt, StayDuration};
use crate::error_handling::types::{SessionError, StorageError};
use crate::session_management::plate::{normalize, Plate};
use crate::session_management::session::ParkingSession;
use crate::storage::Storage;

/// Storage key the parked vehicles are kept under.
pub const DEFAULT_STORAGE_KEY: &str = "veiculos";

/// One row of the occupancy view: a session and what it has cost so far.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveEntry {
    pub session: ParkingSession,
    pub duration: StayDuration,
    pub amount: f64,
}

/// One element of the persisted array.
///
/// Elements that do not decode as a session (an older app may have stored a
/// plate that no longer validates) are carried as raw JSON and written back
/// in place, so no operation ever drops them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum StoredRecord {
    Session(ParkingSession),
    Unreadable(serde_json::Value),
}

impl StoredRecord {
    fn session(&self) -> Option<&ParkingSession> {
        match self {
            StoredRecord::Session(session) => Some(session),
            StoredRecord::Unreadable(_) => None,
        }
    }
}

/// Owner of the set of open parking sessions.
///
/// The whole set is persisted as one JSON array under a single storage key.
/// Every operation re-reads that array, so the store holds no copy of its
/// own; every mutation writes the full array back in one `set_item` call.
///
/// # Fields Overview
///
/// - `storage`: key-value backend holding the serialized sessions
/// - `key`: storage key of the array
/// - `calculator`: pricing used for receipts and the live view
pub struct SessionStore {
    storage: Arc<dyn Storage>,
    key: String,
    calculator: BillingCalculator,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_options(storage, DEFAULT_STORAGE_KEY, BillingCalculator::default())
    }

    pub fn with_options(
        storage: Arc<dyn Storage>,
        key: impl Into<String>,
        calculator: BillingCalculator,
    ) -> Self {
        Self {
            storage,
            key: key.into(),
            calculator,
        }
    }

    pub fn calculator(&self) -> &BillingCalculator {
        &self.calculator
    }

    /// Registers the entry of a vehicle, timestamped now.
    pub fn open_session(&mut self, raw_plate: &str) -> Result<ParkingSession, SessionError> {
        self.open_session_at(raw_plate, Utc::now())
    }

    pub fn open_session_at(
        &mut self,
        raw_plate: &str,
        now: DateTime<Utc>,
    ) -> Result<ParkingSession, SessionError> {
        let plate = Plate::parse(raw_plate)?;
        let mut records = self.load_records()?;
        if Self::sessions(&records).any(|s| s.plate == plate) {
            debug!("Refusing duplicate entry for {}", plate);
            return Err(SessionError::DuplicatePlate(plate.to_string()));
        }
        let session = ParkingSession::new(plate, now);
        records.push(StoredRecord::Session(session.clone()));
        self.save(&records)?;
        info!("Opened session for {} at {}", session.plate, now.to_rfc3339());
        Ok(session)
    }

    pub fn find_by_plate(&self, plate: &str) -> Result<ParkingSession, SessionError> {
        let records = self.load_records()?;
        let (_, session) = Self::locate(&records, plate)?;
        Ok(session.clone())
    }

    /// Computes what closing `plate` now would charge, without removing anything.
    pub fn preview_close(&self, plate: &str) -> Result<Receipt, SessionError> {
        self.preview_close_at(plate, Utc::now())
    }

    pub fn preview_close_at(
        &self,
        plate: &str,
        now: DateTime<Utc>,
    ) -> Result<Receipt, SessionError> {
        let records = self.load_records()?;
        let (_, session) = Self::locate(&records, plate)?;
        Ok(self.receipt_for(session, now))
    }

    /// Removes the session for `plate`. Meant to follow a confirmed `preview_close`.
    pub fn commit_close(&mut self, plate: &str) -> Result<(), SessionError> {
        let mut records = self.load_records()?;
        let (index, session) = Self::locate(&records, plate)?;
        let closed = session.plate.clone();
        records.remove(index);
        self.save(&records)?;
        info!("Closed session for {}", closed);
        Ok(())
    }

    /// Bills and removes the session for `plate` in one step.
    pub fn close_session(&mut self, plate: &str) -> Result<Receipt, SessionError> {
        self.close_session_at(plate, Utc::now())
    }

    pub fn close_session_at(
        &mut self,
        plate: &str,
        now: DateTime<Utc>,
    ) -> Result<Receipt, SessionError> {
        let mut records = self.load_records()?;
        let (index, session) = Self::locate(&records, plate)?;
        let receipt = self.receipt_for(session, now);
        records.remove(index);
        self.save(&records)?;
        info!(
            "Closed session for {}: {} -> {}",
            receipt.session.plate,
            receipt.duration,
            receipt.amount_label()
        );
        Ok(receipt)
    }

    /// Corrects the plate of an open session. Entry time and position are kept.
    pub fn rename_plate(
        &mut self,
        old_plate: &str,
        new_plate: &str,
    ) -> Result<ParkingSession, SessionError> {
        let mut records = self.load_records()?;
        let (index, current) = Self::locate(&records, old_plate)?;
        let new_plate = Plate::parse(new_plate)?;
        if current.plate == new_plate {
            return Ok(current.clone());
        }
        if Self::sessions(&records).any(|s| s.plate == new_plate) {
            return Err(SessionError::DuplicatePlate(new_plate.to_string()));
        }
        let renamed = ParkingSession::new(new_plate, current.entry_time());
        let old = current.plate.clone();
        records[index] = StoredRecord::Session(renamed.clone());
        self.save(&records)?;
        info!("Renamed session {} to {}", old, renamed.plate);
        Ok(renamed)
    }

    /// All open sessions in entry order.
    pub fn list_all(&self) -> Result<Vec<ParkingSession>, SessionError> {
        self.load()
    }

    /// Sessions whose plate contains `term`, ignoring case and hyphens.
    ///
    /// The term goes through the same normalization as an entered plate, so
    /// `abc1234`, `ABC-1234` and `c12` all match `ABC-1234`.
    pub fn search(&self, term: &str) -> Result<Vec<ParkingSession>, SessionError> {
        let needle = normalize(term);
        let sessions = self.load()?;
        if needle.is_empty() {
            return Ok(sessions);
        }
        Ok(sessions
            .into_iter()
            .filter(|s| s.plate.as_str().replace('-', "").contains(&needle))
            .collect())
    }

    pub fn count(&self) -> Result<usize, SessionError> {
        Ok(self.load()?.len())
    }

    /// Elapsed time and running amount for every open session, as of now.
    pub fn live_view(&self) -> Result<Vec<LiveEntry>, SessionError> {
        self.live_view_at(Utc::now())
    }

    pub fn live_view_at(&self, now: DateTime<Utc>) -> Result<Vec<LiveEntry>, SessionError> {
        Ok(self
            .load()?
            .into_iter()
            .map(|session| self.live_entry(session, now))
            .collect())
    }

    /// Same as `live_view_at`, restricted to the sessions `search(term)` returns.
    pub fn live_search_at(
        &self,
        term: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<LiveEntry>, SessionError> {
        Ok(self
            .search(term)?
            .into_iter()
            .map(|session| self.live_entry(session, now))
            .collect())
    }

    /// Live figures for a single open session.
    pub fn live_entry_at(&self, plate: &str, now: DateTime<Utc>) -> Result<LiveEntry, SessionError> {
        let session = self.find_by_plate(plate)?;
        Ok(self.live_entry(session, now))
    }

    fn live_entry(&self, session: ParkingSession, now: DateTime<Utc>) -> LiveEntry {
        let duration = self.calculator.elapsed_duration(session.entry_time(), now);
        let amount = self.calculator.amount_due(&duration);
        LiveEntry {
            session,
            duration,
            amount,
        }
    }

    fn receipt_for(&self, session: &ParkingSession, exit_time: DateTime<Utc>) -> Receipt {
        let duration = self.calculator.elapsed_duration(session.entry_time(), exit_time);
        Receipt {
            session: session.clone(),
            exit_time,
            duration,
            amount: self.calculator.amount_due(&duration),
        }
    }

    /// Index and session of the record matching `plate`. Input that is not a
    /// plate matches nothing.
    fn locate<'a>(
        records: &'a [StoredRecord],
        plate: &str,
    ) -> Result<(usize, &'a ParkingSession), SessionError> {
        let wanted = Plate::parse(plate).map_err(|_| SessionError::NotFound(plate.to_string()))?;
        records
            .iter()
            .enumerate()
            .find_map(|(index, record)| {
                record
                    .session()
                    .filter(|s| s.plate == wanted)
                    .map(|s| (index, s))
            })
            .ok_or_else(|| SessionError::NotFound(wanted.to_string()))
    }

    fn sessions(records: &[StoredRecord]) -> impl Iterator<Item = &ParkingSession> {
        records.iter().filter_map(StoredRecord::session)
    }

    fn load(&self) -> Result<Vec<ParkingSession>, SessionError> {
        let records = self.load_records()?;
        Ok(Self::sessions(&records).cloned().collect())
    }

    /// Decodes the stored array. A blob that is not an array is `Corrupted`;
    /// single elements that are not sessions are kept as they are.
    fn load_records(&self) -> Result<Vec<StoredRecord>, SessionError> {
        let Some(blob) = self.storage.get_item(&self.key)? else {
            return Ok(Vec::new());
        };
        let records: Vec<StoredRecord> = serde_json::from_str(&blob).map_err(|e| {
            error!("Unable to decode sessions under {}: {}", self.key, e);
            StorageError::Corrupted(format!("{}: {}", self.key, e))
        })?;
        for (index, record) in records.iter().enumerate() {
            if let StoredRecord::Unreadable(raw) = record {
                warn!("Skipping unreadable entry {} under {}: {}", index, self.key, raw);
            }
        }
        debug!("Loaded {} record(s) from {}", records.len(), self.key);
        Ok(records)
    }

    fn save(&self, records: &[StoredRecord]) -> Result<(), SessionError> {
        let blob = serde_json::to_string(records).map_err(|e| {
            error!("Unable to encode sessions: {}", e);
            StorageError::WriteFailed(e.to_string())
        })?;
        self.storage.set_item(&self.key, &blob)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStorage, MemoryStorage};
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    fn store() -> (SessionStore, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        (SessionStore::new(storage.clone()), storage)
    }

    fn plates(sessions: &[ParkingSession]) -> Vec<&str> {
        sessions.iter().map(|s| s.plate.as_str()).collect()
    }

    #[test]
    fn test_open_session_stores_canonical_plate() {
        let (mut store, _) = store();
        let session = store.open_session_at(" abc1234 ", t0()).unwrap();
        assert_eq!(session.plate.as_str(), "ABC-1234");
        assert_eq!(session.entry_time(), t0());
        assert_eq!(store.find_by_plate("ABC-1234").unwrap(), session);
    }

    #[test]
    fn test_open_session_rejects_invalid_plate() {
        let (mut store, storage) = store();
        for raw in ["", "   ", "AB123", "ABCD12345"] {
            assert!(matches!(
                store.open_session(raw),
                Err(SessionError::InvalidPlate(_))
            ));
        }
        assert!(storage.get_item(DEFAULT_STORAGE_KEY).unwrap().is_none());
    }

    #[test]
    fn test_open_session_rejects_duplicates_in_any_spelling() {
        let (mut store, _) = store();
        store.open_session("abc1234").unwrap();
        for variant in ["abc1234", "ABC-1234", "abc-1234", " a b c 1 2 3 4 "] {
            assert!(matches!(
                store.open_session(variant),
                Err(SessionError::DuplicatePlate(p)) if p == "ABC-1234"
            ));
        }
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_persisted_layout() {
        let (mut store, storage) = store();
        store.open_session_at("abc1234", t0()).unwrap();
        let blob = storage.get_item(DEFAULT_STORAGE_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&blob).unwrap();
        assert_eq!(
            value,
            serde_json::json!([{ "plate": "ABC-1234", "entryTime": "2024-03-01T08:00:00Z" }])
        );
    }

    #[test]
    fn test_close_unknown_plate_is_not_found() {
        let (mut store, _) = store();
        assert!(matches!(
            store.close_session("XYZ-9999"),
            Err(SessionError::NotFound(_))
        ));
        assert!(matches!(
            store.close_session("not a plate"),
            Err(SessionError::NotFound(_))
        ));
    }

    #[test]
    fn test_open_then_close_immediately() {
        let (mut store, _) = store();
        store.open_session("abc1234").unwrap();
        let receipt = store.close_session("ABC-1234").unwrap();
        assert_eq!(receipt.session.plate.as_str(), "ABC-1234");
        assert_eq!(receipt.duration.hours, 0);
        assert_eq!(receipt.duration.minutes, 0);
        assert!(receipt.amount >= 0.0);
        assert!(matches!(
            store.find_by_plate("ABC-1234"),
            Err(SessionError::NotFound(_))
        ));
    }

    #[test]
    fn test_close_bills_elapsed_time() {
        let (mut store, _) = store();
        store.open_session_at("abc1234", t0()).unwrap();
        let exit = t0() + Duration::minutes(90);
        let receipt = store.close_session_at("abc-1234", exit).unwrap();
        assert_eq!(receipt.exit_time, exit);
        assert_eq!(
            receipt.duration,
            StayDuration { hours: 1, minutes: 30, seconds: 0 }
        );
        assert!((receipt.amount - 15.0).abs() < 1e-9);
        assert_eq!(receipt.amount_label(), "15.00");
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_preview_does_not_mutate() {
        let (mut store, storage) = store();
        store.open_session_at("abc1234", t0()).unwrap();
        let before = storage.get_item(DEFAULT_STORAGE_KEY).unwrap();

        let receipt = store
            .preview_close_at("ABC1234", t0() + Duration::hours(2))
            .unwrap();
        assert!((receipt.amount - 20.0).abs() < 1e-9);
        assert_eq!(storage.get_item(DEFAULT_STORAGE_KEY).unwrap(), before);

        store.commit_close("ABC1234").unwrap();
        assert_eq!(store.count().unwrap(), 0);
        assert!(matches!(
            store.commit_close("ABC1234"),
            Err(SessionError::NotFound(_))
        ));
    }

    #[test]
    fn test_close_keeps_other_sessions_in_order() {
        let (mut store, _) = store();
        for p in ["aaa1111", "bbb2222", "ccc3333"] {
            store.open_session_at(p, t0()).unwrap();
        }
        store.close_session_at("BBB-2222", t0()).unwrap();
        assert_eq!(
            plates(&store.list_all().unwrap()),
            vec!["AAA-1111", "CCC-3333"]
        );
    }

    #[test]
    fn test_rename_plate() {
        let (mut store, _) = store();
        store.open_session_at("aaa1111", t0()).unwrap();
        store.open_session_at("bbb2222", t0() + Duration::minutes(5)).unwrap();

        let renamed = store.rename_plate("AAA-1111", "zzz9999").unwrap();
        assert_eq!(renamed.plate.as_str(), "ZZZ-9999");
        assert_eq!(renamed.entry_time(), t0());
        assert_eq!(
            plates(&store.list_all().unwrap()),
            vec!["ZZZ-9999", "BBB-2222"]
        );
        assert!(matches!(
            store.find_by_plate("AAA-1111"),
            Err(SessionError::NotFound(_))
        ));
    }

    #[test]
    fn test_rename_to_taken_plate_is_duplicate() {
        let (mut store, _) = store();
        store.open_session_at("aaa1111", t0()).unwrap();
        store.open_session_at("bbb2222", t0()).unwrap();
        assert!(matches!(
            store.rename_plate("aaa1111", "BBB-2222"),
            Err(SessionError::DuplicatePlate(_))
        ));
        assert_eq!(
            plates(&store.list_all().unwrap()),
            vec!["AAA-1111", "BBB-2222"]
        );
    }

    #[test]
    fn test_rename_to_itself_is_noop() {
        let (mut store, storage) = store();
        store.open_session_at("aaa1111", t0()).unwrap();
        let before = storage.get_item(DEFAULT_STORAGE_KEY).unwrap();
        let same = store.rename_plate("AAA-1111", "aaa1111").unwrap();
        assert_eq!(same.plate.as_str(), "AAA-1111");
        assert_eq!(storage.get_item(DEFAULT_STORAGE_KEY).unwrap(), before);
    }

    #[test]
    fn test_rename_errors() {
        let (mut store, _) = store();
        store.open_session_at("aaa1111", t0()).unwrap();
        assert!(matches!(
            store.rename_plate("ccc3333", "ddd4444"),
            Err(SessionError::NotFound(_))
        ));
        assert!(matches!(
            store.rename_plate("aaa1111", "bad"),
            Err(SessionError::InvalidPlate(_))
        ));
    }

    #[test]
    fn test_list_all_is_a_snapshot() {
        let (mut store, _) = store();
        store.open_session_at("aaa1111", t0()).unwrap();
        let mut snapshot = store.list_all().unwrap();
        snapshot.clear();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_search() {
        let (mut store, _) = store();
        for p in ["abc1234", "abd5678", "xyz1299"] {
            store.open_session_at(p, t0()).unwrap();
        }
        assert_eq!(plates(&store.search("ab").unwrap()), vec!["ABC-1234", "ABD-5678"]);
        assert_eq!(plates(&store.search("12").unwrap()), vec!["ABC-1234", "XYZ-1299"]);
        assert_eq!(plates(&store.search("c-12").unwrap()), vec!["ABC-1234"]);
        assert_eq!(plates(&store.search("c12").unwrap()), vec!["ABC-1234"]);
        assert_eq!(plates(&store.search("abc1234").unwrap()), vec!["ABC-1234"]);
        assert_eq!(plates(&store.search("ABC-1234").unwrap()), vec!["ABC-1234"]);
        assert_eq!(plates(&store.search(" Xyz 1299 ").unwrap()), vec!["XYZ-1299"]);
        assert_eq!(store.search("").unwrap().len(), 3);
        assert_eq!(store.search("  ").unwrap().len(), 3);
        assert!(store.search("qqq").unwrap().is_empty());
    }

    #[test]
    fn test_live_view() {
        let (mut store, _) = store();
        store.open_session_at("aaa1111", t0()).unwrap();
        store.open_session_at("bbb2222", t0() + Duration::hours(1)).unwrap();

        let now = t0() + Duration::hours(3);
        let view = store.live_view_at(now).unwrap();
        assert_eq!(view.len(), 2);
        assert_eq!(view[0].duration.hours, 3);
        assert!((view[0].amount - 30.0).abs() < 1e-9);
        assert_eq!(view[1].duration.hours, 2);

        let filtered = store.live_search_at("bbb", now).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].session.plate.as_str(), "BBB-2222");

        let single = store.live_entry_at("bbb2222", now).unwrap();
        assert_eq!(single, filtered[0]);
        assert!(matches!(
            store.live_entry_at("ccc3333", now),
            Err(SessionError::NotFound(_))
        ));
    }

    #[test]
    fn test_reads_legacy_blob() {
        let (store, storage) = store();
        storage
            .set_item(
                DEFAULT_STORAGE_KEY,
                r#"[{"placa":"RUU3G45","entrada":"2024-03-01T12:00:00.000Z"}]"#,
            )
            .unwrap();
        let session = store.find_by_plate("ruu-3g45").unwrap();
        assert_eq!(session.plate.as_str(), "RUU-3G45");
    }

    #[test]
    fn test_unreadable_legacy_entry_is_kept() {
        let (mut store, storage) = store();
        storage
            .set_item(
                DEFAULT_STORAGE_KEY,
                r#"[{"placa":"ABC1234","entrada":"2024-03-01T08:00:00.000Z"},{"placa":"X1","entrada":"2024-03-01T09:00:00.000Z"}]"#,
            )
            .unwrap();
        assert_eq!(plates(&store.list_all().unwrap()), vec!["ABC-1234"]);
        assert_eq!(store.count().unwrap(), 1);

        store.open_session_at("zzz9999", t0()).unwrap();
        store.rename_plate("abc1234", "abd1234").unwrap();
        assert_eq!(plates(&store.list_all().unwrap()), vec!["ABD-1234", "ZZZ-9999"]);

        let stored: serde_json::Value =
            serde_json::from_str(&storage.get_item(DEFAULT_STORAGE_KEY).unwrap().unwrap()).unwrap();
        let stored = stored.as_array().unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[0]["plate"], "ABD-1234");
        assert_eq!(stored[1]["placa"], "X1");
        assert_eq!(stored[1]["entrada"], "2024-03-01T09:00:00.000Z");
        assert_eq!(stored[2]["plate"], "ZZZ-9999");

        store.close_session_at("ABD-1234", t0()).unwrap();
        assert!(matches!(store.find_by_plate("X1"), Err(SessionError::NotFound(_))));
        let stored = storage.get_item(DEFAULT_STORAGE_KEY).unwrap().unwrap();
        assert!(stored.contains(r#""placa":"X1""#));
    }

    #[test]
    fn test_corrupted_blob_is_reported() {
        let (mut store, storage) = store();
        storage.set_item(DEFAULT_STORAGE_KEY, "{not json").unwrap();
        assert!(matches!(
            store.list_all(),
            Err(SessionError::StorageError(StorageError::Corrupted(_)))
        ));
        assert!(matches!(
            store.open_session("abc1234"),
            Err(SessionError::StorageError(StorageError::Corrupted(_)))
        ));
        // The unreadable blob is left untouched.
        assert_eq!(
            storage.get_item(DEFAULT_STORAGE_KEY).unwrap().as_deref(),
            Some("{not json")
        );
    }

    #[test]
    fn test_custom_key_and_rate() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store =
            SessionStore::with_options(storage.clone(), "garage", BillingCalculator::new(4.0));
        store.open_session_at("abc1234", t0()).unwrap();
        assert!(storage.get_item(DEFAULT_STORAGE_KEY).unwrap().is_none());
        assert!(storage.get_item("garage").unwrap().is_some());

        let receipt = store.close_session_at("abc1234", t0() + Duration::minutes(30)).unwrap();
        assert!((receipt.amount - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_file_backed_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let storage = Arc::new(FileStorage::new(dir.path()).unwrap());
            let mut store = SessionStore::new(storage);
            store.open_session_at("abc1234", t0()).unwrap();
        }
        let storage = Arc::new(FileStorage::new(dir.path()).unwrap());
        let store = SessionStore::new(storage);
        let session = store.find_by_plate("ABC-1234").unwrap();
        assert_eq!(session.entry_time(), t0());
    }
}
