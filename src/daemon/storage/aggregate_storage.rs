use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::NaiveDate;
use fs4::tokio::AsyncFileExt;
use futures::{stream, StreamExt};
use tokio::fs::{self, File};
use tracing::{debug, warn};

use crate::{
    fs::operations::{remove_if_exists, replace_file_atomically},
    utils::time::{date_to_record_name, record_name_to_date},
};

use super::{
    entities::DailyAggregate,
    error::{StoreError, StoreResult},
};

const RECORD_EXTENSION: &str = "json";
const LOCK_FILE: &str = ".lock";

/// Interface for abstracting storage of daily aggregates. Records are keyed by their day, there is
/// never more than one record per day.
#[async_trait]
pub trait AggregateStore: Send + Sync {
    /// Inserts the aggregate or fully replaces the record already stored for its day.
    async fn upsert(&self, aggregate: &DailyAggregate) -> StoreResult<()>;

    async fn fetch_by_day(&self, day: NaiveDate) -> StoreResult<Option<DailyAggregate>>;

    /// Returns records between `from` and `to` (both inclusive), newest first.
    async fn fetch_range(&self, from: NaiveDate, to: NaiveDate)
        -> StoreResult<Vec<DailyAggregate>>;

    async fn delete_all(&self) -> StoreResult<()>;
}

/// The main realization of [AggregateStore]. Every day is a separate json document in
/// `record_dir`, named after the day. Writers replace documents atomically and every operation
/// goes through an advisory lock so that the cli and the daemon don't step on each other.
pub struct FileAggregateStore {
    record_dir: PathBuf,
}

enum LockKind {
    Shared,
    Exclusive,
}

impl FileAggregateStore {
    pub fn new(record_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&record_dir)?;

        Ok(Self { record_dir })
    }

    fn path_for(&self, day: NaiveDate) -> PathBuf {
        self.record_dir
            .join(format!("{}.{RECORD_EXTENSION}", date_to_record_name(day)))
    }

    async fn lock(&self, kind: LockKind) -> StoreResult<File> {
        let file = File::options()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.record_dir.join(LOCK_FILE))
            .await
            .map_err(StoreError::Unavailable)?;
        match kind {
            LockKind::Shared => file.lock_shared(),
            LockKind::Exclusive => file.lock_exclusive(),
        }
        .map_err(StoreError::Unavailable)?;
        Ok(file)
    }

    async fn release(lock: File) {
        if let Err(e) = lock.unlock_async().await {
            warn!("Failed to release record lock {e}");
        }
    }

    async fn read_record(path: &Path, day: NaiveDate) -> StoreResult<Option<DailyAggregate>> {
        debug!("Reading {path:?}");
        let content = match fs::read(path).await {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::ReadFailed(e)),
        };
        let mut aggregate = serde_json::from_slice::<DailyAggregate>(&content)
            .map_err(|source| StoreError::Corrupted { day, source })?;
        if aggregate.day != day {
            warn!(
                "Record {path:?} claims to be for {}, using {day} from its name",
                aggregate.day
            );
            aggregate.day = day;
        }
        Ok(Some(aggregate))
    }

    /// Days that have a record file, in no particular order.
    async fn stored_days(&self) -> StoreResult<Vec<NaiveDate>> {
        let mut entries = fs::read_dir(&self.record_dir)
            .await
            .map_err(StoreError::ReadFailed)?;
        let mut days = vec![];
        while let Some(entry) = entries.next_entry().await.map_err(StoreError::ReadFailed)? {
            let path = entry.path();
            if path.extension().and_then(|v| v.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            if let Some(day) = path
                .file_stem()
                .and_then(|v| v.to_str())
                .and_then(record_name_to_date)
            {
                days.push(day);
            }
        }
        Ok(days)
    }
}

#[async_trait]
impl AggregateStore for FileAggregateStore {
    async fn upsert(&self, aggregate: &DailyAggregate) -> StoreResult<()> {
        let day = aggregate.day;
        let content = serde_json::to_vec_pretty(aggregate)
            .map_err(|source| StoreError::Encoding { day, source })?;

        let lock = self.lock(LockKind::Exclusive).await?;
        let result = replace_file_atomically(&self.path_for(day), &content)
            .await
            .map_err(|source| StoreError::WriteFailed { day, source });
        Self::release(lock).await;
        result
    }

    async fn fetch_by_day(&self, day: NaiveDate) -> StoreResult<Option<DailyAggregate>> {
        let lock = self.lock(LockKind::Shared).await?;
        let result = Self::read_record(&self.path_for(day), day).await;
        Self::release(lock).await;
        result
    }

    async fn fetch_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<DailyAggregate>> {
        let lock = self.lock(LockKind::Shared).await?;
        let result = async {
            let mut days = self
                .stored_days()
                .await?
                .into_iter()
                .filter(|day| (from..=to).contains(day))
                .collect::<Vec<_>>();
            days.sort_unstable_by(|a, b| b.cmp(a));

            let records = stream::iter(days)
                .map(|day| async move { (day, Self::read_record(&self.path_for(day), day).await) })
                .buffered(4)
                .collect::<Vec<_>>()
                .await;

            let mut aggregates = Vec::with_capacity(records.len());
            for (day, record) in records {
                match record {
                    Ok(Some(v)) => aggregates.push(v),
                    Ok(None) => {}
                    // A single broken day shouldn't hide the rest of the history.
                    Err(e @ StoreError::Corrupted { .. }) => {
                        warn!("Skipping record for {day}: {e}")
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(aggregates)
        }
        .await;
        Self::release(lock).await;
        result
    }

    async fn delete_all(&self) -> StoreResult<()> {
        let lock = self.lock(LockKind::Exclusive).await?;
        let result = async {
            for day in self.stored_days().await? {
                remove_if_exists(&self.path_for(day))
                    .await
                    .map_err(|source| StoreError::WriteFailed { day, source })?;
            }
            Ok(())
        }
        .await;
        Self::release(lock).await;
        result
    }
}

#[cfg(test)]
pub mod testing {
    use std::{
        collections::BTreeMap,
        io,
        sync::{
            atomic::{AtomicBool, AtomicUsize, Ordering},
            Mutex,
        },
    };

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use crate::daemon::storage::{
        entities::DailyAggregate,
        error::{StoreError, StoreResult},
    };

    use super::AggregateStore;

    /// Store kept in memory that counts writes and can be told to fail.
    #[derive(Default)]
    pub struct MemoryAggregateStore {
        records: Mutex<BTreeMap<NaiveDate, DailyAggregate>>,
        upserts: AtomicUsize,
        fail_writes: AtomicBool,
        fail_reads: AtomicBool,
    }

    impl MemoryAggregateStore {
        pub fn upsert_count(&self) -> usize {
            self.upserts.load(Ordering::SeqCst)
        }

        pub fn set_fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        pub fn set_fail_reads(&self, fail: bool) {
            self.fail_reads.store(fail, Ordering::SeqCst);
        }

        pub fn record(&self, day: NaiveDate) -> Option<DailyAggregate> {
            self.records.lock().unwrap().get(&day).cloned()
        }

        pub fn insert(&self, aggregate: DailyAggregate) {
            self.records.lock().unwrap().insert(aggregate.day, aggregate);
        }

        pub fn len(&self) -> usize {
            self.records.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl AggregateStore for MemoryAggregateStore {
        async fn upsert(&self, aggregate: &DailyAggregate) -> StoreResult<()> {
            self.upserts.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StoreError::WriteFailed {
                    day: aggregate.day,
                    source: io::Error::other("disk is gone"),
                });
            }
            self.insert(aggregate.clone());
            Ok(())
        }

        async fn fetch_by_day(&self, day: NaiveDate) -> StoreResult<Option<DailyAggregate>> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(StoreError::ReadFailed(io::Error::other("disk is gone")));
            }
            Ok(self.record(day))
        }

        async fn fetch_range(
            &self,
            from: NaiveDate,
            to: NaiveDate,
        ) -> StoreResult<Vec<DailyAggregate>> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(StoreError::ReadFailed(io::Error::other("disk is gone")));
            }
            if from > to {
                return Ok(vec![]);
            }
            Ok(self
                .records
                .lock()
                .unwrap()
                .range(from..=to)
                .rev()
                .map(|(_, v)| v.clone())
                .collect())
        }

        async fn delete_all(&self) -> StoreResult<()> {
            self.records.lock().unwrap().clear();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    use crate::daemon::storage::{
        aggregate_storage::{AggregateStore, FileAggregateStore},
        entities::DailyAggregate,
        error::StoreError,
    };

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    fn aggregate_with(day: NaiveDate, seconds: u64) -> DailyAggregate {
        let mut aggregate = DailyAggregate::new(day);
        aggregate.add_total_time(seconds, 10);
        aggregate.add_app_time("Cursor", seconds);
        aggregate
    }

    #[tokio::test]
    async fn test_upsert_and_fetch() -> Result<()> {
        let dir = tempdir()?;
        let storage = FileAggregateStore::new(dir.path().to_owned())?;
        let aggregate = aggregate_with(day(3), 3600);

        storage.upsert(&aggregate).await?;

        assert_eq!(storage.fetch_by_day(day(3)).await?, Some(aggregate));
        assert_eq!(storage.fetch_by_day(day(4)).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_upsert_replaces_whole_record() -> Result<()> {
        let dir = tempdir()?;
        let storage = FileAggregateStore::new(dir.path().to_owned())?;
        let mut aggregate = aggregate_with(day(3), 600);
        storage.upsert(&aggregate).await?;

        aggregate.add_total_time(300, 11);
        aggregate.add_app_time("Terminal", 300);
        storage.upsert(&aggregate).await?;
        // Repeating the same write must not change anything.
        storage.upsert(&aggregate).await?;

        let stored = storage.fetch_by_day(day(3)).await?.unwrap();
        assert_eq!(stored.total_seconds, 900);
        assert_eq!(stored.app_seconds("Cursor"), 600);
        assert_eq!(stored.app_seconds("Terminal"), 300);
        assert_eq!(storage.fetch_range(day(1), day(31)).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_range_newest_first() -> Result<()> {
        let dir = tempdir()?;
        let storage = FileAggregateStore::new(dir.path().to_owned())?;
        for d in [1, 5, 3, 9] {
            storage.upsert(&aggregate_with(day(d), u64::from(d) * 60)).await?;
        }

        let days = storage
            .fetch_range(day(2), day(5))
            .await?
            .into_iter()
            .map(|v| v.day)
            .collect::<Vec<_>>();

        assert_eq!(days, vec![day(5), day(3)]);
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_range_skips_corrupted_days() -> Result<()> {
        let dir = tempdir()?;
        let storage = FileAggregateStore::new(dir.path().to_owned())?;
        storage.upsert(&aggregate_with(day(2), 60)).await?;
        std::fs::write(dir.path().join("2026-01-03.json"), "{ not json")?;
        std::fs::write(dir.path().join("notes.txt"), "ignored")?;

        let records = storage.fetch_range(day(1), day(31)).await?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].day, day(2));

        assert!(matches!(
            storage.fetch_by_day(day(3)).await,
            Err(StoreError::Corrupted { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_all() -> Result<()> {
        let dir = tempdir()?;
        let storage = FileAggregateStore::new(dir.path().to_owned())?;
        storage.upsert(&aggregate_with(day(2), 60)).await?;
        storage.upsert(&aggregate_with(day(3), 60)).await?;

        storage.delete_all().await?;

        assert!(storage.fetch_range(NaiveDate::MIN, day(31)).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_record_day_comes_from_file_name() -> Result<()> {
        let dir = tempdir()?;
        let storage = FileAggregateStore::new(dir.path().to_owned())?;
        let misplaced = aggregate_with(day(7), 60);
        std::fs::write(
            dir.path().join("2026-01-08.json"),
            serde_json::to_vec(&misplaced)?,
        )?;

        let stored = storage.fetch_by_day(day(8)).await?.unwrap();
        assert_eq!(stored.day, day(8));
        Ok(())
    }
}
