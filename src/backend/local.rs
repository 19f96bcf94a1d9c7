//! In-process backend: collections held in memory, optionally made durable
//! in a local database directory with a WAL and periodic snapshots.

use crate::backend::{InsertResult, SearchRequest, VectorBackend};
use crate::collection::Collection;
use crate::entity::{Entity, Hit, Row};
use crate::error::{Result, VectorDbError};
use crate::filter::Filter;
use crate::persistence::serialization::CatalogSnapshot;
use crate::persistence::snapshot::SnapshotManager;
use crate::persistence::wal::{WalEntry, WriteAheadLog};
use crate::schema::{CollectionInfo, CollectionSchema};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// Configuration for a durable local database.
#[derive(Debug, Clone)]
pub struct LocalConfig {
    /// Checkpoint after this many WAL entries.
    pub checkpoint_interval: usize,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: 1000,
        }
    }
}

struct Durability {
    wal: WriteAheadLog,
    snapshot_mgr: SnapshotManager,
    wal_count: usize,
    checkpoint_interval: usize,
}

#[derive(Default)]
struct State {
    collections: BTreeMap<String, Collection>,
    durability: Option<Durability>,
}

impl State {
    /// Write an entry to the WAL before it is applied.
    fn log(&mut self, entry: &WalEntry) -> Result<()> {
        if let Some(d) = self.durability.as_mut() {
            d.wal.append(entry)?;
            d.wal_count += 1;
        }
        Ok(())
    }

    fn maybe_checkpoint(&mut self) -> Result<()> {
        let due = self
            .durability
            .as_ref()
            .map(|d| d.wal_count >= d.checkpoint_interval)
            .unwrap_or(false);
        if due {
            self.checkpoint()?;
        }
        Ok(())
    }

    /// Snapshot every collection and truncate the WAL.
    fn checkpoint(&mut self) -> Result<()> {
        let Some(d) = self.durability.as_mut() else {
            return Ok(());
        };
        let snapshot = CatalogSnapshot {
            collections: self.collections.values().cloned().collect(),
        };
        d.snapshot_mgr.save(&snapshot)?;
        d.wal.truncate()?;
        d.wal_count = 0;
        debug!(collections = snapshot.collections.len(), "checkpoint written");
        Ok(())
    }

    fn collection(&self, name: &str) -> Result<&Collection> {
        self.collections
            .get(name)
            .ok_or_else(|| VectorDbError::collection_not_found(name))
    }
}

/// Apply a logged mutation. Used both for live writes (after logging) and
/// for replay on open.
fn apply_entry(collections: &mut BTreeMap<String, Collection>, entry: WalEntry) -> Result<()> {
    match entry {
        WalEntry::CreateCollection { name, schema } => {
            let collection = Collection::new(&name, schema)?;
            collections.insert(name, collection);
        }
        WalEntry::DropCollection { name } => {
            collections.remove(&name);
        }
        WalEntry::Insert { collection, rows } => match collections.get_mut(&collection) {
            Some(c) => c.apply_insert(rows),
            None => warn!(collection = %collection, "insert for unknown collection ignored"),
        },
        WalEntry::Delete { collection, ids } => match collections.get_mut(&collection) {
            Some(c) => {
                c.delete_ids(&ids);
            }
            None => warn!(collection = %collection, "delete for unknown collection ignored"),
        },
    }
    Ok(())
}

/// The in-process vector database service.
pub struct LocalBackend {
    state: RwLock<State>,
    data_dir: Option<PathBuf>,
}

impl LocalBackend {
    /// A non-durable backend whose data lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(State::default()),
            data_dir: None,
        }
    }

    /// Open or create a durable database at the given directory.
    pub fn open(data_dir: impl AsRef<Path>, config: LocalConfig) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;

        let snapshot_mgr = SnapshotManager::new(&data_dir)?;
        let wal = WriteAheadLog::open(data_dir.join("wal.log"))?;
        let mut collections = BTreeMap::new();

        if let Some(snapshot) = snapshot_mgr.load()? {
            for c in snapshot.collections {
                collections.insert(c.name().to_string(), c);
            }
        }

        let entries = wal.replay()?;
        let wal_count = entries.len();
        for entry in entries {
            apply_entry(&mut collections, entry)?;
        }

        info!(
            path = %data_dir.display(),
            collections = collections.len(),
            replayed = wal_count,
            "opened local database"
        );

        Ok(Self {
            state: RwLock::new(State {
                collections,
                durability: Some(Durability {
                    wal,
                    snapshot_mgr,
                    wal_count,
                    checkpoint_interval: config.checkpoint_interval.max(1),
                }),
            }),
            data_dir: Some(data_dir),
        })
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Force a checkpoint: snapshot + truncate WAL.
    pub fn checkpoint(&self) -> Result<()> {
        self.write()?.checkpoint()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| VectorDbError::backend("Lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| VectorDbError::backend("Lock poisoned"))
    }

    /// Log, then apply. Once logged the mutation is acknowledged: a failed
    /// checkpoint only leaves the WAL longer, and is retried on the next write.
    fn commit(state: &mut State, entry: WalEntry) -> Result<()> {
        state.log(&entry)?;
        apply_entry(&mut state.collections, entry)?;
        if let Err(e) = state.maybe_checkpoint() {
            warn!(error = %e, "checkpoint failed, keeping write-ahead log");
        }
        Ok(())
    }

    fn delete_existing(state: &mut State, collection: &str, ids: Vec<i64>) -> Result<usize> {
        let count = ids.len();
        if count > 0 {
            Self::commit(
                state,
                WalEntry::Delete {
                    collection: collection.to_string(),
                    ids,
                },
            )?;
        }
        Ok(count)
    }
}

impl VectorBackend for LocalBackend {
    fn create_collection(&self, name: &str, schema: &CollectionSchema) -> Result<CollectionInfo> {
        let mut state = self.write()?;
        if let Some(existing) = state.collections.get(name) {
            if existing.schema() == schema {
                debug!(collection = name, "collection already exists with the same schema");
                return Ok(existing.info());
            }
            return Err(VectorDbError::schema(format!(
                "collection {} already exists with a different schema",
                name
            )));
        }

        // Validate before anything reaches the log
        let info = Collection::new(name, schema.clone())?.info();
        Self::commit(
            &mut state,
            WalEntry::CreateCollection {
                name: name.to_string(),
                schema: schema.clone(),
            },
        )?;
        info!(collection = name, dim = ?schema.dimension(), "created collection");
        Ok(info)
    }

    fn drop_collection(&self, name: &str) -> Result<bool> {
        let mut state = self.write()?;
        if !state.collections.contains_key(name) {
            return Ok(false);
        }
        Self::commit(
            &mut state,
            WalEntry::DropCollection {
                name: name.to_string(),
            },
        )?;
        info!(collection = name, "dropped collection");
        Ok(true)
    }

    fn has_collection(&self, name: &str) -> Result<bool> {
        Ok(self.read()?.collections.contains_key(name))
    }

    fn list_collections(&self) -> Result<Vec<String>> {
        Ok(self.read()?.collections.keys().cloned().collect())
    }

    fn describe_collection(&self, name: &str) -> Result<CollectionInfo> {
        Ok(self.read()?.collection(name)?.info())
    }

    fn insert(&self, collection: &str, entities: Vec<Entity>) -> Result<InsertResult> {
        let mut state = self.write()?;
        let rows = state.collection(collection)?.prepare_insert(entities)?;
        let insert_ids: Vec<i64> = rows.iter().map(|(id, _)| *id).collect();
        if !rows.is_empty() {
            Self::commit(
                &mut state,
                WalEntry::Insert {
                    collection: collection.to_string(),
                    rows,
                },
            )?;
        }
        debug!(collection, count = insert_ids.len(), "inserted entities");
        Ok(InsertResult {
            insert_count: insert_ids.len(),
            insert_ids,
        })
    }

    fn delete_by_ids(&self, collection: &str, ids: &[i64]) -> Result<usize> {
        let mut state = self.write()?;
        let existing = {
            let c = state.collection(collection)?;
            let present: HashSet<i64> = c.get(ids, &[]).into_iter().map(|row| row.id).collect();
            let mut ids: Vec<i64> = present.into_iter().collect();
            ids.sort_unstable();
            ids
        };
        let count = Self::delete_existing(&mut state, collection, existing)?;
        debug!(collection, requested = ids.len(), deleted = count, "deleted by id");
        Ok(count)
    }

    fn delete_by_filter(&self, collection: &str, filter: &str) -> Result<usize> {
        let parsed = Filter::parse(filter)?;
        let mut state = self.write()?;
        let ids = state.collection(collection)?.matching_ids(&parsed);
        let count = Self::delete_existing(&mut state, collection, ids)?;
        debug!(collection, filter, deleted = count, "deleted by filter");
        Ok(count)
    }

    fn search(&self, collection: &str, request: &SearchRequest) -> Result<Vec<Vec<Hit>>> {
        let filter = match request.filter.as_deref() {
            Some(expr) => Filter::parse(expr)?,
            None => Filter::All,
        };
        let state = self.read()?;
        let results = state.collection(collection)?.search(
            &request.data,
            request.limit,
            &request.output_fields,
            &filter,
        )?;
        debug!(
            collection,
            queries = request.data.len(),
            limit = request.limit,
            filtered = request.filter.is_some(),
            "search"
        );
        Ok(results)
    }

    fn query_by_filter(
        &self,
        collection: &str,
        filter: &str,
        output_fields: &[String],
    ) -> Result<Vec<Row>> {
        let parsed = Filter::parse(filter)?;
        let state = self.read()?;
        Ok(state.collection(collection)?.query(&parsed, output_fields))
    }

    fn query_by_ids(
        &self,
        collection: &str,
        ids: &[i64],
        output_fields: &[String],
    ) -> Result<Vec<Row>> {
        let state = self.read()?;
        Ok(state.collection(collection)?.get(ids, output_fields))
    }

    fn flush(&self) -> Result<()> {
        self.checkpoint()
    }
}
