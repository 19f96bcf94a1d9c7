//! Write-ahead log for the local backend.
//!
//! Frame layout: `[len: u32 LE][crc32: u32 LE][bincode(LogRecord)]`. Every
//! record carries a log sequence number. Opening a log scans it, cuts off a
//! torn or corrupt tail, and continues numbering after the last good record,
//! so appends made after a crash are never hidden behind garbage.

use crate::collection::Record;
use crate::error::{Result, VectorDbError};
use crate::persistence::serialization;
use crate::schema::CollectionSchema;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const FRAME_HEADER: usize = 8;

/// A logged mutation. Inserts carry resolved primary keys and deletes carry
/// the ids actually removed, so replay never re-evaluates ids or filters.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum WalEntry {
    CreateCollection {
        name: String,
        schema: CollectionSchema,
    },
    DropCollection {
        name: String,
    },
    Insert {
        collection: String,
        rows: Vec<(i64, Record)>,
    },
    Delete {
        collection: String,
        ids: Vec<i64>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct LogRecord {
    lsn: u64,
    entry: WalEntry,
}

/// Result of reading one frame.
enum Frame {
    /// A decoded record and its size on disk, header included.
    Record(LogRecord, u64),
    End,
    Torn(&'static str),
}

fn read_frame<R: Read>(reader: &mut R) -> Result<Frame> {
    let mut header = [0u8; FRAME_HEADER];
    let mut filled = 0;
    while filled < FRAME_HEADER {
        match reader.read(&mut header[filled..]) {
            Ok(0) if filled == 0 => return Ok(Frame::End),
            Ok(0) => return Ok(Frame::Torn("truncated header")),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(VectorDbError::IoError(e)),
        }
    }

    let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

    let mut payload = Vec::new();
    let read = (&mut *reader).take(len as u64).read_to_end(&mut payload)?;
    if read < len {
        return Ok(Frame::Torn("truncated payload"));
    }
    if crc32fast::hash(&payload) != crc {
        return Ok(Frame::Torn("checksum mismatch"));
    }
    match serialization::from_bincode::<LogRecord>(&payload) {
        Ok(record) => Ok(Frame::Record(record, (FRAME_HEADER + len) as u64)),
        Err(_) => Ok(Frame::Torn("undecodable payload")),
    }
}

/// Scan a log file: the valid records, the byte length they occupy, and
/// why the scan stopped early, if it did.
fn scan(path: &Path) -> Result<(Vec<LogRecord>, u64, Option<&'static str>)> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok((Vec::new(), 0, None)),
        Err(e) => return Err(e.into()),
    };
    let mut reader = BufReader::new(file);
    let mut records = Vec::new();
    let mut valid_len = 0u64;

    loop {
        match read_frame(&mut reader)? {
            Frame::Record(record, size) => {
                valid_len += size;
                records.push(record);
            }
            Frame::End => return Ok((records, valid_len, None)),
            Frame::Torn(reason) => return Ok((records, valid_len, Some(reason))),
        }
    }
}

/// Append-only log file, fsynced after each record.
pub struct WriteAheadLog {
    path: PathBuf,
    file: File,
    next_lsn: u64,
}

impl WriteAheadLog {
    /// Open (or create) the log at `path`, discarding any torn tail.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (records, valid_len, torn) = scan(&path)?;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        if let Some(reason) = torn {
            warn!(
                path = %path.display(),
                kept = records.len(),
                reason,
                "discarding damaged tail of write-ahead log"
            );
            file.set_len(valid_len)?;
            file.sync_all()?;
        }

        let next_lsn = records.last().map(|r| r.lsn + 1).unwrap_or(0);
        debug!(path = %path.display(), records = records.len(), next_lsn, "opened write-ahead log");
        Ok(Self {
            path,
            file,
            next_lsn,
        })
    }

    /// Append an entry and fsync. Returns its sequence number.
    pub fn append(&mut self, entry: &WalEntry) -> Result<u64> {
        let lsn = self.next_lsn;
        let payload = serialization::to_bincode(&LogRecordRef { lsn, entry })?;
        let len = u32::try_from(payload.len())
            .map_err(|_| VectorDbError::SerializationError("log record exceeds 4 GiB".into()))?;

        let mut frame = Vec::with_capacity(FRAME_HEADER + payload.len());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        frame.extend_from_slice(&payload);
        self.file.write_all(&frame)?;
        self.file.sync_all()?;

        self.next_lsn += 1;
        Ok(lsn)
    }

    /// Entries in log order, up to the first damaged record.
    pub fn replay(&self) -> Result<Vec<WalEntry>> {
        let (records, _, torn) = scan(&self.path)?;
        if let Some(reason) = torn {
            warn!(path = %self.path.display(), reason, "write-ahead log replay stopped early");
        }
        Ok(records.into_iter().map(|r| r.entry).collect())
    }

    /// Sequence number the next append will receive.
    pub fn next_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// Empty the log after a checkpoint. Numbering continues for this handle.
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.sync_all()?;
        Ok(())
    }
}

/// Borrowed twin of `LogRecord`, encodes identically.
#[derive(Serialize)]
struct LogRecordRef<'a> {
    lsn: u64,
    entry: &'a WalEntry,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSchema;
    use crate::vector::Vector;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn record(v: Vec<f32>) -> Record {
        Record {
            vector: Vector::new(v),
            fields: BTreeMap::new(),
        }
    }

    fn drop_entry(name: &str) -> WalEntry {
        WalEntry::DropCollection {
            name: name.to_string(),
        }
    }

    #[test]
    fn test_append_and_replay() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wal.log");

        {
            let mut wal = WriteAheadLog::open(&path).unwrap();
            wal.append(&WalEntry::CreateCollection {
                name: "docs".to_string(),
                schema: CollectionSchema::new(
                    vec![FieldSchema::primary("id", false), FieldSchema::vector("vector", 3)],
                    "",
                ),
            })
            .unwrap();
            wal.append(&WalEntry::Insert {
                collection: "docs".to_string(),
                rows: vec![(0, record(vec![1.0, 2.0, 3.0])), (1, record(vec![4.0, 5.0, 6.0]))],
            })
            .unwrap();
            let lsn = wal
                .append(&WalEntry::Delete {
                    collection: "docs".to_string(),
                    ids: vec![0],
                })
                .unwrap();
            assert_eq!(lsn, 2);
        }

        let wal = WriteAheadLog::open(&path).unwrap();
        assert_eq!(wal.next_lsn(), 3);
        let entries = wal.replay().unwrap();
        assert_eq!(entries.len(), 3);
        assert!(matches!(&entries[0], WalEntry::CreateCollection { name, .. } if name == "docs"));
        assert!(matches!(&entries[1], WalEntry::Insert { rows, .. } if rows.len() == 2));
        assert!(matches!(&entries[2], WalEntry::Delete { ids, .. } if ids == &vec![0]));
    }

    #[test]
    fn test_torn_tail_is_cut_and_appends_survive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wal.log");

        {
            let mut wal = WriteAheadLog::open(&path).unwrap();
            wal.append(&drop_entry("a")).unwrap();
        }
        // Crash mid-write
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(&[0xFF, 0xFF, 0xFF]).unwrap();
        }

        {
            let mut wal = WriteAheadLog::open(&path).unwrap();
            assert_eq!(wal.replay().unwrap().len(), 1);
            assert_eq!(wal.append(&drop_entry("b")).unwrap(), 1);
        }

        let entries = WriteAheadLog::open(&path).unwrap().replay().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(matches!(&entries[1], WalEntry::DropCollection { name } if name == "b"));
    }

    #[test]
    fn test_corrupted_checksum_stops_replay() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wal.log");

        {
            let mut wal = WriteAheadLog::open(&path).unwrap();
            wal.append(&drop_entry("a")).unwrap();
            wal.append(&drop_entry("a")).unwrap();
        }

        // Flip the last payload byte of the second record
        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xAA;
        std::fs::write(&path, &bytes).unwrap();

        let wal = WriteAheadLog::open(&path).unwrap();
        assert_eq!(wal.replay().unwrap().len(), 1);
        assert_eq!(wal.next_lsn(), 1);
    }

    #[test]
    fn test_truncate_keeps_numbering() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wal.log");

        let mut wal = WriteAheadLog::open(&path).unwrap();
        wal.append(&drop_entry("a")).unwrap();
        assert_eq!(wal.replay().unwrap().len(), 1);

        wal.truncate().unwrap();
        assert!(wal.replay().unwrap().is_empty());
        assert_eq!(wal.append(&drop_entry("a")).unwrap(), 1);
        assert_eq!(wal.replay().unwrap().len(), 1);
    }
}
