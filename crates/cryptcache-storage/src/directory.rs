//! Slot directory over a single cache file.
//!
//! The whole descriptor table is loaded at open and kept in memory. Every
//! mutation rewrites the touched descriptor immediately, so the on-disk table
//! never lags behind the in-memory copy between calls.
//!
//! `put` picks a slot in a fixed order:
//!
//! 1. The live slot with the same name, if the new payload fits its capacity.
//!    If it does not fit, that slot is invalidated and step 2 is skipped.
//! 2. A reserved (invalidated) slot whose capacity fits the payload.
//! 3. An empty slot, with `max(2 * len, 1024)` bytes reserved at the end of
//!    the payload region.
//! 4. Otherwise the table is full.

use crate::config::CacheConfig;
use crate::descriptor::{DESCRIPTOR_SIZE, SlotDescriptor, SlotState};
use crate::file::CacheFile;
use crate::name::SlotName;
use crate::{CacheError, MAX_PAYLOAD_LEN, MIN_SLOT_CAPACITY, Result, SLOT_COUNT, TABLE_SIZE};
use cryptcache_codec::{KEY_TABLE, crc32, xor_in_place, xor_to_vec};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Snapshot of one non-empty slot, for tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotInfo {
    /// Slot index in the descriptor table.
    pub index: usize,
    /// Allocation state.
    pub state: SlotState,
    /// Stored name (may be stale for reserved slots).
    pub name: String,
    /// Payload offset relative to the end of the descriptor table.
    pub offset: u32,
    /// Current payload length.
    pub len: u32,
    /// Reserved capacity.
    pub capacity: u32,
    /// CRC-32 recorded when the payload was written.
    pub crc: u32,
    /// Slot key.
    pub key: [u8; 20],
}

/// Aggregate slot usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DirectoryStats {
    /// Slots holding live entries.
    pub live_slots: usize,
    /// Slots with an allocated region but no live entry.
    pub reserved_slots: usize,
    /// Unused slots.
    pub empty_slots: usize,
    /// Sum of live payload lengths.
    pub live_bytes: u64,
    /// Sum of capacities over live and reserved slots.
    pub reserved_bytes: u64,
    /// Size of the cache file.
    pub file_size: u64,
}

/// Named-blob directory stored in one file.
///
/// The directory owns its file handle; dropping it closes the file. It is not
/// meant to be shared between threads without external locking, see
/// [`SharedCache`](crate::SharedCache).
pub struct CacheDirectory<F: CacheFile = File> {
    file: F,
    slots: Vec<SlotDescriptor>,
    path: Option<PathBuf>,
}

impl CacheDirectory<File> {
    /// Open the cache file at `path`, creating or rebuilding it as needed.
    ///
    /// Missing parent directories are created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_at(path.as_ref(), true)
    }

    /// Open the cache file named by `config`.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        config.validate()?;
        Self::open_at(&config.path, config.create_dirs)
    }

    /// Open an existing cache file without creating or rebuilding it.
    ///
    /// Fails with [`CacheError::NotCacheTable`] when the file is missing,
    /// too short, or carries a foreign descriptor stamp. The file is left
    /// untouched in that case.
    pub fn open_existing<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let not_cache = |reason: &'static str| CacheError::NotCacheTable {
            path: path.to_path_buf(),
            reason,
        };

        if !path.is_file() {
            return Err(not_cache("no such file"));
        }
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let Some(slots) = Self::load(&mut file)? else {
            return Err(not_cache("not a cache table"));
        };

        debug!(path = %path.display(), "existing cache table opened");
        Ok(Self {
            file,
            slots,
            path: Some(path.to_path_buf()),
        })
    }

    /// Whether `path` holds a valid cache table. Never modifies the file.
    pub fn is_cache_table<P: AsRef<Path>>(path: P) -> Result<bool> {
        let path = path.as_ref();
        if !path.is_file() {
            return Ok(false);
        }
        let mut file = File::open(path)?;
        Ok(Self::load(&mut file)?.is_some())
    }

    fn open_at(path: &Path, create_dirs: bool) -> Result<Self> {
        if create_dirs
            && let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let mut directory = Self::open_with(file)?;
        directory.path = Some(path.to_path_buf());
        info!(path = %path.display(), "cache table opened");
        Ok(directory)
    }
}

impl<F: CacheFile> CacheDirectory<F> {
    /// Load the directory from an already opened file.
    ///
    /// A file shorter than the descriptor table, or one with any descriptor
    /// carrying a foreign validity stamp, is wiped and formatted from scratch.
    pub fn open_with(mut file: F) -> Result<Self> {
        match Self::load(&mut file)? {
            Some(slots) => Ok(Self {
                file,
                slots,
                path: None,
            }),
            None => Self::create(file),
        }
    }

    /// Read and decode the descriptor table.
    ///
    /// Returns `None` if the file is too short or any stamp is foreign.
    fn load<R: CacheFile>(file: &mut R) -> Result<Option<Vec<SlotDescriptor>>> {
        let size = file.size()?;
        if size < TABLE_SIZE {
            if size > 0 {
                warn!(size, expected = TABLE_SIZE, "cache table truncated");
            }
            return Ok(None);
        }

        let mut raw = vec![0u8; DESCRIPTOR_SIZE * SLOT_COUNT];
        file.read_exact_at(0, &mut raw)?;

        let mut slots = Vec::with_capacity(SLOT_COUNT);
        for (index, chunk) in raw.chunks_exact(DESCRIPTOR_SIZE).enumerate() {
            let record: &[u8; DESCRIPTOR_SIZE] = chunk
                .try_into()
                .map_err(|_| CacheError::Corruption(format!("short descriptor {index}")))?;
            let descriptor = SlotDescriptor::decode(record);
            if !descriptor.has_valid_stamp() {
                warn!(
                    slot = index,
                    stamp = descriptor.stamp,
                    "foreign cache table"
                );
                return Ok(None);
            }
            slots.push(descriptor);
        }

        debug!(size, "cache table loaded");
        Ok(Some(slots))
    }

    /// Wipe `file` and write a freshly formatted descriptor table.
    fn create(mut file: F) -> Result<Self> {
        file.truncate()?;

        let mut rng = rand::rng();
        let slots: Vec<SlotDescriptor> = (0..SLOT_COUNT)
            .map(|_| SlotDescriptor::formatted(&mut rng))
            .collect();

        let mut table = Vec::with_capacity(DESCRIPTOR_SIZE * SLOT_COUNT);
        for slot in &slots {
            table.extend_from_slice(&slot.encode());
        }
        file.write_all_at(0, &table)?;
        file.flush()?;

        info!(slots = SLOT_COUNT, "cache table created");
        Ok(Self {
            file,
            slots,
            path: None,
        })
    }

    /// Path of the backing file, if opened from a path.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether a live entry named `name` exists.
    pub fn exists(&self, name: &str) -> bool {
        SlotName::new(name)
            .ok()
            .and_then(|name| self.find_live(&name))
            .is_some()
    }

    /// Names of all live entries starting with `prefix` (empty matches all).
    pub fn list(&self, prefix: &str) -> Vec<String> {
        self.slots
            .iter()
            .filter(|slot| slot.is_live())
            .map(SlotDescriptor::slot_name)
            .filter(|name| name.starts_with(prefix))
            .map(|name| name.to_string_lossy())
            .collect()
    }

    /// Store `data` under `name`, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// - [`CacheError::InvalidName`] if the name cannot be stored
    /// - [`CacheError::PayloadTooLarge`] above 16 MiB
    /// - [`CacheError::DirectoryFull`] when no slot can take the entry
    pub fn put(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let name = SlotName::new(name)?;
        if data.len() > MAX_PAYLOAD_LEN {
            return Err(CacheError::PayloadTooLarge {
                len: data.len(),
                limit: MAX_PAYLOAD_LEN,
            });
        }
        let len = data.len() as u32;

        let mut outgrown = false;
        let mut target = None;
        if let Some(index) = self.find_live(&name) {
            if len > self.slots[index].capacity {
                debug!(
                    entry = %name,
                    slot = index,
                    len,
                    capacity = self.slots[index].capacity,
                    "entry outgrew its slot"
                );
                self.slots[index].invalidate();
                self.write_descriptor(index)?;
                outgrown = true;
            } else {
                target = Some(index);
            }
        }

        if target.is_none() && !outgrown {
            target = self.find_reusable(len);
            if let Some(index) = target {
                debug!(entry = %name, slot = index, "reusing reserved slot");
                self.slots[index].set_live(&name);
            }
        }

        let index = match target {
            Some(index) => index,
            None => self.allocate(&name, len)?,
        };

        let slot = &mut self.slots[index];
        slot.payload_len = len;
        slot.payload_crc = crc32(data);
        let offset = TABLE_SIZE + u64::from(slot.payload_offset);
        let payload = xor_to_vec(data, &slot.key);

        self.file.write_all_at(offset, &payload)?;
        self.write_descriptor(index)?;
        self.file.flush()?;

        debug!(entry = %name, slot = index, len, "cache entry stored");
        Ok(())
    }

    /// Read the entry named `name`.
    ///
    /// Returns `Ok(None)` when the entry is missing, or when its descriptor
    /// points past the end of the file or claims an impossible length. In
    /// the latter case the slot is forgotten on disk as well.
    pub fn get(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        let Some(index) = SlotName::new(name)
            .ok()
            .and_then(|name| self.find_live(&name))
        else {
            return Ok(None);
        };

        let slot = &self.slots[index];
        let len = slot.payload_len as usize;
        let start = TABLE_SIZE + u64::from(slot.payload_offset);
        let file_size = self.file.size()?;

        if len > MAX_PAYLOAD_LEN || file_size < start + len as u64 {
            warn!(
                entry = name,
                slot = index,
                len,
                offset = slot.payload_offset,
                file_size,
                "corrupted cache entry dropped"
            );
            self.slots[index].reset();
            self.write_descriptor(index)?;
            self.file.flush()?;
            return Ok(None);
        }

        let mut data = vec![0u8; len];
        self.file.read_exact_at(start, &mut data)?;
        xor_in_place(&mut data, &self.slots[index].key);
        Ok(Some(data))
    }

    /// Remove the entry named `name`, keeping its capacity for reuse.
    ///
    /// Erasing a missing entry does nothing.
    pub fn erase(&mut self, name: &str) -> Result<()> {
        let Some(index) = SlotName::new(name)
            .ok()
            .and_then(|name| self.find_live(&name))
        else {
            return Ok(());
        };

        self.slots[index].invalidate();
        self.write_descriptor(index)?;
        self.file.flush()?;
        debug!(entry = name, slot = index, "cache entry erased");
        Ok(())
    }

    /// Store a string entry.
    pub fn put_str(&mut self, name: &str, value: &str) -> Result<()> {
        self.put(name, value.as_bytes())
    }

    /// Read a string entry; invalid UTF-8 is replaced.
    pub fn get_string(&mut self, name: &str) -> Result<Option<String>> {
        Ok(self
            .get(name)?
            .map(|data| String::from_utf8_lossy(&data).into_owned()))
    }

    /// Snapshots of all non-empty slots, in table order.
    pub fn slots(&self) -> impl Iterator<Item = SlotInfo> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.state() != SlotState::Empty)
            .map(|(index, slot)| SlotInfo {
                index,
                state: slot.state(),
                name: slot.slot_name().to_string_lossy(),
                offset: slot.payload_offset,
                len: slot.payload_len,
                capacity: slot.capacity,
                crc: slot.payload_crc,
                key: slot.key,
            })
    }

    /// Slot usage totals.
    pub fn stats(&mut self) -> Result<DirectoryStats> {
        let mut stats = DirectoryStats {
            file_size: self.file.size()?,
            ..DirectoryStats::default()
        };

        for slot in &self.slots {
            match slot.state() {
                SlotState::Live => {
                    stats.live_slots += 1;
                    stats.live_bytes += u64::from(slot.payload_len);
                    stats.reserved_bytes += u64::from(slot.capacity);
                }
                SlotState::Reserved => {
                    stats.reserved_slots += 1;
                    stats.reserved_bytes += u64::from(slot.capacity);
                }
                SlotState::Empty => stats.empty_slots += 1,
            }
        }

        Ok(stats)
    }

    /// Flush and close the backing file.
    pub fn close(mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }

    /// Give back the backing file.
    pub fn into_inner(self) -> F {
        self.file
    }

    fn find_live(&self, name: &SlotName) -> Option<usize> {
        self.slots.iter().position(|slot| slot.is_live_as(name))
    }

    fn find_reusable(&self, len: u32) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.state() == SlotState::Reserved && len <= slot.capacity)
    }

    /// Claim an empty slot and reserve a fresh region at the end of the file.
    fn allocate(&mut self, name: &SlotName, len: u32) -> Result<usize> {
        let Some(index) = self
            .slots
            .iter()
            .position(|slot| slot.state() == SlotState::Empty)
        else {
            error!(entry = %name, "cache table descriptors ended, delete the cache file");
            return Err(CacheError::DirectoryFull { slots: SLOT_COUNT });
        };

        // A truncated file can end inside regions still owned by other
        // slots, so new space starts after the furthest reserved extent.
        let end = self.file.size()?.max(TABLE_SIZE + self.reserved_end());
        let offset = end
            .checked_sub(TABLE_SIZE)
            .and_then(|offset| u32::try_from(offset).ok())
            .ok_or_else(|| {
                CacheError::Corruption(format!("payload region end {end} out of range"))
            })?;

        let capacity = (len as usize * 2).max(MIN_SLOT_CAPACITY);
        let filler: Vec<u8> = KEY_TABLE.iter().copied().cycle().take(capacity).collect();
        self.file.write_all_at(end, &filler)?;

        let slot = &mut self.slots[index];
        slot.set_live(name);
        slot.set_reserved();
        slot.payload_offset = offset;
        slot.capacity = capacity as u32;

        debug!(entry = %name, slot = index, offset, capacity, "allocated new slot");
        Ok(index)
    }

    /// End of the furthest payload region owned by any slot.
    fn reserved_end(&self) -> u64 {
        self.slots
            .iter()
            .filter(|slot| slot.state() != SlotState::Empty)
            .map(|slot| u64::from(slot.payload_offset) + u64::from(slot.capacity))
            .max()
            .unwrap_or(0)
    }

    fn write_descriptor(&mut self, index: usize) -> Result<()> {
        let raw = self.slots[index].encode();
        self.file
            .write_all_at((index * DESCRIPTOR_SIZE) as u64, &raw)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use proptest::test_runner::TestCaseError;
    use std::collections::HashMap;
    use std::io::Cursor;

    type MemoryDirectory = CacheDirectory<Cursor<Vec<u8>>>;

    fn memory() -> MemoryDirectory {
        CacheDirectory::open_with(Cursor::new(Vec::new())).expect("create in-memory cache")
    }

    fn reopen(directory: MemoryDirectory) -> MemoryDirectory {
        let mut cursor = directory.into_inner();
        cursor.set_position(0);
        CacheDirectory::open_with(cursor).expect("reopen in-memory cache")
    }

    #[test]
    fn test_new_table_layout() {
        let mut directory = memory();
        let stats = directory.stats().expect("stats");
        assert_eq!(stats.empty_slots, SLOT_COUNT);
        assert_eq!(stats.live_slots, 0);
        assert_eq!(stats.file_size, TABLE_SIZE);
        assert_eq!(TABLE_SIZE, 960_096);
    }

    #[test]
    fn test_put_get() {
        let mut directory = memory();
        directory.put("lang/en/FOGAME", b"hello").expect("put");
        assert_eq!(directory.get("lang/en/FOGAME").expect("get"), Some(b"hello".to_vec()));
        assert!(directory.exists("lang/en/FOGAME"));
        assert!(!directory.exists("lang/ru/FOGAME"));
    }

    #[test]
    fn test_empty_payload() {
        let mut directory = memory();
        directory.put("empty", b"").expect("put");
        assert_eq!(directory.get("empty").expect("get"), Some(Vec::new()));
    }

    #[test]
    fn test_backslash_names_match() {
        let mut directory = memory();
        directory.put(r"maps\forest", b"map").expect("put");
        assert!(directory.exists("maps/forest"));
        assert_eq!(directory.get(r"maps\forest").expect("get"), Some(b"map".to_vec()));
        assert_eq!(directory.list(""), vec!["maps/forest".to_string()]);
    }

    #[test]
    fn test_payload_is_obfuscated_on_disk() {
        let mut directory = memory();
        let secret = b"plain text that should not appear";
        directory.put("secret", secret).expect("put");
        let bytes = directory.into_inner().into_inner();
        assert!(!bytes.windows(secret.len()).any(|w| w == secret));
    }

    #[test]
    fn test_new_slot_reserves_minimum_capacity() {
        let mut directory = memory();
        directory.put("small", b"x").expect("put");
        let info: Vec<SlotInfo> = directory.slots().collect();
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].capacity as usize, MIN_SLOT_CAPACITY);
        assert_eq!(info[0].offset, 0);
        assert_eq!(info[0].crc, crc32(b"x"));
        assert_eq!(
            directory.stats().expect("stats").file_size,
            TABLE_SIZE + MIN_SLOT_CAPACITY as u64
        );
    }

    #[test]
    fn test_large_slot_reserves_double() {
        let mut directory = memory();
        directory.put("big", &vec![7u8; 4000]).expect("put");
        let info: Vec<SlotInfo> = directory.slots().collect();
        assert_eq!(info[0].capacity, 8000);
    }

    #[test]
    fn test_overwrite_in_place_keeps_file_size() {
        let mut directory = memory();
        directory.put("entry", &[1u8; 100]).expect("put");
        let size = directory.stats().expect("stats").file_size;

        directory.put("entry", &[2u8; 100]).expect("put");
        directory.put("entry", &[3u8; 900]).expect("put");
        assert_eq!(directory.stats().expect("stats").file_size, size);
        assert_eq!(directory.get("entry").expect("get"), Some(vec![3u8; 900]));
        assert_eq!(directory.slots().count(), 1);
    }

    #[test]
    fn test_outgrown_entry_moves_to_new_slot() {
        let mut directory = memory();
        directory.put("grow", &[1u8; 10]).expect("put");
        directory.put("other", &[9u8; 10]).expect("put");
        directory.put("grow", &[2u8; 2000]).expect("put");

        let slots: Vec<SlotInfo> = directory.slots().collect();
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0].state, SlotState::Reserved);
        assert_eq!(slots[2].state, SlotState::Live);
        assert_eq!(slots[2].name, "grow");
        assert_eq!(slots[2].capacity, 4000);

        assert_eq!(directory.get("grow").expect("get"), Some(vec![2u8; 2000]));
        assert_eq!(directory.get("other").expect("get"), Some(vec![9u8; 10]));
    }

    #[test]
    fn test_outgrown_entry_skips_reserved_slots() {
        let mut directory = memory();
        directory.put("big", &[0u8; 3000]).expect("put");
        directory.put("grow", &[1u8; 10]).expect("put");
        directory.erase("big").expect("erase");

        directory.put("grow", &[2u8; 2000]).expect("put");
        let live: Vec<SlotInfo> = directory
            .slots()
            .filter(|slot| slot.state == SlotState::Live)
            .collect();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].index, 2);
    }

    #[test]
    fn test_erased_capacity_reused_by_other_name() {
        let mut directory = memory();
        directory.put("first", &[1u8; 500]).expect("put");
        directory.erase("first").expect("erase");
        let size = directory.stats().expect("stats").file_size;

        directory.put("second", &[2u8; 700]).expect("put");
        assert_eq!(directory.stats().expect("stats").file_size, size);
        let slots: Vec<SlotInfo> = directory.slots().collect();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].index, 0);
        assert_eq!(slots[0].name, "second");
        assert_eq!(directory.get("first").expect("get"), None);
        assert_eq!(directory.get("second").expect("get"), Some(vec![2u8; 700]));
    }

    #[test]
    fn test_reserved_slot_too_small_is_skipped() {
        let mut directory = memory();
        directory.put("first", &[1u8; 10]).expect("put");
        directory.erase("first").expect("erase");
        directory.put("second", &[2u8; 5000]).expect("put");

        let slots: Vec<SlotInfo> = directory.slots().collect();
        assert_eq!(slots[0].state, SlotState::Reserved);
        assert_eq!(slots[1].name, "second");
    }

    #[test]
    fn test_erase_is_idempotent() {
        let mut directory = memory();
        directory.erase("missing").expect("erase missing");
        directory.put("entry", b"data").expect("put");
        directory.erase("entry").expect("erase");
        directory.erase("entry").expect("erase again");
        assert_eq!(directory.get("entry").expect("get"), None);
        assert!(!directory.exists("entry"));
    }

    #[test]
    fn test_list_prefix() {
        let mut directory = memory();
        for name in ["lang/en/FOGAME", "lang/en/FODLG", "lang/ru/FOGAME", "protos/items"] {
            directory.put(name, name.as_bytes()).expect("put");
        }
        directory.erase("lang/en/FODLG").expect("erase");

        let mut en = directory.list("lang/en/");
        en.sort();
        assert_eq!(en, vec!["lang/en/FOGAME".to_string()]);
        assert_eq!(directory.list("lang/").len(), 2);
        assert_eq!(directory.list("").len(), 3);
        assert!(directory.list("nothing").is_empty());
    }

    #[test]
    fn test_invalid_names() {
        let mut directory = memory();
        let long = "n".repeat(40);
        assert!(matches!(
            directory.put(&long, b"x"),
            Err(CacheError::InvalidName { .. })
        ));
        assert_eq!(directory.get(&long).expect("get"), None);
        assert!(!directory.exists(""));
        directory.erase(&long).expect("erase");
    }

    #[test]
    fn test_payload_too_large() {
        let mut directory = memory();
        let data = vec![0u8; MAX_PAYLOAD_LEN + 1];
        assert!(matches!(
            directory.put("huge", &data),
            Err(CacheError::PayloadTooLarge { .. })
        ));
        assert!(!directory.exists("huge"));
    }

    #[test]
    fn test_reopen_keeps_entries() {
        let mut directory = memory();
        directory.put("a", b"alpha").expect("put");
        directory.put("b", b"beta").expect("put");
        directory.erase("a").expect("erase");

        let mut directory = reopen(directory);
        assert_eq!(directory.get("a").expect("get"), None);
        assert_eq!(directory.get("b").expect("get"), Some(b"beta".to_vec()));
        assert_eq!(directory.stats().expect("stats").reserved_slots, 1);
    }

    #[test]
    fn test_foreign_stamp_triggers_rebuild() {
        let mut directory = memory();
        directory.put("entry", b"data").expect("put");
        let mut bytes = directory.into_inner().into_inner();

        let mut slot = SlotDescriptor::decode(
            bytes[DESCRIPTOR_SIZE * 5..DESCRIPTOR_SIZE * 6]
                .try_into()
                .expect("descriptor slice"),
        );
        slot.stamp = 4096;
        bytes[DESCRIPTOR_SIZE * 5..DESCRIPTOR_SIZE * 6].copy_from_slice(&slot.encode());

        let mut directory = CacheDirectory::open_with(Cursor::new(bytes)).expect("reopen");
        assert!(!directory.exists("entry"));
        assert_eq!(directory.stats().expect("stats").file_size, TABLE_SIZE);
    }

    #[test]
    fn test_short_file_triggers_rebuild() {
        let directory =
            CacheDirectory::open_with(Cursor::new(vec![0xAB; 1000])).expect("rebuild short file");
        assert!(directory.list("").is_empty());
        assert_eq!(directory.into_inner().into_inner().len() as u64, TABLE_SIZE);
    }

    #[test]
    fn test_truncated_payload_is_dropped() {
        let mut directory = memory();
        directory.put("keep", &[1u8; 100]).expect("put");
        directory.put("lost", &[2u8; 100]).expect("put");

        let mut bytes = directory.into_inner().into_inner();
        bytes.truncate(TABLE_SIZE as usize + MIN_SLOT_CAPACITY + 50);

        let mut directory = CacheDirectory::open_with(Cursor::new(bytes)).expect("reopen");
        assert_eq!(directory.get("lost").expect("get"), None);
        assert!(!directory.exists("lost"));
        assert_eq!(directory.get("keep").expect("get"), Some(vec![1u8; 100]));

        // The dropped slot lost its region as well.
        let directory = reopen(directory);
        assert_eq!(directory.slots().count(), 1);
    }

    #[test]
    fn test_impossible_length_is_dropped() {
        let mut directory = memory();
        directory.put("entry", b"data").expect("put");
        let index = directory.find_live(&SlotName::new("entry").expect("name")).expect("live");
        directory.slots[index].payload_len = (MAX_PAYLOAD_LEN + 1) as u32;

        assert_eq!(directory.get("entry").expect("get"), None);
        assert_eq!(directory.slots[index].state(), SlotState::Empty);
    }

    #[test]
    fn test_string_helpers() {
        let mut directory = memory();
        directory.put_str("text", "Привет").expect("put");
        assert_eq!(directory.get_string("text").expect("get"), Some("Привет".to_string()));
        assert_eq!(directory.get_string("missing").expect("get"), None);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Put(usize, Vec<u8>),
        Erase(usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => (0..6usize, proptest::collection::vec(any::<u8>(), 0..3000))
                .prop_map(|(name, data)| Op::Put(name, data)),
            1 => (0..6usize).prop_map(Op::Erase),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_matches_map_model(ops in proptest::collection::vec(op_strategy(), 1..40)) {
            let mut directory = memory();
            let mut model: HashMap<String, Vec<u8>> = HashMap::new();

            for op in ops {
                match op {
                    Op::Put(name, data) => {
                        let name = format!("entry/{name}");
                        directory.put(&name, &data).map_err(|e| TestCaseError::fail(e.to_string()))?;
                        model.insert(name, data);
                    }
                    Op::Erase(name) => {
                        let name = format!("entry/{name}");
                        directory.erase(&name).map_err(|e| TestCaseError::fail(e.to_string()))?;
                        model.remove(&name);
                    }
                }
            }

            let mut directory = reopen(directory);
            let mut listed = directory.list("entry/");
            listed.sort();
            let mut expected: Vec<String> = model.keys().cloned().collect();
            expected.sort();
            prop_assert_eq!(listed, expected);

            for (name, data) in &model {
                let stored = directory.get(name).map_err(|e| TestCaseError::fail(e.to_string()))?;
                prop_assert_eq!(stored.as_ref(), Some(data));
            }

            let live = directory.slots().filter(|slot| slot.state == SlotState::Live).count();
            prop_assert_eq!(live, model.len());
        }
    }
}
