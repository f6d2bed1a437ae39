//! # Fixed-Record Pager
//!
//! A [`Pager`] owns one regular file opened for random read/write and
//! addresses it as an array of fixed-size records. The record size is
//! taken from the type parameter of each call, so a single file can hold
//! a 16-byte header in slot 0 followed by node-sized slots; the offset
//! math is always `slot * size_of::<R>()`.
//!
//! Writes past the current end of file extend it (the OS zero-fills the
//! gap), which is how both index files and record files grow one slot at
//! a time. Reads at or past end of file report the slot as absent; a
//! *partial* record read is a corrupted file and is fatal.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::mem::size_of;
use std::path::{Path, PathBuf};

use eyre::{ensure, Result, WrapErr};

use crate::error::DbError;
use crate::storage::DiskRecord;

/// Tombstone byte written by [`Pager::erase`].
const TOMBSTONE: u8 = b'X';

#[derive(Debug)]
pub struct Pager {
    file: File,
    path: PathBuf,
    empty: bool,
}

impl Pager {
    /// Opens (or creates) the backing file.
    ///
    /// With `create_new = false` a missing file is `DbError::NotExist`
    /// and an unreadable one `DbError::OpeningError`, both carrying the
    /// bare file name. With `create_new = true` the file is truncated
    /// and the pager reports [`Pager::is_empty`] until dropped, which is
    /// how tree construction decides between initializing and loading.
    pub fn open<P: AsRef<Path>>(path: P, create_new: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        if !create_new && !path.exists() {
            return Err(DbError::NotExist(file_name).into());
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(create_new)
            .truncate(create_new)
            .open(&path)
            .map_err(|_| DbError::OpeningError(file_name.clone()))?;

        // A file we can open but not stat is as good as unreadable.
        file.metadata()
            .map_err(|_| DbError::OpeningError(file_name))?;

        Ok(Self {
            file,
            path,
            empty: create_new,
        })
    }

    /// True when this pager created a fresh file.
    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Next dense slot id: `file_size / size_of::<R>()`.
    pub fn allocate_id<R: DiskRecord>(&mut self) -> Result<i64> {
        let len = self
            .file
            .metadata()
            .wrap_err_with(|| format!("failed to stat '{}'", self.path.display()))?
            .len();
        Ok((len / size_of::<R>() as u64) as i64)
    }

    /// Writes `record` at `slot`, extending the file when the slot is
    /// past the current end.
    pub fn save<R: DiskRecord>(&mut self, slot: i64, record: &R) -> Result<()> {
        ensure!(slot >= 0, "cannot save record at negative slot {}", slot);
        self.seek_slot::<R>(slot)?;
        self.file
            .write_all(record.as_bytes())
            .wrap_err_with(|| format!("short write at slot {} in '{}'", slot, self.path.display()))
    }

    /// Reads the record at `slot` into `record`. Returns `false` when the
    /// slot is absent (negative, or at/past end of file). A record that
    /// exists only partially means the file is corrupted.
    pub fn recover<R: DiskRecord>(&mut self, slot: i64, record: &mut R) -> Result<bool> {
        if slot < 0 {
            return Ok(false);
        }
        self.seek_slot::<R>(slot)?;

        let buf = record.as_mut_bytes();
        let mut filled = 0;
        while filled < buf.len() {
            let n = self
                .file
                .read(&mut buf[filled..])
                .wrap_err_with(|| format!("read failed in '{}'", self.path.display()))?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            return Ok(false);
        }
        ensure!(
            filled == buf.len(),
            "short read of {}/{} bytes at slot {} in '{}'",
            filled,
            buf.len(),
            slot,
            self.path.display()
        );
        Ok(true)
    }

    /// Marks `slot` erased with a single tombstone byte. Kept as a
    /// primitive; no current index path reads past erased slots.
    pub fn erase<R: DiskRecord>(&mut self, slot: i64) -> Result<()> {
        ensure!(slot >= 0, "cannot erase record at negative slot {}", slot);
        self.seek_slot::<R>(slot)?;
        self.file
            .write_all(&[TOMBSTONE])
            .wrap_err_with(|| format!("failed to erase slot {} in '{}'", slot, self.path.display()))
    }

    fn seek_slot<R: DiskRecord>(&mut self, slot: i64) -> Result<()> {
        let offset = slot as u64 * size_of::<R>() as u64;
        self.file
            .seek(SeekFrom::Start(offset))
            .wrap_err_with(|| format!("seek failed in '{}'", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use zerocopy::little_endian::U32;
    use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout, Unaligned};

    #[repr(C)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
    struct Pair {
        a: U32,
        b: U32,
    }

    fn pair(a: u32, b: u32) -> Pair {
        Pair {
            a: U32::new(a),
            b: U32::new(b),
        }
    }

    #[test]
    fn save_then_recover_roundtrips() {
        let dir = tempdir().unwrap();
        let mut pager = Pager::open(dir.path().join("p.bin"), true).unwrap();

        pager.save(0, &pair(1, 2)).unwrap();
        pager.save(3, &pair(7, 8)).unwrap();

        let mut out = Pair::new_zeroed();
        assert!(pager.recover(3, &mut out).unwrap());
        assert_eq!(out, pair(7, 8));
        assert!(pager.recover(0, &mut out).unwrap());
        assert_eq!(out, pair(1, 2));
    }

    #[test]
    fn allocate_id_tracks_file_growth() {
        let dir = tempdir().unwrap();
        let mut pager = Pager::open(dir.path().join("p.bin"), true).unwrap();

        assert_eq!(pager.allocate_id::<Pair>().unwrap(), 0);
        pager.save(0, &pair(0, 0)).unwrap();
        assert_eq!(pager.allocate_id::<Pair>().unwrap(), 1);
        pager.save(4, &pair(0, 0)).unwrap();
        assert_eq!(pager.allocate_id::<Pair>().unwrap(), 5);
    }

    #[test]
    fn recover_past_end_reports_absent() {
        let dir = tempdir().unwrap();
        let mut pager = Pager::open(dir.path().join("p.bin"), true).unwrap();
        pager.save(0, &pair(1, 1)).unwrap();

        let mut out = Pair::new_zeroed();
        assert!(!pager.recover(1, &mut out).unwrap());
        assert!(!pager.recover(-1, &mut out).unwrap());
    }

    #[test]
    fn missing_file_is_not_exist() {
        let dir = tempdir().unwrap();
        let err = Pager::open(dir.path().join("gone.bin"), false).unwrap_err();
        assert_eq!(
            err.downcast_ref::<DbError>(),
            Some(&DbError::NotExist("gone.bin".to_string()))
        );
    }

    #[test]
    fn reopen_preserves_records_and_clears_empty_flag() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("p.bin");
        {
            let mut pager = Pager::open(&path, true).unwrap();
            assert!(pager.is_empty());
            pager.save(2, &pair(9, 9)).unwrap();
        }
        let mut pager = Pager::open(&path, false).unwrap();
        assert!(!pager.is_empty());
        let mut out = Pair::new_zeroed();
        assert!(pager.recover(2, &mut out).unwrap());
        assert_eq!(out, pair(9, 9));
    }

    #[test]
    fn erase_stamps_a_tombstone_byte() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("p.bin");
        let mut pager = Pager::open(&path, true).unwrap();
        pager.save(1, &pair(5, 5)).unwrap();
        pager.erase::<Pair>(1).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes[8], b'X');
    }
}
