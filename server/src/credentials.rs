//! Line-oriented credential store
//!
//! One `handle,password` record per line, plaintext, no escaping. The store
//! only supports appending a record and scanning every record in order.
//! All access goes through one mutex so a scan never observes a half-written
//! append and two appends never interleave.

use log::debug;
use parking_lot::Mutex;
use shared::split_on_first_delim;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A single `handle,password` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub handle: String,
    pub pass: String,
}

impl CredentialRecord {
    pub fn new(handle: impl Into<String>, pass: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            pass: pass.into(),
        }
    }

    /// Parses one stored line. Blank lines carry no record.
    pub fn parse_line(line: &str) -> Option<Self> {
        if line.trim().is_empty() {
            return None;
        }
        let (handle, pass) = split_on_first_delim(',', line);
        Some(Self { handle, pass })
    }

    pub fn to_line(&self) -> String {
        format!("{},{}", self.handle, self.pass)
    }
}

pub struct CredentialStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A store whose file has not been created yet holds no records.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Appends `record` as a new line, creating the file if needed.
    pub fn append(&self, record: &CredentialRecord) -> io::Result<()> {
        let _guard = self.lock.lock();
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)?;

        // Files written by older servers may lack a trailing newline
        let mut line = String::new();
        if file.metadata()?.len() > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1))?;
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                line.push('\n');
            }
        }
        line.push_str(&record.to_line());
        line.push('\n');

        file.write_all(line.as_bytes())?;
        file.flush()?;
        debug!("Appended credential record for '{}'", record.handle);
        Ok(())
    }

    /// Returns the first record matching `predicate`, scanning in file order.
    pub fn find<F>(&self, mut predicate: F) -> io::Result<Option<CredentialRecord>>
    where
        F: FnMut(&CredentialRecord) -> bool,
    {
        let _guard = self.lock.lock();
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        for line in BufReader::new(file).lines() {
            if let Some(record) = CredentialRecord::parse_line(&line?) {
                if predicate(&record) {
                    return Ok(Some(record));
                }
            }
        }
        Ok(None)
    }

    pub fn contains_handle(&self, handle: &str) -> io::Result<bool> {
        Ok(self.find(|record| record.handle == handle)?.is_some())
    }

    /// True when some record matches both handle and password.
    pub fn verify(&self, handle: &str, pass: &str) -> io::Result<bool> {
        Ok(self
            .find(|record| record.handle == handle && record.pass == pass)?
            .is_some())
    }
}
