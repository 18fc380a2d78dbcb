//! WAL Reader
//!
//! Handles reading batch records from the WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;
use std::sync::Arc;

use bytes::Buf;

use crate::crypto::{Cipher, NONCE_SIZE, TAG_SIZE};
use crate::error::{Result, StoreError};

use super::entry::{compute_crc, MAX_RECORD_SIZE};
use super::{WalEntry, HEADER_SIZE};

/// What the reader found at the current position
#[derive(Debug)]
pub enum ReadOutcome {
    /// A complete, CRC-valid, authenticated entry
    Entry(WalEntry),

    /// Clean end of file on a record boundary
    End,

    /// The tail is incomplete or fails its CRC (crash mid-append)
    Torn { reason: String },
}

/// Reads records from the WAL file
pub struct WalReader {
    reader: BufReader<File>,
    cipher: Arc<dyn Cipher>,

    /// Offset just past the last valid record
    position: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path, cipher: Arc<dyn Cipher>) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            cipher,
            position: 0,
        })
    }

    /// Read the next record
    ///
    /// Returns `Err` only for I/O failures and for records that are intact
    /// on disk but cannot be opened with the current key.
    pub fn next_record(&mut self) -> Result<ReadOutcome> {
        let mut header = [0u8; HEADER_SIZE];
        let read = read_full(&mut self.reader, &mut header)?;
        if read == 0 {
            return Ok(ReadOutcome::End);
        }
        if read < HEADER_SIZE {
            return Ok(ReadOutcome::Torn {
                reason: format!("short header ({} of {} bytes)", read, HEADER_SIZE),
            });
        }

        let mut buf = &header[..];
        let lsn = buf.get_u64_le();
        let crc = buf.get_u32_le();
        let len = buf.get_u32_le();

        if len > MAX_RECORD_SIZE {
            return Ok(ReadOutcome::Torn {
                reason: format!("record length {} exceeds maximum", len),
            });
        }
        // Zero-filled tails look like empty records with a matching CRC
        if lsn == 0 || (len as usize) < NONCE_SIZE + TAG_SIZE {
            return Ok(ReadOutcome::Torn {
                reason: format!("impossible record (lsn={}, len={})", lsn, len),
            });
        }

        let mut payload = vec![0u8; len as usize];
        let read = read_full(&mut self.reader, &mut payload)?;
        if read < payload.len() {
            return Ok(ReadOutcome::Torn {
                reason: format!("short payload ({} of {} bytes)", read, len),
            });
        }

        if compute_crc(&payload) != crc {
            return Ok(ReadOutcome::Torn {
                reason: format!("CRC mismatch in record with LSN {}", lsn),
            });
        }

        // Bytes are intact: failing to open them means the key is wrong
        let entry = match WalEntry::decode_payload(lsn, &payload, self.cipher.as_ref()) {
            Ok(entry) => entry,
            Err(StoreError::Encryption(e)) => {
                return Err(StoreError::KeyCustodyLost(format!(
                    "WAL record {} cannot be decrypted: {}",
                    lsn, e
                )));
            }
            Err(e) => return Err(e),
        };

        self.position += (HEADER_SIZE + payload.len()) as u64;
        Ok(ReadOutcome::Entry(entry))
    }

    /// Read every valid entry, stopping at the first torn record
    pub fn entries(mut self) -> Result<Vec<WalEntry>> {
        let mut entries = Vec::new();
        while let ReadOutcome::Entry(entry) = self.next_record()? {
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Offset just past the last valid record read so far
    pub fn position(&self) -> u64 {
        self.position
    }
}

/// Fill `buf` as far as the file allows; returns bytes read
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(StoreError::Io(e)),
        }
    }
    Ok(filled)
}
