//! Paged cache of `.shx` record entries.
//!
//! Entries are 8 bytes each (offset and length, big-endian 16-bit words).
//! They are read a page at a time on first access so that querying a few
//! records of a huge file never loads the whole index. Writers call
//! [`RecordIndex::load_all`] once since every entry is rewritten on close.

use std::io::{self, Read, Seek, SeekFrom};

use super::{FieldCodec, HEADER_BYTES};

/// Records per index page (8 KiB of `.shx` entries).
pub const PAGE_RECORDS: usize = 1024;
/// Bytes per `.shx` entry.
pub const ENTRY_BYTES: usize = 8;

/// Random-access byte source backing the index.
pub trait PageSource {
    fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()>;
}

impl<T: Read + Seek> PageSource for T {
    fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.seek(SeekFrom::Start(offset))?;
        self.read_exact(buf)
    }
}

/// Location of one record in the `.shp` file, in bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct RecordEntry {
    /// Offset of the record header.
    pub offset: u64,
    /// Content length, excluding the 8-byte record header.
    pub size: u64,
}

impl RecordEntry {
    pub fn decode(bytes: &[u8], codec: FieldCodec) -> Self {
        RecordEntry {
            offset: u64::from(codec.be_i32(&bytes[0..4]) as u32) * 2,
            size: u64::from(codec.be_i32(&bytes[4..8]) as u32) * 2,
        }
    }

    pub fn encode(&self, bytes: &mut [u8], codec: FieldCodec) {
        codec.put_be_i32(&mut bytes[0..4], (self.offset / 2) as i32);
        codec.put_be_i32(&mut bytes[4..8], (self.size / 2) as i32);
    }
}

#[derive(Debug)]
pub struct RecordIndex {
    len: usize,
    page_records: usize,
    /// `None` until the page is read.
    pages: Vec<Option<Vec<RecordEntry>>>,
    all_loaded: bool,
}

impl RecordIndex {
    /// Index over `len` records, nothing loaded yet.
    pub fn new(len: usize) -> Self {
        Self::with_page_records(len, PAGE_RECORDS)
    }

    pub fn with_page_records(len: usize, page_records: usize) -> Self {
        let page_records = page_records.max(1);
        RecordIndex {
            len,
            page_records,
            pages: vec![None; len.div_ceil(page_records)],
            all_loaded: len == 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_page_loaded(&self, page: usize) -> bool {
        self.pages.get(page).is_some_and(Option::is_some)
    }

    pub fn is_all_loaded(&self) -> bool {
        self.all_loaded
    }

    pub fn loaded_pages(&self) -> usize {
        self.pages.iter().filter(|p| p.is_some()).count()
    }

    /// Entry for record `i`, reading its page if needed. `i` must be in range.
    pub fn entry<P: PageSource + ?Sized>(
        &mut self,
        source: &mut P,
        codec: FieldCodec,
        i: usize,
    ) -> io::Result<RecordEntry> {
        if i >= self.len {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("record {i} is past the end of the index"),
            ));
        }
        let page = i / self.page_records;
        if self.pages[page].is_none() {
            let first = page * self.page_records;
            let count = self.page_records.min(self.len - first);
            self.pages[page] = Some(Self::read_entries(source, codec, first, count)?);
        }
        Ok(match &self.pages[page] {
            Some(entries) => entries[i - page * self.page_records],
            None => RecordEntry::default(),
        })
    }

    /// Read every entry in one pass.
    pub fn load_all<P: PageSource + ?Sized>(
        &mut self,
        source: &mut P,
        codec: FieldCodec,
    ) -> io::Result<()> {
        if self.all_loaded {
            return Ok(());
        }
        let entries = Self::read_entries(source, codec, 0, self.len)?;
        for (page, chunk) in entries.chunks(self.page_records).enumerate() {
            self.pages[page] = Some(chunk.to_vec());
        }
        self.all_loaded = true;
        Ok(())
    }

    /// Append an entry. Only valid once everything is loaded.
    pub fn push(&mut self, entry: RecordEntry) {
        debug_assert!(self.all_loaded, "push on a partially loaded index");
        match self.pages.last_mut() {
            Some(Some(last)) if last.len() < self.page_records => last.push(entry),
            _ => self.pages.push(Some(vec![entry])),
        }
        self.len += 1;
    }

    /// Loaded entries in record order.
    pub fn iter_loaded(&self) -> impl Iterator<Item = &RecordEntry> + '_ {
        self.pages.iter().flatten().flatten()
    }

    fn read_entries<P: PageSource + ?Sized>(
        source: &mut P,
        codec: FieldCodec,
        first: usize,
        count: usize,
    ) -> io::Result<Vec<RecordEntry>> {
        let mut bytes = vec![0u8; count * ENTRY_BYTES];
        let offset = (HEADER_BYTES + first * ENTRY_BYTES) as u64;
        source.read_exact_at(offset, &mut bytes)?;
        Ok(bytes
            .chunks_exact(ENTRY_BYTES)
            .map(|chunk| RecordEntry::decode(chunk, codec))
            .collect())
    }
}
