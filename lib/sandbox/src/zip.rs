//! Streaming STORED-method ZIP writer.
//!
//! Entries are written with general-purpose flag 0x0808 (UTF-8 names +
//! data descriptor) so each entry's CRC and sizes land in a trailing
//! descriptor and the archive can be emitted without seeking back. The
//! central directory comes last. Method 0 (stored) keeps CPU cost
//! negligible; the snapshot byte budget bounds archive size.

const LOCAL_HEADER_SIG: u32 = 0x0403_4b50;
const DATA_DESCRIPTOR_SIG: u32 = 0x0807_4b50;
const CENTRAL_HEADER_SIG: u32 = 0x0201_4b50;
const END_OF_CENTRAL_DIR_SIG: u32 = 0x0605_4b50;

/// Version needed to extract: 2.0.
const VERSION_NEEDED: u16 = 20;
/// Bit 3 (data descriptor) + bit 11 (UTF-8 names).
const GP_FLAGS: u16 = 0x0808;
/// Method 0: stored, no compression.
const METHOD_STORED: u16 = 0;

struct CentralEntry {
    name: Vec<u8>,
    crc: u32,
    size: u32,
    offset: u32,
}

/// Builds a STORED-method ZIP archive in memory, entry by entry.
///
/// Callers are responsible for adding entries in a deterministic order;
/// the snapshot capturer sorts paths byte-wise before writing.
#[derive(Default)]
pub struct StoredZipWriter {
    buf: Vec<u8>,
    entries: Vec<CentralEntry>,
}

impl StoredZipWriter {
    /// Creates an empty archive.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries added so far.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Appends one file entry: local header, stored bytes, data
    /// descriptor.
    pub fn add_file(&mut self, path: &str, data: &[u8]) {
        let name = path.as_bytes().to_vec();
        let crc = crc32fast::hash(data);
        let size = data.len() as u32;
        let offset = self.buf.len() as u32;

        self.put_u32(LOCAL_HEADER_SIG);
        self.put_u16(VERSION_NEEDED);
        self.put_u16(GP_FLAGS);
        self.put_u16(METHOD_STORED);
        self.put_u16(0); // mod time
        self.put_u16(0); // mod date
        self.put_u32(0); // crc deferred to descriptor
        self.put_u32(0); // compressed size deferred
        self.put_u32(0); // uncompressed size deferred
        self.put_u16(name.len() as u16);
        self.put_u16(0); // extra length
        self.buf.extend_from_slice(&name);

        self.buf.extend_from_slice(data);

        self.put_u32(DATA_DESCRIPTOR_SIG);
        self.put_u32(crc);
        self.put_u32(size); // compressed == uncompressed for stored
        self.put_u32(size);

        self.entries.push(CentralEntry {
            name,
            crc,
            size,
            offset,
        });
    }

    /// Writes the central directory and end record, returning the
    /// finished archive bytes.
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        let central_offset = self.buf.len() as u32;
        let entries = std::mem::take(&mut self.entries);

        for entry in &entries {
            self.put_u32(CENTRAL_HEADER_SIG);
            self.put_u16(VERSION_NEEDED); // version made by
            self.put_u16(VERSION_NEEDED); // version needed
            self.put_u16(GP_FLAGS);
            self.put_u16(METHOD_STORED);
            self.put_u16(0); // mod time
            self.put_u16(0); // mod date
            self.put_u32(entry.crc);
            self.put_u32(entry.size);
            self.put_u32(entry.size);
            self.put_u16(entry.name.len() as u16);
            self.put_u16(0); // extra length
            self.put_u16(0); // comment length
            self.put_u16(0); // disk number start
            self.put_u16(0); // internal attributes
            self.put_u32(0); // external attributes
            self.put_u32(entry.offset);
            self.buf.extend_from_slice(&entry.name);
        }

        let central_size = self.buf.len() as u32 - central_offset;
        let count = entries.len() as u16;

        self.put_u32(END_OF_CENTRAL_DIR_SIG);
        self.put_u16(0); // this disk
        self.put_u16(0); // central directory start disk
        self.put_u16(count);
        self.put_u16(count);
        self.put_u32(central_size);
        self.put_u32(central_offset);
        self.put_u16(0); // comment length

        self.buf
    }

    fn put_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }
}
