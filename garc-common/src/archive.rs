// Archive container
// Single-file container of named streams, each a list of parts written
// sequentially into the file. A varint-encoded stream directory is written
// as a footer on finalize; readers locate it from the file tail and then
// access any (stream, part) at random.

use crate::varint::{read_fixed_u64, read_varint, write_fixed_u64, write_varint};
use ahash::AHashMap;
use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

const ARCHIVE_MAGIC: &[u8; 4] = b"GARC";

/// Well-known stream names
pub const PARAMS_STREAM: &str = "params";
pub const COLLECTION_STREAM: &str = "collection";
pub const FILE_INFO_STREAM: &str = "file_info";

/// Name of the stream holding one segment group's parts
pub fn seg_stream_name(group_id: u32) -> String {
    format!("seg-{:06}", group_id)
}

/// A part within a stream: where it sits in the file and how big it is
#[derive(Debug, Clone)]
struct Part {
    offset: u64,
    packed_size: u64,
    raw_size: u64,
}

#[derive(Debug)]
struct Stream {
    name: String,
    parts: Vec<Part>,
}

enum ArchiveMode {
    Write { writer: BufWriter<File>, offset: u64 },
    Read { reader: BufReader<File> },
}

/// The on-disk container. Opened either for writing (streams registered and
/// parts appended, directory written by [`Archive::finalize`]) or for
/// reading (directory parsed from the footer, parts fetched at random).
pub struct Archive {
    mode: ArchiveMode,
    streams: Vec<Stream>,
    stream_ids: AHashMap<String, usize>,
}

impl Archive {
    /// Create a new archive file for writing
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("cannot create archive {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(ARCHIVE_MAGIC)?;
        writer.write_all(&[crate::types::GARC_FILE_MAJOR as u8, crate::types::GARC_FILE_MINOR as u8])?;

        Ok(Archive {
            mode: ArchiveMode::Write {
                writer,
                offset: (ARCHIVE_MAGIC.len() + 2) as u64,
            },
            streams: Vec::new(),
            stream_ids: AHashMap::new(),
        })
    }

    /// Open an existing archive for reading and parse its stream directory
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("cannot open archive {}", path.display()))?;
        let mut reader = BufReader::new(file);

        let mut head = [0u8; 6];
        reader.read_exact(&mut head).context("archive too short")?;
        if &head[..4] != ARCHIVE_MAGIC {
            bail!("not a garc archive (bad magic)");
        }

        // Tail: [footer bytes][footer_size: u64][magic]
        reader.seek(SeekFrom::End(-(8 + ARCHIVE_MAGIC.len() as i64)))?;
        let footer_size = read_fixed_u64(&mut reader)?;
        let mut tail_magic = [0u8; 4];
        reader.read_exact(&mut tail_magic)?;
        if &tail_magic != ARCHIVE_MAGIC {
            bail!("archive is truncated or was not finalized");
        }

        reader.seek(SeekFrom::End(
            -(footer_size as i64 + 8 + ARCHIVE_MAGIC.len() as i64),
        ))?;
        let mut footer = vec![0u8; footer_size as usize];
        reader.read_exact(&mut footer).context("cannot read archive directory")?;

        let mut streams = Vec::new();
        let mut stream_ids = AHashMap::new();
        let mut cursor = std::io::Cursor::new(footer.as_slice());

        let (n_streams, _) = read_varint(&mut cursor)?;
        for _ in 0..n_streams {
            let (name_len, _) = read_varint(&mut cursor)?;
            let mut name_buf = vec![0u8; name_len as usize];
            cursor.read_exact(&mut name_buf)?;
            let name = String::from_utf8(name_buf).context("stream name is not UTF-8")?;

            let (n_parts, _) = read_varint(&mut cursor)?;
            let mut parts = Vec::with_capacity(n_parts as usize);
            for _ in 0..n_parts {
                let (offset, _) = read_varint(&mut cursor)?;
                let (packed_size, _) = read_varint(&mut cursor)?;
                let (raw_size, _) = read_varint(&mut cursor)?;
                parts.push(Part {
                    offset,
                    packed_size,
                    raw_size,
                });
            }

            stream_ids.insert(name.clone(), streams.len());
            streams.push(Stream { name, parts });
        }

        Ok(Archive {
            mode: ArchiveMode::Read { reader },
            streams,
            stream_ids,
        })
    }

    /// Register a stream (or return the id of an already registered one)
    pub fn register_stream(&mut self, name: &str) -> usize {
        if let Some(&id) = self.stream_ids.get(name) {
            return id;
        }
        let id = self.streams.len();
        self.stream_ids.insert(name.to_string(), id);
        self.streams.push(Stream {
            name: name.to_string(),
            parts: Vec::new(),
        });
        id
    }

    /// Look up a stream id by name
    pub fn stream_id(&self, name: &str) -> Option<usize> {
        self.stream_ids.get(name).copied()
    }

    pub fn stream_name(&self, stream_id: usize) -> &str {
        &self.streams[stream_id].name
    }

    pub fn n_streams(&self) -> usize {
        self.streams.len()
    }

    /// Number of parts currently in a stream
    pub fn part_count(&self, stream_id: usize) -> usize {
        self.streams[stream_id].parts.len()
    }

    /// Uncompressed size recorded for a part
    pub fn part_raw_size(&self, stream_id: usize, part_id: usize) -> u64 {
        self.streams[stream_id].parts[part_id].raw_size
    }

    /// Append a part to a stream; returns its part id within the stream
    pub fn add_part(&mut self, stream_id: usize, data: &[u8], raw_size: u64) -> Result<usize> {
        let ArchiveMode::Write { writer, offset } = &mut self.mode else {
            bail!("archive is open for reading");
        };
        let stream = &mut self.streams[stream_id];
        stream.parts.push(Part {
            offset: *offset,
            packed_size: data.len() as u64,
            raw_size,
        });
        writer.write_all(data)?;
        *offset += data.len() as u64;
        Ok(stream.parts.len() - 1)
    }

    /// Read a part back from an archive opened for reading
    pub fn get_part(&mut self, stream_id: usize, part_id: usize) -> Result<Vec<u8>> {
        let part = {
            let stream = self
                .streams
                .get(stream_id)
                .with_context(|| format!("no stream with id {}", stream_id))?;
            stream
                .parts
                .get(part_id)
                .with_context(|| {
                    format!("stream {} has no part {}", stream.name, part_id)
                })?
                .clone()
        };
        let ArchiveMode::Read { reader } = &mut self.mode else {
            bail!("archive is open for writing");
        };
        reader.seek(SeekFrom::Start(part.offset))?;
        let mut data = vec![0u8; part.packed_size as usize];
        reader.read_exact(&mut data)?;
        Ok(data)
    }

    /// Write the stream directory and close the archive
    pub fn finalize(&mut self) -> Result<()> {
        let ArchiveMode::Write { writer, .. } = &mut self.mode else {
            bail!("archive is open for reading");
        };

        let mut footer: Vec<u8> = Vec::new();
        write_varint(&mut footer, self.streams.len() as u64)?;
        for stream in &self.streams {
            write_varint(&mut footer, stream.name.len() as u64)?;
            footer.extend_from_slice(stream.name.as_bytes());
            write_varint(&mut footer, stream.parts.len() as u64)?;
            for part in &stream.parts {
                write_varint(&mut footer, part.offset)?;
                write_varint(&mut footer, part.packed_size)?;
                write_varint(&mut footer, part.raw_size)?;
            }
        }

        writer.write_all(&footer)?;
        write_fixed_u64(writer, footer.len() as u64)?;
        writer.write_all(ARCHIVE_MAGIC)?;
        writer.flush().context("cannot finalize archive")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_then_read_parts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.garc");

        let mut arch = Archive::create(&path).unwrap();
        let s1 = arch.register_stream("alpha");
        let s2 = arch.register_stream("beta");
        arch.add_part(s1, b"first", 5).unwrap();
        arch.add_part(s2, b"second-part", 100).unwrap();
        arch.add_part(s1, b"third", 5).unwrap();
        arch.finalize().unwrap();

        let mut arch = Archive::open(&path).unwrap();
        let s1 = arch.stream_id("alpha").unwrap();
        let s2 = arch.stream_id("beta").unwrap();
        assert_eq!(arch.part_count(s1), 2);
        assert_eq!(arch.part_count(s2), 1);
        assert_eq!(arch.get_part(s1, 0).unwrap(), b"first");
        assert_eq!(arch.get_part(s1, 1).unwrap(), b"third");
        assert_eq!(arch.get_part(s2, 0).unwrap(), b"second-part");
        assert_eq!(arch.part_raw_size(s2, 0), 100);
        assert!(arch.stream_id("gamma").is_none());
    }

    #[test]
    fn test_register_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.garc");
        let mut arch = Archive::create(&path).unwrap();
        let a = arch.register_stream("s");
        let b = arch.register_stream("s");
        assert_eq!(a, b);
    }

    #[test]
    fn test_open_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.garc");
        std::fs::write(&path, b"this is not an archive at all").unwrap();
        assert!(Archive::open(&path).is_err());
    }
}
