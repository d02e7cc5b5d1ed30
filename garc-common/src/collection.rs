// Collection directory
// Samples in insertion order, contigs per sample, and the ordered list of
// segment descriptors that reconstruct each contig. Serialized with varints
// (zigzag deltas for group ids) into the archive's collection stream.

use crate::varint::{decode_varint, encode_varint, zigzag_decode, zigzag_encode};
use ahash::AHashMap;
use anyhow::{bail, Context, Result};

/// One stored segment of a contig
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentDesc {
    /// Segment group the payload belongs to
    pub group_id: u32,
    /// Part index inside the group's stream
    pub in_group_id: u32,
    /// Uncompressed segment length in bases
    pub raw_len: u32,
    /// True when the part is the group reference (stored raw, no LZ layer)
    pub is_ref: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ContigDesc {
    pub name: String,
    pub segments: Vec<SegmentDesc>,
}

#[derive(Debug, Clone, Default)]
pub struct SampleDesc {
    pub name: String,
    pub contigs: Vec<ContigDesc>,
}

/// Directory of every sample/contig in an archive
#[derive(Debug, Default)]
pub struct Collection {
    samples: Vec<SampleDesc>,
    sample_ids: AHashMap<String, usize>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sample; fails on duplicate names
    pub fn add_sample(&mut self, name: &str) -> Result<usize> {
        if self.sample_ids.contains_key(name) {
            bail!("sample {} already present in the collection", name);
        }
        let id = self.samples.len();
        self.sample_ids.insert(name.to_string(), id);
        self.samples.push(SampleDesc {
            name: name.to_string(),
            contigs: Vec::new(),
        });
        Ok(id)
    }

    /// Register a contig under a sample; returns its index within the sample
    pub fn add_contig(&mut self, sample_id: usize, name: &str) -> usize {
        let contigs = &mut self.samples[sample_id].contigs;
        contigs.push(ContigDesc {
            name: name.to_string(),
            segments: Vec::new(),
        });
        contigs.len() - 1
    }

    /// Append a segment descriptor to a contig
    pub fn add_segment(&mut self, sample_id: usize, contig_id: usize, desc: SegmentDesc) {
        self.samples[sample_id].contigs[contig_id].segments.push(desc);
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn samples(&self) -> &[SampleDesc] {
        &self.samples
    }

    pub fn sample_id(&self, name: &str) -> Option<usize> {
        self.sample_ids.get(name).copied()
    }

    pub fn sample(&self, sample_id: usize) -> &SampleDesc {
        &self.samples[sample_id]
    }

    /// Find a contig by name within one sample
    pub fn find_contig(&self, sample: &str, contig: &str) -> Option<&ContigDesc> {
        let &sid = self.sample_ids.get(sample)?;
        self.samples[sid].contigs.iter().find(|c| c.name == contig)
    }

    /// Find a contig by name across all samples (first match in sample order)
    pub fn find_contig_any_sample(&self, contig: &str) -> Option<(&str, &ContigDesc)> {
        for sample in &self.samples {
            if let Some(c) = sample.contigs.iter().find(|c| c.name == contig) {
                return Some((sample.name.as_str(), c));
            }
        }
        None
    }

    /// Serialize the directory into a byte buffer
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut prev_group: i64 = 0;

        encode_varint(&mut buf, self.samples.len() as u64);
        for sample in &self.samples {
            encode_varint(&mut buf, sample.name.len() as u64);
            buf.extend_from_slice(sample.name.as_bytes());
            encode_varint(&mut buf, sample.contigs.len() as u64);
            for contig in &sample.contigs {
                encode_varint(&mut buf, contig.name.len() as u64);
                buf.extend_from_slice(contig.name.as_bytes());
                encode_varint(&mut buf, contig.segments.len() as u64);
                for seg in &contig.segments {
                    let delta = seg.group_id as i64 - prev_group;
                    prev_group = seg.group_id as i64;
                    encode_varint(&mut buf, zigzag_encode(delta));
                    encode_varint(&mut buf, seg.in_group_id as u64);
                    encode_varint(&mut buf, seg.raw_len as u64);
                    encode_varint(&mut buf, seg.is_ref as u64);
                }
            }
        }
        buf
    }

    /// Rebuild a directory from [`Collection::serialize`] output
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let mut pos = 0usize;
        let next = |pos: &mut usize| -> Result<u64> {
            let (v, used) = decode_varint(&data[*pos..]).context("collection data truncated")?;
            *pos += used;
            Ok(v)
        };
        let next_string = |pos: &mut usize| -> Result<String> {
            let (len, used) = decode_varint(&data[*pos..]).context("collection data truncated")?;
            *pos += used;
            let end = *pos + len as usize;
            if end > data.len() {
                bail!("collection data truncated");
            }
            let s = String::from_utf8(data[*pos..end].to_vec())
                .context("collection name is not UTF-8")?;
            *pos = end;
            Ok(s)
        };

        let mut collection = Collection::new();
        let mut prev_group: i64 = 0;

        let n_samples = next(&mut pos)?;
        for _ in 0..n_samples {
            let sample_name = next_string(&mut pos)?;
            let sample_id = collection.add_sample(&sample_name)?;
            let n_contigs = next(&mut pos)?;
            for _ in 0..n_contigs {
                let contig_name = next_string(&mut pos)?;
                let contig_id = collection.add_contig(sample_id, &contig_name);
                let n_segments = next(&mut pos)?;
                for _ in 0..n_segments {
                    let delta = zigzag_decode(next(&mut pos)?);
                    let group_id = prev_group + delta;
                    if group_id < 0 || group_id > u32::MAX as i64 {
                        bail!("collection segment group id out of range");
                    }
                    prev_group = group_id;
                    let in_group_id = next(&mut pos)? as u32;
                    let raw_len = next(&mut pos)? as u32;
                    let is_ref = next(&mut pos)? != 0;
                    collection.add_segment(
                        sample_id,
                        contig_id,
                        SegmentDesc {
                            group_id: group_id as u32,
                            in_group_id,
                            raw_len,
                            is_ref,
                        },
                    );
                }
            }
        }

        Ok(collection)
    }
}
