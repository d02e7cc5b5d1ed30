// Archive compression pipeline
// Reads FASTA samples, cuts contigs into fixed-size segments, and stores
// each segment either as a group reference (zstd only) or as an LZ-diff
// delta against its group's reference (LZ, then zstd). The first sample
// lays down one group per (contig rank, segment rank); later samples reuse
// the group at the same position unless the estimator says the reference
// is a poor fit, in which case the segment founds a new group.

use crate::genome_io::GenomeIO;
use crate::lz_diff::{LzDiff, LzVersion};
use crate::segment::{segment_bounds, DEFAULT_SEGMENT_SIZE};
use crate::segment_compression::{compress_part, decompress_part, DEFAULT_ZSTD_LEVEL};
use ahash::AHashMap;
use anyhow::{bail, Context, Result};
use garc_common::{
    decode_varint, encode_varint, garc_version, seg_stream_name, Archive, Collection, Contig,
    PackedBlock, SegmentDesc, COLLECTION_STREAM, FILE_INFO_STREAM, PARAMS_STREAM,
};
use rayon::prelude::*;
use std::path::Path;

pub use crate::lz_diff::DEFAULT_MIN_MATCH_LEN;

#[derive(Debug, Clone)]
pub struct CompressorConfig {
    pub segment_size: u32,
    pub min_match_len: u32,
    pub zstd_level: i32,
    pub verbosity: u32,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        CompressorConfig {
            segment_size: DEFAULT_SEGMENT_SIZE,
            min_match_len: DEFAULT_MIN_MATCH_LEN,
            zstd_level: DEFAULT_ZSTD_LEVEL,
            verbosity: 1,
        }
    }
}

enum PendingOutcome {
    Delta(PackedBlock),
    /// Estimated cost exceeded the poor-fit bound; the payload becomes the
    /// reference of a fresh group instead.
    Fallback(Contig),
}

struct SegmentGroup {
    lz: LzDiff,
    stream_id: usize,
    pending: Option<Contig>,
    outcome: Option<Result<PendingOutcome>>,
}

enum JobKind {
    /// Segment already written as a new group's reference part
    Reference { group_id: u32, raw_len: u32 },
    /// Segment queued on a group, resolved after the parallel pass
    Delta { group_id: u32, raw_len: u32 },
}

struct Job {
    contig_id: usize,
    kind: JobKind,
}

/// Builds one archive; samples are added in order and the directory is
/// written by [`Compressor::finalize`].
pub struct Compressor {
    archive: Archive,
    collection: Collection,
    config: CompressorConfig,
    groups: Vec<SegmentGroup>,
    group_at: AHashMap<(u32, u32), u32>,
}

impl Compressor {
    pub fn new(path: &Path, config: CompressorConfig) -> Result<Self> {
        Ok(Compressor {
            archive: Archive::create(path)?,
            collection: Collection::new(),
            config,
            groups: Vec::new(),
            group_at: AHashMap::new(),
        })
    }

    /// Start a new archive from an existing one: parameters, directory, and
    /// every stored part carry over verbatim; further samples may then be
    /// added. Existing archives are never modified in place.
    pub fn from_archive(input: &Path, output: &Path, mut config: CompressorConfig) -> Result<Self> {
        let mut old = Archive::open(input)?;

        let params_sid = old
            .stream_id(PARAMS_STREAM)
            .context("archive has no params stream")?;
        let params = old.get_part(params_sid, 0)?;
        let (min_match_len, segment_size, lz_version) = parse_params(&params)?;
        if lz_version != LzVersion::V2 {
            bail!("appending to archives written with the V1 dialect is not supported");
        }
        config.min_match_len = min_match_len;
        config.segment_size = segment_size;

        let coll_sid = old
            .stream_id(COLLECTION_STREAM)
            .context("archive has no collection stream")?;
        let packed = old.get_part(coll_sid, 0)?;
        let collection = Collection::deserialize(&decompress_part(&packed)?)?;

        let mut new = Compressor::new(output, config)?;
        new.collection = collection;

        // carry over every group stream in id order
        let mut group_id = 0u32;
        loop {
            let name = seg_stream_name(group_id);
            let Some(old_sid) = old.stream_id(&name) else {
                break;
            };
            let new_sid = new.archive.register_stream(&name);

            let reference = decompress_part(&old.get_part(old_sid, 0)?)?;
            for part_id in 0..old.part_count(old_sid) {
                let raw_size = old.part_raw_size(old_sid, part_id);
                let data = old.get_part(old_sid, part_id)?;
                new.archive.add_part(new_sid, &data, raw_size)?;
            }

            let mut lz = LzDiff::new(LzVersion::V2);
            let accepted = lz.set_min_match_len(new.config.min_match_len);
            debug_assert!(accepted);
            lz.prepare(&reference);
            new.groups.push(SegmentGroup {
                lz,
                stream_id: new_sid,
                pending: None,
                outcome: None,
            });
            group_id += 1;
        }

        // rebuild the position-to-group map; the first sample to introduce
        // a position wins, exactly as during creation
        for sample in new.collection.samples() {
            for (contig_rank, contig) in sample.contigs.iter().enumerate() {
                for (seg_rank, seg) in contig.segments.iter().enumerate() {
                    new.group_at
                        .entry((contig_rank as u32, seg_rank as u32))
                        .or_insert(seg.group_id);
                }
            }
        }

        Ok(new)
    }

    /// Read a FASTA file (plain or gzipped) and add it as one sample
    pub fn add_fasta_file(&mut self, sample_name: &str, path: &Path) -> Result<()> {
        let mut reader = GenomeIO::open(path)?;
        let mut contigs = Vec::new();
        while let Some((name, contig)) = reader.read_contig_converted()? {
            contigs.push((name, contig));
        }
        self.add_sample_contigs(sample_name, contigs)
    }

    /// Add one sample given its contigs in order
    pub fn add_sample_contigs(
        &mut self,
        sample_name: &str,
        contigs: Vec<(String, Contig)>,
    ) -> Result<()> {
        let sample_id = self.collection.add_sample(sample_name)?;
        let mut jobs: Vec<Job> = Vec::new();

        // assign segments to groups; unseen positions found new groups
        for (contig_rank, (contig_name, contig)) in contigs.iter().enumerate() {
            let contig_id = self.collection.add_contig(sample_id, contig_name);
            let bounds = segment_bounds(contig.len(), self.config.segment_size as usize);
            for (seg_rank, &(start, end)) in bounds.iter().enumerate() {
                let payload = contig[start..end].to_vec();
                let raw_len = payload.len() as u32;
                let key = (contig_rank as u32, seg_rank as u32);

                if let Some(&group_id) = self.group_at.get(&key) {
                    debug_assert!(self.groups[group_id as usize].pending.is_none());
                    self.groups[group_id as usize].pending = Some(payload);
                    jobs.push(Job {
                        contig_id,
                        kind: JobKind::Delta { group_id, raw_len },
                    });
                } else {
                    let group_id = self.new_reference_group(&payload)?;
                    self.group_at.insert(key, group_id);
                    jobs.push(Job {
                        contig_id,
                        kind: JobKind::Reference { group_id, raw_len },
                    });
                }
            }
        }

        // encode queued segments; within one sample each group holds at
        // most one pending payload, so groups are independent
        let zstd_level = self.config.zstd_level;
        let min_match_len = self.config.min_match_len;
        self.groups.par_iter_mut().for_each(|group| {
            let Some(payload) = group.pending.take() else {
                return;
            };
            // a segment that cannot reach a 2:1 LZ gain against the group
            // reference founds its own group; tails shorter than a single
            // match are always stored as deltas
            let bound = payload.len() as u32 / 2;
            let poor_fit = payload.len() as u32 > min_match_len
                && group.lz.estimate(&payload, bound) > bound;
            group.outcome = Some(if poor_fit {
                Ok(PendingOutcome::Fallback(payload))
            } else {
                let encoded = group.lz.encode(&payload);
                compress_part(&encoded, zstd_level).map(PendingOutcome::Delta)
            });
        });

        // resolve outcomes and register segments in contig order
        for job in jobs {
            match job.kind {
                JobKind::Reference { group_id, raw_len } => {
                    self.collection.add_segment(
                        sample_id,
                        job.contig_id,
                        SegmentDesc {
                            group_id,
                            in_group_id: 0,
                            raw_len,
                            is_ref: true,
                        },
                    );
                }
                JobKind::Delta { group_id, raw_len } => {
                    let outcome = self.groups[group_id as usize]
                        .outcome
                        .take()
                        .expect("queued segment has no outcome")?;
                    match outcome {
                        PendingOutcome::Delta(packed) => {
                            let stream_id = self.groups[group_id as usize].stream_id;
                            let part_id =
                                self.archive.add_part(stream_id, &packed, raw_len as u64)?;
                            self.collection.add_segment(
                                sample_id,
                                job.contig_id,
                                SegmentDesc {
                                    group_id,
                                    in_group_id: part_id as u32,
                                    raw_len,
                                    is_ref: false,
                                },
                            );
                        }
                        PendingOutcome::Fallback(payload) => {
                            let new_group = self.new_reference_group(&payload)?;
                            self.collection.add_segment(
                                sample_id,
                                job.contig_id,
                                SegmentDesc {
                                    group_id: new_group,
                                    in_group_id: 0,
                                    raw_len,
                                    is_ref: true,
                                },
                            );
                        }
                    }
                }
            }
        }

        if self.config.verbosity > 0 {
            eprintln!(
                "added sample {} ({} contigs, {} groups total)",
                sample_name,
                contigs.len(),
                self.groups.len()
            );
        }

        Ok(())
    }

    fn new_reference_group(&mut self, payload: &Contig) -> Result<u32> {
        let group_id = self.groups.len() as u32;
        let stream_id = self.archive.register_stream(&seg_stream_name(group_id));
        let packed = compress_part(payload, self.config.zstd_level)?;
        self.archive.add_part(stream_id, &packed, payload.len() as u64)?;

        let mut lz = LzDiff::new(LzVersion::V2);
        let accepted = lz.set_min_match_len(self.config.min_match_len);
        debug_assert!(accepted);
        lz.prepare(payload);

        self.groups.push(SegmentGroup {
            lz,
            stream_id,
            pending: None,
            outcome: None,
        });
        Ok(group_id)
    }

    pub fn n_samples(&self) -> usize {
        self.collection.n_samples()
    }

    pub fn n_groups(&self) -> usize {
        self.groups.len()
    }

    /// Write the params, file-info, and collection streams, then the
    /// archive directory
    pub fn finalize(&mut self) -> Result<()> {
        let mut params = Vec::new();
        encode_varint(&mut params, self.config.min_match_len as u64);
        encode_varint(&mut params, self.config.segment_size as u64);
        encode_varint(&mut params, 2); // token dialect written by this version
        let sid = self.archive.register_stream(PARAMS_STREAM);
        self.archive.add_part(sid, &params, params.len() as u64)?;

        let info = garc_version();
        let sid = self.archive.register_stream(FILE_INFO_STREAM);
        self.archive.add_part(sid, info.as_bytes(), info.len() as u64)?;

        let serialized = self.collection.serialize();
        let packed = compress_part(&serialized, self.config.zstd_level)?;
        let sid = self.archive.register_stream(COLLECTION_STREAM);
        self.archive.add_part(sid, &packed, serialized.len() as u64)?;

        self.archive.finalize()
    }
}

/// Parse the params stream: (min_match_len, segment_size, dialect)
pub(crate) fn parse_params(data: &[u8]) -> Result<(u32, u32, LzVersion)> {
    let mut pos = 0usize;
    let next = |pos: &mut usize| -> Result<u64> {
        let (v, used) = decode_varint(&data[*pos..]).context("params stream truncated")?;
        *pos += used;
        Ok(v)
    };
    let min_match_len = next(&mut pos)? as u32;
    let segment_size = next(&mut pos)? as u32;
    let version = match next(&mut pos)? {
        1 => LzVersion::V1,
        2 => LzVersion::V2,
        other => bail!("unknown LZ dialect {} in params stream", other),
    };
    Ok((min_match_len, segment_size, version))
}
