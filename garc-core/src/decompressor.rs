// Archive extraction
// Opens an archive, exposes the directory, and reconstructs contigs or
// sub-ranges segment by segment. Only the segments overlapping a requested
// range are ever decompressed.

use crate::compressor::parse_params;
use crate::lz_diff::{LzDiff, LzVersion};
use crate::segment::segments_for_range;
use crate::segment_compression::decompress_part;
use ahash::AHashMap;
use anyhow::{bail, Context, Result};
use garc_common::{
    seg_stream_name, Archive, Collection, Contig, ContigDesc, SegmentDesc, COLLECTION_STREAM,
    FILE_INFO_STREAM, PARAMS_STREAM,
};
use std::path::Path;

pub struct Decompressor {
    archive: Archive,
    collection: Collection,
    min_match_len: u32,
    segment_size: u32,
    lz_version: LzVersion,
    producer: String,
    ref_cache: AHashMap<u32, Contig>,
}

impl Decompressor {
    pub fn open(path: &Path) -> Result<Self> {
        let mut archive = Archive::open(path)?;

        let params_sid = archive
            .stream_id(PARAMS_STREAM)
            .context("archive has no params stream")?;
        let params = archive.get_part(params_sid, 0)?;
        let (min_match_len, segment_size, lz_version) = parse_params(&params)?;

        let coll_sid = archive
            .stream_id(COLLECTION_STREAM)
            .context("archive has no collection stream")?;
        let packed = archive.get_part(coll_sid, 0)?;
        let collection = Collection::deserialize(&decompress_part(&packed)?)?;

        let producer = match archive.stream_id(FILE_INFO_STREAM) {
            Some(sid) => String::from_utf8_lossy(&archive.get_part(sid, 0)?).into_owned(),
            None => String::new(),
        };

        Ok(Decompressor {
            archive,
            collection,
            min_match_len,
            segment_size,
            lz_version,
            producer,
            ref_cache: AHashMap::new(),
        })
    }

    pub fn producer(&self) -> &str {
        &self.producer
    }

    pub fn min_match_len(&self) -> u32 {
        self.min_match_len
    }

    pub fn segment_size(&self) -> u32 {
        self.segment_size
    }

    pub fn lz_version(&self) -> LzVersion {
        self.lz_version
    }

    pub fn n_samples(&self) -> usize {
        self.collection.n_samples()
    }

    pub fn list_samples(&self) -> Vec<String> {
        self.collection
            .samples()
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }

    /// The sample whose segments founded the archive's groups
    pub fn reference_sample(&self) -> Option<&str> {
        self.collection.samples().first().map(|s| s.name.as_str())
    }

    pub fn list_contigs(&self, sample: &str) -> Result<Vec<String>> {
        let sid = self
            .collection
            .sample_id(sample)
            .with_context(|| format!("no sample {} in archive", sample))?;
        Ok(self
            .collection
            .sample(sid)
            .contigs
            .iter()
            .map(|c| c.name.clone())
            .collect())
    }

    fn contig_desc(&self, sample: Option<&str>, contig: &str) -> Result<ContigDesc> {
        match sample {
            Some(sample) => {
                self.collection
                    .sample_id(sample)
                    .with_context(|| format!("no sample {} in archive", sample))?;
                self.collection
                    .find_contig(sample, contig)
                    .cloned()
                    .with_context(|| format!("no contig {} in sample {}", contig, sample))
            }
            None => self
                .collection
                .find_contig_any_sample(contig)
                .map(|(_, c)| c.clone())
                .with_context(|| format!("no contig {} in archive", contig)),
        }
    }

    fn group_reference(&mut self, group_id: u32) -> Result<()> {
        if self.ref_cache.contains_key(&group_id) {
            return Ok(());
        }
        let stream_id = self
            .archive
            .stream_id(&seg_stream_name(group_id))
            .with_context(|| format!("archive has no stream for segment group {}", group_id))?;
        let packed = self.archive.get_part(stream_id, 0)?;
        let reference = decompress_part(&packed)?;
        self.ref_cache.insert(group_id, reference);
        Ok(())
    }

    fn decode_segment(&mut self, desc: &SegmentDesc) -> Result<Contig> {
        let stream_id = self
            .archive
            .stream_id(&seg_stream_name(desc.group_id))
            .with_context(|| format!("archive has no stream for segment group {}", desc.group_id))?;
        let packed = self.archive.get_part(stream_id, desc.in_group_id as usize)?;
        let payload = decompress_part(&packed)?;

        let segment = if desc.is_ref {
            payload
        } else {
            self.group_reference(desc.group_id)?;
            let reference = &self.ref_cache[&desc.group_id];
            let mut lz = LzDiff::new(self.lz_version);
            let accepted = lz.set_min_match_len(self.min_match_len);
            debug_assert!(accepted);
            lz.decode(reference, &payload).with_context(|| {
                format!(
                    "corrupt archive: segment group {} part {}",
                    desc.group_id, desc.in_group_id
                )
            })?
        };

        if segment.len() != desc.raw_len as usize {
            bail!(
                "corrupt archive: segment group {} part {} decodes to {} bases, directory says {}",
                desc.group_id,
                desc.in_group_id,
                segment.len(),
                desc.raw_len
            );
        }
        Ok(segment)
    }

    /// Reconstruct a whole contig
    pub fn get_contig(&mut self, sample: Option<&str>, contig: &str) -> Result<Contig> {
        let desc = self.contig_desc(sample, contig)?;
        let total: usize = desc.segments.iter().map(|s| s.raw_len as usize).sum();
        let mut out = Contig::with_capacity(total);
        for seg in &desc.segments {
            out.extend(self.decode_segment(seg)?);
        }
        Ok(out)
    }

    /// Reconstruct `[start, end)` of a contig, decoding only the segments
    /// the range overlaps
    pub fn get_contig_range(
        &mut self,
        sample: Option<&str>,
        contig: &str,
        start: usize,
        end: usize,
    ) -> Result<Contig> {
        let desc = self.contig_desc(sample, contig)?;
        let seg_lens: Vec<u32> = desc.segments.iter().map(|s| s.raw_len).collect();
        let (first, last, first_offset) = segments_for_range(&seg_lens, start, end)
            .with_context(|| format!("range {}-{} is outside contig {}", start, end, contig))?;

        let mut out = Contig::with_capacity(end - start);
        for seg in &desc.segments[first..last] {
            out.extend(self.decode_segment(seg)?);
        }
        let skip = start - first_offset;
        Ok(out[skip..skip + (end - start)].to_vec())
    }

    /// Reconstruct every contig of a sample, in order
    pub fn get_sample(&mut self, sample: &str) -> Result<Vec<(String, Contig)>> {
        let sid = self
            .collection
            .sample_id(sample)
            .with_context(|| format!("no sample {} in archive", sample))?;
        let sample_desc = self.collection.sample(sid).clone();

        let mut out = Vec::with_capacity(sample_desc.contigs.len());
        for contig in &sample_desc.contigs {
            let mut seq = Contig::new();
            for seg in &contig.segments {
                seq.extend(self.decode_segment(seg)?);
            }
            out.push((contig.name.clone(), seq));
        }
        Ok(out)
    }
}
