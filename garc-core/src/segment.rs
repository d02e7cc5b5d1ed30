// Contig segmentation
// Contigs are cut into fixed-size blocks; each block is stored and decoded
// independently, which is what makes sub-range queries cheap.

/// Default segment size in bases
pub const DEFAULT_SEGMENT_SIZE: u32 = 60_000;

/// Half-open (start, end) bounds of each segment of a contig
pub fn segment_bounds(contig_len: usize, segment_size: usize) -> Vec<(usize, usize)> {
    assert!(segment_size > 0);
    let mut bounds = Vec::with_capacity(contig_len / segment_size + 1);
    let mut start = 0;
    while start < contig_len {
        let end = (start + segment_size).min(contig_len);
        bounds.push((start, end));
        start = end;
    }
    bounds
}

/// Locate the segments overlapping `[start, end)` of a contig whose stored
/// segment lengths are `seg_lens`. Returns `(first_seg, last_seg_exclusive,
/// offset_of_first_seg)`; None when the range is empty or out of bounds.
pub fn segments_for_range(
    seg_lens: &[u32],
    start: usize,
    end: usize,
) -> Option<(usize, usize, usize)> {
    if start >= end {
        return None;
    }
    let total: usize = seg_lens.iter().map(|&l| l as usize).sum();
    if end > total {
        return None;
    }

    let mut first = None;
    let mut offset = 0usize;
    let mut last = seg_lens.len();
    for (idx, &len) in seg_lens.iter().enumerate() {
        let seg_end = offset + len as usize;
        if first.is_none() && start < seg_end {
            first = Some((idx, offset));
        }
        if end <= seg_end {
            last = idx + 1;
            break;
        }
        offset = seg_end;
    }

    let (first, first_offset) = first?;
    Some((first, last, first_offset))
}
