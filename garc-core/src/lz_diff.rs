// LZ-diff codec
// Encodes a query contig as literals, N-run tokens, and back-references
// against a reference contig. Two token dialects coexist: V1 (legacy
// archives) and V2 (current); both share the hash-indexed matcher and
// differ only at token emission and parse points.

use garc_common::{hash::MurMur64Hash, types::Contig, N_SYMBOL, PAD_SYMBOL};
use thiserror::Error;

/// Default minimum back-reference length
pub const DEFAULT_MIN_MATCH_LEN: u32 = 18;

/// Distance between indexed reference positions. The sparse build trades
/// index memory for match quality; back-extension recovers sub-step
/// alignment of matches that start between indexed positions.
pub const HASHING_STEP: usize = if cfg!(feature = "sparse-index") { 4 } else { 1 };

const SPARSE_INDEX: bool = HASHING_STEP > 1;
const MAX_NO_TRIES: usize = 32;
const MIN_NRUN_LEN: u32 = 4;
const MAX_LOAD_FACTOR: f64 = 0.6;

/// Token byte introducing an N-run
const N_RUN_STARTER: u8 = 30;

const EMPTY_CELL16: u16 = u16::MAX;
const EMPTY_CELL32: u32 = u32::MAX;

/// Token dialect. V2 adds the identity literal `!`, the open-ended match,
/// and the empty encoding for a query equal to the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LzVersion {
    V1,
    V2,
}

/// Decoder failure; the archive layer treats any of these as corruption.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("encoded stream ends mid-token at offset {0}")]
    Truncated(usize),
    #[error("expected a digit at offset {0}")]
    MalformedInt(usize),
    #[error("match token at offset {0} addresses the reference out of range")]
    RefOutOfRange(usize),
    #[error("byte {byte:#04x} at offset {offset} is not a valid token")]
    InvalidToken { offset: usize, byte: u8 },
}

/// LZ-diff encoder/decoder bound to one reference contig.
///
/// `prepare` attaches the reference; the position index is built lazily on
/// the first call that needs it. `decode` uses neither the attached
/// reference nor the index and is a pure function of its arguments.
pub struct LzDiff {
    version: LzVersion,
    reference: Contig, // padded with key_len PAD symbols
    reference_len: usize,
    ht16: Vec<u16>,
    ht32: Vec<u32>,
    short_ht_ver: bool,
    ht_mask: u64,
    min_match_len: u32,
    key_len: u32,
    key_mask: u64,
    index_ready: bool,
}

impl LzDiff {
    pub fn new(version: LzVersion) -> Self {
        let mut lz = LzDiff {
            version,
            reference: Vec::new(),
            reference_len: 0,
            ht16: Vec::new(),
            ht32: Vec::new(),
            short_ht_ver: false,
            ht_mask: 0,
            min_match_len: DEFAULT_MIN_MATCH_LEN,
            key_len: 0,
            key_mask: 0,
            index_ready: false,
        };
        lz.update_key_params();
        lz
    }

    fn update_key_params(&mut self) {
        self.key_len = self.min_match_len - HASHING_STEP as u32 + 1;
        self.key_mask = if self.key_len >= 32 {
            !0u64
        } else {
            (1u64 << (2 * self.key_len)) - 1
        };
    }

    /// Change the minimum match length. Rejected (returns false) once a
    /// reference is attached or the index has been built; the value must be
    /// at least the hashing step.
    pub fn set_min_match_len(&mut self, min_match_len: u32) -> bool {
        if !self.reference.is_empty() || self.index_ready {
            return false;
        }
        if min_match_len < HASHING_STEP as u32 {
            return false;
        }
        self.min_match_len = min_match_len;
        self.update_key_params();
        true
    }

    pub fn version(&self) -> LzVersion {
        self.version
    }

    pub fn min_match_len(&self) -> u32 {
        self.min_match_len
    }

    /// Attach a reference contig. The table width is chosen here: 16-bit
    /// cells suffice while every stored position fits below the sentinel.
    pub fn prepare(&mut self, reference: &Contig) {
        self.short_ht_ver = reference.len() / HASHING_STEP < 65535;
        self.reference.clear();
        self.reference.extend_from_slice(reference);
        self.reference_len = reference.len();
        self.reference
            .resize(reference.len() + self.key_len as usize, PAD_SYMBOL);
        self.ht16.clear();
        self.ht32.clear();
        self.index_ready = false;
    }

    /// The attached reference without its padding
    pub fn get_reference(&self) -> Contig {
        self.reference[..self.reference_len].to_vec()
    }

    /// Build the index if it is not ready yet; idempotent.
    pub fn assure_index(&mut self) {
        if !self.index_ready {
            self.prepare_index();
        }
    }

    fn prepare_index(&mut self) {
        // Count positions whose window holds only valid symbols (and, in a
        // sparse build, whose index lands on the hashing grid).
        let mut n_keys: u64 = 0;
        let mut no_prev_valid: u32 = 0;
        let mut cnt_mod: u32 = 0;
        let key_len_mod = self.key_len % HASHING_STEP as u32;
        for &c in &self.reference {
            if c < 4 {
                no_prev_valid += 1;
            } else {
                no_prev_valid = 0;
            }
            cnt_mod += 1;
            if cnt_mod == HASHING_STEP as u32 {
                cnt_mod = 0;
            }
            if cnt_mod == key_len_mod && no_prev_valid >= self.key_len {
                n_keys += 1;
            }
        }

        let mut ht_size = (n_keys as f64 / MAX_LOAD_FACTOR) as u64;
        if ht_size == 0 {
            ht_size = 1;
        }
        while ht_size & (ht_size - 1) != 0 {
            ht_size &= ht_size - 1;
        }
        ht_size <<= 1;
        if ht_size < 8 {
            ht_size = 8;
        }
        self.ht_mask = ht_size - 1;

        if self.short_ht_ver {
            self.ht16.clear();
            self.ht16.resize(ht_size as usize, EMPTY_CELL16);
            self.make_index16();
        } else {
            self.ht32.clear();
            self.ht32.resize(ht_size as usize, EMPTY_CELL32);
            self.make_index32();
        }

        self.index_ready = true;
    }

    fn make_index16(&mut self) {
        let ref_size = self.reference.len();
        let mut i = 0usize;
        while i + (self.key_len as usize) < ref_size {
            if let Some(code) = self.get_code(&self.reference[i..]) {
                let mut pos = (MurMur64Hash::hash(code) & self.ht_mask) as usize;
                for _ in 0..MAX_NO_TRIES {
                    if self.ht16[pos] == EMPTY_CELL16 {
                        self.ht16[pos] = (i / HASHING_STEP) as u16;
                        break;
                    }
                    pos = (pos + 1) & self.ht_mask as usize;
                }
            }
            i += HASHING_STEP;
        }
    }

    fn make_index32(&mut self) {
        let ref_size = self.reference.len();
        let mut i = 0usize;
        while i + (self.key_len as usize) < ref_size {
            if let Some(code) = self.get_code(&self.reference[i..]) {
                let mut pos = (MurMur64Hash::hash(code) & self.ht_mask) as usize;
                for _ in 0..MAX_NO_TRIES {
                    if self.ht32[pos] == EMPTY_CELL32 {
                        self.ht32[pos] = (i / HASHING_STEP) as u32;
                        break;
                    }
                    pos = (pos + 1) & self.ht_mask as usize;
                }
            }
            i += HASHING_STEP;
        }
    }

    /// Pack the window at `seq` into a 2-bit code; None if any symbol in
    /// the window blocks matching.
    fn get_code(&self, seq: &[u8]) -> Option<u64> {
        let mut code = 0u64;
        for &sym in &seq[..self.key_len as usize] {
            if sym > 3 {
                return None;
            }
            code = (code << 2) | sym as u64;
        }
        Some(code)
    }

    /// Advance a window code by one position. Only valid when the previous
    /// position held a valid code and the scan did not jump.
    fn get_code_skip1(&self, prev_code: u64, seq: &[u8]) -> Option<u64> {
        let last = seq[self.key_len as usize - 1];
        if last > 3 {
            return None;
        }
        Some(((prev_code << 2) & self.key_mask) | last as u64)
    }

    /// Length of the N-run starting at `seq`, 0 if shorter than 3
    fn get_nrun_len(&self, seq: &[u8], max_len: usize) -> u32 {
        if seq.len() < 3 || seq[0] != N_SYMBOL || seq[1] != N_SYMBOL || seq[2] != N_SYMBOL {
            return 0;
        }
        let mut len = 3;
        while len < max_len && seq[len] == N_SYMBOL {
            len += 1;
        }
        len as u32
    }

    fn matching_length(s1: &[u8], s2: &[u8], max_len: usize) -> usize {
        let max = max_len.min(s1.len()).min(s2.len());
        let mut len = 0;
        while len < max && s1[len] == s2[len] {
            len += 1;
        }
        len
    }

    fn ht_cell(&self, pos: usize) -> Option<u32> {
        if self.short_ht_ver {
            let v = self.ht16[pos];
            (v != EMPTY_CELL16).then_some(v as u32)
        } else {
            let v = self.ht32[pos];
            (v != EMPTY_CELL32).then_some(v)
        }
    }

    /// Walk the probe chain and keep the candidate maximizing backward plus
    /// forward extension; candidates must beat the running best strictly, so
    /// ties resolve to the earlier probe. Returns (ref_pos, len_bck, len_fwd).
    fn find_best_match(
        &self,
        slot: u64,
        text: &[u8],
        text_pos: usize,
        max_len: usize,
        no_prev_literals: usize,
    ) -> Option<(u32, u32, u32)> {
        let mut best_ref_pos = 0u32;
        let mut best_len_bck = 0u32;
        let mut best_len_fwd = 0u32;
        let mut min_to_update = self.min_match_len as usize;

        let mut ht_pos = slot as usize;
        for _ in 0..MAX_NO_TRIES {
            let Some(cell) = self.ht_cell(ht_pos) else {
                break;
            };
            let h_pos = cell as usize * HASHING_STEP;

            let f_len = Self::matching_length(&text[text_pos..], &self.reference[h_pos..], max_len);
            if f_len >= self.key_len as usize {
                let max_back = no_prev_literals.min(h_pos);
                let mut b_len = 0usize;
                while b_len < max_back
                    && text[text_pos - b_len - 1] == self.reference[h_pos - b_len - 1]
                {
                    b_len += 1;
                }
                if b_len + f_len > min_to_update {
                    best_ref_pos = h_pos as u32;
                    best_len_bck = b_len as u32;
                    best_len_fwd = f_len as u32;
                    min_to_update = b_len + f_len;
                }
            }

            ht_pos = (ht_pos + 1) & self.ht_mask as usize;
        }

        if (best_len_bck + best_len_fwd) as usize >= self.min_match_len as usize {
            Some((best_ref_pos, best_len_bck, best_len_fwd))
        } else {
            None
        }
    }

    fn encode_literal(&self, sym: u8, encoded: &mut Vec<u8>) {
        // Symbols above 'Z' get the single-byte lowercase escape form so
        // every literal still costs exactly one byte.
        if sym < 26 {
            encoded.push(b'A' + sym);
        } else {
            encoded.push(b'a' + (sym - 26));
        }
    }

    fn encode_nrun(&self, len: u32, encoded: &mut Vec<u8>) {
        encoded.push(N_RUN_STARTER);
        append_int(encoded, (len - MIN_NRUN_LEN) as i64);
        encoded.push(N_SYMBOL);
    }

    fn encode_match(&self, ref_pos: u32, len: Option<u32>, pred_pos: u32, encoded: &mut Vec<u8>) {
        let dif_pos = ref_pos as i64 - pred_pos as i64;
        append_int(encoded, dif_pos);
        if let Some(match_len) = len {
            encoded.push(b',');
            append_int(encoded, (match_len - self.min_match_len) as i64);
        }
        encoded.push(b'.');
    }

    /// Rewrite trailing literals that agree with the reference just before
    /// `match_pos` to the identity literal. Only plain `A..Z` literals are
    /// considered; anything else ends the scan.
    fn rewrite_identity_literals(&self, match_pos: u32, encoded: &mut Vec<u8>) {
        let e_size = encoded.len();
        let mut scan = 1usize;
        while scan < e_size && scan < match_pos as usize {
            let c = encoded[e_size - scan];
            if !c.is_ascii_uppercase() {
                break;
            }
            if c - b'A' == self.reference[match_pos as usize - scan] {
                encoded[e_size - scan] = b'!';
            }
            scan += 1;
        }
    }

    /// Encode `text` against the attached reference
    pub fn encode(&mut self, text: &Contig) -> Contig {
        self.assure_index();

        let text_size = text.len();
        let mut encoded: Contig = Vec::with_capacity(text_size / 64);

        if self.version == LzVersion::V2
            && text_size == self.reference_len
            && text[..] == self.reference[..self.reference_len]
        {
            return encoded; // equal sequences
        }

        let mut i = 0usize;
        let mut pred_pos = 0u32;
        let mut no_prev_literals = 0usize;
        let mut x_prev: Option<u64> = None;

        while i + (self.key_len as usize) < text_size {
            let x = match x_prev {
                Some(prev) if self.version == LzVersion::V2 && no_prev_literals > 0 => {
                    self.get_code_skip1(prev, &text[i..])
                }
                _ => self.get_code(&text[i..]),
            };
            x_prev = x;

            let Some(code) = x else {
                let nrun_len = self.get_nrun_len(&text[i..], text_size - i);
                if nrun_len >= MIN_NRUN_LEN {
                    self.encode_nrun(nrun_len, &mut encoded);
                    i += nrun_len as usize;
                    no_prev_literals = 0;
                } else {
                    self.encode_literal(text[i], &mut encoded);
                    i += 1;
                    pred_pos += 1;
                    if SPARSE_INDEX {
                        no_prev_literals += 1;
                    }
                }
                continue;
            };

            let slot = MurMur64Hash::hash(code) & self.ht_mask;
            let max_len = text_size - i;

            match self.find_best_match(slot, text, i, max_len, no_prev_literals) {
                None => {
                    self.encode_literal(text[i], &mut encoded);
                    i += 1;
                    pred_pos += 1;
                    if SPARSE_INDEX {
                        no_prev_literals += 1;
                    }
                }
                Some((mut match_pos, len_bck, len_fwd)) => {
                    if len_bck > 0 {
                        // retract the literals the match extends over
                        encoded.truncate(encoded.len() - len_bck as usize);
                        i -= len_bck as usize;
                        pred_pos -= len_bck;
                        match_pos -= len_bck;
                    }

                    let total = len_bck + len_fwd;

                    if self.version == LzVersion::V2 && match_pos == pred_pos {
                        self.rewrite_identity_literals(match_pos, &mut encoded);
                    }

                    let open_ended = self.version == LzVersion::V2
                        && i + total as usize == text_size
                        && match_pos as usize + total as usize == self.reference_len;
                    let len = if open_ended { None } else { Some(total) };
                    self.encode_match(match_pos, len, pred_pos, &mut encoded);

                    pred_pos = match_pos + total;
                    i += total as usize;
                    no_prev_literals = 0;
                }
            }
        }

        while i < text_size {
            self.encode_literal(text[i], &mut encoded);
            i += 1;
        }

        encoded
    }

    fn is_literal(c: u8) -> bool {
        c.is_ascii_uppercase() || (b'a'..=b'f').contains(&c) || c == b'!'
    }

    fn literal_symbol(c: u8) -> u8 {
        if c.is_ascii_uppercase() {
            c - b'A'
        } else {
            26 + (c - b'a')
        }
    }

    /// Decode an encoded buffer against `reference` (unpadded). Pure in its
    /// arguments; needs no prior `prepare` and no index.
    pub fn decode(&self, reference: &Contig, encoded: &[u8]) -> Result<Contig, DecodeError> {
        if encoded.is_empty() {
            // V2 writes nothing for a query equal to the reference
            return Ok(match self.version {
                LzVersion::V2 => reference.clone(),
                LzVersion::V1 => Contig::new(),
            });
        }

        let mut decoded = Contig::new();
        let mut pred_pos = 0usize;
        let mut i = 0usize;

        while i < encoded.len() {
            let c = encoded[i];
            if Self::is_literal(c) {
                let sym = if c == b'!' {
                    if self.version != LzVersion::V2 {
                        return Err(DecodeError::InvalidToken { offset: i, byte: c });
                    }
                    *reference
                        .get(pred_pos)
                        .ok_or(DecodeError::RefOutOfRange(i))?
                } else {
                    Self::literal_symbol(c)
                };
                decoded.push(sym);
                pred_pos += 1;
                i += 1;
            } else if c == N_RUN_STARTER {
                i += 1;
                let (delta, used) = read_int(encoded, i)?;
                i += used;
                if delta < 0 {
                    return Err(DecodeError::MalformedInt(i));
                }
                if i >= encoded.len() {
                    return Err(DecodeError::Truncated(i));
                }
                i += 1; // run terminator
                let len = delta as usize + MIN_NRUN_LEN as usize;
                decoded.resize(decoded.len() + len, N_SYMBOL);
                // pred_pos deliberately not advanced, mirroring the encoder
            } else if c == b'-' || c.is_ascii_digit() {
                let token_start = i;
                let (raw_pos, used) = read_int(encoded, i)?;
                i += used;

                let signed_ref_pos = raw_pos + pred_pos as i64;
                if signed_ref_pos < 0 {
                    return Err(DecodeError::RefOutOfRange(token_start));
                }
                let ref_pos = signed_ref_pos as usize;

                if i >= encoded.len() {
                    return Err(DecodeError::Truncated(i));
                }

                let len = match encoded[i] {
                    b',' => {
                        i += 1;
                        let (raw_len, used) = read_int(encoded, i)?;
                        i += used;
                        if raw_len < 0 {
                            return Err(DecodeError::MalformedInt(i));
                        }
                        if i >= encoded.len() {
                            return Err(DecodeError::Truncated(i));
                        }
                        if encoded[i] != b'.' {
                            return Err(DecodeError::MalformedInt(i));
                        }
                        i += 1;
                        raw_len as usize + self.min_match_len as usize
                    }
                    b'.' => {
                        // open-ended match: copy to end of reference
                        if self.version != LzVersion::V2 {
                            return Err(DecodeError::MalformedInt(i));
                        }
                        i += 1;
                        if ref_pos > reference.len() {
                            return Err(DecodeError::RefOutOfRange(token_start));
                        }
                        reference.len() - ref_pos
                    }
                    _ => return Err(DecodeError::MalformedInt(i)),
                };

                let end = ref_pos
                    .checked_add(len)
                    .ok_or(DecodeError::RefOutOfRange(token_start))?;
                if end > reference.len() {
                    return Err(DecodeError::RefOutOfRange(token_start));
                }
                decoded.extend_from_slice(&reference[ref_pos..end]);
                pred_pos = end;
            } else {
                return Err(DecodeError::InvalidToken { offset: i, byte: c });
            }
        }

        Ok(decoded)
    }

    /// Byte cost of the encoding `encode` would produce, accumulated with a
    /// truncated scan. Returns early once the running cost exceeds `bound`.
    /// V1 has no fast path and simply encodes.
    pub fn estimate(&mut self, text: &Contig, bound: u32) -> u32 {
        self.assure_index();

        if self.version == LzVersion::V1 {
            return self.encode(text).len() as u32;
        }

        let text_size = text.len();

        if text_size == self.reference_len && text[..] == self.reference[..self.reference_len] {
            return 0; // equal sequences
        }

        let mut est_cost = 0u32;
        let mut i = 0usize;
        let mut pred_pos = 0u32;
        let mut no_prev_literals = 0usize;
        let mut x_prev: Option<u64> = None;

        while i + (self.key_len as usize) < text_size {
            if est_cost > bound {
                return est_cost;
            }

            let x = match x_prev {
                Some(prev) if no_prev_literals > 0 => self.get_code_skip1(prev, &text[i..]),
                _ => self.get_code(&text[i..]),
            };
            x_prev = x;

            let Some(code) = x else {
                let nrun_len = self.get_nrun_len(&text[i..], text_size - i);
                if nrun_len >= MIN_NRUN_LEN {
                    est_cost += Self::cost_nrun(nrun_len);
                    i += nrun_len as usize;
                    no_prev_literals = 0;
                } else {
                    est_cost += 1;
                    i += 1;
                    pred_pos += 1;
                    if SPARSE_INDEX {
                        no_prev_literals += 1;
                    }
                }
                continue;
            };

            let slot = MurMur64Hash::hash(code) & self.ht_mask;
            let max_len = text_size - i;

            match self.find_best_match(slot, text, i, max_len, no_prev_literals) {
                None => {
                    est_cost += 1;
                    i += 1;
                    pred_pos += 1;
                    if SPARSE_INDEX {
                        no_prev_literals += 1;
                    }
                }
                Some((match_pos, len_bck, len_fwd)) => {
                    let total = len_bck + len_fwd;
                    // match_pos is deliberately not adjusted by len_bck here;
                    // in the dense build len_bck is always zero and the count
                    // equals the exact encoding size.
                    let open_ended = i + total as usize == text_size
                        && match_pos as usize + total as usize == self.reference_len;
                    est_cost +=
                        self.cost_match(match_pos, if open_ended { None } else { Some(total) }, pred_pos);
                    pred_pos = match_pos + total;
                    i += total as usize;
                    no_prev_literals = 0;
                }
            }
        }

        est_cost + (text_size - i) as u32
    }

    fn uint_len(x: u32) -> u32 {
        if x < 10 {
            1
        } else if x < 100 {
            2
        } else if x < 1_000 {
            3
        } else if x < 10_000 {
            4
        } else if x < 100_000 {
            5
        } else if x < 1_000_000 {
            6
        } else if x < 10_000_000 {
            7
        } else {
            8
        }
    }

    fn sint_len(x: i32) -> u32 {
        if x >= 0 {
            Self::uint_len(x as u32)
        } else {
            1 + Self::uint_len((-x) as u32)
        }
    }

    fn cost_nrun(len: u32) -> u32 {
        2 + Self::uint_len(len - MIN_NRUN_LEN)
    }

    fn cost_match(&self, ref_pos: u32, len: Option<u32>, pred_pos: u32) -> u32 {
        let mut r = Self::sint_len(ref_pos as i32 - pred_pos as i32);
        if let Some(match_len) = len {
            r += 1 + Self::uint_len(match_len - self.min_match_len);
        }
        r + 1
    }

    fn int_len(x: u32) -> u32 {
        if x < 10 {
            1
        } else if x < 100 {
            2
        } else if x < 1_000 {
            3
        } else if x < 10_000 {
            4
        } else if x < 100_000 {
            5
        } else if x < 1_000_000 {
            6
        } else if x < 10_000_000 {
            7
        } else if x < 100_000_000 {
            8
        } else if x < 1_000_000_000 {
            9
        } else {
            10
        }
    }

    fn coding_cost_nrun(&self, len: u32) -> u32 {
        1 + Self::int_len(len - MIN_NRUN_LEN) + 1
    }

    fn coding_cost_match(&self, match_pos: u32, len: u32, pred_pos: u32) -> u32 {
        let dif_pos = match_pos as i32 - pred_pos as i32;
        let pos_digits = if dif_pos >= 0 {
            Self::int_len(dif_pos as u32)
        } else {
            Self::int_len((-dif_pos) as u32) + 1
        };
        pos_digits + Self::int_len(len - self.min_match_len) + 2
    }

    /// Per-base cost vector of length `text.len()`. Each emission's total
    /// byte cost lands on its first covered base (`prefix_costs`) or its
    /// last, with zeros on the remaining covered bases. Consumed by the
    /// segmentation planner to place break points.
    pub fn get_coding_cost_vector(&mut self, text: &Contig, prefix_costs: bool) -> Vec<u32> {
        self.assure_index();

        let text_size = text.len();
        let mut v_costs: Vec<u32> = Vec::with_capacity(text_size);

        let mut i = 0usize;
        let mut pred_pos = 0u32;
        let mut no_prev_literals = 0usize;
        let mut x_prev: Option<u64> = None;

        while i + (self.key_len as usize) < text_size {
            let x = match x_prev {
                Some(prev) if no_prev_literals > 0 => self.get_code_skip1(prev, &text[i..]),
                _ => self.get_code(&text[i..]),
            };
            x_prev = x;

            let Some(code) = x else {
                let nrun_len = self.get_nrun_len(&text[i..], text_size - i);
                if nrun_len >= MIN_NRUN_LEN {
                    let tc = self.coding_cost_nrun(nrun_len);
                    if prefix_costs {
                        v_costs.push(tc);
                        v_costs.resize(v_costs.len() + nrun_len as usize - 1, 0);
                    } else {
                        v_costs.resize(v_costs.len() + nrun_len as usize - 1, 0);
                        v_costs.push(tc);
                    }
                    i += nrun_len as usize;
                    no_prev_literals = 0;
                } else {
                    v_costs.push(1);
                    i += 1;
                    pred_pos += 1;
                    if SPARSE_INDEX {
                        no_prev_literals += 1;
                    }
                }
                continue;
            };

            let slot = MurMur64Hash::hash(code) & self.ht_mask;
            let max_len = text_size - i;

            match self.find_best_match(slot, text, i, max_len, no_prev_literals) {
                None => {
                    v_costs.push(1);
                    i += 1;
                    pred_pos += 1;
                    if SPARSE_INDEX {
                        no_prev_literals += 1;
                    }
                }
                Some((mut match_pos, len_bck, len_fwd)) => {
                    if len_bck > 0 {
                        v_costs.truncate(v_costs.len() - len_bck as usize);
                        i -= len_bck as usize;
                        pred_pos -= len_bck;
                        match_pos -= len_bck;
                    }

                    let total = len_bck + len_fwd;
                    let tc = self.coding_cost_match(match_pos, total, pred_pos);
                    if prefix_costs {
                        v_costs.push(tc);
                        v_costs.resize(v_costs.len() + total as usize - 1, 0);
                    } else {
                        v_costs.resize(v_costs.len() + total as usize - 1, 0);
                        v_costs.push(tc);
                    }

                    pred_pos = match_pos + total;
                    i += total as usize;
                    no_prev_literals = 0;
                }
            }
        }

        while i < text_size {
            v_costs.push(1);
            i += 1;
        }

        v_costs
    }
}

/// Append a signed integer in the codec's ASCII form
fn append_int(text: &mut Vec<u8>, mut x: i64) {
    if x == 0 {
        text.push(b'0');
        return;
    }
    if x < 0 {
        text.push(b'-');
        x = -x;
    }

    let start = text.len();
    while x > 0 {
        text.push(b'0' + (x % 10) as u8);
        x /= 10;
    }
    text[start..].reverse();
}

/// Read a signed ASCII integer at `pos`, returns (value, bytes_consumed)
fn read_int(data: &[u8], pos: usize) -> Result<(i64, usize), DecodeError> {
    let mut i = pos;
    let mut neg = false;
    if i < data.len() && data[i] == b'-' {
        neg = true;
        i += 1;
    }

    let digits_start = i;
    let mut x = 0i64;
    while i < data.len() && data[i].is_ascii_digit() {
        x = x
            .checked_mul(10)
            .and_then(|v| v.checked_add((data[i] - b'0') as i64))
            .ok_or(DecodeError::MalformedInt(i))?;
        i += 1;
    }
    if i == digits_start {
        return Err(if i >= data.len() {
            DecodeError::Truncated(i)
        } else {
            DecodeError::MalformedInt(i)
        });
    }

    Ok((if neg { -x } else { x }, i - pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_read_int_roundtrip() {
        for x in [0i64, 1, -1, 9, 10, -10, 123456, -987654] {
            let mut buf = Vec::new();
            append_int(&mut buf, x);
            let (y, used) = read_int(&buf, 0).unwrap();
            assert_eq!(x, y);
            assert_eq!(used, buf.len());
        }
    }

    #[test]
    fn test_literal_only_roundtrip() {
        let reference = vec![0, 0, 0, 1, 1, 1];
        let target = vec![0, 1, 2, 3];

        let mut lz = LzDiff::new(LzVersion::V2);
        lz.prepare(&reference);

        let encoded = lz.encode(&target);
        assert_eq!(encoded.len(), target.len());
        assert_eq!(lz.decode(&reference, &encoded).unwrap(), target);
    }

    #[test]
    fn test_identical_sequences_encode_empty() {
        let reference: Contig = (0..64).map(|i| (i % 4) as u8).collect();

        let mut lz = LzDiff::new(LzVersion::V2);
        lz.prepare(&reference);

        let encoded = lz.encode(&reference);
        assert!(encoded.is_empty());
        assert_eq!(lz.decode(&reference, &encoded).unwrap(), reference);
    }

    #[test]
    fn test_invalid_symbol_literal_escape() {
        use garc_common::INVALID_SYMBOL;
        let reference = vec![0, 1, 2, 3];
        let target = vec![0, INVALID_SYMBOL, 3];

        let mut lz = LzDiff::new(LzVersion::V2);
        lz.prepare(&reference);

        let encoded = lz.encode(&target);
        assert_eq!(encoded, b"AeD".to_vec());
        assert_eq!(lz.decode(&reference, &encoded).unwrap(), target);
    }

    #[test]
    fn test_index_width_selection() {
        let small: Contig = (0..100).map(|i| (i % 4) as u8).collect();
        let mut lz = LzDiff::new(LzVersion::V2);
        lz.prepare(&small);
        assert!(lz.short_ht_ver);

        let large: Contig = (0..70_000).map(|i| (i % 4) as u8).collect();
        lz.prepare(&large);
        assert_eq!(lz.short_ht_ver, 70_000 / HASHING_STEP < 65535);
    }
}
