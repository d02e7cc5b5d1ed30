// FASTA genome I/O
// Reads plain or gzipped FASTA into symbol-coded contigs and writes
// line-wrapped FASTA back out.

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use garc_common::{ascii_from_symbols, symbol_from_ascii, Contig};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

/// Default FASTA line width on output
pub const DEFAULT_LINE_WIDTH: usize = 80;

/// FASTA reader producing symbol-coded contigs
pub struct GenomeIO<R> {
    reader: BufReader<R>,
    pending_header: Option<String>,
    line: String,
}

impl GenomeIO<Box<dyn Read>> {
    /// Open a FASTA file, transparently decoding gzip by file extension
    pub fn open(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
        let reader: Box<dyn Read> = if path.extension().is_some_and(|e| e == "gz") {
            Box::new(MultiGzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Ok(Self::new(reader))
    }
}

impl<R: Read> GenomeIO<R> {
    pub fn new(reader: R) -> Self {
        GenomeIO {
            reader: BufReader::with_capacity(4 << 20, reader),
            pending_header: None,
            line: String::new(),
        }
    }

    /// Read the next contig, converting bases to internal symbols.
    /// Returns None at end of input.
    pub fn read_contig_converted(&mut self) -> Result<Option<(String, Contig)>> {
        let header = match self.pending_header.take() {
            Some(h) => h,
            None => match self.next_header()? {
                Some(h) => h,
                None => return Ok(None),
            },
        };

        let mut contig = Contig::new();
        loop {
            self.line.clear();
            let n = self.reader.read_line(&mut self.line)?;
            if n == 0 {
                break;
            }
            let line = self.line.trim_end();
            if let Some(next) = line.strip_prefix('>') {
                self.pending_header = Some(contig_name(next));
                break;
            }
            contig.extend(line.bytes().map(symbol_from_ascii));
        }

        Ok(Some((header, contig)))
    }

    fn next_header(&mut self) -> Result<Option<String>> {
        loop {
            self.line.clear();
            let n = self.reader.read_line(&mut self.line)?;
            if n == 0 {
                return Ok(None);
            }
            let line = self.line.trim_end();
            if let Some(rest) = line.strip_prefix('>') {
                return Ok(Some(contig_name(rest)));
            }
        }
    }
}

/// Contig name is the first whitespace-delimited token of the header
fn contig_name(header: &str) -> String {
    header.split_whitespace().next().unwrap_or("").to_string()
}

/// FASTA writer with fixed line wrapping
pub struct GenomeWriter<W: Write> {
    writer: W,
    line_width: usize,
}

impl<W: Write> GenomeWriter<W> {
    pub fn new(writer: W, line_width: usize) -> Self {
        GenomeWriter {
            writer,
            line_width: line_width.max(1),
        }
    }

    pub fn write_contig(&mut self, name: &str, contig: &Contig) -> Result<()> {
        writeln!(self.writer, ">{}", name)?;
        let ascii = ascii_from_symbols(contig);
        for chunk in ascii.chunks(self.line_width) {
            self.writer.write_all(chunk)?;
            self.writer.write_all(b"\n")?;
        }
        Ok(())
    }

    pub fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_two_contigs() {
        let fasta = b">chr1 extra description\nACGT\nacgt\n>chr2\nNNNNACGT\n";
        let mut io = GenomeIO::new(Cursor::new(&fasta[..]));

        let (name, contig) = io.read_contig_converted().unwrap().unwrap();
        assert_eq!(name, "chr1");
        assert_eq!(contig, vec![0, 1, 2, 3, 0, 1, 2, 3]);

        let (name, contig) = io.read_contig_converted().unwrap().unwrap();
        assert_eq!(name, "chr2");
        assert_eq!(contig, vec![4, 4, 4, 4, 0, 1, 2, 3]);

        assert!(io.read_contig_converted().unwrap().is_none());
    }

    #[test]
    fn test_skips_leading_junk() {
        let fasta = b"; comment\n>only\nAC\n";
        let mut io = GenomeIO::new(Cursor::new(&fasta[..]));
        let (name, contig) = io.read_contig_converted().unwrap().unwrap();
        assert_eq!(name, "only");
        assert_eq!(contig, vec![0, 1]);
    }

    #[test]
    fn test_write_wraps_lines() {
        let contig: Contig = vec![0; 10];
        let mut out = Vec::new();
        {
            let mut w = GenomeWriter::new(&mut out, 4);
            w.write_contig("c", &contig).unwrap();
            w.finish().unwrap();
        }
        assert_eq!(out, b">c\nAAAA\nAAAA\nAA\n");
    }

    #[test]
    fn test_gzip_input() {
        use flate2::{write::GzEncoder, Compression};
        let mut gz = GzEncoder::new(Vec::new(), Compression::default());
        gz.write_all(b">g\nACGTN\n").unwrap();
        let packed = gz.finish().unwrap();

        let mut io = GenomeIO::new(MultiGzDecoder::new(Cursor::new(packed)));
        let (name, contig) = io.read_contig_converted().unwrap().unwrap();
        assert_eq!(name, "g");
        assert_eq!(contig, vec![0, 1, 2, 3, 4]);
    }
}
