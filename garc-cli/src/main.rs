// garc CLI
// Create, extend, inspect, and extract from genome-collection archives

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use flate2::write::GzEncoder;
use flate2::Compression;
use garc_core::{
    Compressor, CompressorConfig, Decompressor, GenomeWriter, DEFAULT_LINE_WIDTH,
    DEFAULT_MIN_MATCH_LEN, DEFAULT_SEGMENT_SIZE, DEFAULT_ZSTD_LEVEL,
};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "garc")]
#[command(version, about = "Compressed archive for genome-assembly collections", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new archive from FASTA files (the first file becomes the
    /// reference collection)
    Create {
        /// Output archive path
        #[arg(short = 'o', long)]
        output: PathBuf,

        /// Input FASTA files, plain or gzipped
        inputs: Vec<PathBuf>,

        /// Read additional input paths from a file, one per line
        #[arg(short = 'i', long)]
        file_list: Option<PathBuf>,

        /// Segment size for splitting contigs
        #[arg(short = 's', long, default_value_t = DEFAULT_SEGMENT_SIZE)]
        segment_size: u32,

        /// Minimum match length for LZ encoding
        #[arg(short = 'm', long, default_value_t = DEFAULT_MIN_MATCH_LEN)]
        min_match_len: u32,

        /// ZSTD compression level for stored parts
        #[arg(short = 'c', long, default_value_t = DEFAULT_ZSTD_LEVEL)]
        compression_level: i32,

        /// Worker threads (0 = all cores)
        #[arg(short = 't', long, default_value_t = 0)]
        threads: usize,

        /// Verbosity level (0 = quiet)
        #[arg(short = 'v', long, default_value_t = 1)]
        verbosity: u32,
    },

    /// Produce a new archive from an existing one plus more FASTA files
    Append {
        /// Existing archive to extend
        input_archive: PathBuf,

        /// Output archive path
        #[arg(short = 'o', long)]
        output: PathBuf,

        /// Input FASTA files to add
        inputs: Vec<PathBuf>,

        /// Read additional input paths from a file, one per line
        #[arg(short = 'i', long)]
        file_list: Option<PathBuf>,

        /// ZSTD compression level for newly stored parts
        #[arg(short = 'c', long, default_value_t = DEFAULT_ZSTD_LEVEL)]
        compression_level: i32,

        /// Worker threads (0 = all cores)
        #[arg(short = 't', long, default_value_t = 0)]
        threads: usize,

        /// Verbosity level (0 = quiet)
        #[arg(short = 'v', long, default_value_t = 1)]
        verbosity: u32,
    },

    /// Extract every sample in the archive as FASTA
    Getcol {
        archive: PathBuf,

        /// Output file (default: stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Gzip the FASTA output at this level (1-9)
        #[arg(short = 'z', long)]
        gzip_level: Option<u32>,

        /// FASTA line width
        #[arg(short = 'l', long, default_value_t = DEFAULT_LINE_WIDTH)]
        line_width: usize,
    },

    /// Extract whole samples as FASTA
    Getset {
        archive: PathBuf,

        /// Sample names to extract
        #[arg(required = true)]
        samples: Vec<String>,

        /// Output file (default: stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Gzip the FASTA output at this level (1-9)
        #[arg(short = 'z', long)]
        gzip_level: Option<u32>,

        /// FASTA line width
        #[arg(short = 'l', long, default_value_t = DEFAULT_LINE_WIDTH)]
        line_width: usize,
    },

    /// Extract contigs; queries take the form NAME[@SAMPLE][:FROM-TO]
    /// with a zero-based half-open range
    Getctg {
        archive: PathBuf,

        /// Contig queries
        #[arg(required = true)]
        queries: Vec<String>,

        /// Output file (default: stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Gzip the FASTA output at this level (1-9)
        #[arg(short = 'z', long)]
        gzip_level: Option<u32>,

        /// FASTA line width
        #[arg(short = 'l', long, default_value_t = DEFAULT_LINE_WIDTH)]
        line_width: usize,
    },

    /// Print the name of the reference sample
    Listref { archive: PathBuf },

    /// List sample names in the archive
    Listset { archive: PathBuf },

    /// List contig names for the given samples (all samples when none given)
    Listctg {
        archive: PathBuf,
        samples: Vec<String>,
    },

    /// Print archive metadata
    Info { archive: PathBuf },
}

/// Derive a sample name from a file path by stripping genomic extensions
fn extract_sample_name(path: &Path) -> String {
    let mut name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string();

    let extensions = [".fa.gz", ".fasta.gz", ".fna.gz", ".fa", ".fasta", ".fna", ".gz"];
    for ext in &extensions {
        if let Some(stripped) = name.strip_suffix(ext) {
            name = stripped.to_string();
            break;
        }
    }
    name
}

/// Combine positional inputs with an optional file list
fn gather_inputs(inputs: Vec<PathBuf>, file_list: Option<PathBuf>) -> Result<Vec<PathBuf>> {
    let mut all = inputs;
    if let Some(list) = file_list {
        let file = File::open(&list)
            .with_context(|| format!("cannot open file list {}", list.display()))?;
        for line in BufReader::new(file).lines() {
            let line = line?;
            let line = line.trim();
            if !line.is_empty() {
                all.push(PathBuf::from(line));
            }
        }
    }
    if all.is_empty() {
        bail!("no input files given");
    }
    Ok(all)
}

fn configure_threads(threads: usize) {
    if threads > 0 {
        // ignore failure when a pool already exists
        let _ = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global();
    }
}

fn open_output(path: &Option<PathBuf>, gzip_level: Option<u32>) -> Result<Box<dyn Write>> {
    let base: Box<dyn Write> = match path {
        Some(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("cannot create {}", p.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    };
    Ok(match gzip_level {
        Some(level) => Box::new(GzEncoder::new(base, Compression::new(level.clamp(1, 9)))),
        None => base,
    })
}

/// Parse NAME[@SAMPLE][:FROM-TO]
fn parse_contig_query(query: &str) -> Result<(String, Option<String>, Option<(usize, usize)>)> {
    let (rest, range) = match query.rsplit_once(':') {
        Some((rest, range_str)) => {
            let (from, to) = range_str
                .split_once('-')
                .with_context(|| format!("bad range in query {}", query))?;
            let from: usize = from
                .parse()
                .with_context(|| format!("bad range start in query {}", query))?;
            let to: usize = to
                .parse()
                .with_context(|| format!("bad range end in query {}", query))?;
            (rest, Some((from, to)))
        }
        None => (query, None),
    };

    let (name, sample) = match rest.split_once('@') {
        Some((name, sample)) => (name.to_string(), Some(sample.to_string())),
        None => (rest.to_string(), None),
    };
    Ok((name, sample, range))
}

fn cmd_create(
    output: PathBuf,
    inputs: Vec<PathBuf>,
    file_list: Option<PathBuf>,
    segment_size: u32,
    min_match_len: u32,
    compression_level: i32,
    threads: usize,
    verbosity: u32,
) -> Result<()> {
    configure_threads(threads);
    let files = gather_inputs(inputs, file_list)?;

    let config = CompressorConfig {
        segment_size,
        min_match_len,
        zstd_level: compression_level,
        verbosity,
    };
    let mut compressor = Compressor::new(&output, config)?;
    for file in &files {
        let sample = extract_sample_name(file);
        compressor
            .add_fasta_file(&sample, file)
            .with_context(|| format!("cannot add {}", file.display()))?;
    }
    compressor.finalize()?;

    if verbosity > 0 {
        eprintln!(
            "wrote {} ({} samples, {} segment groups)",
            output.display(),
            compressor.n_samples(),
            compressor.n_groups()
        );
    }
    Ok(())
}

fn cmd_append(
    input_archive: PathBuf,
    output: PathBuf,
    inputs: Vec<PathBuf>,
    file_list: Option<PathBuf>,
    compression_level: i32,
    threads: usize,
    verbosity: u32,
) -> Result<()> {
    configure_threads(threads);
    let files = gather_inputs(inputs, file_list)?;

    let config = CompressorConfig {
        zstd_level: compression_level,
        verbosity,
        ..CompressorConfig::default()
    };
    let mut compressor = Compressor::from_archive(&input_archive, &output, config)?;
    for file in &files {
        let sample = extract_sample_name(file);
        compressor
            .add_fasta_file(&sample, file)
            .with_context(|| format!("cannot add {}", file.display()))?;
    }
    compressor.finalize()?;

    if verbosity > 0 {
        eprintln!(
            "wrote {} ({} samples, {} segment groups)",
            output.display(),
            compressor.n_samples(),
            compressor.n_groups()
        );
    }
    Ok(())
}

fn cmd_getcol(
    archive: PathBuf,
    output: Option<PathBuf>,
    gzip_level: Option<u32>,
    line_width: usize,
) -> Result<()> {
    let mut decomp = Decompressor::open(&archive)?;
    let mut writer = GenomeWriter::new(open_output(&output, gzip_level)?, line_width);
    for sample in decomp.list_samples() {
        for (name, contig) in decomp.get_sample(&sample)? {
            writer.write_contig(&name, &contig)?;
        }
    }
    writer.finish()
}

fn cmd_getset(
    archive: PathBuf,
    samples: Vec<String>,
    output: Option<PathBuf>,
    gzip_level: Option<u32>,
    line_width: usize,
) -> Result<()> {
    let mut decomp = Decompressor::open(&archive)?;
    let mut writer = GenomeWriter::new(open_output(&output, gzip_level)?, line_width);
    for sample in &samples {
        for (name, contig) in decomp.get_sample(sample)? {
            writer.write_contig(&name, &contig)?;
        }
    }
    writer.finish()
}

fn cmd_getctg(
    archive: PathBuf,
    queries: Vec<String>,
    output: Option<PathBuf>,
    gzip_level: Option<u32>,
    line_width: usize,
) -> Result<()> {
    let mut decomp = Decompressor::open(&archive)?;
    let mut writer = GenomeWriter::new(open_output(&output, gzip_level)?, line_width);
    for query in &queries {
        let (name, sample, range) = parse_contig_query(query)?;
        match range {
            None => {
                let contig = decomp.get_contig(sample.as_deref(), &name)?;
                writer.write_contig(&name, &contig)?;
            }
            Some((from, to)) => {
                let contig = decomp.get_contig_range(sample.as_deref(), &name, from, to)?;
                writer.write_contig(&format!("{}:{}-{}", name, from, to), &contig)?;
            }
        }
    }
    writer.finish()
}

fn cmd_listref(archive: PathBuf) -> Result<()> {
    let decomp = Decompressor::open(&archive)?;
    match decomp.reference_sample() {
        Some(name) => println!("{}", name),
        None => bail!("archive contains no samples"),
    }
    Ok(())
}

fn cmd_listset(archive: PathBuf) -> Result<()> {
    let decomp = Decompressor::open(&archive)?;
    for name in decomp.list_samples() {
        println!("{}", name);
    }
    Ok(())
}

fn cmd_listctg(archive: PathBuf, samples: Vec<String>) -> Result<()> {
    let decomp = Decompressor::open(&archive)?;
    let samples = if samples.is_empty() {
        decomp.list_samples()
    } else {
        samples
    };
    for sample in &samples {
        for contig in decomp.list_contigs(sample)? {
            println!("{}", contig);
        }
    }
    Ok(())
}

fn cmd_info(archive: PathBuf) -> Result<()> {
    let decomp = Decompressor::open(&archive)?;
    let n_contigs: usize = decomp
        .list_samples()
        .iter()
        .map(|s| decomp.list_contigs(s).map(|c| c.len()).unwrap_or(0))
        .sum();

    println!("producer       : {}", decomp.producer());
    println!("segment size   : {}", decomp.segment_size());
    println!("min match len  : {}", decomp.min_match_len());
    println!("lz dialect     : {:?}", decomp.lz_version());
    println!("samples        : {}", decomp.n_samples());
    println!("contigs        : {}", n_contigs);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Create {
            output,
            inputs,
            file_list,
            segment_size,
            min_match_len,
            compression_level,
            threads,
            verbosity,
        } => cmd_create(
            output,
            inputs,
            file_list,
            segment_size,
            min_match_len,
            compression_level,
            threads,
            verbosity,
        ),
        Commands::Append {
            input_archive,
            output,
            inputs,
            file_list,
            compression_level,
            threads,
            verbosity,
        } => cmd_append(
            input_archive,
            output,
            inputs,
            file_list,
            compression_level,
            threads,
            verbosity,
        ),
        Commands::Getcol {
            archive,
            output,
            gzip_level,
            line_width,
        } => cmd_getcol(archive, output, gzip_level, line_width),
        Commands::Getset {
            archive,
            samples,
            output,
            gzip_level,
            line_width,
        } => cmd_getset(archive, samples, output, gzip_level, line_width),
        Commands::Getctg {
            archive,
            queries,
            output,
            gzip_level,
            line_width,
        } => cmd_getctg(archive, queries, output, gzip_level, line_width),
        Commands::Listref { archive } => cmd_listref(archive),
        Commands::Listset { archive } => cmd_listset(archive),
        Commands::Listctg { archive, samples } => cmd_listctg(archive, samples),
        Commands::Info { archive } => cmd_info(archive),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_sample_name() {
        assert_eq!(extract_sample_name(Path::new("a/b/scerevisiae8.fa.gz")), "scerevisiae8");
        assert_eq!(extract_sample_name(Path::new("genome.fasta")), "genome");
        assert_eq!(extract_sample_name(Path::new("data.fa")), "data");
        assert_eq!(extract_sample_name(Path::new("plain")), "plain");
    }

    #[test]
    fn test_parse_contig_query() {
        assert_eq!(
            parse_contig_query("chr1").unwrap(),
            ("chr1".to_string(), None, None)
        );
        assert_eq!(
            parse_contig_query("chr1@hap1").unwrap(),
            ("chr1".to_string(), Some("hap1".to_string()), None)
        );
        assert_eq!(
            parse_contig_query("chr1@hap1:100-200").unwrap(),
            ("chr1".to_string(), Some("hap1".to_string()), Some((100, 200)))
        );
        assert_eq!(
            parse_contig_query("chr1:5-9").unwrap(),
            ("chr1".to_string(), None, Some((5, 9)))
        );
        assert!(parse_contig_query("chr1:5").is_err());
    }
}
