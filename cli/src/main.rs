use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::exit;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use bam::codec::{binary, text};
use bam::header::Header;
use bam::index::{AlignmentIndex, BinningIndex};
use bam::indexer::{build_index, write_index_file};
use bam::iter::RegionIter;
use bam::record::Record;
use bam::region::resolve_tid;
use bam::stream::{bgzf, plain};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Suppress all but error-level logging
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a BAM file as SAM text on stdout
    View { bam_path: PathBuf },
    /// Convert SAM text on stdin/a file into a BAM file
    Sam2Bam {
        sam_path: Option<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Build a region-query index for a BAM file
    Index {
        bam_path: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Query a region against a BAM file and its index
    Query {
        bam_path: PathBuf,
        index_path: PathBuf,
        region: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let default_level = if cli.quiet { "error" } else { default_level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Commands::View { bam_path } => view(&bam_path),
        Commands::Sam2Bam { sam_path, output } => sam2bam(sam_path, &output),
        Commands::Index { bam_path, output } => {
            let out = output.unwrap_or_else(|| bam_path.with_extension("bam.bai"));
            index(&bam_path, &out)
        }
        Commands::Query {
            bam_path,
            index_path,
            region,
        } => query(&bam_path, &index_path, &region),
    }
}

fn write_or_broken_pipe(result: io::Result<()>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => exit(141),
        Err(e) => Err(e.into()),
    }
}

fn view(bam_path: &PathBuf) -> Result<()> {
    let file = File::open(bam_path).with_context(|| format!("opening {:?}", bam_path))?;
    let mut reader = bgzf::Reader::new(file).context("reading BGZF stream")?;
    let header = Header::read_binary(&mut reader).context("reading BAM header")?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    let mut rec = Record::default();
    let mut scratch = Vec::new();
    loop {
        let consumed = binary::read_record(&mut reader, &mut rec, &mut scratch)?;
        if consumed == 0 {
            break;
        }
        write_or_broken_pipe((|| -> io::Result<()> {
            text::format_record(&mut out, &header, &rec)?;
            writeln!(out)
        })())?;
    }
    write_or_broken_pipe(out.flush())
}

fn sam2bam(sam_path: Option<PathBuf>, output: &PathBuf) -> Result<()> {
    let lines: Vec<String> = match sam_path {
        Some(p) => BufReader::new(File::open(&p).with_context(|| format!("opening {:?}", p))?)
            .lines()
            .collect::<io::Result<_>>()?,
        None => io::stdin().lock().lines().collect::<io::Result<_>>()?,
    };

    let mut header_text = Vec::new();
    let mut record_lines = Vec::new();
    for line in &lines {
        if line.starts_with('@') {
            header_text.extend_from_slice(line.as_bytes());
            header_text.push(b'\n');
        } else if !line.is_empty() {
            record_lines.push(line);
        }
    }
    let header = Header::parse_text(&header_text);

    let out_file = File::create(output).with_context(|| format!("creating {:?}", output))?;
    let mut writer = bgzf::Writer::new(out_file);
    header.write_binary(&mut writer)?;

    let mut rec = Record::default();
    let mut scratch = Vec::new();
    for line in record_lines {
        text::parse_record(&header, line.as_bytes(), &mut rec)
            .with_context(|| format!("parsing record: {line}"))?;
        binary::write_record(&mut writer, &rec, &mut scratch)?;
    }
    writer.close().context("closing BGZF stream")?;
    Ok(())
}

fn index(bam_path: &PathBuf, output: &PathBuf) -> Result<()> {
    let file = File::open(bam_path).with_context(|| format!("opening {:?}", bam_path))?;
    let mut reader = bgzf::Reader::new(file).context("reading BGZF stream")?;
    let header = Header::read_binary(&mut reader).context("reading BAM header")?;

    let mut idx = BinningIndex::default();
    build_index(&mut reader, header.n_targets(), &mut idx)?;

    let mut out = BufWriter::new(
        File::create(output).with_context(|| format!("creating {:?}", output))?,
    );
    write_index_file(&mut out, &idx)?;
    out.flush()?;
    Ok(())
}

fn query(bam_path: &PathBuf, index_path: &PathBuf, region: &str) -> Result<()> {
    let file = File::open(bam_path).with_context(|| format!("opening {:?}", bam_path))?;
    let mut reader = bgzf::Reader::new(file).context("reading BGZF stream")?;
    let header = Header::read_binary(&mut reader).context("reading BAM header")?;

    let idx_file = File::open(index_path).with_context(|| format!("opening {:?}", index_path))?;
    let mut idx_reader = plain::Reader(BufReader::new(idx_file));
    let mut magic = [0u8; 4];
    io::Read::read_exact(&mut idx_reader, &mut magic).context("reading index magic")?;
    if &magic != b"BAI\x01" {
        anyhow::bail!("bad index magic in {:?}", index_path);
    }
    let idx = BinningIndex::load(&mut idx_reader).context("loading index")?;

    let (tid, begin, end) = resolve_tid(&header, region);
    if tid < 0 {
        anyhow::bail!("unrecognized reference in region {region:?}");
    }
    let chunks = idx.query(tid, begin, end);
    let mut region_iter = RegionIter::over_chunks(tid, begin, end, chunks);

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut rec = Record::default();
    let mut scratch = Vec::new();
    while region_iter.next(&mut reader, &mut rec, &mut scratch)? {
        write_or_broken_pipe((|| -> io::Result<()> {
            text::format_record(&mut out, &header, &rec)?;
            writeln!(out)
        })())?;
    }
    write_or_broken_pipe(out.flush())
}
