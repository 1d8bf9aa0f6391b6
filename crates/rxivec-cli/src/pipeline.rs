//! Batch driver: enumerate the XML dump, fan extraction (and optionally
//! embedding) out over the files, and persist one table per run.
//!
//! Execution strategy is configuration, not code: `workers = 1` walks the
//! files sequentially, anything higher runs extraction on a bounded pool
//! of blocking tasks with results gathered in completion order. Both
//! strategies produce the same output set for the same inputs; only row
//! order may differ.
//!
//! Per-file failures never stop a run. Each one becomes a line in the
//! error log and the file is absent from every downstream table.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, instrument, warn};

use rxivec_common::{ArticleRecord, EmbeddingRecord};
use rxivec_embed::SentenceEmbedder;
use rxivec_extract::extract_file;
use rxivec_store as store;

/// What a completed run did; logged and returned to the caller.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub files: usize,
    pub records: usize,
    pub failures: usize,
    pub elapsed_secs: f64,
}

/// All `*.xml` files directly inside `dir`, sorted. Non-recursive.
pub fn gather_xml_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("reading input directory {}", dir.display()))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("xml"))
                    .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

// ── Error log ─────────────────────────────────────────────────────────────────

/// Append-only run log, one line per failed input file.
pub struct ErrorLog {
    writer: BufWriter<File>,
}

impl ErrorLog {
    pub fn append(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { writer: BufWriter::new(file) })
    }

    pub fn record(&mut self, file: &Path, message: &str) -> std::io::Result<()> {
        writeln!(self.writer, "Error processing file {}: {}", file.display(), message)
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl Drop for ErrorLog {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

// ── Extraction cache ──────────────────────────────────────────────────────────

/// Per-run extraction memo: a path is parsed at most once per run, no
/// matter how often it is requested. Dropped with the run.
#[derive(Default)]
pub struct ExtractionCache {
    entries: HashMap<PathBuf, std::result::Result<ArticleRecord, String>>,
}

impl ExtractionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_extract(&mut self, path: &Path) -> &std::result::Result<ArticleRecord, String> {
        if !self.entries.contains_key(path) {
            let result = extract_file(path).map_err(|e| e.to_string());
            self.entries.insert(path.to_path_buf(), result);
        }
        &self.entries[path]
    }

    pub fn insert(&mut self, path: PathBuf, result: std::result::Result<ArticleRecord, String>) {
        self.entries.insert(path, result);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Driver ────────────────────────────────────────────────────────────────────

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb
}

/// Extract every file, logging failures, returning successes with their
/// source path in gather order (sequential) or completion order (pooled).
async fn extract_all(
    files: &[PathBuf],
    workers: usize,
    cache: &mut ExtractionCache,
    errors: &mut ErrorLog,
    pb: &ProgressBar,
) -> Result<(Vec<(PathBuf, ArticleRecord)>, usize)> {
    let mut extracted = Vec::new();
    let mut failures = 0usize;

    if workers <= 1 {
        for path in files {
            match cache.get_or_extract(path) {
                Ok(record) => extracted.push((path.clone(), record.clone())),
                Err(message) => {
                    errors.record(path, message)?;
                    failures += 1;
                }
            }
            pb.inc(1);
        }
    } else {
        // One pure task per file; no shared state between siblings.
        let mut stream = futures::stream::iter(files.iter().cloned())
            .map(|path| {
                tokio::task::spawn_blocking(move || {
                    let result = extract_file(&path).map_err(|e| e.to_string());
                    (path, result)
                })
            })
            .buffer_unordered(workers);

        while let Some(joined) = stream.next().await {
            let (path, result) = joined.context("extraction worker panicked")?;
            match &result {
                Ok(record) => extracted.push((path.clone(), record.clone())),
                Err(message) => {
                    errors.record(&path, message)?;
                    failures += 1;
                }
            }
            cache.insert(path, result);
            pb.inc(1);
        }
    }

    Ok((extracted, failures))
}

/// Metadata-only run: every parseable article becomes one row of the
/// metadata table.
#[instrument(skip_all, fields(input = %input.display()))]
pub async fn run_metadata(
    input: &Path,
    output: &Path,
    error_log: &Path,
    workers: usize,
) -> Result<RunSummary> {
    let t0 = Instant::now();
    let files = gather_xml_files(input)?;
    info!(files = files.len(), workers, "Extracting metadata from {}", input.display());

    let mut cache = ExtractionCache::new();
    let mut errors = ErrorLog::append(error_log)?;
    let pb = progress_bar(files.len() as u64);

    let (extracted, failures) = extract_all(&files, workers, &mut cache, &mut errors, &pb).await?;
    pb.finish_and_clear();
    errors.flush()?;

    let records: Vec<ArticleRecord> = extracted.into_iter().map(|(_, record)| record).collect();
    store::write_metadata(output, &records)
        .with_context(|| format!("writing {}", output.display()))?;

    let summary = RunSummary {
        files: files.len(),
        records: records.len(),
        failures,
        elapsed_secs: t0.elapsed().as_secs_f64(),
    };
    info!(
        records = summary.records,
        failures = summary.failures,
        "Metadata table written to {} in {:.1}s",
        output.display(),
        summary.elapsed_secs
    );
    Ok(summary)
}

/// Embedding run: extract, embed the abstracts of the successes in model
/// batches, write the embeddings table. A failed batch is logged per
/// affected file and skipped.
#[instrument(skip_all, fields(input = %input.display(), model = embedder.model_name()))]
pub async fn run_embed(
    input: &Path,
    output: &Path,
    error_log: &Path,
    workers: usize,
    embedder: &SentenceEmbedder,
) -> Result<RunSummary> {
    let t0 = Instant::now();
    let files = gather_xml_files(input)?;
    info!(files = files.len(), workers, "Embedding abstracts from {}", input.display());

    let mut cache = ExtractionCache::new();
    let mut errors = ErrorLog::append(error_log)?;
    let pb = progress_bar(files.len() as u64);
    let (extracted, mut failures) =
        extract_all(&files, workers, &mut cache, &mut errors, &pb).await?;
    pb.finish_and_clear();

    let pb = progress_bar(extracted.len() as u64);
    let mut embeddings: Vec<EmbeddingRecord> = Vec::with_capacity(extracted.len());
    for batch in extracted.chunks(embedder.batch_size()) {
        let texts: Vec<String> =
            batch.iter().map(|(_, record)| record.abstract_text.clone()).collect();
        match embedder.embed(&texts).await {
            Ok(vectors) => {
                for ((_, record), vector) in batch.iter().zip(vectors) {
                    embeddings.push(EmbeddingRecord { id: record.id.clone(), vector });
                }
            }
            Err(e) => {
                warn!("Embedding batch failed: {e} — skipping {} files", batch.len());
                for (path, _) in batch {
                    errors.record(path, &e.to_string())?;
                    failures += 1;
                }
            }
        }
        pb.inc(batch.len() as u64);
    }
    pb.finish_and_clear();
    errors.flush()?;

    store::write_embeddings(output, &embeddings, embedder.dimension())
        .with_context(|| format!("writing {}", output.display()))?;

    let summary = RunSummary {
        files: files.len(),
        records: embeddings.len(),
        failures,
        elapsed_secs: t0.elapsed().as_secs_f64(),
    };
    info!(
        records = summary.records,
        failures = summary.failures,
        dim = embedder.dimension(),
        "Embeddings table written to {} in {:.1}s",
        output.display(),
        summary.elapsed_secs
    );
    Ok(summary)
}
