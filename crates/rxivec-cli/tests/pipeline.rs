//! Batch driver tests over temporary XML dumps.

use std::fs;
use std::path::{Path, PathBuf};

use rxivec_cli::pipeline::{gather_xml_files, run_metadata, ExtractionCache};
use rxivec_common::EmbeddingRecord;
use rxivec_store::{merge_files, read_metadata, write_embeddings};

fn article_xml(doi: &str, title: &str, with_abstract: bool) -> String {
    let abstract_block = if with_abstract {
        "<abstract><p>Results of the study.</p></abstract>"
    } else {
        ""
    };
    format!(
        r#"<?xml version="1.0"?>
<article>
  <front>
    <article-meta>
      <article-id pub-id-type="doi">{doi}</article-id>
      <title-group><article-title>{title}</article-title></title-group>
      <contrib-group>
        <contrib contrib-type="author">
          <name><surname>Doe</surname><given-names>Jane</given-names></name>
        </contrib>
      </contrib-group>
      {abstract_block}
    </article-meta>
  </front>
</article>"#
    )
}

fn write_article(dir: &Path, name: &str, doi: &str, with_abstract: bool) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, article_xml(doi, "A title", with_abstract)).unwrap();
    path
}

fn fixture_dump(dir: &Path) -> PathBuf {
    let input = dir.join("xml-dump");
    fs::create_dir(&input).unwrap();
    write_article(&input, "a.xml", "10.1101/a", true);
    write_article(&input, "b.xml", "10.1101/b", false); // no abstract → fails
    write_article(&input, "c.xml", "10.1101/c", true);
    input
}

#[tokio::test]
async fn test_metadata_run_writes_table_and_error_log() {
    let dir = tempfile::tempdir().unwrap();
    let input = fixture_dump(dir.path());
    let output = dir.path().join("metadata.parquet");
    let error_log = dir.path().join("errors.txt");

    let summary = run_metadata(&input, &output, &error_log, 1).await.unwrap();
    assert_eq!(summary.files, 3);
    assert_eq!(summary.records, 2);
    assert_eq!(summary.failures, 1);

    let mut records = read_metadata(&output).unwrap();
    records.sort_by(|a, b| a.id.cmp(&b.id));
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, "10.1101/a");
    assert_eq!(records[0].url, "https://doi.org/10.1101/a");
    assert_eq!(records[0].authors, "Doe Jane");
    assert_eq!(records[1].id, "10.1101/c");

    // One line for the one failed file, nothing else
    let log = fs::read_to_string(&error_log).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("Error processing file "));
    assert!(lines[0].contains("b.xml"));
}

#[tokio::test]
async fn test_parallel_matches_sequential() {
    let dir = tempfile::tempdir().unwrap();
    let input = fixture_dump(dir.path());

    let seq_out = dir.path().join("seq.parquet");
    let par_out = dir.path().join("par.parquet");
    run_metadata(&input, &seq_out, &dir.path().join("seq_errors.txt"), 1).await.unwrap();
    run_metadata(&input, &par_out, &dir.path().join("par_errors.txt"), 4).await.unwrap();

    let mut seq = read_metadata(&seq_out).unwrap();
    let mut par = read_metadata(&par_out).unwrap();
    seq.sort_by(|a, b| a.id.cmp(&b.id));
    par.sort_by(|a, b| a.id.cmp(&b.id));
    assert_eq!(seq, par);
}

#[tokio::test]
async fn test_repeat_runs_are_identical() {
    let dir = tempfile::tempdir().unwrap();
    let input = fixture_dump(dir.path());

    let first_out = dir.path().join("first.parquet");
    let second_out = dir.path().join("second.parquet");
    run_metadata(&input, &first_out, &dir.path().join("e1.txt"), 1).await.unwrap();
    run_metadata(&input, &second_out, &dir.path().join("e2.txt"), 1).await.unwrap();

    let mut first = read_metadata(&first_out).unwrap();
    let mut second = read_metadata(&second_out).unwrap();
    first.sort_by(|a, b| a.id.cmp(&b.id));
    second.sort_by(|a, b| a.id.cmp(&b.id));
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_empty_directory_still_writes_table() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("empty");
    fs::create_dir(&input).unwrap();
    let output = dir.path().join("metadata.parquet");

    let summary =
        run_metadata(&input, &output, &dir.path().join("errors.txt"), 1).await.unwrap();
    assert_eq!(summary.files, 0);
    assert_eq!(summary.records, 0);
    assert!(read_metadata(&output).unwrap().is_empty());
}

#[test]
fn test_gather_is_non_recursive_and_xml_only() {
    let dir = tempfile::tempdir().unwrap();
    write_article(dir.path(), "b.xml", "10.1101/b", true);
    write_article(dir.path(), "a.xml", "10.1101/a", true);
    fs::write(dir.path().join("notes.txt"), "not xml").unwrap();
    let nested = dir.path().join("nested");
    fs::create_dir(&nested).unwrap();
    write_article(&nested, "deep.xml", "10.1101/deep", true);

    let files = gather_xml_files(dir.path()).unwrap();
    let names: Vec<_> =
        files.iter().map(|p| p.file_name().unwrap().to_string_lossy().to_string()).collect();
    assert_eq!(names, vec!["a.xml", "b.xml"]);
}

#[test]
fn test_cache_parses_each_path_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_article(dir.path(), "a.xml", "10.1101/a", true);

    let mut cache = ExtractionCache::new();
    assert!(cache.get_or_extract(&path).is_ok());
    assert_eq!(cache.len(), 1);

    // Deleting the file proves the second request is served from the cache
    fs::remove_file(&path).unwrap();
    assert!(cache.get_or_extract(&path).is_ok());
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_metadata_then_merge_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let input = fixture_dump(dir.path());
    let metadata = dir.path().join("metadata.parquet");
    run_metadata(&input, &metadata, &dir.path().join("errors.txt"), 1).await.unwrap();

    // Embeddings table with one id shared with metadata, one not
    let embeddings = dir.path().join("embeddings.parquet");
    write_embeddings(
        &embeddings,
        &[
            EmbeddingRecord { id: "10.1101/a".to_string(), vector: vec![0.1, 0.2] },
            EmbeddingRecord { id: "10.1101/zzz".to_string(), vector: vec![0.3, 0.4] },
        ],
        2,
    )
    .unwrap();

    let merged = dir.path().join("merged.parquet");
    let summary = merge_files(&embeddings, &metadata, &merged).unwrap();
    assert_eq!(summary.merged_rows, 1);
}
