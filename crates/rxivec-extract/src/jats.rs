//! JATS (Journal Article Tag Suite) parser for preprint XML dumps.
//!
//! bioRxiv and medRxiv ship one JATS document per article. We pull out:
//!   abstract:  <abstract> descendant text, whitespace-normalized
//!   doi:       <article-id pub-id-type="doi">
//!   title:     <article-title> descendant text
//!   authors:   <contrib contrib-type="author"> / <name> part text,
//!              document order, joined ", "
//!
//! First occurrence wins for abstract, DOI and title; a reference list's
//! <article-title> elements come after the front matter and are never
//! reached. Contributors without a <name> (collaborations, consortia) are
//! skipped without failing the record.

use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{ExtractError, Result};
use rxivec_common::ArticleRecord;

/// Read and parse one article file.
pub fn extract_file(path: &Path) -> Result<ArticleRecord> {
    let data = std::fs::read_to_string(path)?;
    parse_article(&data)
}

/// Parse one JATS document into an [`ArticleRecord`].
///
/// Fails with [`ExtractError::MissingField`] when the abstract or DOI is
/// absent or empty; the caller drops the whole record in that case.
pub fn parse_article(xml: &str) -> Result<ArticleRecord> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    // State machine over the front matter
    let mut doi: Option<String> = None;
    let mut in_doi = false;
    let mut doi_buf = String::new();

    let mut title_frags: Vec<String> = Vec::new();
    let mut in_title = false;
    let mut title_done = false;

    let mut abstract_frags: Vec<String> = Vec::new();
    let mut abstract_depth = 0usize;
    let mut abstract_done = false;

    let mut authors: Vec<String> = Vec::new();
    let mut in_author = false;
    let mut author_named = false;
    let mut in_name = false;
    let mut name_frags: Vec<String> = Vec::new();

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"abstract" => {
                    if abstract_depth > 0 || !abstract_done {
                        abstract_depth += 1;
                    }
                }
                b"article-id" => {
                    if doi.is_none() && attr_eq(e, b"pub-id-type", b"doi") {
                        in_doi = true;
                        doi_buf.clear();
                    }
                }
                b"article-title" => {
                    if !title_done && abstract_depth == 0 {
                        in_title = true;
                    }
                }
                b"contrib" => {
                    if attr_eq(e, b"contrib-type", b"author") {
                        in_author = true;
                        author_named = false;
                    }
                }
                b"name" => {
                    if in_author && !author_named {
                        in_name = true;
                        name_frags.clear();
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                // Self-closing elements carry no text; an empty <abstract/>
                // still counts as "located but empty" and fails below.
                if e.name().as_ref() == b"abstract" && !abstract_done {
                    abstract_done = true;
                }
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().map_err(|e| ExtractError::Xml(e.to_string()))?;
                dispatch_text(
                    &text,
                    in_doi,
                    &mut doi_buf,
                    in_title,
                    &mut title_frags,
                    abstract_depth,
                    &mut abstract_frags,
                    in_name,
                    &mut name_frags,
                );
            }
            Ok(Event::CData(ref e)) => {
                let text = String::from_utf8_lossy(e).into_owned();
                dispatch_text(
                    &text,
                    in_doi,
                    &mut doi_buf,
                    in_title,
                    &mut title_frags,
                    abstract_depth,
                    &mut abstract_frags,
                    in_name,
                    &mut name_frags,
                );
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"abstract" => {
                    if abstract_depth > 0 {
                        abstract_depth -= 1;
                        if abstract_depth == 0 {
                            abstract_done = true;
                        }
                    }
                }
                b"article-id" => {
                    if in_doi {
                        in_doi = false;
                        let candidate = doi_buf.trim();
                        if !candidate.is_empty() {
                            doi = Some(candidate.to_string());
                        }
                    }
                }
                b"article-title" => {
                    if in_title {
                        in_title = false;
                        title_done = true;
                    }
                }
                b"name" => {
                    if in_name {
                        in_name = false;
                        if !name_frags.is_empty() {
                            authors.push(name_frags.join(" "));
                            author_named = true;
                        }
                    }
                }
                b"contrib" => in_author = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    let doi = doi.ok_or(ExtractError::MissingField("doi"))?;
    let abstract_text = abstract_frags.join(" ");
    if abstract_text.is_empty() {
        return Err(ExtractError::MissingField("abstract"));
    }

    Ok(ArticleRecord::new(
        doi,
        title_frags.join(" "),
        authors.join(", "),
        abstract_text,
    ))
}

/// Route one text fragment to whichever collector is active.
#[allow(clippy::too_many_arguments)]
fn dispatch_text(
    text: &str,
    in_doi: bool,
    doi_buf: &mut String,
    in_title: bool,
    title_frags: &mut Vec<String>,
    abstract_depth: usize,
    abstract_frags: &mut Vec<String>,
    in_name: bool,
    name_frags: &mut Vec<String>,
) {
    if in_doi {
        doi_buf.push_str(text.trim());
    }
    if in_title {
        push_fragment(title_frags, text);
    }
    if abstract_depth > 0 {
        push_fragment(abstract_frags, text);
    }
    if in_name {
        push_fragment(name_frags, text);
    }
}

/// Collapse a raw text node into a single-space-separated fragment.
fn push_fragment(frags: &mut Vec<String>, text: &str) {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if !normalized.is_empty() {
        frags.push(normalized);
    }
}

fn attr_eq(e: &BytesStart<'_>, key: &[u8], value: &[u8]) -> bool {
    e.attributes()
        .flatten()
        .any(|a| a.key.as_ref() == key && a.value.as_ref() == value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE: &str = r#"<?xml version="1.0"?>
<article xmlns:xlink="http://www.w3.org/1999/xlink">
  <front>
    <article-meta>
      <article-id pub-id-type="doi">10.1101/2024.01.01.573742</article-id>
      <title-group>
        <article-title>Single-cell atlas of the <italic>human</italic> cortex</article-title>
      </title-group>
      <contrib-group>
        <contrib contrib-type="author">
          <name><surname>Doe</surname><given-names>Jane</given-names></name>
        </contrib>
        <contrib contrib-type="author">
          <collab>Cortex Mapping Consortium</collab>
        </contrib>
        <contrib contrib-type="author">
          <name><surname>Smith</surname><given-names>John</given-names></name>
        </contrib>
        <contrib contrib-type="editor">
          <name><surname>Hidden</surname><given-names>Ed</given-names></name>
        </contrib>
      </contrib-group>
      <abstract>
        <sec><title>Background</title><p>Mapping the cortex at
        single-cell   resolution.</p></sec>
      </abstract>
    </article-meta>
  </front>
</article>"#;

    #[test]
    fn test_parse_full_article() {
        let rec = parse_article(ARTICLE).unwrap();
        assert_eq!(rec.id, "10.1101/2024.01.01.573742");
        assert_eq!(rec.url, "https://doi.org/10.1101/2024.01.01.573742");
        assert_eq!(rec.title, "Single-cell atlas of the human cortex");
        assert_eq!(
            rec.abstract_text,
            "Background Mapping the cortex at single-cell resolution."
        );
    }

    #[test]
    fn test_authors_keep_document_order_and_skip_unnamed() {
        let rec = parse_article(ARTICLE).unwrap();
        // The consortium has no <name> and the editor is not an author;
        // neither shifts the remaining order.
        assert_eq!(rec.authors, "Doe Jane, Smith John");
    }

    #[test]
    fn test_missing_abstract_fails_record() {
        let xml = r#"<article><front><article-meta>
            <article-id pub-id-type="doi">10.1101/x</article-id>
            <title-group><article-title>T</article-title></title-group>
        </article-meta></front></article>"#;
        let err = parse_article(xml).unwrap_err();
        assert!(matches!(err, ExtractError::MissingField("abstract")));
    }

    #[test]
    fn test_missing_doi_fails_record() {
        let xml = r#"<article><front><article-meta>
            <article-id pub-id-type="pmid">12345</article-id>
            <abstract><p>Text.</p></abstract>
        </article-meta></front></article>"#;
        let err = parse_article(xml).unwrap_err();
        assert!(matches!(err, ExtractError::MissingField("doi")));
    }

    #[test]
    fn test_empty_abstract_fails_record() {
        let xml = r#"<article><front><article-meta>
            <article-id pub-id-type="doi">10.1101/x</article-id>
            <abstract/>
        </article-meta></front></article>"#;
        assert!(parse_article(xml).is_err());
    }

    #[test]
    fn test_first_doi_wins() {
        let xml = r#"<article><front><article-meta>
            <article-id pub-id-type="doi">10.1101/first</article-id>
            <article-id pub-id-type="doi">10.1101/second</article-id>
            <abstract><p>Text.</p></abstract>
        </article-meta></front></article>"#;
        let rec = parse_article(xml).unwrap();
        assert_eq!(rec.id, "10.1101/first");
    }

    #[test]
    fn test_missing_title_is_tolerated() {
        let xml = r#"<article><front><article-meta>
            <article-id pub-id-type="doi">10.1101/x</article-id>
            <abstract><p>Text.</p></abstract>
        </article-meta></front></article>"#;
        let rec = parse_article(xml).unwrap();
        assert_eq!(rec.title, "");
        assert_eq!(rec.authors, "");
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let a = parse_article(ARTICLE).unwrap();
        let b = parse_article(ARTICLE).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_malformed_xml_fails() {
        assert!(matches!(
            parse_article("<article><abstract>unclosed"),
            Err(ExtractError::Xml(_))
        ));
    }
}
