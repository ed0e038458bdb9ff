//! 三元组导入模块
//!
//! 从 N-Triples、CSV、JSON Lines 读取 RDF 三元组，供模式推断使用。
//! Malformed records are counted and skipped, never fatal.

use crate::error::{Error, Result};
use crate::metrics::global_metrics;
use crate::types::RdfTriple;
use rayon::prelude::*;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// 导入统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportStats {
    pub triples_read: usize,
    pub errors: usize,
    pub duration_ms: u64,
}

/// Input format, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripleFormat {
    NTriples,
    Csv,
    JsonLines,
}

impl TripleFormat {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "nt" | "ntriples" => Some(TripleFormat::NTriples),
            "csv" => Some(TripleFormat::Csv),
            "jsonl" | "ndjson" => Some(TripleFormat::JsonLines),
            _ => None,
        }
    }
}

/// JSON Lines record
#[derive(Debug, Deserialize)]
struct TripleRecord {
    subject: String,
    predicate: String,
    object: String,
}

/// 批量导入器
#[derive(Debug, Clone)]
pub struct TripleImporter {
    /// Parse N-Triples lines on the rayon pool above this many lines
    parallel_threshold: usize,
}

impl Default for TripleImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl TripleImporter {
    pub fn new() -> Self {
        Self {
            parallel_threshold: 10_000,
        }
    }

    pub fn with_parallel_threshold(mut self, lines: usize) -> Self {
        self.parallel_threshold = lines;
        self
    }

    /// Load a file, picking the format from its extension
    pub fn import_file<P: AsRef<Path>>(&self, path: P) -> Result<(Vec<RdfTriple>, ImportStats)> {
        let path = path.as_ref();
        let format = TripleFormat::from_path(path).ok_or_else(|| {
            Error::Import(format!("无法识别的文件格式: {}", path.display()))
        })?;
        match format {
            TripleFormat::NTriples => self.import_ntriples(path),
            TripleFormat::Csv => self.import_csv(path),
            TripleFormat::JsonLines => self.import_jsonl(path),
        }
    }

    /// 从 N-Triples 导入
    pub fn import_ntriples<P: AsRef<Path>>(&self, path: P) -> Result<(Vec<RdfTriple>, ImportStats)> {
        let start = Instant::now();
        let reader = BufReader::new(File::open(path)?);
        let lines: Vec<String> = reader.lines().collect::<std::io::Result<_>>()?;

        let parsed: Vec<Option<Result<RdfTriple>>> = if lines.len() > self.parallel_threshold {
            debug!(lines = lines.len(), "parsing N-Triples in parallel");
            lines.par_iter().map(|l| parse_ntriples_line(l)).collect()
        } else {
            lines.iter().map(|l| parse_ntriples_line(l)).collect()
        };

        let mut triples = Vec::with_capacity(parsed.len());
        let mut stats = ImportStats::default();
        for (line_no, result) in parsed.into_iter().enumerate() {
            match result {
                Some(Ok(triple)) => triples.push(triple),
                Some(Err(e)) => {
                    warn!(line = line_no + 1, error = %e, "skipping N-Triples line");
                    stats.errors += 1;
                }
                None => {}
            }
        }
        Ok(self.finish(triples, stats, start))
    }

    /// 从 CSV 导入（表头 subject,predicate,object）
    pub fn import_csv<P: AsRef<Path>>(&self, path: P) -> Result<(Vec<RdfTriple>, ImportStats)> {
        let start = Instant::now();
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(path)
            .map_err(|e| Error::Import(format!("CSV 打开失败: {}", e)))?;

        let mut triples = Vec::new();
        let mut stats = ImportStats::default();
        for (row, record) in reader.deserialize::<TripleRecord>().enumerate() {
            match record {
                Ok(r) => triples.push(RdfTriple::new(
                    strip_brackets(&r.subject),
                    strip_brackets(&r.predicate),
                    strip_brackets(&r.object),
                )),
                Err(e) => {
                    warn!(row = row + 2, error = %e, "skipping CSV row");
                    stats.errors += 1;
                }
            }
        }
        Ok(self.finish(triples, stats, start))
    }

    /// 从 JSON Lines 导入
    pub fn import_jsonl<P: AsRef<Path>>(&self, path: P) -> Result<(Vec<RdfTriple>, ImportStats)> {
        let start = Instant::now();
        let reader = BufReader::new(File::open(path)?);

        let mut triples = Vec::new();
        let mut stats = ImportStats::default();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TripleRecord>(&line) {
                Ok(r) => triples.push(RdfTriple::new(r.subject, r.predicate, r.object)),
                Err(e) => {
                    warn!(line = line_no + 1, error = %e, "skipping JSON line");
                    stats.errors += 1;
                }
            }
        }
        Ok(self.finish(triples, stats, start))
    }

    fn finish(
        &self,
        triples: Vec<RdfTriple>,
        mut stats: ImportStats,
        start: Instant,
    ) -> (Vec<RdfTriple>, ImportStats) {
        stats.triples_read = triples.len();
        stats.duration_ms = start.elapsed().as_millis() as u64;
        global_metrics().record_triples_loaded(triples.len() as u64);
        info!(
            triples = stats.triples_read,
            errors = stats.errors,
            duration_ms = stats.duration_ms,
            "triples loaded"
        );
        (triples, stats)
    }
}

fn strip_brackets(s: &str) -> String {
    s.strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(s)
        .to_string()
}

// ============================================================================
// N-Triples
// ============================================================================

/// Parse one N-Triples line. `None` for blank lines and comments.
pub fn parse_ntriples_line(line: &str) -> Option<Result<RdfTriple>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    Some(parse_statement(line))
}

fn parse_statement(line: &str) -> Result<RdfTriple> {
    let (subject, rest) = next_term(line)?;
    let (predicate, rest) = next_term(rest)?;
    let (object, rest) = next_term(rest)?;
    if rest.trim() != "." {
        return Err(Error::Import(format!("缺少结尾的 '.': {}", line)));
    }
    Ok(RdfTriple::new(subject, predicate, object))
}

/// Leading term of `input` and the remainder. Literals keep only their lexical form.
fn next_term(input: &str) -> Result<(String, &str)> {
    let input = input.trim_start();
    if let Some(rest) = input.strip_prefix('<') {
        let end = rest
            .find('>')
            .ok_or_else(|| Error::Import(format!("IRI 未闭合: {}", input)))?;
        return Ok((rest[..end].to_string(), &rest[end + 1..]));
    }
    if input.starts_with("_:") {
        let end = input.find(char::is_whitespace).unwrap_or(input.len());
        return Ok((input[..end].to_string(), &input[end..]));
    }
    if let Some(rest) = input.strip_prefix('"') {
        let mut value = String::new();
        let mut chars = rest.char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => return Ok((value, skip_literal_suffix(&rest[i + 1..]))),
                '\\' => match chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 'r')) => value.push('\r'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, other)) => value.push(other),
                    None => break,
                },
                _ => value.push(c),
            }
        }
        return Err(Error::Import(format!("字面量未闭合: {}", input)));
    }
    Err(Error::Import(format!("无法识别的项: {}", input)))
}

/// Skip `@lang` or `^^<datatype>` after a literal
fn skip_literal_suffix(rest: &str) -> &str {
    if let Some(tagged) = rest.strip_prefix('@') {
        let end = tagged.find(char::is_whitespace).unwrap_or(tagged.len());
        return &tagged[end..];
    }
    if let Some(typed) = rest.strip_prefix("^^<") {
        if let Some(end) = typed.find('>') {
            return &typed[end + 1..];
        }
    }
    rest
}

/// 从文件导入（按扩展名选择格式）
pub fn import_file<P: AsRef<Path>>(path: P) -> Result<(Vec<RdfTriple>, ImportStats)> {
    TripleImporter::new().import_file(path)
}
