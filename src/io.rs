//! CSV artifact I/O shared by every pipeline stage.
//!
//! Generalizes the teacher's `write_matrix_tsv` (gzip-if-suffixed, otherwise
//! plain `BufWriter<File>`) to this pipeline's artifacts: plaintext and
//! anonymized datasets, candidate-index side files, and the `.zip`-suffixed
//! candidate-pairs, encoded-identifier, and compared/matched-link tables.
//! Per spec §9's Open Question, a `.zip` suffix here means a raw DEFLATE
//! stream via `flate2`, not a full ZIP container — consistent with the
//! teacher's existing `flate2` dependency rather than pulling in a ZIP crate
//! for a single stage's artifacts.
//!
//! Every write goes to a sibling temp file first and is renamed into place
//! only once fully flushed, so a failure mid-write leaves no half-written
//! artifact at the final path (spec §7).

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::bitset::Bitset;
use crate::config::ENCODED_FIELDS;
use crate::error::{LinkError, Result};
use crate::matcher::{ComparedLink, EncodedRecord};
use crate::mondrian::Row;

fn is_compressed(path: &Path) -> bool {
    path.to_string_lossy().ends_with(".zip")
}

fn open_writer(path: &Path) -> Result<(Box<dyn Write>, std::path::PathBuf)> {
    let tmp = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|e| e.to_str()).unwrap_or("out")
    ));
    let file = File::create(&tmp)?;
    let writer: Box<dyn Write> = if is_compressed(path) {
        Box::new(BufWriter::new(DeflateEncoder::new(file, Compression::default())))
    } else {
        Box::new(BufWriter::new(file))
    };
    Ok((writer, tmp))
}

fn finish_writer(writer: Box<dyn Write>, tmp: std::path::PathBuf, dest: &Path) -> Result<()> {
    drop(writer);
    std::fs::rename(tmp, dest)?;
    Ok(())
}

fn open_reader(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path)?;
    if is_compressed(path) {
        Ok(Box::new(DeflateDecoder::new(BufReader::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Writes rows (each a `index` plus the named `columns`) as a headered CSV,
/// compressing if `path` is `.zip`-suffixed.
pub fn write_rows(path: impl AsRef<Path>, columns: &[String], rows: &[Row]) -> Result<()> {
    let path = path.as_ref();
    let (writer, tmp) = open_writer(path)?;
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header = vec!["index".to_string()];
    header.extend(columns.iter().cloned());
    csv_writer.write_record(&header)?;

    for row in rows {
        let mut record = vec![row.get("index").cloned().unwrap_or_default()];
        for col in columns {
            record.push(row.get(col).cloned().unwrap_or_default());
        }
        csv_writer.write_record(&record)?;
    }
    let writer = csv_writer.into_inner().map_err(|e| LinkError::invalid_input(e.to_string()))?;
    finish_writer(writer, tmp, path)
}

/// Reads a headered CSV back into `Row`s keyed by column name.
pub fn read_rows(path: impl AsRef<Path>) -> Result<Vec<Row>> {
    let reader = open_reader(path.as_ref())?;
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let row: Row = headers.iter().zip(record.iter()).map(|(h, v)| (h.to_string(), v.to_string())).collect();
        rows.push(row);
    }
    Ok(rows)
}

/// Writes a bare, headerless list of indices, one per line (spec §11 —
/// `candidate_records_index_A/B.csv`).
pub fn write_index_list(path: impl AsRef<Path>, indices: &HashSet<String>) -> Result<()> {
    let path = path.as_ref();
    let (writer, tmp) = open_writer(path)?;
    let mut csv_writer = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    let mut sorted: Vec<&String> = indices.iter().collect();
    sorted.sort();
    for idx in sorted {
        csv_writer.write_record([idx])?;
    }
    let writer = csv_writer.into_inner().map_err(|e| LinkError::invalid_input(e.to_string()))?;
    finish_writer(writer, tmp, path)
}

pub fn read_index_list(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let reader = open_reader(path.as_ref())?;
    let mut csv_reader = csv::ReaderBuilder::new().has_headers(false).from_reader(reader);
    let mut out = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        if let Some(idx) = record.get(0) {
            out.push(idx.to_string());
        }
    }
    Ok(out)
}

/// Writes candidate or matched link pairs with an `index_A,index_B` header.
pub fn write_pairs(path: impl AsRef<Path>, pairs: &[(String, String)]) -> Result<()> {
    let path = path.as_ref();
    let (writer, tmp) = open_writer(path)?;
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(["index_A", "index_B"])?;
    for (a, b) in pairs {
        csv_writer.write_record([a, b])?;
    }
    let writer = csv_writer.into_inner().map_err(|e| LinkError::invalid_input(e.to_string()))?;
    finish_writer(writer, tmp, path)
}

pub fn read_pairs(path: impl AsRef<Path>) -> Result<Vec<(String, String)>> {
    let reader = open_reader(path.as_ref())?;
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut out = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let a = record.get(0).unwrap_or_default().to_string();
        let b = record.get(1).unwrap_or_default().to_string();
        out.push((a, b));
    }
    Ok(out)
}

/// Writes a side's Bloom-encoded identifiers: `index` plus the six
/// [`ENCODED_FIELDS`] bit strings (spec §4.3, §11).
pub fn write_encoded_records(path: impl AsRef<Path>, records: &HashMap<String, EncodedRecord>) -> Result<()> {
    let path = path.as_ref();
    let (writer, tmp) = open_writer(path)?;
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header = vec!["index".to_string()];
    header.extend(ENCODED_FIELDS.iter().map(|f| f.to_string()));
    csv_writer.write_record(&header)?;

    let mut indices: Vec<&String> = records.keys().collect();
    indices.sort();
    for index in indices {
        let fields = &records[index];
        let mut record = vec![index.clone()];
        for field in ENCODED_FIELDS {
            record.push(fields[field].to_bit_string());
        }
        csv_writer.write_record(&record)?;
    }
    let writer = csv_writer.into_inner().map_err(|e| LinkError::invalid_input(e.to_string()))?;
    finish_writer(writer, tmp, path)
}

pub fn read_encoded_records(path: impl AsRef<Path>) -> Result<HashMap<String, EncodedRecord>> {
    let reader = open_reader(path.as_ref())?;
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let mut out = HashMap::new();
    for record in csv_reader.records() {
        let record = record?;
        let index = record.get(0).unwrap_or_default().to_string();
        let mut fields = EncodedRecord::new();
        for field in ENCODED_FIELDS {
            let pos = headers.iter().position(|h| h == field).ok_or_else(|| {
                LinkError::invalid_input(format!("encoded identifiers file missing column {field:?}"))
            })?;
            let bits = record.get(pos).unwrap_or_default();
            fields.insert(field.to_string(), Bitset::from_bit_string(bits));
        }
        out.insert(index, fields);
    }
    Ok(out)
}

/// Writes compared links: `index_A,index_B` plus one Dice-score column per
/// [`ENCODED_FIELDS`] entry (spec §4.5 phase one output).
pub fn write_compared_links(path: impl AsRef<Path>, compared: &[ComparedLink]) -> Result<()> {
    let path = path.as_ref();
    let (writer, tmp) = open_writer(path)?;
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header = vec!["index_A".to_string(), "index_B".to_string()];
    header.extend(ENCODED_FIELDS.iter().map(|f| f.to_string()));
    csv_writer.write_record(&header)?;

    for link in compared {
        let mut record = vec![link.index_a.clone(), link.index_b.clone()];
        record.extend(link.scores.iter().map(|s| s.to_string()));
        csv_writer.write_record(&record)?;
    }
    let writer = csv_writer.into_inner().map_err(|e| LinkError::invalid_input(e.to_string()))?;
    finish_writer(writer, tmp, path)
}

pub fn read_compared_links(path: impl AsRef<Path>) -> Result<Vec<ComparedLink>> {
    let reader = open_reader(path.as_ref())?;
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut out = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let index_a = record.get(0).unwrap_or_default().to_string();
        let index_b = record.get(1).unwrap_or_default().to_string();
        let scores: Vec<f64> = record
            .iter()
            .skip(2)
            .map(|v| v.parse().unwrap_or(0.0))
            .collect();
        out.push(ComparedLink { index_a, index_b, scores });
    }
    Ok(out)
}
