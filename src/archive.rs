//! Saving, extracting and combining historical emissions archives.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Writer};
use indicatif::{ProgressBar, ProgressStyle};
use tempfile::NamedTempFile;

use crate::error::{Error, Result};

const UTF8_BOM: &str = "\u{feff}";

/// Streams `body` into `target`, creating parent directories as needed.
///
/// Bytes go to a temporary file beside `target`, which only replaces
/// `target` once the whole body has been written.
pub(crate) fn save_stream<R: Read>(
    mut body: R,
    target: &Path,
    content_length: Option<u64>,
    progress: bool,
) -> Result<u64> {
    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;

    let pb = match content_length {
        Some(len) if progress => {
            let pb = ProgressBar::new(len);
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.green} {bytes}/{total_bytes} ({bytes_per_sec}) {wide_bar} {eta}",
            ) {
                pb.set_style(style.progress_chars("=>-"));
            }
            Some(pb)
        }
        _ => None,
    };

    let mut out = NamedTempFile::new_in(parent).map_err(|e| Error::io(parent, e))?;
    let mut written: u64 = 0;
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = match body.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                if let Some(pb) = &pb {
                    pb.abandon();
                }
                return Err(Error::io(target, e));
            }
        };
        out.write_all(&buf[..n]).map_err(|e| Error::io(target, e))?;
        written += n as u64;
        if let Some(pb) = &pb {
            pb.inc(n as u64);
        }
    }
    out.flush().map_err(|e| Error::io(target, e))?;
    out.persist(target).map_err(|e| Error::io(target, e.error))?;

    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }
    Ok(written)
}

/// Unpacks `archive` into `dest`.
pub(crate) fn extract(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive).map_err(|e| Error::io(archive, e))?;
    let mut zip = zip::ZipArchive::new(file)?;
    fs::create_dir_all(dest).map_err(|e| Error::io(dest, e))?;
    zip.extract(dest)?;
    tracing::debug!(
        archive = %archive.display(),
        entries = zip.len(),
        "extracted historical archive"
    );
    Ok(())
}

/// Merges every `*.csv` directly inside `dir` into `target`.
///
/// The header is the union of all input headers in first-seen order; each row
/// is re-mapped by column name and missing cells are left empty. The output
/// starts with a UTF-8 byte order mark.
pub(crate) fn concatenate_csv(dir: &Path, target: &Path) -> Result<PathBuf> {
    let mut inputs: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| Error::io(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    inputs.sort();

    let mut columns: Vec<String> = Vec::new();
    let mut tables: Vec<(Vec<usize>, Vec<StringRecord>)> = Vec::with_capacity(inputs.len());

    for path in &inputs {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let text = text.strip_prefix(UTF8_BOM).unwrap_or(&text);
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.as_bytes());

        let header = reader
            .headers()
            .map_err(|e| Error::io(path, e.into()))?
            .clone();
        if header.is_empty() {
            continue;
        }
        let mapping: Vec<usize> = header
            .iter()
            .map(|name| match columns.iter().position(|c| c == name) {
                Some(i) => i,
                None => {
                    columns.push(name.to_string());
                    columns.len() - 1
                }
            })
            .collect();
        let rows = reader
            .records()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::io(path, e.into()))?;
        tables.push((mapping, rows));
    }

    let mut out = File::create(target).map_err(|e| Error::io(target, e))?;
    out.write_all(UTF8_BOM.as_bytes())
        .map_err(|e| Error::io(target, e))?;

    let mut writer = Writer::from_writer(out);
    let mut row_count = 0usize;
    if !columns.is_empty() {
        writer
            .write_record(&columns)
            .map_err(|e| Error::io(target, e.into()))?;
        for (mapping, rows) in &tables {
            for row in rows {
                let mut cells = vec![""; columns.len()];
                for (value, &col) in row.iter().zip(mapping) {
                    cells[col] = value;
                }
                writer
                    .write_record(&cells)
                    .map_err(|e| Error::io(target, e.into()))?;
                row_count += 1;
            }
        }
    }
    writer.flush().map_err(|e| Error::io(target, e))?;

    tracing::debug!(
        files = inputs.len(),
        rows = row_count,
        target = %target.display(),
        "combined historical CSV files"
    );
    Ok(target.to_path_buf())
}
