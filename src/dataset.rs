use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const BRANDS: &str = "brands.json";
pub const MODELS: &str = "brand_models.json";
pub const CATEGORIES: &str = "model_categories.json";
pub const PRODUCTS: &str = "products.json";
pub const ENHANCED: &str = "products_enhanced.json";

/// Load a whole stage dataset. Stage inputs are bounded (page-count sized),
/// so eager loading is fine here; the enrichment engine uses `ArrayStream`
/// instead.
pub fn read_array<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let records = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("invalid JSON array in {}", path.display()))?;
    Ok(records)
}

/// Write a stage dataset in one shot, pretty-printed.
pub fn write_array<T: Serialize>(path: impl AsRef<Path>, records: &[T]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

enum StreamState {
    Start,
    Items { first: bool },
    Done,
}

/// Lazy reader over a JSON array of objects: yields one record at a time
/// so memory stays bounded regardless of dataset size.
pub struct ArrayStream<R: Read> {
    reader: BufReader<R>,
    state: StreamState,
}

impl ArrayStream<File> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
        Ok(Self::new(file))
    }
}

impl<R: Read> ArrayStream<R> {
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            state: StreamState::Start,
        }
    }

    /// Skip whitespace, then return the next byte without consuming it.
    fn peek_nonspace(&mut self) -> std::io::Result<Option<u8>> {
        loop {
            let buf = self.reader.fill_buf()?;
            if buf.is_empty() {
                return Ok(None);
            }
            match buf.iter().position(|b| !b.is_ascii_whitespace()) {
                Some(pos) => {
                    let byte = buf[pos];
                    self.reader.consume(pos);
                    return Ok(Some(byte));
                }
                None => {
                    let len = buf.len();
                    self.reader.consume(len);
                }
            }
        }
    }

    fn bump(&mut self) {
        self.reader.consume(1);
    }

    fn fail(&mut self, err: anyhow::Error) -> Option<Result<Value>> {
        self.state = StreamState::Done;
        Some(Err(err))
    }
}

impl<R: Read> Iterator for ArrayStream<R> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if let StreamState::Start = self.state {
            match self.peek_nonspace() {
                Err(e) => return self.fail(e.into()),
                Ok(None) => return self.fail(anyhow::anyhow!("empty input, expected a JSON array")),
                Ok(Some(b'[')) => {
                    self.bump();
                    self.state = StreamState::Items { first: true };
                }
                Ok(Some(byte)) => {
                    return self.fail(anyhow::anyhow!(
                        "expected '[' at start of dataset, found {:?}",
                        byte as char
                    ))
                }
            }
        }

        let first = match self.state {
            StreamState::Done => return None,
            StreamState::Items { first } => first,
            StreamState::Start => unreachable!(),
        };

        match self.peek_nonspace() {
            Err(e) => return self.fail(e.into()),
            Ok(None) => return self.fail(anyhow::anyhow!("truncated dataset: missing ']'")),
            Ok(Some(b']')) => {
                self.bump();
                self.state = StreamState::Done;
                return None;
            }
            Ok(Some(b',')) if !first => {
                self.bump();
                match self.peek_nonspace() {
                    Err(e) => return self.fail(e.into()),
                    Ok(Some(b'{')) => {}
                    _ => return self.fail(anyhow::anyhow!("expected an object after ','")),
                }
            }
            Ok(Some(b'{')) if first => {}
            Ok(Some(byte)) => {
                return self.fail(anyhow::anyhow!(
                    "expected an object record, found {:?}",
                    byte as char
                ))
            }
        }

        // Objects are self-delimiting, so the deserializer consumes
        // exactly one record and leaves the separator in the buffer.
        let mut de = serde_json::Deserializer::from_reader(&mut self.reader);
        match Value::deserialize(&mut de) {
            Ok(value) => {
                self.state = StreamState::Items { first: false };
                Some(Ok(value))
            }
            Err(e) => self.fail(e.into()),
        }
    }
}

/// Incremental JSON array writer with crash-safe replacement semantics.
///
/// Records go to a sibling `<target>.tmp` file as a valid, growing array;
/// a crash mid-run leaves that file recognizably truncated and the target
/// untouched. `sync` is the durability checkpoint, `commit` closes the
/// container and atomically renames over the target. Dropping the writer
/// without committing removes the temp file.
pub struct ArrayWriter {
    writer: BufWriter<File>,
    tmp_path: PathBuf,
    target: PathBuf,
    count: usize,
    committed: bool,
}

impl ArrayWriter {
    pub fn create(target: impl Into<PathBuf>) -> Result<Self> {
        let target = target.into();
        let Some(file_name) = target.file_name().and_then(|n| n.to_str()) else {
            bail!("invalid dataset path {}", target.display());
        };
        let tmp_path = target.with_file_name(format!("{file_name}.tmp"));
        let file = File::create(&tmp_path)
            .with_context(|| format!("cannot create {}", tmp_path.display()))?;
        let mut out = Self {
            writer: BufWriter::new(file),
            tmp_path,
            target,
            count: 0,
            committed: false,
        };
        out.writer.write_all(b"[")?;
        Ok(out)
    }

    pub fn push(&mut self, record: &Value) -> Result<()> {
        let rendered = serde_json::to_string_pretty(record)?;
        let sep: &[u8] = if self.count == 0 { b"\n" } else { b",\n" };
        self.writer.write_all(sep)?;
        for (i, line) in rendered.lines().enumerate() {
            if i > 0 {
                self.writer.write_all(b"\n")?;
            }
            self.writer.write_all(b"  ")?;
            self.writer.write_all(line.as_bytes())?;
        }
        self.count += 1;
        Ok(())
    }

    /// Flush buffered records and fsync the temp file.
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Close the array and atomically replace the target. The target path
    /// only ever holds the old or the new complete content.
    pub fn commit(mut self) -> Result<()> {
        let closer: &[u8] = if self.count == 0 { b"]\n" } else { b"\n]\n" };
        self.writer.write_all(closer)?;
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        std::fs::rename(&self.tmp_path, &self.target).with_context(|| {
            format!(
                "cannot replace {} with {}",
                self.target.display(),
                self.tmp_path.display()
            )
        })?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for ArrayWriter {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.tmp_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collect(path: &Path) -> Vec<Value> {
        ArrayStream::open(path)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn stream_yields_records_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(
            &path,
            r#"[
  {"id": "1", "name": "a, with ] tricky [ text", "tags": ["x", "y"]},
  {"id": "2", "price": 1234.5, "nested": {"k": null}}
]"#,
        )
        .unwrap();

        let records = collect(&path);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["id"], "1");
        assert_eq!(records[1]["price"], 1234.5);
    }

    #[test]
    fn stream_handles_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        std::fs::write(&path, "[]\n").unwrap();
        assert!(collect(&path).is_empty());
    }

    #[test]
    fn truncated_array_surfaces_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cut.json");
        std::fs::write(&path, "[\n  {\"id\": \"1\"},\n  {\"id\": \"2\"}").unwrap();

        let results: Vec<_> = ArrayStream::open(&path).unwrap().collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert!(results[2].is_err());
    }

    #[test]
    fn commit_replaces_target_and_removes_temp() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.json");
        std::fs::write(&target, "[\n  {\"old\": true}\n]\n").unwrap();

        let mut writer = ArrayWriter::create(&target).unwrap();
        writer.push(&json!({"id": "1"})).unwrap();
        writer.sync().unwrap();
        writer.push(&json!({"id": "2"})).unwrap();
        writer.commit().unwrap();

        let records = collect(&target);
        assert_eq!(records.len(), 2);
        assert!(!dir.path().join("out.json.tmp").exists());
    }

    #[test]
    fn abandoned_writer_leaves_target_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.json");
        let original = "[\n  {\"old\": true}\n]\n";
        std::fs::write(&target, original).unwrap();

        {
            let mut writer = ArrayWriter::create(&target).unwrap();
            writer.push(&json!({"id": "1"})).unwrap();
            writer.sync().unwrap();
            // Dropped without commit, as an aborted run would.
        }

        assert_eq!(std::fs::read_to_string(&target).unwrap(), original);
        assert!(!dir.path().join("out.json.tmp").exists());
    }

    #[test]
    fn rewrite_of_own_output_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.json");
        let records = vec![
            json!({"id": "1", "price": 1234.5, "image_url": null}),
            json!({"id": "2", "specifications": {"Weight": "12 kg"}}),
        ];

        let mut writer = ArrayWriter::create(&target).unwrap();
        for r in &records {
            writer.push(r).unwrap();
        }
        writer.commit().unwrap();
        let first_pass = std::fs::read(&target).unwrap();

        let mut writer = ArrayWriter::create(&target).unwrap();
        for item in ArrayStream::open(&target).unwrap() {
            writer.push(&item.unwrap()).unwrap();
        }
        writer.commit().unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), first_pass);
    }

    #[test]
    fn empty_commit_writes_valid_array() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.json");
        ArrayWriter::create(&target).unwrap().commit().unwrap();
        assert!(collect(&target).is_empty());
    }
}
