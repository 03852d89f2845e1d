use std::io::{Cursor, Write};

use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

use crate::error::StoreError;

/// Receives store entries during an export, keyed by root-relative path.
pub trait ArchiveSink {
    fn add_directory(&mut self, name: &str) -> Result<(), StoreError>;
    fn add_file(&mut self, name: &str, contents: &[u8]) -> Result<(), StoreError>;
}

/// In-memory zip archive, deflate level 9.
pub struct ZipSink {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
}

impl ZipSink {
    pub fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            options: SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(9)),
        }
    }

    pub fn finish(self) -> Result<Vec<u8>, StoreError> {
        let cursor = self.writer.finish().map_err(archive_err)?;
        Ok(cursor.into_inner())
    }
}

impl Default for ZipSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveSink for ZipSink {
    fn add_directory(&mut self, name: &str) -> Result<(), StoreError> {
        self.writer
            .add_directory(format!("{}/", name.trim_end_matches('/')), self.options)
            .map_err(archive_err)
    }

    fn add_file(&mut self, name: &str, contents: &[u8]) -> Result<(), StoreError> {
        self.writer
            .start_file(name, self.options)
            .map_err(archive_err)?;
        self.writer.write_all(contents)?;
        Ok(())
    }
}

fn archive_err(e: zip::result::ZipError) -> StoreError {
    StoreError::Archive(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn zip_sink_round_trips_entries() {
        let mut sink = ZipSink::new();
        sink.add_directory("ops").unwrap();
        sink.add_file("ops/deploy.sh", b"echo deploy\n").unwrap();
        sink.add_file("root.sh", b"echo root\n").unwrap();
        let bytes = sink.finish().unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 3);

        let mut body = String::new();
        archive
            .by_name("ops/deploy.sh")
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "echo deploy\n");
    }

    #[test]
    fn empty_archive_is_valid() {
        let bytes = ZipSink::new().finish().unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 0);
    }
}
