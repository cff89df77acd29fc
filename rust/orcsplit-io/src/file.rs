use std::{
    fs::File,
    ops::Range,
    path::Path,
    sync::{Arc, OnceLock},
};

use bytes::{Bytes, BytesMut};

use crate::{ReadAt, verify};

/// A `ReadAt` over a local file.
///
/// The size is fetched lazily and cached: the file is expected to be immutable
/// for the lifetime of the reader.
pub struct FileReader {
    file: Arc<File>,
    size: OnceLock<u64>,
}

impl FileReader {
    pub fn new(file: impl Into<Arc<File>>) -> FileReader {
        FileReader {
            file: file.into(),
            size: Default::default(),
        }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<FileReader> {
        Ok(FileReader::new(File::open(path)?))
    }
}

impl FileReader {
    fn get_size(&self) -> std::io::Result<u64> {
        if let Some(&size) = self.size.get() {
            Ok(size)
        } else {
            let size = self.file.metadata()?.len();
            let _ = self.size.set(size);
            Ok(size)
        }
    }

    fn adjust_read_range(&self, range: Range<u64>) -> std::io::Result<Range<u64>> {
        let size = self.get_size()?;
        if range.start >= size || range.start == range.end {
            return Ok(0..0);
        }
        let range = range.start..std::cmp::min(range.end, size);
        Ok(range)
    }

    fn read_at_impl(file: &File, range: Range<u64>) -> std::io::Result<Bytes> {
        let len = (range.end - range.start) as usize;
        let mut buf = BytesMut::zeroed(len);
        file_read_at_exact(file, range.start, &mut buf)?;
        Ok(buf.freeze())
    }
}

impl ReadAt for FileReader {
    fn size(&self) -> std::io::Result<u64> {
        self.get_size()
    }

    fn read_at(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        verify!(range.end >= range.start);
        let range = self.adjust_read_range(range)?;
        if range.is_empty() {
            return Ok(Bytes::new());
        }
        Self::read_at_impl(&self.file, range)
    }
}

#[cfg(unix)]
pub fn file_read_at_exact(file: &File, pos: u64, buf: &mut [u8]) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;

    file.read_exact_at(buf, pos)
}

#[cfg(windows)]
pub fn file_read_at_exact(file: &File, mut pos: u64, mut buf: &mut [u8]) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;

    while !buf.is_empty() {
        match file.seek_read(buf, pos) {
            Ok(0) => break,
            Ok(n) => {
                buf = &mut buf[n..];
                pos += n as u64;
            }
            Err(e) => return Err(e),
        }
    }
    if !buf.is_empty() {
        return Err(std::io::ErrorKind::UnexpectedEof.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use crate::{ReadAt, file::FileReader};

    #[test]
    fn test_file_reader() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("test.bin");
        let mut file = std::fs::File::create(&path).expect("create file");
        for _ in 0..10 {
            file.write_all(b"abcdefgh").expect("write_all");
        }
        file.sync_all().expect("sync");

        let reader = FileReader::open(&path).expect("open file");
        assert_eq!(reader.size().unwrap(), 80);
        for pos in (0..80).step_by(8) {
            let buf = reader.read_at(pos..pos + 4).expect("read_at");
            assert_eq!(buf.as_ref(), b"abcd");
        }
        let tail = reader.read_at(76..200).expect("read_at past end");
        assert_eq!(tail.as_ref(), b"efgh");
        assert!(reader.read_at(100..120).unwrap().is_empty());
    }
}
