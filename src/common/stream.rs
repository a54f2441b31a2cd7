// Copyright © 2018 Cormac O'Brien
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of this software
// and associated documentation files (the "Software"), to deal in the Software without
// restriction, including without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all copies or
// substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING
// BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! Sequential binary input used by the map loader.
//!
//! The loader never sees `io::Error`s. A stream that cannot be opened, or whose position was lost
//! by a failed seek, simply reads zero bytes, and it is up to the caller to notice that it got
//! fewer bytes than it asked for.

use std::{
    fs::File,
    io::{self, BufReader, Read, Seek, SeekFrom},
    path::Path,
};

/// A sequential byte source with absolute and relative seeking.
pub trait ByteStream {
    /// Reads up to `buf.len()` bytes into `buf`, returning the number of bytes actually read.
    ///
    /// Returns 0 if the stream is unusable. Never returns more than `buf.len()`.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Moves the read position to `offset`, measured from the start of the stream or, if
    /// `relative` is set, from the current position.
    fn seek(&mut self, offset: i64, relative: bool);
}

/// A `ByteStream` over any `Read + Seek` source.
#[derive(Debug)]
pub struct FileStream<R> {
    inner: Option<R>,

    // cleared by a failed seek, set again by the next successful one
    positioned: bool,
}

impl FileStream<BufReader<File>> {
    /// Opens the file at `path` for reading.
    ///
    /// If the file cannot be opened, the error is logged and the returned stream is unusable.
    pub fn open<P>(path: P) -> FileStream<BufReader<File>>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        match File::open(path) {
            Ok(f) => FileStream::new(BufReader::new(f)),
            Err(why) => {
                error!("error opening {}: {}", path.display(), why);
                FileStream {
                    inner: None,
                    positioned: false,
                }
            }
        }
    }
}

impl<R> FileStream<R>
where
    R: Read + Seek,
{
    pub fn new(reader: R) -> FileStream<R> {
        FileStream {
            inner: Some(reader),
            positioned: true,
        }
    }

    /// Returns `true` if the underlying source was opened successfully.
    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    /// Releases the underlying source. Subsequent reads return 0.
    pub fn close(&mut self) {
        self.inner = None;
    }
}

impl<R> ByteStream for FileStream<R>
where
    R: Read + Seek,
{
    fn read(&mut self, buf: &mut [u8]) -> usize {
        if !self.positioned {
            return 0;
        }

        let reader = match self.inner {
            Some(ref mut r) => r,
            None => return 0,
        };

        let mut total = 0;
        while total < buf.len() {
            match reader.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(why) => {
                    warn!("read failed after {} of {} bytes: {}", total, buf.len(), why);
                    break;
                }
            }
        }

        total
    }

    fn seek(&mut self, offset: i64, relative: bool) {
        let reader = match self.inner {
            Some(ref mut r) => r,
            None => return,
        };

        let pos = if relative {
            SeekFrom::Current(offset)
        } else if offset < 0 {
            warn!("seek to negative offset {}", offset);
            self.positioned = false;
            return;
        } else {
            SeekFrom::Start(offset as u64)
        };

        match reader.seek(pos) {
            Ok(_) => self.positioned = true,
            Err(why) => {
                warn!("seek to {:?} failed: {}", pos, why);
                self.positioned = false;
            }
        }
    }
}
