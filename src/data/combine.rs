use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::thread;

use crossbeam_channel::{bounded, Receiver};

use crate::error::{Error, Result};

/// Default number of lines each reader may run ahead of the consumer.
pub const DEFAULT_CAPACITY: usize = 10;

/// Two line sources zipped line by line into `"{left}{delimiter}{right}"`.
///
/// Each side is read by its own producer thread into a bounded channel, so a
/// reader blocks once it is `capacity` lines ahead of the consumer. Blank lines
/// are dropped on both sides, matching [`RowStream`](super::RowStream), and
/// invalid UTF-8 is decoded lossily. The combined stream ends as soon as either
/// side ends.
pub struct CombinedLines {
    left: Receiver<Result<String>>,
    right: Receiver<Result<String>>,
    delimiter: char,
    done: bool,
}

impl CombinedLines {
    pub fn new<A, B>(
        left: A,
        left_name: impl Into<PathBuf>,
        right: B,
        right_name: impl Into<PathBuf>,
        delimiter: u8,
        capacity: usize,
    ) -> Result<Self>
    where
        A: BufRead + Send + 'static,
        B: BufRead + Send + 'static,
    {
        Ok(Self {
            left: spawn_reader(left, left_name.into(), capacity)?,
            right: spawn_reader(right, right_name.into(), capacity)?,
            delimiter: delimiter as char,
            done: false,
        })
    }
}

/// Open both files and combine them.
pub fn combine_files(
    left: impl AsRef<Path>,
    right: impl AsRef<Path>,
    delimiter: u8,
    capacity: usize,
) -> Result<CombinedLines> {
    let (left, right) = (left.as_ref(), right.as_ref());
    let open = |path: &Path| {
        File::open(path)
            .map(BufReader::new)
            .map_err(|e| Error::io(path, e))
    };
    CombinedLines::new(open(left)?, left, open(right)?, right, delimiter, capacity)
}

fn spawn_reader<R>(reader: R, name: PathBuf, capacity: usize) -> Result<Receiver<Result<String>>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = bounded(capacity.max(1));
    let thread_name = format!("lines:{}", name.display());
    thread::Builder::new()
        .name(thread_name)
        .spawn(move || {
            for line in reader.split(b'\n') {
                let line = match line {
                    Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => continue,
                    Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
                    Err(e) => Err(Error::io(&name, e)),
                };
                let failed = line.is_err();
                // consumer hung up
                if tx.send(line).is_err() || failed {
                    break;
                }
            }
        })
        .map_err(|e| Error::io("<thread spawn>", e))?;
    Ok(rx)
}

impl Iterator for CombinedLines {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match (self.left.recv(), self.right.recv()) {
            (Ok(Ok(left)), Ok(Ok(right))) => {
                let left = left.trim_end_matches('\r');
                let right = right.trim_end_matches('\r');
                Some(Ok(format!("{left}{}{right}", self.delimiter)))
            }
            (Ok(Err(e)), _) | (_, Ok(Err(e))) => {
                self.done = true;
                Some(Err(e))
            }
            _ => {
                self.done = true;
                None
            }
        }
    }
}
