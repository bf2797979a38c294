use super::{Destination, DestinationError};
use crate::formatter::RenderedRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleStream {
    Stdout,
    Stderr,
}

impl fmt::Display for ConsoleStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleStream::Stdout => f.write_str("stdout"),
            ConsoleStream::Stderr => f.write_str("stderr"),
        }
    }
}

/// Writes each record as one line and flushes immediately.
pub struct ConsoleDestination {
    name: String,
    writer: Box<dyn Write + Send>,
}

impl ConsoleDestination {
    pub fn new(stream: ConsoleStream) -> Self {
        let writer: Box<dyn Write + Send> = match stream {
            ConsoleStream::Stdout => Box::new(std::io::stdout()),
            ConsoleStream::Stderr => Box::new(std::io::stderr()),
        };
        Self {
            name: stream.to_string(),
            writer,
        }
    }

    /// Console destination over an arbitrary writer.
    pub fn with_writer(name: impl Into<String>, writer: Box<dyn Write + Send>) -> Self {
        Self {
            name: name.into(),
            writer,
        }
    }

    fn io_error(&self, source: std::io::Error) -> DestinationError {
        DestinationError::Console {
            stream: self.name.clone(),
            source,
        }
    }
}

impl fmt::Debug for ConsoleDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleDestination")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Destination for ConsoleDestination {
    fn describe(&self) -> String {
        self.name.clone()
    }

    async fn open(&mut self) -> Result<(), DestinationError> {
        Ok(())
    }

    async fn write(&mut self, record: &RenderedRecord) -> Result<(), DestinationError> {
        write_line(self.writer.as_mut(), record.payload()).map_err(|e| self.io_error(e))
    }

    async fn close(&mut self) -> Result<(), DestinationError> {
        self.writer.flush().map_err(|e| self.io_error(e))
    }
}

fn write_line(writer: &mut dyn Write, payload: &[u8]) -> std::io::Result<()> {
    writer.write_all(payload)?;
    writer.write_all(b"\n")?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_writes_one_line_per_record() {
        let buffer = SharedBuffer::default();
        let mut console = ConsoleDestination::with_writer("buffer", Box::new(buffer.clone()));
        console.open().await.unwrap();
        console.write(&RenderedRecord::banner("first".into())).await.unwrap();
        console.write(&RenderedRecord::banner("second".into())).await.unwrap();
        console.close().await.unwrap();

        let written = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert_eq!(written, "first\nsecond\n");
    }

    #[tokio::test]
    async fn test_io_error_is_fatal() {
        let mut console = ConsoleDestination::with_writer("stdout", Box::new(BrokenPipe));
        let err = console
            .write(&RenderedRecord::banner("x".into()))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("stdout"));
    }
}
