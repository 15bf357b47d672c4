#![allow(dead_code)]

use serde_json::Value;
use std::io;
use std::sync::{Arc, Mutex};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::format::{DefaultFields, FormatEvent};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// In-memory sink collecting every formatted line.
#[derive(Clone, Default)]
pub struct CapturedLines(Arc<Mutex<Vec<u8>>>);

pub struct CapturedWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLines {
    type Writer = CapturedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CapturedWriter(Arc::clone(&self.0))
    }
}

impl CapturedLines {
    pub fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().unwrap();
        String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn records(&self) -> Vec<Value> {
        self.lines()
            .iter()
            .map(|line| serde_json::from_str(line).expect("record is valid JSON"))
            .collect()
    }

    /// The only record written; fails if there were zero or several.
    pub fn single(&self) -> Value {
        let mut records = self.records();
        assert_eq!(records.len(), 1, "expected exactly one record: {:?}", self.lines());
        records.remove(0)
    }
}

/// Install `formatter` as the thread's default subscriber until the guard
/// is dropped.
pub fn install<F>(formatter: F) -> (CapturedLines, DefaultGuard)
where
    F: FormatEvent<Registry, DefaultFields> + Send + Sync + 'static,
{
    let captured = CapturedLines::default();
    let layer = tracing_subscriber::fmt::layer::<Registry>()
        .event_format(formatter)
        .with_writer(captured.clone());
    let guard = tracing::subscriber::set_default(Registry::default().with(layer));
    (captured, guard)
}

/// Run `f` with `formatter` installed and return what it wrote.
pub fn capture<F>(formatter: F, f: impl FnOnce()) -> CapturedLines
where
    F: FormatEvent<Registry, DefaultFields> + Send + Sync + 'static,
{
    let (captured, _guard) = install(formatter);
    f();
    captured
}

pub fn keys(record: &Value) -> Vec<String> {
    let mut keys: Vec<String> = record
        .as_object()
        .expect("record is an object")
        .keys()
        .cloned()
        .collect();
    keys.sort();
    keys
}

pub fn sorted(keys: &[&str]) -> Vec<String> {
    let mut keys: Vec<String> = keys.iter().map(|key| key.to_string()).collect();
    keys.sort();
    keys
}

pub const DEFAULT_ATTRIBUTES: [&str; 5] = ["timestamp", "status", "message", "location", "file"];
