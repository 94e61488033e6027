//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use cwrgraph_storage::{ContentId, MemoryObjectStore, MetaObject, ObjectStore, StorageError};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Route pipeline logs to the test writer; `RUST_LOG` selects the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Space-padded fixed-width line with `parts` placed at their start column
pub fn line(width: usize, parts: &[(usize, &str)]) -> String {
    let mut buf = vec![b' '; width];
    for (start, text) in parts {
        buf[*start..*start + text.len()].copy_from_slice(text.as_bytes());
    }
    String::from_utf8(buf).unwrap()
}

pub fn hdr() -> String {
    line(59, &[(0, "HDR"), (3, "PB"), (6, "00000123"), (14, "ACME MUSIC")])
}

pub fn grh(group: u32) -> String {
    format!("GRHNWR{:05}02.10", group)
}

pub fn grt(group: u32) -> String {
    format!("GRT{:05}0000001400000365", group)
}

pub fn trl() -> String {
    "TRL000010000001400000367".to_string()
}

pub fn nwr(tx: u32, title: &str) -> String {
    work("NWR", tx, title)
}

pub fn rev(tx: u32, title: &str) -> String {
    work("REV", tx, title)
}

fn work(tag: &str, tx: u32, title: &str) -> String {
    let tx = format!("{:09}", tx);
    line(
        260,
        &[
            (0, tag),
            (3, &tx),
            (12, "0000000"),
            (19, title),
            (79, "EN"),
            (95, "T0000000001"),
            (142, "ORI"),
            (259, "Y"),
        ],
    )
}

pub fn spu(tx: u32, seq: u32, publisher: u32) -> String {
    format!("SPU{:09}{:07}{:02}", tx, seq, publisher)
}

/// Lines joined into a `'static` async reader
pub fn reader(lines: &[String]) -> Cursor<Vec<u8>> {
    let mut text = lines.join("\n");
    text.push('\n');
    Cursor::new(text.into_bytes())
}

/// HDR, one group with two works (two and one SPU), TRL
pub fn sample_file() -> Vec<String> {
    vec![
        hdr(),
        grh(1),
        nwr(0, "FIRST SONG"),
        spu(0, 1, 1),
        spu(0, 2, 2),
        nwr(1, "SECOND SONG"),
        spu(1, 1, 1),
        grt(1),
        trl(),
    ]
}

/// Multi-group file large enough to keep every worker busy
pub fn large_file(groups: u32, works_per_group: u32) -> Vec<String> {
    let mut lines = vec![hdr()];
    for g in 1..=groups {
        lines.push(grh(g));
        for w in 0..works_per_group {
            let tx = g * 1000 + w;
            if w % 3 == 2 {
                lines.push(rev(tx, &format!("REVISED {}", tx)));
            } else {
                lines.push(nwr(tx, &format!("WORK {}", tx)));
            }
            for s in 0..(w % 4) {
                lines.push(spu(tx, s + 1, s + 1));
            }
            if w % 5 == 0 {
                lines.push(format!("SWR{:09}0000009", tx));
            }
        }
        lines.push(grt(g));
    }
    lines.push(trl());
    lines
}

/// Store whose writes complete after a content-dependent delay, so results
/// arrive out of line order
#[derive(Default)]
pub struct JitterStore {
    inner: MemoryObjectStore,
}

#[async_trait]
impl ObjectStore for JitterStore {
    async fn put(&self, object: &MetaObject) -> cwrgraph_storage::Result<ContentId> {
        let jitter = u64::from_str_radix(&object.id().as_str()[..2], 16).unwrap_or(0);
        tokio::time::sleep(Duration::from_micros(jitter * 10)).await;
        self.inner.put(object).await
    }

    async fn get(&self, id: &ContentId) -> cwrgraph_storage::Result<MetaObject> {
        self.inner.get(id).await
    }

    async fn contains(&self, id: &ContentId) -> cwrgraph_storage::Result<bool> {
        self.inner.contains(id).await
    }

    async fn len(&self) -> cwrgraph_storage::Result<usize> {
        self.inner.len().await
    }
}

/// Store that rejects every object whose `record_type` is `fail_on`
pub struct FailingStore {
    inner: MemoryObjectStore,
    fail_on: &'static str,
    pub failures: AtomicUsize,
}

impl FailingStore {
    pub fn new(fail_on: &'static str) -> Self {
        Self {
            inner: MemoryObjectStore::new(),
            fail_on,
            failures: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ObjectStore for FailingStore {
    async fn put(&self, object: &MetaObject) -> cwrgraph_storage::Result<ContentId> {
        if object.get_string("record_type").ok() == Some(self.fail_on) {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(StorageError::database(format!("rejected {}", self.fail_on)));
        }
        self.inner.put(object).await
    }

    async fn get(&self, id: &ContentId) -> cwrgraph_storage::Result<MetaObject> {
        self.inner.get(id).await
    }

    async fn contains(&self, id: &ContentId) -> cwrgraph_storage::Result<bool> {
        self.inner.contains(id).await
    }

    async fn len(&self) -> cwrgraph_storage::Result<usize> {
        self.inner.len().await
    }
}
