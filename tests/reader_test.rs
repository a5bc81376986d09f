//! Multipart reader over store-backed parts.

mod common;

use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;

use common::{stage_parts, uploaded_video, UPLOAD_PREFIX};
use tokio::runtime::Handle;
use vidi::reader::{open_upload, MultipartReader, StorePartOpener};
use vidi::storage::{paths, put_bytes, BoxStore, FsStore, MemoryStore};
use vidi_common::Error;

const MIB: u64 = 1024 * 1024;

fn pattern(len: u64) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn four_part_upload_reads_back_whole() {
    let memory = MemoryStore::new();
    let data = pattern(10 * MIB);
    let info = stage_parts(&memory, UPLOAD_PREFIX, "big", &data, 3 * MIB);
    assert_eq!(info.parts.len(), 4);

    let store: Arc<dyn BoxStore> = Arc::new(memory);
    let handle = Handle::current();
    let expected = data.clone();

    tokio::task::spawn_blocking(move || {
        let opener = StorePartOpener::numbered(handle, store, UPLOAD_PREFIX, "big");
        let mut reader = MultipartReader::new(opener, info.size, info.part_size).unwrap();

        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out.len() as u64, 10 * MIB);
        assert!(out == expected);

        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).unwrap(), 0);

        reader.seek(SeekFrom::Start(3 * MIB - 1)).unwrap();
        let mut two = [0u8; 2];
        reader.read_exact(&mut two).unwrap();
        assert_eq!(two, [expected[(3 * MIB - 1) as usize], expected[(3 * MIB) as usize]]);
        assert!(reader.open_readers() <= vidi::reader::MAX_OPEN_READERS);
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn open_upload_prefers_parts() {
    let memory = MemoryStore::new();
    let data = pattern(10_000);
    let mut video = uploaded_video("both");
    video.upload_info = Some(stage_parts(&memory, UPLOAD_PREFIX, "both", &data, 4096));
    // A stale artifact that must be ignored.
    memory.insert(paths::artifact_name(UPLOAD_PREFIX, "both"), vec![0u8; 10]);

    let store: Arc<dyn BoxStore> = Arc::new(memory);
    let handle = Handle::current();
    let out = tokio::task::spawn_blocking(move || {
        let mut reader = open_upload(&handle, store, UPLOAD_PREFIX, &video).unwrap();
        assert_eq!(reader.part_count(), 3);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        out
    })
    .await
    .unwrap();

    assert_eq!(out, data);
}

#[tokio::test(flavor = "multi_thread")]
async fn open_upload_falls_back_to_artifact_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let fs = FsStore::new(dir.path());
    let data = pattern(50_000);
    put_bytes(&fs, &paths::artifact_name(UPLOAD_PREFIX, "legacy"), data.clone())
        .await
        .unwrap();

    let video = uploaded_video("legacy");
    let store: Arc<dyn BoxStore> = Arc::new(fs);
    let handle = Handle::current();
    let out = tokio::task::spawn_blocking(move || {
        let mut reader = open_upload(&handle, store, UPLOAD_PREFIX, &video).unwrap();
        assert_eq!(reader.part_count(), 1);
        reader.seek(SeekFrom::Start(40_000)).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        out
    })
    .await
    .unwrap();

    assert_eq!(out, &data[40_000..]);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_part_latches_error() {
    let memory = MemoryStore::new();
    let data = pattern(10_000);
    let info = stage_parts(&memory, UPLOAD_PREFIX, "holes", &data, 4096);
    let store: Arc<dyn BoxStore> = Arc::new(memory);
    store
        .delete(&paths::part_name(UPLOAD_PREFIX, "holes", 1))
        .await
        .unwrap();

    let handle = Handle::current();
    tokio::task::spawn_blocking(move || {
        let opener = StorePartOpener::numbered(handle, store, UPLOAD_PREFIX, "holes");
        let mut reader = MultipartReader::new(opener, info.size, info.part_size).unwrap();

        let mut out = Vec::new();
        assert!(reader.read_to_end(&mut out).is_err());

        let err = reader.read(&mut [0u8; 4]).unwrap_err();
        let inner = Error::from_io(err);
        assert!(matches!(inner, Error::PreviousError(_)), "{inner}");
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_upload_info_is_rejected() {
    let memory = MemoryStore::new();
    let mut video = uploaded_video("broken");
    let mut info = stage_parts(&memory, UPLOAD_PREFIX, "broken", &pattern(10_000), 4096);
    info.parts.remove(1);
    video.upload_info = Some(info);

    let store: Arc<dyn BoxStore> = Arc::new(memory);
    let handle = Handle::current();
    let result = tokio::task::spawn_blocking(move || {
        open_upload(&handle, store, UPLOAD_PREFIX, &video).map(|_| ())
    })
    .await
    .unwrap();

    assert!(result.is_err());
}
