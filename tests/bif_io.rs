//! BIF file writing, reading, and preview export.

use std::fs;

use bifgen::{BifError, BifReader, Resolution, default_output_path, export_frames, write_bif};

fn payloads() -> Vec<Vec<u8>> {
    (0..5u8)
        .map(|i| {
            let mut payload = vec![0xFF, 0xD8];
            payload.extend(std::iter::repeat_n(i, 10 + i as usize));
            payload.extend([0xFF, 0xD9]);
            payload
        })
        .collect()
}

#[test]
fn written_file_reads_back_entry_by_entry() {
    let directory = tempfile::tempdir().unwrap();
    let path = directory.path().join("out.bif");
    let images = payloads();

    let written = write_bif(&path, &images, 10).unwrap();
    assert_eq!(written, fs::metadata(&path).unwrap().len());

    let mut reader = BifReader::open(&path).unwrap();
    assert_eq!(reader.len(), 5);
    assert_eq!(reader.header().version, 0);
    assert_eq!(reader.interval_ms(), 10_000);
    assert_eq!(reader.timestamp_ms(4), 40_000);
    // Out of order on purpose.
    for index in [3, 0, 4, 1, 2] {
        assert_eq!(reader.image(index).unwrap(), images[index]);
        assert_eq!(reader.image_len(index), Some(images[index].len()));
    }
    assert!(matches!(reader.image(5), Err(BifError::CorruptIndex(_))));
}

#[test]
fn writing_leaves_no_temporary_files() {
    let directory = tempfile::tempdir().unwrap();
    let path = directory.path().join("out.bif");
    write_bif(&path, &payloads(), 10).unwrap();
    // Overwrite in place.
    write_bif(&path, &payloads()[..2], 10).unwrap();

    let names: Vec<_> = fs::read_dir(directory.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(names, vec![std::ffi::OsString::from("out.bif")]);
    assert_eq!(BifReader::open(&path).unwrap().len(), 2);
}

#[test]
fn zero_interval_writes_nothing() {
    let directory = tempfile::tempdir().unwrap();
    let path = directory.path().join("out.bif");
    assert!(matches!(
        write_bif(&path, &payloads(), 0),
        Err(BifError::InvalidInterval)
    ));
    assert!(!path.exists());
}

#[test]
fn opening_a_missing_file_is_an_io_error() {
    let directory = tempfile::tempdir().unwrap();
    let error = BifReader::open(directory.path().join("missing.bif")).unwrap_err();
    assert!(matches!(error, BifError::IoError(_)));
    assert_eq!(error.exit_code(), 1);
}

#[test]
fn opening_a_non_bif_file_is_rejected() {
    let directory = tempfile::tempdir().unwrap();
    let path = directory.path().join("fake.bif");
    fs::write(&path, b"\x89PNG\r\n\x1a\n and then some").unwrap();
    assert!(matches!(BifReader::open(&path), Err(BifError::InvalidMagic)));

    fs::write(&path, b"\x89BIF").unwrap();
    assert!(matches!(
        BifReader::open(&path),
        Err(BifError::TruncatedHeader { actual: 4, .. })
    ));
}

#[test]
fn export_writes_numbered_frames_in_index_order() {
    let directory = tempfile::tempdir().unwrap();
    let bif = directory.path().join("movie-HD.bif");
    let images = payloads();
    write_bif(&bif, &images, 10).unwrap();

    let out = directory.path().join("movie-HD_preview");
    let written = export_frames(&bif, &out).unwrap();

    assert_eq!(written.len(), 5);
    for (index, path) in written.iter().enumerate() {
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            format!("frame_{index:04}.jpg")
        );
        assert_eq!(fs::read(path).unwrap(), images[index]);
    }
}

#[test]
fn default_output_name_uses_stem_and_mode() {
    assert_eq!(
        default_output_path("/videos/Big Buck Bunny.mp4".as_ref(), Resolution::Hd)
            .to_str()
            .unwrap(),
        "Big Buck Bunny-HD.bif"
    );
}
