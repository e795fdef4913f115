//! JPEG parsing and scanning over hand-assembled streams.

mod common;

use common::{gray_baseline, segment};
use stegscan::{check_trailing_data, parse_dct_coefficients, parse_metadata, Error, Level, Scanner};

#[test]
fn test_parse_metadata_is_idempotent() {
    let mut bytes = gray_baseline(8, 8, &[0xFC]);
    bytes.splice(2..2, segment(0xFE, b"created with a camera"));

    let first = parse_metadata(&bytes).unwrap();
    let second = parse_metadata(&bytes).unwrap();
    assert_eq!(first, second);
    assert_eq!((first.width, first.height), (8, 8));
    assert_eq!(first.comments, vec!["created with a camera".to_string()]);
    assert_eq!(first.quant_tables.len(), 1);
    assert!(!first.progressive);
}

#[test]
fn test_stuffed_byte_is_skipped_by_decoder() {
    // 0xFF 0x00 is one literal 0xFF byte of entropy-coded data
    let data = parse_dct_coefficients(&gray_baseline(8, 8, &[0xFF, 0x00, 0xBF])).unwrap();
    assert_eq!(data.blocks.len(), 1);
    assert_eq!(&data.blocks[0].coefficients[..4], &[3, 1, 1, 1]);
    assert!(data.blocks[0].coefficients[4..].iter().all(|&c| c == 0));
}

#[test]
fn test_scan_ends_at_real_marker_not_stuffed_byte() {
    let bytes = gray_baseline(8, 8, &[0xFF, 0x00, 0xBF]);
    let meta = parse_metadata(&bytes).unwrap();
    let scan = &meta.scans[0];

    // Stuffed pair stays inside the scan; FF D9 closes it
    assert_eq!(&bytes[scan.data_start..scan.data_end], &[0xFF, 0x00, 0xBF]);
    assert_eq!(&bytes[scan.data_end..], &[0xFF, 0xD9]);
    assert!(!meta.has_trailing_data);
}

#[test]
fn test_trailing_data_detection() {
    let mut bytes = gray_baseline(8, 8, &[0xFC]);
    assert_eq!(check_trailing_data(&bytes), (false, 0));

    bytes.extend_from_slice(b"0123456789");
    assert_eq!(check_trailing_data(&bytes), (true, 10));
    let meta = parse_metadata(&bytes).unwrap();
    assert!(meta.has_trailing_data);
    assert_eq!(meta.trailing_size, 10);
}

#[test]
fn test_not_a_jpeg() {
    assert!(matches!(parse_metadata(b"GIF89a"), Err(Error::NotAJpeg)));
    assert!(matches!(parse_dct_coefficients(b"GIF89a"), Err(Error::NotAJpeg)));
}

#[test]
fn test_scan_file_with_appended_c2() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("holiday.jpg");
    let mut bytes = gray_baseline(8, 8, &[0xFC]);
    bytes.extend_from_slice(b"admin password: s3cret; beacon https://203.0.113.9/checkin");
    std::fs::write(&path, &bytes).unwrap();

    let result = Scanner::new().scan_file(&path);
    assert!(result.error.is_none());
    assert_eq!(result.level, Level::ConfirmedC2);
    assert!(result
        .findings
        .iter()
        .any(|f| f.description == "C2 indicators in appended data"));
}

#[test]
fn test_scan_file_dispatches_on_magic_not_extension() {
    let dir = tempfile::tempdir().unwrap();
    // JPEG bytes behind a misleading extension
    let path = dir.path().join("renamed.png");
    let mut bytes = gray_baseline(8, 8, &[0xFC]);
    bytes.extend_from_slice(b"just some trailing notes");
    std::fs::write(&path, &bytes).unwrap();

    let result = Scanner::new().scan_file(&path);
    assert!(result.error.is_none());
    assert!(result
        .findings
        .iter()
        .any(|f| f.description == "Appended data after EOI"));
}

#[test]
fn test_huge_declared_frame_is_refused() {
    let bytes = gray_baseline(65535, 65535, &[0x00]);
    match parse_dct_coefficients(&bytes) {
        Err(Error::ResourceLimit { requested, .. }) => assert_eq!(requested, 8192 * 8192),
        other => panic!("expected resource limit, got {:?}", other.map(|d| d.blocks.len())),
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("huge.jpg");
    std::fs::write(&path, &bytes).unwrap();
    let result = Scanner::new().scan_file(&path);
    assert!(result.error.is_none());
    assert_eq!(result.level, Level::Clean);
    assert!(result
        .findings
        .iter()
        .any(|f| f.description == "Coefficient decoding failed"));
}
