mod common;

use beth_bsa::{Archive, ArchiveType, Error, ReadOptions};
use common::{build_bsa, build_btdx_gnrl, build_morrowind, BsaEntry, GnrlEntry};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use tracing_test::traced_test;

fn write_archive(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn magic_dispatch_routes_every_table_row() {
    let dir = TempDir::new().unwrap();

    let cases: Vec<(&str, Vec<u8>, ArchiveType)> = vec![
        ("mw.bsa", build_morrowind(&[]), ArchiveType::Morrowind),
        ("ob.bsa", build_bsa(0x67, 0x3, &[]), ArchiveType::Oblivion),
        ("fo3.bsa", build_bsa(0x68, 0x3, &[]), ArchiveType::Fallout3),
        ("sse.bsa", build_bsa(0x69, 0x3, &[]), ArchiveType::SkyrimSe),
        ("fo4.ba2", build_btdx_gnrl(1, &[]), ArchiveType::Fallout4),
        ("sf.ba2", build_btdx_gnrl(2, &[]), ArchiveType::Starfield),
        (
            "sf_lz4.ba2",
            build_btdx_gnrl(3, &[]),
            ArchiveType::StarfieldLz4Texture,
        ),
    ];

    for (name, bytes, expected) in cases {
        let path = write_archive(&dir, name, &bytes);
        let archive = Archive::read(&path, ReadOptions::default()).unwrap();
        assert_eq!(archive.archive_type(), expected, "dialect of {name}");
    }
}

#[test]
fn foreign_magic_version_pairs_are_rejected() {
    let dir = TempDir::new().unwrap();

    // (magic, version) pairs that exist individually but not together
    let bad: &[(&str, u32, u32)] = &[
        ("bsa_v1.bsa", 0x0041_5342, 0x01),
        ("bsa_v2.bsa", 0x0041_5342, 0x02),
        ("bsa_mw.bsa", 0x0041_5342, 0x100),
        ("btdx_ob.ba2", 0x5844_5442, 0x67),
        ("btdx_sse.ba2", 0x5844_5442, 0x69),
        ("bsa_unknown.bsa", 0x0041_5342, 0x6A),
        ("btdx_unknown.ba2", 0x5844_5442, 0x1234),
    ];

    for (name, magic, version) in bad {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&magic.to_le_bytes());
        bytes.extend_from_slice(&version.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 64]);

        let path = write_archive(&dir, name, &bytes);
        assert!(
            matches!(
                Archive::read(&path, ReadOptions::default()),
                Err(Error::InvalidData(_))
            ),
            "{name} must not parse"
        );
    }

    let path = write_archive(&dir, "garbage.bin", b"not an archive at all");
    assert!(matches!(
        Archive::read(&path, ReadOptions::default()),
        Err(Error::InvalidData(_))
    ));
}

#[test]
fn truncated_header_is_invalid_data() {
    let dir = TempDir::new().unwrap();
    let full = build_bsa(0x67, 0x3, &[]);
    let path = write_archive(&dir, "short.bsa", &full[..12]);

    assert!(matches!(
        Archive::read(&path, ReadOptions::default()),
        Err(Error::InvalidData(_))
    ));
}

#[test]
fn missing_archive_is_file_not_found() {
    assert!(matches!(
        Archive::read("/does/not/exist.bsa", ReadOptions::default()),
        Err(Error::FileNotFound { .. })
    ));
}

#[traced_test]
#[test]
fn morrowind_archive_reconstructs_the_tree() {
    let dir = TempDir::new().unwrap();

    let a = [0x11u8; 16];
    let c = [0x22u8; 32];
    let d = [0x33u8; 8];
    let bytes = build_morrowind(&[("a.nif", &a), ("b\\c.dds", &c), ("b\\d.dds", &d)]);
    let path = write_archive(&dir, "mw.bsa", &bytes);

    let archive = Archive::read(&path, ReadOptions::default()).unwrap();
    assert_eq!(archive.archive_type(), ArchiveType::Morrowind);
    assert_eq!(archive.file_count(), 3);

    let root = archive.root();
    assert_eq!(root.file_count(), 1);
    assert_eq!(root.file(0).unwrap().name(), "a.nif");
    assert_eq!(root.subfolder_count(), 1);

    let b = root.subfolder(0).unwrap();
    assert_eq!(b.name(), "b");
    assert_eq!(b.file_count(), 2);
    assert_eq!(b.file(0).unwrap().name(), "c.dds");
    assert_eq!(b.file(0).unwrap().size(), 32);
    assert_eq!(b.file(1).unwrap().full_path(), "b\\d.dds");

    // raw payloads come back byte for byte
    let out = TempDir::new().unwrap();
    archive
        .extract_all(out.path(), |_, _| true, Default::default())
        .unwrap();
    assert_eq!(fs::read(out.path().join("a.nif")).unwrap(), a);
    assert_eq!(fs::read(out.path().join("b/c.dds")).unwrap(), c);
    assert_eq!(fs::read(out.path().join("b/d.dds")).unwrap(), d);
}

#[test]
fn bsa_names_resolve_in_record_order() {
    let dir = TempDir::new().unwrap();

    let bytes = build_bsa(
        0x67,
        0x3,
        &[
            BsaEntry::new("meshes\\armor\\iron.nif", b"ironiron"),
            BsaEntry::new("meshes\\armor\\steel.nif", b"steel"),
            BsaEntry::new("textures\\skin.dds", b"skin"),
        ],
    );
    let path = write_archive(&dir, "ob.bsa", &bytes);

    let archive = Archive::read(&path, ReadOptions::default()).unwrap();
    assert_eq!(archive.file_count(), 3);
    assert_eq!(
        archive.file_names(),
        vec![
            "meshes\\armor\\iron.nif".to_owned(),
            "meshes\\armor\\steel.nif".to_owned(),
            "textures\\skin.dds".to_owned(),
        ]
    );
    assert_eq!(
        archive.folder_names(),
        vec!["meshes\\armor".to_owned(), "textures".to_owned()]
    );

    let meshes = archive.root().subfolder(0).unwrap();
    assert_eq!(meshes.name(), "meshes");
    assert_eq!(meshes.file_count(), 0, "placeholder folder holds no files");
    assert_eq!(meshes.total_file_count(), 2);

    let armor = meshes.subfolder(0).unwrap();
    let iron = armor.file(0).unwrap();
    assert_eq!(iron.name(), "iron.nif");
    assert_eq!(iron.size(), 8);
    assert!(!archive.is_compressed(iron));
}

#[test]
fn compression_toggle_xors_with_the_archive_default() {
    let dir = TempDir::new().unwrap();

    // no default compression: the toggled entry is the compressed one
    let bytes = build_bsa(
        0x68,
        0x3,
        &[
            BsaEntry::new("a\\plain.txt", b"plain"),
            BsaEntry::toggled("a\\packed.txt", b"????"),
        ],
    );
    let path = write_archive(&dir, "plain_default.bsa", &bytes);
    let archive = Archive::read(&path, ReadOptions::default()).unwrap();
    let folder = archive.root().subfolder(0).unwrap();
    assert!(!archive.is_compressed(folder.file(0).unwrap()));
    assert!(archive.is_compressed(folder.file(1).unwrap()));

    // default-compressed: the toggle now means "stored raw"
    let bytes = build_bsa(
        0x68,
        0x3 | 0x4,
        &[
            BsaEntry::new("a\\packed.txt", b"????"),
            BsaEntry::toggled("a\\plain.txt", b"plain"),
        ],
    );
    let path = write_archive(&dir, "compressed_default.bsa", &bytes);
    let archive = Archive::read(&path, ReadOptions::default()).unwrap();
    let folder = archive.root().subfolder(0).unwrap();
    assert!(archive.is_compressed(folder.file(0).unwrap()));
    assert!(!archive.is_compressed(folder.file(1).unwrap()));
}

#[test]
fn hash_verification_reports_a_mismatch_but_keeps_the_tree() {
    let dir = TempDir::new().unwrap();

    let entries = [BsaEntry::new("a\\file.nif", b"payload!")];
    let good = build_bsa(0x67, 0x3, &entries);

    let verify = ReadOptions::builder().verify_hashes(true).build();

    let path = write_archive(&dir, "good.bsa", &good);
    let archive = Archive::read(&path, verify).unwrap();
    assert!(archive.hashes_valid());
    assert!(archive.verify_hashes().is_ok());

    // flip a byte inside the stored file-record hash: it sits after the
    // folder record (16 bytes) and the folder's BString name (1 + 1 bytes)
    let mut bad = good.clone();
    let hash_pos = 0x24 + 16 + 2;
    bad[hash_pos] ^= 0xFF;

    let path = write_archive(&dir, "bad.bsa", &bad);
    let archive = Archive::read(&path, verify).unwrap();
    assert!(!archive.hashes_valid(), "mismatch must be noticed");
    assert!(matches!(archive.verify_hashes(), Err(Error::InvalidHashes)));
    // the tree is still fully populated
    assert_eq!(archive.file_names(), vec!["a\\file.nif".to_owned()]);

    // without verification the same archive parses clean
    let archive = Archive::read(&path, ReadOptions::default()).unwrap();
    assert!(archive.hashes_valid());
}

#[test]
fn gnrl_records_parse_for_every_version() {
    let dir = TempDir::new().unwrap();

    for version in [1u32, 2, 3] {
        let bytes = build_btdx_gnrl(
            version,
            &[
                GnrlEntry {
                    path: "interface\\fonts.swf".to_owned(),
                    packed: None,
                    unpacked: b"raw bytes".to_vec(),
                },
                GnrlEntry {
                    path: "interface\\menu.swf".to_owned(),
                    packed: Some(vec![1, 2, 3, 4]),
                    unpacked: vec![0; 32],
                },
            ],
        );
        let path = write_archive(&dir, &format!("v{version}.ba2"), &bytes);

        let archive = Archive::read(&path, ReadOptions::default()).unwrap();
        assert_eq!(archive.file_count(), 2, "version {version}");

        let interface = archive.root().subfolder(0).unwrap();
        assert_eq!(interface.name(), "interface");

        let raw = interface.file(0).unwrap();
        assert_eq!(raw.name(), "fonts.swf");
        assert_eq!(raw.size(), 0);
        assert_eq!(raw.uncompressed_size(), 9);
        assert!(!archive.is_compressed(raw));

        let packed = interface.file(1).unwrap();
        assert_eq!(packed.size(), 4);
        assert_eq!(packed.uncompressed_size(), 32);
        assert!(archive.is_compressed(packed));
    }
}

#[test]
fn closed_archive_cannot_extract() {
    let dir = TempDir::new().unwrap();
    let bytes = build_morrowind(&[("a.txt", b"aaaa")]);
    let path = write_archive(&dir, "mw.bsa", &bytes);

    let mut archive = Archive::read(&path, ReadOptions::default()).unwrap();
    archive.close();

    let out = TempDir::new().unwrap();
    let file = archive.root().file(0).unwrap();
    assert!(archive.extract(file, out.path()).is_err());
}
