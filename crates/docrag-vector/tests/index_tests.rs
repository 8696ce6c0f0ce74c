use std::fs;

use docrag_core::{Chunk, Error, IndexEntry};
use docrag_vector::layout::{CHUNKS_FILE, MANIFEST_FILE, VECTORS_FILE};
use docrag_vector::{read_manifest, VectorIndex};
use proptest::prelude::*;

const MODEL: &str = "test-model";

fn chunk(text: &str, source: &str, seq: usize) -> Chunk {
    Chunk { text: text.to_string(), source: source.to_string(), sequence_index: seq, start: seq * 10 }
}

fn entry(vector: Vec<f32>, text: &str) -> IndexEntry {
    IndexEntry::new(vector, chunk(text, &format!("{text}.md"), 0))
}

fn sample() -> VectorIndex {
    VectorIndex::build(
        MODEL,
        2,
        vec![
            entry(vec![0.0, 0.0], "origin"),
            entry(vec![3.0, 4.0], "far"),
            entry(vec![1.0, 0.0], "near"),
            entry(vec![0.0, 1.0], "near-twin"),
        ],
    )
    .expect("build")
}

#[test]
fn build_rejects_mixed_lengths() {
    let err = VectorIndex::build(MODEL, 2, vec![entry(vec![0.0, 0.0], "a"), entry(vec![1.0, 2.0, 3.0], "b")])
        .unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 3, .. }));
}

#[test]
fn failed_add_leaves_index_unchanged() {
    let mut index = sample();
    let err = index.add_batch(vec![entry(vec![9.0, 9.0], "ok"), entry(vec![1.0], "bad")]).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { .. }));
    assert_eq!(index.len(), 4);
}

#[test]
fn zero_dimension_is_rejected() {
    assert!(matches!(VectorIndex::new(MODEL, 0), Err(Error::InvalidConfig(_))));
}

#[test]
fn search_ranks_by_distance_and_breaks_ties_by_position() {
    let hits = sample().search(&[0.0, 0.0], 3).unwrap();
    let texts: Vec<&str> = hits.iter().map(|h| h.chunk.text.as_str()).collect();
    assert_eq!(texts, vec!["origin", "near", "near-twin"]);
    assert_eq!(hits[0].distance, 0.0);
    assert_eq!(hits[1].distance, 1.0);
    assert_eq!(hits[2].distance, 1.0);
    assert_eq!(hits[1].position, 2);
    assert_eq!(hits[2].chunk.source, "near-twin.md");
}

#[test]
fn distance_is_euclidean() {
    let hits = sample().search(&[0.0, 0.0], 4).unwrap();
    assert_eq!(hits[3].chunk.text, "far");
    assert!((hits[3].distance - 5.0).abs() < 1e-6);
}

#[test]
fn k_larger_than_index_returns_everything() {
    let hits = sample().search(&[3.0, 4.0], 10).unwrap();
    assert_eq!(hits.len(), 4);
    assert_eq!(hits[0].chunk.text, "far");
}

#[test]
fn k_zero_and_empty_index_return_nothing() {
    assert!(sample().search(&[0.0, 0.0], 0).unwrap().is_empty());
    let empty = VectorIndex::new(MODEL, 2).unwrap();
    assert!(empty.search(&[0.0, 0.0], 3).unwrap().is_empty());
}

#[test]
fn query_of_wrong_length_is_rejected() {
    let err = sample().search(&[0.0, 0.0, 0.0], 1).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 3, context: "query vector" }));
}

#[test]
fn persisted_index_searches_identically() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let dir = tmp.path().join("store");
    let index = sample();
    let manifest = index.persist(&dir)?;
    assert_eq!(manifest.count, 4);
    assert_eq!(manifest.dimension, 2);
    assert_eq!(manifest.model, MODEL);
    assert_eq!(read_manifest(&dir)?, manifest);

    let loaded = VectorIndex::load(&dir, MODEL, 2)?;
    for query in [[0.0, 0.0], [3.0, 4.0], [0.4, 0.6], [-1.0, 2.5]] {
        assert_eq!(loaded.search(&query, 3)?, index.search(&query, 3)?);
    }
    assert_eq!(loaded.chunk(1), index.chunk(1));
    assert_eq!(loaded.vector(3), Some(&[0.0f32, 1.0][..]));
    Ok(())
}

#[test]
fn empty_index_round_trips() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    VectorIndex::new(MODEL, 8)?.persist(tmp.path())?;
    let loaded = VectorIndex::load(tmp.path(), MODEL, 8)?;
    assert!(loaded.is_empty());
    Ok(())
}

#[test]
fn dimension_mismatch_fails_before_reading_vectors() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let entries = (0..3).map(|i| entry(vec![i as f32; 1024], &format!("c{i}"))).collect();
    VectorIndex::build(MODEL, 1024, entries)?.persist(tmp.path())?;
    // A broken vectors file must not matter: the manifest check comes first.
    fs::write(tmp.path().join(VECTORS_FILE), b"garbage")?;
    let err = VectorIndex::load(tmp.path(), MODEL, 768).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 768, actual: 1024, .. }));
    Ok(())
}

#[test]
fn model_mismatch_is_fatal() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    sample().persist(tmp.path())?;
    let err = VectorIndex::load(tmp.path(), "other-model", 2).unwrap_err();
    match err {
        Error::ModelMismatch { persisted, configured } => {
            assert_eq!(persisted, MODEL);
            assert_eq!(configured, "other-model");
        }
        other => panic!("unexpected {other:?}"),
    }
    Ok(())
}

#[test]
fn missing_directory_is_a_persistence_error() {
    let tmp = tempfile::tempdir().unwrap();
    let err = VectorIndex::load(&tmp.path().join("nope"), MODEL, 2).unwrap_err();
    assert!(matches!(err, Error::Persistence { .. }));
}

#[test]
fn corrupt_files_are_rejected() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let dir = tmp.path();
    sample().persist(dir)?;
    let pristine_vectors = fs::read(dir.join(VECTORS_FILE))?;
    let pristine_chunks = fs::read_to_string(dir.join(CHUNKS_FILE))?;

    // truncated vectors
    fs::write(dir.join(VECTORS_FILE), &pristine_vectors[..pristine_vectors.len() - 4])?;
    assert!(matches!(VectorIndex::load(dir, MODEL, 2), Err(Error::Persistence { .. })));

    // same size, flipped bits
    let mut flipped = pristine_vectors.clone();
    flipped[0] ^= 0xff;
    fs::write(dir.join(VECTORS_FILE), &flipped)?;
    assert!(matches!(VectorIndex::load(dir, MODEL, 2), Err(Error::Persistence { .. })));
    fs::write(dir.join(VECTORS_FILE), &pristine_vectors)?;

    // a dropped chunk record
    let fewer: Vec<&str> = pristine_chunks.lines().take(3).collect();
    fs::write(dir.join(CHUNKS_FILE), fewer.join("\n"))?;
    assert!(matches!(VectorIndex::load(dir, MODEL, 2), Err(Error::Persistence { .. })));

    // records out of order
    let mut swapped: Vec<&str> = pristine_chunks.lines().collect();
    swapped.swap(0, 1);
    fs::write(dir.join(CHUNKS_FILE), swapped.join("\n"))?;
    assert!(matches!(VectorIndex::load(dir, MODEL, 2), Err(Error::Persistence { .. })));
    fs::write(dir.join(CHUNKS_FILE), &pristine_chunks)?;

    // counts the data files cannot back, including ones whose byte size overflows
    let pristine_manifest = read_manifest(dir)?;
    for count in [usize::MAX / 8, 1 << 40, 5] {
        let inflated = docrag_vector::Manifest { count, ..pristine_manifest.clone() };
        fs::write(dir.join(MANIFEST_FILE), serde_json::to_string(&inflated)?)?;
        assert!(matches!(VectorIndex::load(dir, MODEL, 2), Err(Error::Persistence { .. })), "count {count}");
    }

    fs::write(dir.join(MANIFEST_FILE), "{ not json")?;
    assert!(matches!(VectorIndex::load(dir, MODEL, 2), Err(Error::Persistence { .. })));
    assert!(matches!(read_manifest(dir), Err(Error::Persistence { .. })));
    Ok(())
}

#[test]
fn persist_replaces_previous_contents() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let dir = tmp.path().join("store");
    sample().persist(&dir)?;
    fs::write(dir.join("stray.txt"), "left over")?;

    let smaller = VectorIndex::build(MODEL, 2, vec![entry(vec![1.0, 1.0], "only")])?;
    smaller.persist(&dir)?;
    assert!(!dir.join("stray.txt").exists());
    let loaded = VectorIndex::load(&dir, MODEL, 2)?;
    assert_eq!(loaded.len(), 1);

    // no staging leftovers next to the store
    assert_eq!(fs::read_dir(tmp.path())?.count(), 1);
    Ok(())
}

proptest! {
    #[test]
    fn search_is_sorted_and_bounded(
        rows in prop::collection::vec(prop::collection::vec(-10.0f32..10.0, 3), 0..40),
        query in prop::collection::vec(-10.0f32..10.0, 3),
        k in 0usize..50,
    ) {
        let entries = rows.iter().enumerate().map(|(i, v)| entry(v.clone(), &format!("c{i}"))).collect();
        let index = VectorIndex::build(MODEL, 3, entries).unwrap();
        let hits = index.search(&query, k).unwrap();
        prop_assert_eq!(hits.len(), k.min(rows.len()));
        for pair in hits.windows(2) {
            prop_assert!(pair[0].distance <= pair[1].distance);
        }
    }
}
