mod common;

use std::sync::Arc;

use densify_core::error::DensifyError;
use densify_core::pipeline::ParallelDecompressor;
use densify_core::reconstruct::reconstruct;

use common::ramp_store;

#[test]
fn test_parallel_matches_sequential_in_order() {
    let store = Arc::new(ramp_store(16));

    let expected: Vec<_> = (0..16).map(|i| reconstruct(&store, i).unwrap()).collect();

    let decompressor = ParallelDecompressor::with_workers(4);
    let stream = decompressor.decompress_all(Arc::clone(&store)).unwrap();
    assert_eq!(stream.total(), 16);

    let mut count = 0;
    for (expected_index, item) in stream.enumerate() {
        let (index, dense) = item.unwrap();
        assert_eq!(index, expected_index);
        assert_eq!(dense, expected[index]);
        count += 1;
    }
    assert_eq!(count, 16);
}

#[test]
fn test_single_worker_pool() {
    let store = Arc::new(ramp_store(5));
    let decompressor = ParallelDecompressor::with_workers(1);

    let frames: Vec<_> = decompressor
        .decompress_all(Arc::clone(&store))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(frames.len(), 5);
    for (i, (index, dense)) in frames.iter().enumerate() {
        assert_eq!(*index, i);
        assert_eq!(dense, &reconstruct(&store, i).unwrap());
    }
}

#[test]
fn test_explicit_frame_selection_preserves_given_order() {
    let store = Arc::new(ramp_store(6));
    let decompressor = ParallelDecompressor::with_workers(3);

    let picked = vec![4, 0, 2];
    let stream = decompressor
        .decompress(Arc::clone(&store), picked.clone())
        .unwrap();

    let indices: Vec<usize> = stream.map(|item| item.unwrap().0).collect();
    assert_eq!(indices, picked);
}

#[test]
fn test_failure_surfaces_at_its_ordered_position() {
    let store = Arc::new(ramp_store(4));
    let decompressor = ParallelDecompressor::with_workers(2);

    let mut stream = decompressor
        .decompress(Arc::clone(&store), vec![0, 1, 99])
        .unwrap();

    assert_eq!(stream.next().unwrap().unwrap().0, 0);
    assert_eq!(stream.next().unwrap().unwrap().0, 1);

    let err = stream.next().unwrap().unwrap_err();
    assert!(matches!(
        err,
        DensifyError::FrameIndexOutOfRange { index: 99, total: 4 }
    ));

    // Fused after the error.
    assert!(stream.next().is_none());
}

#[test]
fn test_early_failure_discards_later_completions() {
    let store = Arc::new(ramp_store(4));
    let decompressor = ParallelDecompressor::with_workers(4);

    let mut stream = decompressor
        .decompress(Arc::clone(&store), vec![99, 0, 1, 2])
        .unwrap();

    // The very first in-order result is the failure; everything the other
    // workers produced is drained and dropped.
    assert!(stream.next().unwrap().is_err());
    assert!(stream.next().is_none());
}

#[test]
fn test_empty_frame_selection() {
    let store = Arc::new(ramp_store(3));
    let decompressor = ParallelDecompressor::with_workers(2);

    let mut stream = decompressor.decompress(Arc::clone(&store), vec![]).unwrap();
    assert_eq!(stream.total(), 0);
    assert!(stream.next().is_none());
}

#[test]
fn test_repeated_parallel_runs_are_identical() {
    let store = Arc::new(ramp_store(8));
    let decompressor = ParallelDecompressor::with_workers(4);

    let first: Vec<_> = decompressor
        .decompress_all(Arc::clone(&store))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    let second: Vec<_> = decompressor
        .decompress_all(Arc::clone(&store))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_dropping_stream_midway_releases_the_store() {
    let store = Arc::new(ramp_store(12));
    let decompressor = ParallelDecompressor::with_workers(4);

    let mut stream = decompressor.decompress_all(Arc::clone(&store)).unwrap();
    let _ = stream.next();
    drop(stream);

    // Drop drains the pool; give the last worker a moment to unwind its
    // closure before checking that no clone of the store is left.
    for _ in 0..200 {
        if Arc::strong_count(&store) == 1 {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
    assert_eq!(Arc::strong_count(&store), 1);
}
