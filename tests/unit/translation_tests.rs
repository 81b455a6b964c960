/*!
 * Tests for partitioning, reconciliation and rate limiting
 */

use std::sync::Arc;
use std::time::Duration;

use linebatch::translation::core::reconcile;
use linebatch::translation::{partition, InputDocument, RateLimiter, TranslationMapping};
use crate::common;

/// Every partition is contiguous, ordered and complete
#[test]
fn test_partition_with_any_sizes_should_cover_input_exactly() {
    for total in [0usize, 1, 2, 7, 10, 99, 100, 101] {
        let doc = InputDocument::from_lines(common::numbered_lines(total));
        for workers in [0usize, 1, 2, 3, 4, 8, 200] {
            let chunks = partition(doc.data_entries(), workers);
            let size = total.div_ceil(workers.max(1));

            assert!(chunks.len() <= workers.max(1));
            for (i, chunk) in chunks.iter().enumerate() {
                assert!(!chunk.is_empty());
                if i + 1 < chunks.len() {
                    assert_eq!(chunk.len(), size);
                }
                let first = chunk.first_index().unwrap();
                let last = chunk.last_index().unwrap();
                assert_eq!(last - first + 1, chunk.len(), "chunk must be contiguous");
            }

            let flat: Vec<String> = chunks
                .iter()
                .flat_map(|c| c.entries.iter().map(|e| e.entry.raw.clone()))
                .collect();
            assert_eq!(flat, common::numbered_lines(total));
        }
    }
}

/// A header is not part of any chunk
#[test]
fn test_partition_should_exclude_header_line() {
    let mut lines = vec!["0:::Header".to_string()];
    lines.extend(common::numbered_lines(4));
    let doc = InputDocument::from_lines(&lines);

    let chunks = partition(doc.data_entries(), 2);
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].first_index(), Some(1));
    assert_eq!(chunks[1].last_index(), Some(4));
}

/// Missing ids fall back to the original text, never to a blank
#[test]
fn test_reconcile_should_never_blank_a_missing_id() {
    let lines = common::numbered_lines(20);
    let mut mapping = TranslationMapping::new();
    for i in (1..=20).step_by(3) {
        mapping.insert(i.to_string(), format!("dịch {}", i));
    }
    mapping.insert("999".to_string(), "unrelated".to_string());

    let result = reconcile(&lines, &mapping);

    assert_eq!(result.len(), lines.len());
    for (i, line) in result.iter().enumerate() {
        let id = i + 1;
        if (id - 1) % 3 == 0 {
            assert_eq!(*line, format!("{}:::dịch {}", id, id));
        } else {
            assert_eq!(*line, format!("{}:::line {}", id, id));
        }
    }
}

/// An empty mapped text is used as-is
#[test]
fn test_reconcile_with_empty_translation_should_keep_it() {
    let mut mapping = TranslationMapping::new();
    mapping.insert("1".to_string(), String::new());
    assert_eq!(reconcile(&["1:::Hello"], &mapping), vec!["1:::"]);
}

/// Grants from many tasks are spaced by the minimum delay
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rate_limiter_with_many_tasks_should_space_grants() {
    let limiter = Arc::new(RateLimiter::new());
    let delay = Duration::from_millis(30);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                let mut grants = Vec::new();
                for _ in 0..2 {
                    grants.push(limiter.acquire(delay).await);
                }
                grants
            })
        })
        .collect();

    let mut grants = Vec::new();
    for handle in handles {
        grants.extend(handle.await.unwrap());
    }
    grants.sort();

    assert_eq!(grants.len(), 16);
    for pair in grants.windows(2) {
        assert!(pair[1].duration_since(pair[0]) >= delay);
    }
}
