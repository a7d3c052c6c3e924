//! Fork/join geometry decode
//!
//! Jobs are split into batches of `vertex_batch_size`. A fixed set of scoped
//! workers pulls batches from a shared queue until it is empty; the join
//! reassembles results in job order, so output never depends on scheduling.

use std::sync::Mutex;
use std::thread;

use crate::core::config::AssetConfig;
use crate::foundation::logging::{debug, trace};
use super::AssetError;

/// Decode every job, in parallel when there is more than one batch
///
/// The first error (in job order) is returned. A panicking worker is
/// reported as [`AssetError::WorkerPanicked`].
pub fn decode_batches<J, T, F>(jobs: &[J], config: &AssetConfig, decode: F) -> Result<Vec<T>, AssetError>
where
    J: Sync,
    T: Send,
    F: Fn(&J) -> Result<T, AssetError> + Sync,
{
    let batch_size = config.vertex_batch_size.max(1);
    let batch_count = jobs.len().div_ceil(batch_size);
    let worker_count = config.loader_threads.max(1).min(batch_count);

    if worker_count <= 1 {
        return jobs.iter().map(&decode).collect();
    }

    debug!(
        "Decoding {} jobs in {} batches on {} workers",
        jobs.len(),
        batch_count,
        worker_count
    );

    let queue = Mutex::new(jobs.chunks(batch_size).enumerate());
    let next_batch = || {
        // Poisoning surfaces through the panicking worker's join handle.
        let mut queue = queue.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        queue.next()
    };

    let finished: Vec<Vec<(usize, Result<Vec<T>, AssetError>)>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..worker_count)
            .map(|id| {
                let next_batch = &next_batch;
                let decode = &decode;
                scope.spawn(move || {
                    let mut done = Vec::new();
                    while let Some((index, batch)) = next_batch() {
                        trace!("Worker {} decoding batch {}", id, index);
                        done.push((index, batch.iter().map(decode).collect::<Result<Vec<T>, AssetError>>()));
                    }
                    done
                })
            })
            .collect();

        let mut finished = Vec::with_capacity(handles.len());
        let mut panicked = false;
        for handle in handles {
            match handle.join() {
                Ok(done) => finished.push(done),
                Err(_) => panicked = true,
            }
        }
        if panicked {
            Err(AssetError::WorkerPanicked)
        } else {
            Ok(finished)
        }
    })?;

    let mut batches: Vec<_> = finished.into_iter().flatten().collect();
    batches.sort_by_key(|(index, _)| *index);

    let mut results = Vec::with_capacity(jobs.len());
    for (_, batch) in batches {
        results.extend(batch?);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(threads: usize, batch: usize) -> AssetConfig {
        AssetConfig::default()
            .with_loader_threads(threads)
            .with_vertex_batch_size(batch)
    }

    #[test]
    fn test_results_keep_job_order() {
        let jobs: Vec<u32> = (0..100).collect();
        let squares = decode_batches(&jobs, &config(4, 3), |&j| Ok(j * j)).unwrap();
        let expected: Vec<u32> = (0..100).map(|j| j * j).collect();
        assert_eq!(squares, expected);
    }

    #[test]
    fn test_single_worker_matches_parallel() {
        let jobs: Vec<u32> = (0..37).collect();
        let serial = decode_batches(&jobs, &config(1, 4), |&j| Ok(j + 1)).unwrap();
        let parallel = decode_batches(&jobs, &config(8, 4), |&j| Ok(j + 1)).unwrap();
        assert_eq!(serial, parallel);
    }

    #[test]
    fn test_first_error_in_job_order_wins() {
        let jobs: Vec<usize> = (0..20).collect();
        let result = decode_batches(&jobs, &config(4, 2), |&j| {
            if j == 7 || j == 15 {
                Err(AssetError::Parse { line: j, message: "bad".to_string() })
            } else {
                Ok(j)
            }
        });
        assert!(matches!(result, Err(AssetError::Parse { line: 7, .. })));
    }

    #[test]
    fn test_worker_panic_is_reported() {
        let jobs: Vec<usize> = (0..8).collect();
        let result = decode_batches(&jobs, &config(2, 1), |&j| {
            assert!(j != 5, "decode failure");
            Ok(j)
        });
        assert!(matches!(result, Err(AssetError::WorkerPanicked)));
    }

    #[test]
    fn test_empty_jobs() {
        let jobs: Vec<u8> = Vec::new();
        let result = decode_batches(&jobs, &config(4, 4), |&j| Ok(j)).unwrap();
        assert!(result.is_empty());
    }
}
