use log::debug;
use rayon::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParallelError {
    #[error("Thread error: {0}")]
    ThreadError(String),

    #[error("Invalid job count: {0}")]
    InvalidJobCount(usize),
}

/// Runs `processor` over `items` on a dedicated pool of `jobs` threads.
///
/// Every item gets its own `Result`; one failure never cancels the rest.
/// The returned vector is in the same order as `items`, whatever order the
/// work finished in.
pub fn process_ordered<T, U, E, F>(
    items: &[T],
    jobs: usize,
    processor: F,
) -> Result<Vec<Result<U, E>>, ParallelError>
where
    T: Sync,
    U: Send,
    E: Send,
    F: Fn(&T) -> Result<U, E> + Send + Sync,
{
    if jobs == 0 {
        return Err(ParallelError::InvalidJobCount(jobs));
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .thread_name(|i| format!("sample-{}", i))
        .build()
        .map_err(|e| ParallelError::ThreadError(format!("Failed to build thread pool: {}", e)))?;
    debug!("Processing {} item(s) on {} thread(s)", items.len(), jobs);

    Ok(pool.install(|| items.par_iter().map(|item| processor(item)).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_results_keep_input_order() {
        let items: Vec<u64> = (0..50).collect();
        let results = process_ordered(&items, 4, |&n| {
            // Later items finish first.
            std::thread::sleep(std::time::Duration::from_millis(50 - n));
            Ok::<u64, String>(n * 2)
        })
        .unwrap();

        let values: Vec<u64> = results.into_iter().map(Result::unwrap).collect();
        assert_eq!(values, items.iter().map(|n| n * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_failures_do_not_cancel_others() {
        let items = vec![1, 2, 3, 4];
        let results = process_ordered(&items, 2, |&n| {
            if n % 2 == 0 {
                Err(format!("sample {} failed", n))
            } else {
                Ok(n)
            }
        })
        .unwrap();

        assert_eq!(results.len(), 4);
        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 2);
        assert_eq!(results[0], Ok(1));
        assert_eq!(results[1], Err("sample 2 failed".to_string()));
    }

    #[test]
    fn test_zero_jobs_rejected() {
        let items = vec![1];
        assert!(matches!(
            process_ordered(&items, 0, |&n| Ok::<i32, String>(n)),
            Err(ParallelError::InvalidJobCount(0))
        ));
    }
}
