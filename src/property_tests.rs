//! Property-based tests for the derived cluster configuration

#[cfg(test)]
mod tests {
    use crate::config::{reduce_task_count, replication_factor, ConfigSet, HadoopSettings};
    use crate::templates::Artifacts;
    use proptest::prelude::*;

    // Property test: replication depends only on the eight-worker threshold
    proptest! {
        #[test]
        fn test_replication_threshold(workers in 0usize..10_000usize) {
            let expected = if workers >= 8 { 3 } else { 2 };
            prop_assert_eq!(replication_factor(workers, None), expected);
        }

        #[test]
        fn test_replication_override_always_wins(
            workers in 0usize..10_000usize,
            requested in 1u32..16u32,
        ) {
            prop_assert_eq!(replication_factor(workers, Some(requested)), requested);
        }
    }

    // Property test: reduce task count is the nearest integer, halves rounding up
    proptest! {
        #[test]
        fn test_reduce_tasks_round_half_up(
            reduce_max in 0u32..64u32,
            workers in 0usize..2_000usize,
            factor in 0.0f64..8.0f64,
        ) {
            let exact = f64::from(reduce_max) * workers as f64 * factor;
            let count = reduce_task_count(reduce_max, workers, factor) as f64;

            prop_assert!(count <= exact + 0.5);
            prop_assert!(count > exact - 0.5);
        }

        #[test]
        fn test_no_workers_no_reduce_tasks(
            reduce_max in 0u32..64u32,
            factor in 0.0f64..8.0f64,
        ) {
            prop_assert_eq!(reduce_task_count(reduce_max, 0, factor), 0);
        }
    }

    // Property test: every node receives the same slaves file, master excluded
    proptest! {
        #[test]
        fn test_slaves_lists_workers_only(
            workers in prop::collection::btree_set("node[0-9]{3}", 0..40),
        ) {
            let workers: Vec<String> = workers.into_iter().collect();
            let settings = HadoopSettings::default();
            let config = ConfigSet::for_worker_count(workers.len(), &settings);
            let artifacts = Artifacts::render(&config, &settings, "master", &workers).unwrap();

            let listed: Vec<&str> = if artifacts.slaves.content.is_empty() {
                Vec::new()
            } else {
                artifacts.slaves.content.split('\n').collect()
            };
            prop_assert_eq!(listed.len(), workers.len());
            prop_assert!(!listed.contains(&"master"));
            prop_assert_eq!(config.worker_count, workers.len());
        }
    }
}
