use std::sync::{Arc, Barrier};
use std::thread;

use lgpd_core::errors::StorageError;
use lgpd_core::models::{JobState, NewSourceConfig, TransitionPayload};
use lgpd_core::traits::{IJobStore, ISourceRegistry};
use lgpd_storage::StorageEngine;
use proptest::prelude::*;
use tempfile::TempDir;

fn setup(dir: &TempDir) -> (Arc<StorageEngine>, lgpd_core::JobId) {
    let store = StorageEngine::open(&dir.path().join("race.db"), 4).unwrap();
    let source = store
        .register(&NewSourceConfig {
            name: "race".to_string(),
            host: String::new(),
            port: 0,
            username: String::new(),
            password: String::new(),
            database_name: "race.sqlite".to_string(),
            driver: "sqlite".to_string(),
        })
        .unwrap();
    let job = store.create_job(source.id).unwrap();
    (Arc::new(store), job.id)
}

fn away_from_running() -> impl Strategy<Value = JobState> {
    prop_oneof![
        Just(JobState::failed("cancelled")),
        Just(JobState::failed("timeout")),
        (41u8..=100).prop_map(|progress| JobState::InProgress { progress }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn racing_dispatch_has_exactly_one_winner(threads in 2usize..12) {
        let dir = TempDir::new().unwrap();
        let (store, job_id) = setup(&dir);
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    store.transition(
                        job_id,
                        &JobState::Pending,
                        JobState::InProgress { progress: 0 },
                        TransitionPayload::none(),
                    )
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let wins = results.iter().filter(|r| r.is_ok()).count();
        let stale = results
            .iter()
            .filter(|r| matches!(r, Err(StorageError::StaleState { .. })))
            .count();
        prop_assert_eq!(wins, 1);
        prop_assert_eq!(stale, threads - 1);
        prop_assert_eq!(
            store.get_job(job_id).unwrap().state,
            JobState::InProgress { progress: 0 }
        );
    }

    #[test]
    fn racing_cancel_and_dispatch_end_in_one_state(threads in 2usize..8) {
        let dir = TempDir::new().unwrap();
        let (store, job_id) = setup(&dir);
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let next = if i % 2 == 0 {
                        JobState::InProgress { progress: 0 }
                    } else {
                        JobState::failed("cancelled")
                    };
                    barrier.wait();
                    store
                        .transition(job_id, &JobState::Pending, next, TransitionPayload::none())
                        .map(|job| job.state)
                })
            })
            .collect();

        let winners: Vec<JobState> = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap().ok())
            .collect();
        prop_assert_eq!(winners.len(), 1);
        prop_assert_eq!(&store.get_job(job_id).unwrap().state, &winners[0]);
    }

    #[test]
    fn racing_updates_of_a_running_job_have_one_winner(
        targets in prop::collection::vec(away_from_running(), 2..10)
    ) {
        let dir = TempDir::new().unwrap();
        let (store, job_id) = setup(&dir);
        let running = JobState::InProgress { progress: 40 };
        store
            .transition(job_id, &JobState::Pending, running.clone(), TransitionPayload::none())
            .unwrap();
        let barrier = Arc::new(Barrier::new(targets.len()));

        let handles: Vec<_> = targets
            .iter()
            .cloned()
            .map(|next| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                let running = running.clone();
                thread::spawn(move || {
                    barrier.wait();
                    store
                        .transition(job_id, &running, next, TransitionPayload::none())
                        .map(|job| job.state)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners: Vec<&JobState> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        let stale = results
            .iter()
            .filter(|r| matches!(r, Err(StorageError::StaleState { .. })))
            .count();
        prop_assert_eq!(winners.len(), 1);
        prop_assert_eq!(stale, targets.len() - 1);
        prop_assert_eq!(&store.get_job(job_id).unwrap().state, winners[0]);
    }
}
