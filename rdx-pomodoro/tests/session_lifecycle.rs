use pomodoro::prelude::*;
use std::time::Duration;
use tokio::sync::mpsc;

#[tokio::test(flavor = "multi_thread")]
async fn quarter_second_cycle() {
    let session = Session::new(Duration::from_millis(250), Duration::from_millis(250)).unwrap();
    assert_eq!(session.current_state(), SessionState::New);

    session.start().unwrap();
    assert_eq!(session.current_state(), SessionState::Focusing);
    let started_at = session.state_timestamp();

    tokio::time::sleep(Duration::from_millis(260)).await;
    assert_eq!(session.current_state(), SessionState::OnBreak);
    assert!(session.state_timestamp() > started_at);

    tokio::time::sleep(Duration::from_millis(260)).await;
    assert_eq!(session.current_state(), SessionState::Focusing);

    session.teardown();
    assert_eq!(session.current_state(), SessionState::Invalid);
    let err = session.start().unwrap_err();
    assert_eq!(err.from, SessionState::Invalid);
    assert_eq!(err.to, SessionState::Focusing);
}

#[tokio::test(flavor = "multi_thread")]
async fn observers_follow_every_transition() {
    let duration = Duration::from_millis(125);
    let session = Session::new(duration, duration).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    for _ in 0..2 {
        let tx = tx.clone();
        session.add_observer(move |state| {
            tx.send(state)?;
            Ok(())
        });
    }
    session.start().unwrap();

    assert_eq!(rx.recv().await, Some(SessionState::Focusing));
    assert_eq!(rx.recv().await, Some(SessionState::Focusing));

    // Nothing else until the focus phase ends.
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(rx.try_recv().is_err());

    for expected in [SessionState::OnBreak, SessionState::Focusing, SessionState::OnBreak] {
        assert_eq!(rx.recv().await, Some(expected));
        assert_eq!(rx.recv().await, Some(expected));
    }
    session.teardown();
    assert_eq!(session.dispatch_stats().failed(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_observer_does_not_delay_phases() {
    let duration = Duration::from_millis(50);
    let session = Session::new(duration, duration).unwrap();
    session.add_observer(|_| {
        std::thread::sleep(Duration::from_millis(400));
        Ok(())
    });
    session.start().unwrap();

    tokio::time::sleep(duration + Duration::from_millis(25)).await;
    assert_eq!(session.current_state(), SessionState::OnBreak);
    tokio::time::sleep(duration).await;
    assert_eq!(session.current_state(), SessionState::Focusing);
    session.teardown();
}

#[tokio::test(flavor = "multi_thread")]
async fn shared_handles_register_concurrently() {
    let duration = Duration::from_millis(20);
    let session = Session::new(duration, duration).unwrap();
    session.start().unwrap();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let session = session.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..25 {
                session.add_observer(|_| Ok(()));
                let _ = session.current_state();
                tokio::task::yield_now().await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(session.observer_count(), 200);

    session.teardown();
    assert_eq!(session.current_state(), SessionState::Invalid);
}

#[tokio::test(flavor = "multi_thread")]
async fn teardown_from_another_thread() {
    let session = Session::new(Duration::from_millis(30), Duration::from_millis(30)).unwrap();
    session.start().unwrap();
    tokio::time::sleep(Duration::from_millis(45)).await;

    let remote = session.clone();
    std::thread::spawn(move || remote.teardown()).join().unwrap();
    assert_eq!(session.current_state(), SessionState::Invalid);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(session.current_state(), SessionState::Invalid);
}
