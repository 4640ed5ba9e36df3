// tests/runner_interrupt.rs

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::io::AsyncWriteExt;

use remoterun::runner::{CommandRunner, InterruptHandle, RunOutcome, fail_and_interrupt};
use remoterun::store::MemoryRepository;
use remoterun::types::{ExecStatus, ScriptType};
use remoterun_test_utils::builders::{
    CLUSTER_ID, RecordBuilder, SCHEDULING_ID, fast_settings, seeded_repository,
};
use remoterun_test_utils::fake_shell::FakeShell;
use remoterun_test_utils::follow_up::RecordingFollowUp;
use remoterun_test_utils::{init_tracing, wait_until, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn runner(
    repo: &MemoryRepository,
    shell: &FakeShell,
    follow_up: &RecordingFollowUp,
) -> CommandRunner<FakeShell> {
    CommandRunner::new(
        Arc::new(repo.clone()),
        shell.clone(),
        Arc::new(follow_up.clone()),
        fast_settings(),
    )
}

fn stdout_contains(repo: &MemoryRepository, id: &str, needle: &str) -> bool {
    repo.record(id)
        .and_then(|r| r.stdout_snapshot)
        .is_some_and(|s| s.contains(needle))
}

#[tokio::test]
async fn watchdog_interrupt_during_capture_adopts_stored_status() -> TestResult {
    init_tracing();

    let repo = seeded_repository(ScriptType::Shell, "");
    repo.insert_record(
        RecordBuilder::new("r1", "long-job.sh")
            .scheduling(SCHEDULING_ID)
            .build(),
    );
    let shell = FakeShell::hanging().with_stdout("progress 10%\n");
    let follow_up = RecordingFollowUp::new();
    let handle = InterruptHandle::new();

    let task = {
        let runner = runner(&repo, &shell, &follow_up);
        let handle = handle.clone();
        tokio::spawn(async move { runner.execute("r1", &handle).await })
    };

    with_timeout(wait_until(|| stdout_contains(&repo, "r1", "progress 10%"))).await;
    assert!(fail_and_interrupt(&repo, "r1", "timed out by watchdog", &handle));

    let outcome = with_timeout(task).await?;
    assert_eq!(outcome, RunOutcome::Interrupted(ExecStatus::Failed));

    let stored = repo.record("r1").ok_or("record missing")?;
    assert_eq!(stored.status, ExecStatus::Failed);
    assert_eq!(stored.last_error.as_deref(), Some("timed out by watchdog"));
    assert!(stored.finish_time.is_some());
    assert_eq!(stored.stdout_snapshot.as_deref(), Some("progress 10%\n"));

    // The interrupting actor owns notification.
    assert!(follow_up.calls().is_empty());
    assert_eq!(shell.closed_sessions(), 1);
    assert_eq!(shell.open_sessions(), 0);
    Ok(())
}

#[tokio::test]
async fn interrupt_keeps_external_job_fields_found_so_far() -> TestResult {
    init_tracing();

    let repo = seeded_repository(ScriptType::SparkStream, "stream");
    repo.insert_record(
        RecordBuilder::new("r1", "spark-submit --name stream app.jar")
            .cluster(CLUSTER_ID)
            .build(),
    );
    let shell = FakeShell::hanging().with_stdout("Submitted application application_17_3\n");
    let follow_up = RecordingFollowUp::new();
    let handle = InterruptHandle::new();

    let task = {
        let runner = runner(&repo, &shell, &follow_up);
        let handle = handle.clone();
        tokio::spawn(async move { runner.execute("r1", &handle).await })
    };

    with_timeout(wait_until(|| stdout_contains(&repo, "r1", "application_17_3"))).await;
    assert!(fail_and_interrupt(&repo, "r1", "cancelled", &handle));

    let outcome = with_timeout(task).await?;
    assert_eq!(outcome, RunOutcome::Interrupted(ExecStatus::Failed));

    let stored = repo.record("r1").ok_or("record missing")?;
    assert_eq!(stored.last_error.as_deref(), Some("cancelled"));
    assert!(
        stored
            .stdout_snapshot
            .as_deref()
            .is_some_and(|s| s.contains("application_17_3"))
    );
    // The stream never finished, so no id was extracted.
    assert_eq!(stored.external_job_id, None);
    Ok(())
}

#[tokio::test]
async fn interrupt_after_completion_is_a_no_op() -> TestResult {
    init_tracing();

    let repo = seeded_repository(ScriptType::Shell, "");
    repo.insert_record(RecordBuilder::new("r1", "true").build());
    let shell = FakeShell::exiting(0);
    let follow_up = RecordingFollowUp::new();
    let handle = InterruptHandle::new();

    let outcome = with_timeout(runner(&repo, &shell, &follow_up).execute("r1", &handle)).await;
    assert_eq!(outcome, RunOutcome::Finished(ExecStatus::Succeeded));

    assert!(handle.is_command_finished());
    assert!(!handle.interrupt());
    assert!(!fail_and_interrupt(&repo, "r1", "too late", &handle));

    let stored = repo.record("r1").ok_or("record missing")?;
    assert_eq!(stored.status, ExecStatus::Succeeded);
    assert_eq!(stored.last_error, None);
    Ok(())
}

#[tokio::test]
async fn repeated_interrupts_fire_once() -> TestResult {
    init_tracing();

    let repo = seeded_repository(ScriptType::Shell, "");
    repo.insert_record(RecordBuilder::new("r1", "sleep 600").build());
    let shell = FakeShell::hanging().with_stdout("started\n");
    let follow_up = RecordingFollowUp::new();
    let handle = InterruptHandle::new();

    let task = {
        let runner = runner(&repo, &shell, &follow_up);
        let handle = handle.clone();
        tokio::spawn(async move { runner.execute("r1", &handle).await })
    };

    with_timeout(wait_until(|| stdout_contains(&repo, "r1", "started"))).await;
    assert!(fail_and_interrupt(&repo, "r1", "first", &handle));
    assert!(!fail_and_interrupt(&repo, "r1", "second", &handle));
    assert!(!handle.interrupt());

    let outcome = with_timeout(task).await?;
    assert_eq!(outcome, RunOutcome::Interrupted(ExecStatus::Failed));
    let stored = repo.record("r1").ok_or("record missing")?;
    assert_eq!(stored.last_error.as_deref(), Some("first"));
    Ok(())
}

#[tokio::test]
async fn output_arriving_after_watchdog_verdict_keeps_it() -> TestResult {
    init_tracing();

    let repo = seeded_repository(ScriptType::Shell, "");
    repo.insert_record(RecordBuilder::new("r1", "long-job.sh").build());
    let (shell, mut stdout) = FakeShell::piped();
    let follow_up = RecordingFollowUp::new();
    let handle = InterruptHandle::new();

    let task = {
        let runner = runner(&repo, &shell, &follow_up);
        let handle = handle.clone();
        tokio::spawn(async move { runner.execute("r1", &handle).await })
    };

    stdout.write_all(b"chunk 1\n").await?;
    with_timeout(wait_until(|| stdout_contains(&repo, "r1", "chunk 1"))).await;

    // A watchdog in another process writes its verdict straight to the store
    // and has not interrupted yet.
    let mut verdict = repo.record("r1").ok_or("record missing")?;
    verdict.status = ExecStatus::Failed;
    verdict.finish_time = Some(Utc::now());
    verdict.last_error = Some("timed out by watchdog".to_string());
    repo.insert_record(verdict);

    stdout.write_all(b"chunk 2\n").await?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let stored = repo.record("r1").ok_or("record missing")?;
    assert_eq!(stored.status, ExecStatus::Failed);
    assert_eq!(stored.last_error.as_deref(), Some("timed out by watchdog"));

    assert!(handle.interrupt());
    let outcome = with_timeout(task).await?;
    assert_eq!(outcome, RunOutcome::Interrupted(ExecStatus::Failed));

    let stored = repo.record("r1").ok_or("record missing")?;
    assert_eq!(stored.status, ExecStatus::Failed);
    assert_eq!(stored.last_error.as_deref(), Some("timed out by watchdog"));
    assert_eq!(stored.stdout_snapshot.as_deref(), Some("chunk 1\nchunk 2\n"));
    assert!(follow_up.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn interrupt_without_stored_verdict_fails_the_record() -> TestResult {
    init_tracing();

    let repo = seeded_repository(ScriptType::Shell, "");
    repo.insert_record(RecordBuilder::new("r1", "sleep 600").build());
    let shell = FakeShell::hanging().with_stdout("started\n");
    let follow_up = RecordingFollowUp::new();
    let handle = InterruptHandle::new();

    let task = {
        let runner = runner(&repo, &shell, &follow_up);
        let handle = handle.clone();
        tokio::spawn(async move { runner.execute("r1", &handle).await })
    };

    with_timeout(wait_until(|| stdout_contains(&repo, "r1", "started"))).await;
    assert!(handle.interrupt());

    let outcome = with_timeout(task).await?;
    assert_eq!(outcome, RunOutcome::Interrupted(ExecStatus::Failed));

    let stored = repo.record("r1").ok_or("record missing")?;
    assert_eq!(stored.status, ExecStatus::Failed);
    assert!(stored.finish_time.is_some());
    assert!(
        stored
            .last_error
            .as_deref()
            .is_some_and(|e| e.contains("not terminal"))
    );
    Ok(())
}

#[tokio::test]
async fn submit_failure_after_interrupt_keeps_stored_verdict() -> TestResult {
    init_tracing();

    let repo = seeded_repository(ScriptType::Shell, "");
    repo.insert_record(
        RecordBuilder::new("r1", "true")
            .scheduling(SCHEDULING_ID)
            .build(),
    );
    let handle = InterruptHandle::new();
    let shell = {
        let repo = repo.clone();
        let handle = handle.clone();
        FakeShell::exiting(0)
            .failing_submit("channel closed")
            .on_open(move || {
                fail_and_interrupt(&repo, "r1", "timed out", &handle);
            })
    };
    let follow_up = RecordingFollowUp::new();

    let outcome = with_timeout(runner(&repo, &shell, &follow_up).execute("r1", &handle)).await;
    assert_eq!(outcome, RunOutcome::Interrupted(ExecStatus::Failed));
    assert!(handle.is_interrupted());

    let stored = repo.record("r1").ok_or("record missing")?;
    assert_eq!(stored.status, ExecStatus::Failed);
    assert!(stored.finish_time.is_some());
    assert_eq!(stored.last_error.as_deref(), Some("Remote IO error: channel closed"));

    // Interrupted runs never notify or chain.
    assert!(follow_up.calls().is_empty());
    assert_eq!(shell.closed_sessions(), 1);
    Ok(())
}
