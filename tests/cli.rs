use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::write;
use tempfile::NamedTempFile;

#[test]
fn help_describes_the_build_command() {
    let mut cmd = Command::cargo_bin("folio-press").expect("Binary exists");
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("build"));
}

#[test]
fn build_fails_for_missing_profile_file() {
    let mut cmd = Command::cargo_bin("folio-press").expect("Binary exists");
    cmd.arg("build")
        .arg("--profile")
        .arg("/definitely/not/here.yaml");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read profile file"));
}

#[test]
fn build_fails_when_credentials_are_missing_from_the_environment() {
    let profile = NamedTempFile::new().expect("temp file");
    write(
        profile.path(),
        b"profile:\n  bio: \"Backend engineer\"\n  aesthetic: \"minimalist\"\n",
    )
    .expect("write profile");

    let mut cmd = Command::cargo_bin("folio-press").expect("Binary exists");
    cmd.arg("build")
        .arg("--profile")
        .arg(profile.path())
        .env_remove("GEMINI_API_KEY")
        .env_remove("GITHUB_TOKEN");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("GEMINI_API_KEY"));
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::layer::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        use std::fmt::Write as FmtWrite;
        let mut msg = String::new();
        let _ = write!(&mut msg, "{:?}", event);
        self.events.lock().unwrap().push(msg);
    }
}

#[tokio::test]
async fn emits_cli_started_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use folio_press::cli::{run, Cli, Commands};

    // Minimum input for the Build subcommand; the dummy path fails later,
    // after the startup event has been emitted.
    let cli = Cli {
        command: Commands::Build {
            profile: std::path::PathBuf::from("dummy.yaml"),
            name: None,
        },
    };

    let _ = run(cli).await;

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("cli_started")),
        "Expected a 'cli_started' trace event, got: {:?}",
        event_msgs
    );
}
