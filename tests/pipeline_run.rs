use std::time::Duration;

use mockall::Sequence;

use folio_press::config::{PipelineConfig, RetryPolicy};
use folio_press::generate::{GenerateError, MockCompletionClient};
use folio_press::pipeline::{Pipeline, PipelineError, Publication, Stage};
use folio_press::profile::{Credentials, UserProfile};
use folio_press::publish::{MockRepoHost, PublishError, RepoId};

const MODEL_OUTPUT: &str =
    "Here you go:\n```html\n<html><head><title>Me</title></head><body><h1>Backend engineer</h1></body></html>\n```";
const EXPECTED_DOCUMENT: &str =
    "<html><head><title>Me</title></head><body><h1>Backend engineer</h1></body></html>";

fn sample_profile() -> UserProfile {
    UserProfile {
        bio: "Backend engineer, 5 yrs".to_string(),
        links: vec!["https://x.dev".to_string()],
        aesthetic: "minimalist dark mode".to_string(),
        color_theme: None,
        layout: None,
    }
}

fn sample_credentials() -> Credentials {
    Credentials::new("test-api-key", "test-token")
}

/// Config with a fixed repository name and no real waiting, so tests are
/// fast and deterministic.
fn test_config(repo_name: &str) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.repo_name = Some(repo_name.to_string());
    config.settle_delay = Duration::ZERO;
    config.retry = RetryPolicy {
        max_attempts: 3,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff_multiplier: 2.0,
    };
    config
}

fn happy_host() -> MockRepoHost {
    let mut host = MockRepoHost::new();
    host.expect_create_repository()
        .times(1)
        .returning(move |_, name| {
            Ok(RepoId {
                owner: "octo".to_string(),
                name: name.to_string(),
            })
        });
    host.expect_put_file()
        .times(1)
        .withf(|_, _, path, content, _| {
            path == "index.html" && content == EXPECTED_DOCUMENT.as_bytes()
        })
        .returning(|_, _, _, _, _| Ok("abc123".to_string()));
    host.expect_enable_pages().times(1).returning(|_, _| Ok(()));
    host.expect_site_url()
        .returning(|repo| format!("https://{}.github.io/{}/", repo.owner, repo.name));
    host
}

#[tokio::test]
async fn run_publishes_extracted_document() {
    let mut llm = MockCompletionClient::new();
    llm.expect_complete()
        .times(1)
        .returning(|_, _| Ok(MODEL_OUTPUT.to_string()));

    let pipeline = Pipeline::new(llm, happy_host(), test_config("folio-test"));
    let outcome = pipeline
        .run(&sample_profile(), &sample_credentials())
        .await
        .expect("pipeline should succeed");

    match outcome {
        Publication::Complete(result) => {
            assert_eq!(result.repo.owner, "octo");
            assert_eq!(result.repo.name, "folio-test");
            assert_eq!(result.commit, "abc123");
            assert_eq!(result.url, "https://octo.github.io/folio-test/");
        }
        other => panic!("expected complete publication, got {other:?}"),
    }
}

#[tokio::test]
async fn validation_failure_never_reaches_the_publisher() {
    let mut llm = MockCompletionClient::new();
    llm.expect_complete()
        .times(1)
        .returning(|_, _| Ok("I could not produce a page, sorry.".to_string()));

    let mut host = MockRepoHost::new();
    host.expect_create_repository().times(0);
    host.expect_put_file().times(0);

    let pipeline = Pipeline::new(llm, host, test_config("folio-test"));
    let err = pipeline
        .run(&sample_profile(), &sample_credentials())
        .await
        .expect_err("validation must fail the run");

    assert!(matches!(err, PipelineError::Validation { .. }));
    assert_eq!(err.stage(), Stage::Generate);
}

#[tokio::test]
async fn empty_bio_fails_before_any_external_call() {
    let mut llm = MockCompletionClient::new();
    llm.expect_complete().times(0);
    let mut host = MockRepoHost::new();
    host.expect_create_repository().times(0);

    let mut profile = sample_profile();
    profile.bio = "  ".to_string();

    let pipeline = Pipeline::new(llm, host, test_config("folio-test"));
    let err = pipeline
        .run(&profile, &sample_credentials())
        .await
        .expect_err("empty bio must fail");

    assert!(matches!(err, PipelineError::InvalidInput { .. }));
    assert_eq!(err.stage(), Stage::Compile);
}

#[tokio::test]
async fn empty_credentials_fail_before_any_external_call() {
    let mut llm = MockCompletionClient::new();
    llm.expect_complete().times(0);
    let host = MockRepoHost::new();

    let pipeline = Pipeline::new(llm, host, test_config("folio-test"));
    let err = pipeline
        .run(&sample_profile(), &Credentials::new("", "token"))
        .await
        .expect_err("empty api key must fail");

    assert!(matches!(err, PipelineError::InvalidInput { .. }));
}

#[tokio::test]
async fn upstream_outage_is_retried_exactly_to_the_bound() {
    let mut llm = MockCompletionClient::new();
    llm.expect_complete()
        .times(3)
        .returning(|_, _| Err(GenerateError::Upstream("service unavailable".to_string())));

    let mut host = MockRepoHost::new();
    host.expect_create_repository().times(0);

    let pipeline = Pipeline::new(llm, host, test_config("folio-test"));
    let err = pipeline
        .run(&sample_profile(), &sample_credentials())
        .await
        .expect_err("persistent outage must fail");

    match err {
        PipelineError::Upstream {
            stage, attempts, ..
        } => {
            assert_eq!(stage, Stage::Generate);
            assert_eq!(attempts, 3, "retry count must be exactly the bound");
        }
        other => panic!("expected upstream failure, got {other:?}"),
    }
}

#[tokio::test]
async fn single_transient_outage_recovers() {
    let mut seq = Sequence::new();
    let mut llm = MockCompletionClient::new();
    llm.expect_complete()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Err(GenerateError::Upstream("blip".to_string())));
    llm.expect_complete()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(MODEL_OUTPUT.to_string()));

    let pipeline = Pipeline::new(llm, happy_host(), test_config("folio-test"));
    let outcome = pipeline
        .run(&sample_profile(), &sample_credentials())
        .await
        .expect("pipeline should recover from one blip");
    assert!(matches!(outcome, Publication::Complete(_)));
}

#[tokio::test]
async fn auth_failure_is_never_retried() {
    let mut llm = MockCompletionClient::new();
    llm.expect_complete()
        .times(1)
        .returning(|_, _| Err(GenerateError::Auth));

    let mut host = MockRepoHost::new();
    host.expect_create_repository().times(0);

    let pipeline = Pipeline::new(llm, host, test_config("folio-test"));
    let err = pipeline
        .run(&sample_profile(), &sample_credentials())
        .await
        .expect_err("auth failure must fail");

    assert!(matches!(err, PipelineError::Auth { stage: Stage::Generate }));
}

#[tokio::test]
async fn name_conflict_surfaces_without_a_commit_attempt() {
    let mut llm = MockCompletionClient::new();
    llm.expect_complete()
        .times(1)
        .returning(|_, _| Ok(MODEL_OUTPUT.to_string()));

    let mut host = MockRepoHost::new();
    host.expect_create_repository().times(1).returning(|_, name| {
        Err(PublishError::NameConflict {
            name: name.to_string(),
        })
    });
    host.expect_put_file().times(0);

    let pipeline = Pipeline::new(llm, host, test_config("folio-taken"));
    let err = pipeline
        .run(&sample_profile(), &sample_credentials())
        .await
        .expect_err("conflict must fail the run");

    match err {
        PipelineError::NameConflict { name } => assert_eq!(name, "folio-taken"),
        other => panic!("expected name conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn commit_failure_after_creation_is_a_partial_publication() {
    let mut llm = MockCompletionClient::new();
    llm.expect_complete()
        .times(1)
        .returning(|_, _| Ok(MODEL_OUTPUT.to_string()));

    let mut host = MockRepoHost::new();
    host.expect_create_repository()
        .times(1)
        .returning(|_, name| {
            Ok(RepoId {
                owner: "octo".to_string(),
                name: name.to_string(),
            })
        });
    // The commit is attempted exactly once: a partial publish is never
    // retried automatically.
    host.expect_put_file()
        .times(1)
        .returning(|_, _, _, _, _| Err(PublishError::Upstream("write failed".to_string())));
    host.expect_enable_pages().times(0);

    let pipeline = Pipeline::new(llm, host, test_config("folio-test"));
    let outcome = pipeline
        .run(&sample_profile(), &sample_credentials())
        .await
        .expect("partial publish is a terminal outcome, not an error");

    match outcome {
        Publication::Partial(partial) => {
            assert_eq!(partial.repo, RepoId {
                owner: "octo".to_string(),
                name: "folio-test".to_string(),
            });
            assert!(partial.reason.contains("write failed"));
        }
        other => panic!("expected partial publication, got {other:?}"),
    }
}

#[tokio::test]
async fn creation_outage_is_retried_then_fails_at_publish_stage() {
    let mut llm = MockCompletionClient::new();
    llm.expect_complete()
        .times(1)
        .returning(|_, _| Ok(MODEL_OUTPUT.to_string()));

    let mut host = MockRepoHost::new();
    host.expect_create_repository()
        .times(3)
        .returning(|_, _| Err(PublishError::Upstream("host down".to_string())));
    host.expect_put_file().times(0);

    let pipeline = Pipeline::new(llm, host, test_config("folio-test"));
    let err = pipeline
        .run(&sample_profile(), &sample_credentials())
        .await
        .expect_err("persistent host outage must fail");

    match err {
        PipelineError::Upstream {
            stage, attempts, ..
        } => {
            assert_eq!(stage, Stage::Publish);
            assert_eq!(attempts, 3);
        }
        other => panic!("expected upstream failure, got {other:?}"),
    }
}

#[tokio::test]
async fn repeated_runs_are_independent() {
    for name in ["folio-first", "folio-second"] {
        let mut llm = MockCompletionClient::new();
        llm.expect_complete()
            .times(1)
            .returning(|_, _| Ok(MODEL_OUTPUT.to_string()));

        let pipeline = Pipeline::new(llm, happy_host(), test_config(name));
        let outcome = pipeline
            .run(&sample_profile(), &sample_credentials())
            .await
            .expect("each invocation should succeed on its own");

        match outcome {
            Publication::Complete(result) => {
                assert_eq!(result.repo.name, name);
                assert!(!result.url.is_empty());
            }
            other => panic!("expected complete publication, got {other:?}"),
        }
    }
}
