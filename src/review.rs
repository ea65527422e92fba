//! Orchestration of the generate → execute → review loop.

use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::core::classify::classify;
use crate::core::decision::{Decision, parse_decision};
use crate::core::types::{Classification, ExecOutcome, FeedbackMemory};
use crate::io::memory_store::MemoryStore;
use crate::io::oracle::{ArtifactNamer, DecisionOracle, GenerationOracle};
use crate::io::sandbox::Sandbox;
use crate::io::stable::ArtifactStore;

/// Parameters for one review-loop invocation.
#[derive(Debug, Clone)]
pub struct LoopRequest {
    /// Natural-language task for the generation oracle.
    pub prompt: String,
    /// Loop bound, inclusive; the loop runs `1..=max_attempts`.
    pub max_attempts: u32,
    /// Wall-clock budget for each candidate execution.
    pub execution_timeout: Duration,
}

/// What happened during a single attempt, for observer callbacks.
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    /// 1-indexed attempt number.
    pub attempt: u32,
    pub code: String,
    pub stdout: String,
    pub stderr: String,
    /// Present on the classify path (failed execution).
    pub classification: Option<Classification>,
    /// Present on the review path (clean execution).
    pub decision: Option<Decision>,
}

/// Where an accepted program ended up in the stable directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedArtifact {
    pub filename: String,
}

/// Summary of a finished loop.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// Stdout of the accepted attempt, or of the last attempt when the
    /// budget ran out. Exhaustion is deliberately not an error: callers
    /// always get the best-effort output.
    pub output: String,
    /// Set when the decision oracle accepted and the artifact was saved.
    pub accepted: Option<AcceptedArtifact>,
    /// Attempts actually executed.
    pub attempts: u32,
}

/// Drive the loop until the decision oracle accepts or attempts run out.
///
/// Per iteration: generate (with previous-attempt feedback and the
/// cross-run learning context), execute in the sandbox, then either review
/// a clean run with the decision oracle or classify a failed one and feed
/// the detail forward. A clean execution is necessary but not sufficient:
/// the oracle may still choose retry.
///
/// Execution, classification, and persistence problems are absorbed into
/// the loop (folded into stderr or logged); only oracle transport
/// failures surface as `Err`.
pub fn run_review_loop<G, D, N, S, F>(
    generator: &G,
    decider: &D,
    namer: &N,
    sandbox: &S,
    memory: &mut MemoryStore,
    store: &ArtifactStore,
    request: &LoopRequest,
    mut on_attempt: F,
) -> Result<LoopOutcome>
where
    G: GenerationOracle,
    D: DecisionOracle,
    N: ArtifactNamer,
    S: Sandbox,
    F: FnMut(&AttemptOutcome),
{
    let mut feedback: Option<String> = None;
    let mut feedback_memory = FeedbackMemory::default();
    let mut last_output = String::new();

    for attempt in 1..=request.max_attempts {
        info!(attempt, max_attempts = request.max_attempts, "starting attempt");

        let learning = memory.learning_context();
        let code = generator.generate(&request.prompt, feedback.as_deref(), &learning)?;

        let outcome = match sandbox.execute(&code, request.execution_timeout) {
            Ok(outcome) => outcome,
            Err(err) => {
                // Launch failures flow through the textual classifier like
                // any other failed execution.
                warn!(err = %err, "sandbox execution failed");
                ExecOutcome {
                    stdout: String::new(),
                    stderr: format!("{err:#}"),
                }
            }
        };
        last_output = outcome.stdout.clone();

        if outcome.is_clean() {
            let reply = decider.decide(
                &outcome.stdout,
                "",
                feedback.as_deref(),
                feedback_memory.lines(),
            )?;
            let decision = parse_decision(&reply);
            debug!(?decision, attempt, "decision oracle replied");

            let attempt_outcome = AttemptOutcome {
                attempt,
                code: code.clone(),
                stdout: outcome.stdout.clone(),
                stderr: String::new(),
                classification: None,
                decision: Some(decision),
            };
            on_attempt(&attempt_outcome);

            if decision == Decision::Accept {
                let accepted = persist_accepted(namer, store, &code);
                return Ok(LoopOutcome {
                    output: outcome.stdout,
                    accepted,
                    attempts: attempt,
                });
            }
            info!(attempt, "decision oracle chose retry");
            // Feedback and durable memory stay untouched on a retry vote.
            continue;
        }

        let classification = classify(&outcome.stdout, &outcome.stderr);
        if let Err(err) = memory.add_error(
            classification.category.as_str(),
            &classification.detail,
            Some(&code),
        ) {
            // A lost history entry must not stop the loop.
            warn!(err = %err, "failed to persist error history");
        }
        feedback_memory.push(classification.detail.clone());
        feedback = Some(classification.detail.clone());

        on_attempt(&AttemptOutcome {
            attempt,
            code,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            classification: Some(classification),
            decision: None,
        });
    }

    info!(
        attempts = request.max_attempts,
        "attempts exhausted, returning last output"
    );
    Ok(LoopOutcome {
        output: last_output,
        accepted: None,
        attempts: request.max_attempts,
    })
}

/// Name and save an accepted program.
///
/// Naming and persistence failures are logged and reported as `None`
/// rather than aborting: the loop still returns the accepted output even
/// when the artifact could not be written.
fn persist_accepted<N: ArtifactNamer>(
    namer: &N,
    store: &ArtifactStore,
    code: &str,
) -> Option<AcceptedArtifact> {
    let existing = match store.existing_names() {
        Ok(existing) => existing,
        Err(err) => {
            warn!(err = %err, "failed to list stable directory");
            Vec::new()
        }
    };
    let suggested = match namer.suggest_name(code, &existing) {
        Ok(suggested) => suggested,
        Err(err) => {
            warn!(err = %err, "namer failed, using fallback name");
            None
        }
    };
    let filename = store.resolve_name(suggested, &existing);
    match store.save(&filename, code) {
        Ok(_) => Some(AcceptedArtifact { filename }),
        Err(err) => {
            warn!(err = %err, "failed to save accepted program");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ErrorCategory;
    use crate::test_support::{
        ScriptedDecider, ScriptedGenerator, ScriptedNamer, ScriptedSandbox, failing, succeeding,
    };

    fn request(max_attempts: u32) -> LoopRequest {
        LoopRequest {
            prompt: "print ok".to_string(),
            max_attempts,
            execution_timeout: Duration::from_secs(5),
        }
    }

    fn fresh_store(temp: &tempfile::TempDir) -> (MemoryStore, ArtifactStore) {
        let memory = MemoryStore::load(&temp.path().join("memory.json")).expect("load memory");
        let store = ArtifactStore::new(&temp.path().join("stable"), ".py");
        (memory, store)
    }

    #[test]
    fn accepts_on_first_clean_attempt() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (mut memory, store) = fresh_store(&temp);

        let generator = ScriptedGenerator::new(vec!["print('ok')".to_string()]);
        let decider = ScriptedDecider::new(vec!["Decision: 1\nExplanation: good".to_string()]);
        let namer = ScriptedNamer::new(vec![Some("greeter.py".to_string())]);
        let sandbox = ScriptedSandbox::new(vec![succeeding("ok\n")]);

        let outcome = run_review_loop(
            &generator,
            &decider,
            &namer,
            &sandbox,
            &mut memory,
            &store,
            &request(3),
            |_| {},
        )
        .expect("loop");

        assert_eq!(outcome.output, "ok\n");
        assert_eq!(outcome.attempts, 1);
        assert_eq!(
            outcome.accepted,
            Some(AcceptedArtifact {
                filename: "greeter.py".to_string()
            })
        );
        assert_eq!(store.existing_names().expect("list"), ["greeter.py"]);
        // Accepting mutates nothing in the durable store.
        assert!(memory.record().error_history.is_empty());
    }

    #[test]
    fn exhaustion_runs_exactly_n_attempts_and_returns_last_output() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (mut memory, store) = fresh_store(&temp);

        let generator = ScriptedGenerator::new(vec!["broken(".to_string()]);
        let decider = ScriptedDecider::new(Vec::new());
        let namer = ScriptedNamer::new(Vec::new());
        let sandbox = ScriptedSandbox::new(vec![failing(
            "partial\n",
            "SyntaxError: unexpected EOF",
        )]);

        let mut seen = Vec::new();
        let outcome = run_review_loop(
            &generator,
            &decider,
            &namer,
            &sandbox,
            &mut memory,
            &store,
            &request(4),
            |attempt| seen.push(attempt.attempt),
        )
        .expect("loop");

        assert_eq!(seen, [1, 2, 3, 4]);
        assert_eq!(outcome.attempts, 4);
        assert_eq!(outcome.output, "partial\n");
        assert!(outcome.accepted.is_none());
        // The decision oracle is never consulted for failed executions.
        assert_eq!(decider.calls(), 0);
        // Every failure lands in the durable history with recomputed frequency.
        let history = &memory.record().error_history;
        assert_eq!(history.len(), 4);
        assert_eq!(history[3].frequency, 4);
    }

    #[test]
    fn classification_detail_becomes_next_feedback() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (mut memory, store) = fresh_store(&temp);

        let generator = ScriptedGenerator::new(vec![
            "import missing_thing".to_string(),
            "print('ok')".to_string(),
        ]);
        let decider = ScriptedDecider::new(vec!["Decision: 1".to_string()]);
        let namer = ScriptedNamer::new(vec![None]);
        let sandbox = ScriptedSandbox::new(vec![
            failing("", "ModuleNotFoundError: No module named 'numpy'"),
            succeeding("ok\n"),
        ]);

        let outcome = run_review_loop(
            &generator,
            &decider,
            &namer,
            &sandbox,
            &mut memory,
            &store,
            &request(3),
            |_| {},
        )
        .expect("loop");

        assert_eq!(outcome.attempts, 2);
        let feedback_seen = generator.feedback_history();
        assert_eq!(feedback_seen[0], None);
        assert!(
            feedback_seen[1]
                .as_deref()
                .expect("second attempt has feedback")
                .contains("'numpy'")
        );
        // The ephemeral detail reached the decision oracle verbatim.
        assert!(decider.last_memory_lines()[0].contains("'numpy'"));
        // Namer declined, so the counter fallback named the artifact.
        assert_eq!(
            outcome.accepted,
            Some(AcceptedArtifact {
                filename: "code_file_1.py".to_string()
            })
        );
        assert_eq!(
            memory.record().error_history[0].kind,
            ErrorCategory::MissingImport.as_str()
        );
    }

    #[test]
    fn clean_execution_can_still_be_retried() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (mut memory, store) = fresh_store(&temp);

        let generator =
            ScriptedGenerator::new(vec!["print('meh')".to_string(), "print('ok')".to_string()]);
        let decider = ScriptedDecider::new(vec![
            "Decision: 2\nExplanation: output unsatisfactory".to_string(),
            "Decision: 1\nExplanation: fine now".to_string(),
        ]);
        let namer = ScriptedNamer::new(vec![None]);
        let sandbox =
            ScriptedSandbox::new(vec![succeeding("meh\n"), succeeding("ok\n")]);

        let outcome = run_review_loop(
            &generator,
            &decider,
            &namer,
            &sandbox,
            &mut memory,
            &store,
            &request(3),
            |_| {},
        )
        .expect("loop");

        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.output, "ok\n");
        assert_eq!(decider.calls(), 2);
        // A retry vote is not a failure: nothing is classified or recorded.
        assert!(memory.record().error_history.is_empty());
        // No feedback was set by the retry vote.
        assert_eq!(generator.feedback_history()[1], None);
    }

    #[test]
    fn ambiguous_decision_reply_defaults_to_retry() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (mut memory, store) = fresh_store(&temp);

        let generator = ScriptedGenerator::new(vec!["print('ok')".to_string()]);
        let decider = ScriptedDecider::new(vec!["looks good".to_string()]);
        let namer = ScriptedNamer::new(Vec::new());
        let sandbox = ScriptedSandbox::new(vec![succeeding("ok\n")]);

        let outcome = run_review_loop(
            &generator,
            &decider,
            &namer,
            &sandbox,
            &mut memory,
            &store,
            &request(2),
            |_| {},
        )
        .expect("loop");

        // Both attempts retried; nothing accepted or saved.
        assert!(outcome.accepted.is_none());
        assert_eq!(outcome.attempts, 2);
        assert!(store.existing_names().expect("list").is_empty());
    }

    #[test]
    fn sandbox_error_is_folded_into_classification() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (mut memory, store) = fresh_store(&temp);

        let generator = ScriptedGenerator::new(vec!["print('ok')".to_string()]);
        let decider = ScriptedDecider::new(Vec::new());
        let namer = ScriptedNamer::new(Vec::new());
        let sandbox = ScriptedSandbox::erroring("interpreter not found");

        let outcome = run_review_loop(
            &generator,
            &decider,
            &namer,
            &sandbox,
            &mut memory,
            &store,
            &request(1),
            |_| {},
        )
        .expect("loop");

        assert!(outcome.accepted.is_none());
        assert_eq!(
            memory.record().error_history[0].kind,
            ErrorCategory::EmptyOutput.as_str()
        );
    }
}
