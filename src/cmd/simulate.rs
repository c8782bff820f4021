//! Scripted sessions: `photosweep simulate` and `photosweep stages`.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use photosweep::aggregate::WorkflowSnapshot;
use photosweep::engine::{Collaborators, WorkflowEngine};
use photosweep::intent::{Intent, IntentOutcome};
use photosweep::memory::{LibraryFixture, MemoryPreferences};
use photosweep::owner;
use photosweep::stage;
use photosweep::sweep_config::SweepConfig;

/// One replayed intent and what came of it.
#[derive(Debug, Serialize)]
struct SimulationStep {
    intent: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<IntentOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    steps: Vec<SimulationStep>,
    snapshot: WorkflowSnapshot,
}

fn load_intents(path: &Path) -> Result<Vec<Intent>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read intent script {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse intent script {}", path.display()))
}

pub async fn cmd_simulate(config: &SweepConfig, library: &Path, intents: &Path) -> Result<()> {
    let fixture = LibraryFixture::load(library)?;
    let intents = load_intents(intents)?;
    let library = fixture.into_library();

    let workflow = &config.toml.workflow;
    let preferences = Arc::new(MemoryPreferences::new(
        workflow.filter.clone(),
        workflow.classification_on_swipe,
        workflow.daily_task_target,
    ));
    let engine = WorkflowEngine::new(
        Collaborators {
            photos: library.photos,
            albums: library.albums,
            deleter: library.deleter,
            preferences,
        },
        config.engine_options(),
    );
    let aggregator = engine.aggregator();
    let (handle, task) = owner::spawn(engine);

    info!(count = intents.len(), "replaying intents");
    let mut steps = Vec::with_capacity(intents.len());
    for intent in intents {
        let name = intent.name();
        let step = match handle.send(intent).await {
            Ok(outcome) => SimulationStep {
                intent: name,
                outcome: Some(outcome),
                error: None,
            },
            Err(e) => {
                warn!(intent = name, error = %e, "intent failed, continuing");
                SimulationStep {
                    intent: name,
                    outcome: None,
                    error: Some(e.to_string()),
                }
            }
        };
        steps.push(step);
    }

    let revision = handle.state().revision;
    let snapshot = aggregator
        .snapshot_at(revision)
        .await
        .context("Aggregator stopped before publishing the final snapshot")?;

    drop(handle);
    let mut engine = task.await.context("Engine owner task failed")?;
    engine.dispose();

    let report = SimulationReport { steps, snapshot };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub fn cmd_stages(classification_on_swipe: bool) {
    for stage in stage::active_sequence(classification_on_swipe) {
        println!(
            "{:<9} {:>4.0}%  {}",
            stage.to_string(),
            stage::stage_progress(*stage, classification_on_swipe) * 100.0,
            stage.title_key()
        );
    }
}
