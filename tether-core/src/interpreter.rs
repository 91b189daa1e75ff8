//! Interpreter - Execute Effects using a Provider
//!
//! The Interpreter executes the Effects of a Plan and collects the results.
//! This is where side effects actually occur. Effects are independent of each
//! other, so they run concurrently; providers are expected to serialize work
//! that shares a remote object (see [`crate::lock::KeyedLockManager`]).

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::effect::Effect;
use crate::plan::Plan;
use crate::provider::{Provider, ProviderError, ProviderResult};
use crate::resource::{ResourceId, State};

/// Result of executing each Effect
#[derive(Debug)]
pub enum EffectOutcome {
    /// Create succeeded
    Created { state: State },
    /// Update succeeded
    Updated { state: State },
    /// The replacement was created and the previous resource deleted
    Replaced { state: State },
    /// Delete succeeded
    Deleted { id: ResourceId },
    /// Tracking dropped; the remote object was not touched
    Forgotten { id: ResourceId },
    /// Skipped (e.g., dry-run)
    Skipped { reason: String },
}

/// Result of executing the entire Plan
///
/// `outcomes` is in plan order regardless of completion order.
#[derive(Debug)]
pub struct ApplyResult {
    pub outcomes: Vec<(Effect, Result<EffectOutcome, ProviderError>)>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl ApplyResult {
    pub fn is_success(&self) -> bool {
        self.failure_count == 0
    }
}

/// Interpreter configuration
#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    /// If true, skip actual side effects
    pub dry_run: bool,
    /// Maximum number of effects in flight at once
    pub parallelism: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            parallelism: 10,
        }
    }
}

/// Interpreter that executes Effects using a Provider
pub struct Interpreter<P: Provider + 'static> {
    provider: Arc<P>,
    config: InterpreterConfig,
}

impl<P: Provider + 'static> Interpreter<P> {
    pub fn new(provider: P) -> Self {
        Self::from_shared(Arc::new(provider))
    }

    pub fn from_shared(provider: Arc<P>) -> Self {
        Self {
            provider,
            config: InterpreterConfig::default(),
        }
    }

    pub fn with_config(mut self, config: InterpreterConfig) -> Self {
        self.config = config;
        self
    }

    /// Execute a Plan, interpreting all Effects and causing side effects
    pub async fn apply(&self, plan: &Plan) -> ApplyResult {
        let permits = Arc::new(Semaphore::new(self.config.parallelism.max(1)));
        let mut tasks = JoinSet::new();

        for (index, effect) in plan.effects().iter().cloned().enumerate() {
            let provider = Arc::clone(&self.provider);
            let permits = Arc::clone(&permits);
            let dry_run = self.config.dry_run;
            tasks.spawn(async move {
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => execute_effect(provider.as_ref(), &effect, dry_run).await,
                    Err(_) => Err(ProviderError::new("interpreter shut down")),
                };
                (index, result)
            });
        }

        let mut results: Vec<Option<ProviderResult<EffectOutcome>>> =
            (0..plan.effects().len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => log::error!("effect task failed to complete: {}", e),
            }
        }

        let mut outcomes = Vec::with_capacity(results.len());
        let mut success_count = 0;
        let mut failure_count = 0;
        for (effect, result) in plan.effects().iter().cloned().zip(results) {
            let result = result.unwrap_or_else(|| {
                Err(ProviderError::new("effect task panicked").for_resource(effect.resource_id().clone()))
            });
            match &result {
                Ok(_) => success_count += 1,
                Err(_) => failure_count += 1,
            }
            outcomes.push((effect, result));
        }

        ApplyResult {
            outcomes,
            success_count,
            failure_count,
        }
    }
}

/// Execute a single Effect
async fn execute_effect<P: Provider + ?Sized>(
    provider: &P,
    effect: &Effect,
    dry_run: bool,
) -> ProviderResult<EffectOutcome> {
    if dry_run {
        return Ok(EffectOutcome::Skipped {
            reason: "dry-run mode".to_string(),
        });
    }

    match effect {
        Effect::Create(resource) => {
            let state = provider.create(resource).await?;
            Ok(EffectOutcome::Created { state })
        }
        Effect::Update { id, from, to } => {
            let state = provider.update(id, from, to).await?;
            Ok(EffectOutcome::Updated { state })
        }
        Effect::Replace {
            id,
            from,
            to,
            keep_previous,
            ..
        } => {
            // Create first so a failed create leaves the old resource in place.
            let state = provider.create(to).await?;
            if !keep_previous {
                provider.delete(id, from).await?;
            }
            Ok(EffectOutcome::Replaced { state })
        }
        Effect::Delete { id, from } => {
            provider.delete(id, from).await?;
            Ok(EffectOutcome::Deleted { id: id.clone() })
        }
        Effect::Forget { id, .. } => Ok(EffectOutcome::Forgotten { id: id.clone() }),
    }
}
