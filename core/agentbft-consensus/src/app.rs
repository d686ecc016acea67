//! App driver
//!
//! `AbciApp` owns the active round instance and the latest synchronized
//! data. Payloads and end-of-block calls are forwarded to the round; events,
//! whether emitted by the round or injected from outside (timeouts), are
//! looked up in the transition function. Self-loops create a fresh round
//! instance, final states stop the app until a new period is started.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use agentbft_state::SynchronizedData;

use crate::collection_round::AbciRound;
use crate::errors::{RoundError, RoundResult};
use crate::metrics;
use crate::transition::TransitionFunction;
use crate::types::{AbciEvent, RoundId};

/// Constructor of a fresh round instance
pub type RoundFactory<E, P> = fn(SynchronizedData) -> RoundResult<Box<dyn AbciRound<E, P>>>;

/// Transition taken by the app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition<E> {
    pub from: RoundId,
    pub event: E,
    pub to: RoundId,
}

enum AppState<E, P> {
    Running(Box<dyn AbciRound<E, P>>),
    Finished(RoundId),
}

/// Builder for [`AbciApp`]
pub struct AbciAppBuilder<E: AbciEvent, P> {
    transition_function: TransitionFunction<E>,
    factories: BTreeMap<RoundId, RoundFactory<E, P>>,
    event_to_timeout: BTreeMap<E, Duration>,
    cross_period_persisted_keys: BTreeSet<String>,
    db_pre_conditions: BTreeMap<RoundId, BTreeSet<String>>,
    db_post_conditions: BTreeMap<RoundId, BTreeSet<String>>,
    enable_metrics: bool,
}

impl<E: AbciEvent, P> AbciAppBuilder<E, P> {
    pub fn new(transition_function: TransitionFunction<E>) -> Self {
        Self {
            transition_function,
            factories: BTreeMap::new(),
            event_to_timeout: BTreeMap::new(),
            cross_period_persisted_keys: BTreeSet::new(),
            db_pre_conditions: BTreeMap::new(),
            db_post_conditions: BTreeMap::new(),
            enable_metrics: false,
        }
    }

    /// Register the constructor of a non-final round
    pub fn round(mut self, round: RoundId, factory: RoundFactory<E, P>) -> Self {
        self.factories.insert(round, factory);
        self
    }

    /// Declare the deadline after which the outer engine injects `event`
    pub fn event_timeout(mut self, event: E, timeout: Duration) -> Self {
        self.event_to_timeout.insert(event, timeout);
        self
    }

    pub fn cross_period_persisted_keys(mut self, keys: BTreeSet<String>) -> Self {
        self.cross_period_persisted_keys = keys;
        self
    }

    /// Keys that must be set when `round` starts
    pub fn db_pre_condition<I, S>(mut self, round: RoundId, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.db_pre_conditions
            .insert(round, keys.into_iter().map(Into::into).collect());
        self
    }

    /// Keys that must be set when the final state `round` is reached
    pub fn db_post_condition<I, S>(mut self, round: RoundId, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.db_post_conditions
            .insert(round, keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn enable_metrics(mut self, enabled: bool) -> Self {
        self.enable_metrics = enabled;
        self
    }

    /// Check every running round has a factory and start the initial round
    pub fn build(self, synchronized_data: SynchronizedData) -> RoundResult<AbciApp<E, P>> {
        let function = &self.transition_function;
        if let Some(round) = function
            .rounds()
            .find(|round| !function.is_final(*round) && !self.factories.contains_key(round))
        {
            return Err(RoundError::MissingFactory(round));
        }

        let initial_round = self.transition_function.initial_round();
        let mut app = AbciApp {
            transition_function: self.transition_function,
            factories: self.factories,
            event_to_timeout: self.event_to_timeout,
            cross_period_persisted_keys: self.cross_period_persisted_keys,
            db_pre_conditions: self.db_pre_conditions,
            db_post_conditions: self.db_post_conditions,
            enable_metrics: self.enable_metrics,
            state: AppState::Finished(initial_round),
            synchronized_data: synchronized_data.clone(),
            history: Vec::new(),
        };

        app.state = AppState::Running(app.start_round(initial_round, synchronized_data)?);
        info!("App started in {}", initial_round);
        Ok(app)
    }
}

/// Running instance of an app's transition graph
pub struct AbciApp<E: AbciEvent, P> {
    transition_function: TransitionFunction<E>,
    factories: BTreeMap<RoundId, RoundFactory<E, P>>,
    event_to_timeout: BTreeMap<E, Duration>,
    cross_period_persisted_keys: BTreeSet<String>,
    db_pre_conditions: BTreeMap<RoundId, BTreeSet<String>>,
    db_post_conditions: BTreeMap<RoundId, BTreeSet<String>>,
    enable_metrics: bool,
    state: AppState<E, P>,
    synchronized_data: SynchronizedData,
    history: Vec<Transition<E>>,
}

impl<E: AbciEvent, P> AbciApp<E, P> {
    pub fn builder(transition_function: TransitionFunction<E>) -> AbciAppBuilder<E, P> {
        AbciAppBuilder::new(transition_function)
    }

    pub fn transition_function(&self) -> &TransitionFunction<E> {
        &self.transition_function
    }

    /// Latest synchronized data
    pub fn synchronized_data(&self) -> &SynchronizedData {
        &self.synchronized_data
    }

    pub fn current_round_id(&self) -> RoundId {
        match &self.state {
            AppState::Running(round) => round.round_id(),
            AppState::Finished(round) => *round,
        }
    }

    /// Active round instance, if the app is still running
    pub fn current_round(&self) -> Option<&dyn AbciRound<E, P>> {
        match &self.state {
            AppState::Running(round) => Some(round.as_ref()),
            AppState::Finished(_) => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, AppState::Finished(_))
    }

    /// Final state reached, if any
    pub fn final_state(&self) -> Option<RoundId> {
        match &self.state {
            AppState::Running(_) => None,
            AppState::Finished(round) => Some(*round),
        }
    }

    /// Transitions taken so far, oldest first
    pub fn history(&self) -> &[Transition<E>] {
        &self.history
    }

    pub fn event_to_timeout(&self) -> &BTreeMap<E, Duration> {
        &self.event_to_timeout
    }

    pub fn timeout_for(&self, event: E) -> Option<Duration> {
        self.event_to_timeout.get(&event).copied()
    }

    /// Forward a delivered payload to the active round
    pub fn process_payload(&mut self, payload: P) -> RoundResult<()> {
        let round = match &mut self.state {
            AppState::Running(round) => round,
            AppState::Finished(final_state) => return Err(RoundError::TerminalRound(*final_state)),
        };

        let result = round.process_payload(payload);
        if self.enable_metrics {
            let round_id = round.round_id();
            metrics::record_payload(round_id.as_str(), result.is_ok());
            metrics::update_collection_size(round_id.as_str(), round.collected());
        }
        if let Err(err) = &result {
            warn!("Payload rejected by {}: {}", round.round_id(), err);
        }
        result
    }

    /// Forward liveness information to the active round
    pub fn mark_unreachable(&mut self, sender: &str) -> RoundResult<()> {
        match &mut self.state {
            AppState::Running(round) => round.mark_unreachable(sender),
            AppState::Finished(final_state) => Err(RoundError::TerminalRound(*final_state)),
        }
    }

    /// Evaluate the active round at the end of a block.
    ///
    /// Returns the event the round emitted, if any. If the event cannot be
    /// applied the app keeps its previous synchronized data, and the round
    /// is reopened with its collection intact.
    pub fn end_block(&mut self) -> RoundResult<Option<E>> {
        let round = match &mut self.state {
            AppState::Running(round) => round,
            AppState::Finished(_) => return Ok(None),
        };

        let round_id = round.round_id();
        match round.end_block()? {
            Some((synchronized_data, event)) => {
                info!("{} resolved with event {}", round_id, event);
                let previous = std::mem::replace(&mut self.synchronized_data, synchronized_data);
                if let Err(err) = self.process_event(event) {
                    warn!("Cannot apply {} from {}: {}", event, round_id, err);
                    self.synchronized_data = previous;
                    if let AppState::Running(round) = &mut self.state {
                        round.reopen();
                    }
                    return Err(err);
                }
                if self.enable_metrics {
                    metrics::record_resolution(round_id.as_str(), &event.to_string());
                }
                Ok(Some(event))
            }
            None => {
                debug!("{} still pending", round_id);
                Ok(None)
            }
        }
    }

    /// Apply an event, emitted by the active round or injected from outside
    pub fn process_event(&mut self, event: E) -> RoundResult<RoundId> {
        let from = match &self.state {
            AppState::Running(round) => round.round_id(),
            AppState::Finished(final_state) => return Err(RoundError::TerminalRound(*final_state)),
        };

        let to = self
            .transition_function
            .next_round(from, event)
            .ok_or_else(|| RoundError::NoTransition {
                round: from,
                event: event.to_string(),
            })?;

        let next_state = if self.transition_function.is_final(to) {
            self.check_post_conditions(to)?;
            info!("Reached final state {} from {} on {}", to, from, event);
            AppState::Finished(to)
        } else {
            info!("Transition {} --{}--> {}", from, event, to);
            AppState::Running(self.start_round(to, self.synchronized_data.clone())?)
        };

        self.state = next_state;
        self.history.push(Transition { from, event, to });
        if self.enable_metrics {
            metrics::record_transition(from.as_str(), to.as_str());
            metrics::update_collection_size(from.as_str(), 0);
        }

        Ok(to)
    }

    /// Restart from the initial round in the next period
    pub fn new_period(&mut self) -> RoundResult<()> {
        if let AppState::Running(round) = &self.state {
            return Err(RoundError::NotFinished(round.round_id()));
        }

        let synchronized_data = self
            .synchronized_data
            .new_period(&self.cross_period_persisted_keys);
        let initial_round = self.transition_function.initial_round();
        let round = self.start_round(initial_round, synchronized_data.clone())?;

        info!(
            "Starting period {} in {}",
            synchronized_data.period_count(),
            initial_round
        );
        self.synchronized_data = synchronized_data;
        self.state = AppState::Running(round);
        Ok(())
    }

    fn start_round(
        &self,
        round: RoundId,
        synchronized_data: SynchronizedData,
    ) -> RoundResult<Box<dyn AbciRound<E, P>>> {
        if let Some(keys) = self.db_pre_conditions.get(&round) {
            if let Some(key) = keys.iter().find(|key| !synchronized_data.db().contains(key)) {
                return Err(RoundError::PreConditionViolated {
                    round,
                    key: key.clone(),
                });
            }
        }

        let factory = self
            .factories
            .get(&round)
            .ok_or(RoundError::MissingFactory(round))?;
        factory(synchronized_data)
    }

    fn check_post_conditions(&self, round: RoundId) -> RoundResult<()> {
        if let Some(keys) = self.db_post_conditions.get(&round) {
            if let Some(key) = keys
                .iter()
                .find(|key| !self.synchronized_data.db().contains(key))
            {
                return Err(RoundError::PostConditionViolated {
                    round,
                    key: key.clone(),
                });
            }
        }
        Ok(())
    }
}
