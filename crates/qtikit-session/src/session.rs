//! The test-session state machine.
//!
//! A session owns the route, the test-level and per-occurrence variable
//! stores, and the attempt/time bookkeeping. Every navigation call runs
//! through the interpreter: preconditions and branch conditions decide
//! where the cursor goes, response and outcome processing mutate the
//! stores. A failed call leaves the session exactly as it was.

use crate::clock::{SessionClock, SystemClock};
use crate::error::{BranchTargetError, SessionError, SessionResult};
use crate::route::{self, Route, RouteItem, TEST_SCOPE};
use qtikit_eval::{
    run_rules, ChainedLookup, Evaluator, OperatorRegistry, RuleFlow, VariableLookup, VariableStore,
};
use qtikit_types::expression::Expr;
use qtikit_types::testdef::{
    AssessmentTest, BranchRule, BranchTarget, FeedbackAccess, NavigationMode, ShowHide,
    SubmissionMode, TestFeedback,
};
use qtikit_types::value::{Scalar, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

// ══════════════════════════════════════════════════════════════════════════════
// States and events
// ══════════════════════════════════════════════════════════════════════════════

/// The lifecycle state of a session. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Initial,
    Interacting,
    ModalFeedback,
    Suspended,
    Closed,
}

/// An observable change, delivered to registered subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    PositionChanged {
        position: usize,
        item: String,
    },
    AttemptBegun {
        item: String,
        attempt: u32,
    },
    AttemptEnded {
        item: String,
    },
    FeedbackShown {
        identifiers: Vec<String>,
    },
    Closed,
}

// ══════════════════════════════════════════════════════════════════════════════
// Snapshot
// ══════════════════════════════════════════════════════════════════════════════

/// Everything needed to rebuild a session: state, cursor, attempts,
/// durations, shown feedbacks, and all variable values. The route itself
/// is rebuilt from the seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub test_identifier: String,
    pub seed: u64,
    pub state: SessionState,
    pub suspended_from: SessionState,
    pub position: usize,
    pub attempt_open: bool,
    pub end_feedback: bool,
    pub attempts: Vec<u32>,
    pub durations: BTreeMap<String, Duration>,
    /// Feedback identifiers shown, keyed by the route position they were
    /// shown at.
    pub shown_feedbacks: BTreeSet<(String, usize)>,
    pub test_values: BTreeMap<String, Value>,
    pub item_values: Vec<BTreeMap<String, Value>>,
}

// ══════════════════════════════════════════════════════════════════════════════
// The session
// ══════════════════════════════════════════════════════════════════════════════

/// One candidate's traversal of one test.
pub struct TestSession {
    test: Arc<AssessmentTest>,
    seed: u64,
    route: Route,
    registry: OperatorRegistry,
    clock: Box<dyn SessionClock>,
    state: SessionState,
    suspended_from: SessionState,
    position: usize,
    attempt_open: bool,
    /// Set while the modal feedback held is the end-of-test one.
    end_feedback: bool,
    attempts: Vec<u32>,
    test_store: VariableStore,
    item_stores: Vec<VariableStore>,
    durations: BTreeMap<String, Duration>,
    shown_feedbacks: BTreeSet<(String, usize)>,
    last_tick: Duration,
    subscribers: Vec<Box<dyn FnMut(&SessionEvent)>>,
}

impl TestSession {
    /// A fresh session over a test, timed by the system clock.
    pub fn new(test: Arc<AssessmentTest>, seed: u64) -> Self {
        Self::with_clock(test, seed, Box::new(SystemClock::new()))
    }

    /// A fresh session with an explicit time source.
    pub fn with_clock(test: Arc<AssessmentTest>, seed: u64, clock: Box<dyn SessionClock>) -> Self {
        let route = Route::build(&test, seed);
        let mut test_store = VariableStore::new();
        test_store.declare_all(test.outcome_declarations.iter().cloned());
        let item_stores: Vec<VariableStore> = route
            .items()
            .iter()
            .map(|occurrence| {
                let mut store = VariableStore::new();
                store.declare_all(occurrence.item.response_declarations.iter().cloned());
                store.declare_all(occurrence.item.outcome_declarations.iter().cloned());
                store
            })
            .collect();
        let attempts = vec![0; route.len()];
        let last_tick = clock.now();
        Self {
            test,
            seed,
            route,
            registry: OperatorRegistry::standard(),
            clock,
            state: SessionState::Initial,
            suspended_from: SessionState::Interacting,
            position: 0,
            attempt_open: false,
            end_feedback: false,
            attempts,
            test_store,
            item_stores,
            durations: BTreeMap::new(),
            shown_feedbacks: BTreeSet::new(),
            last_tick,
            subscribers: Vec::new(),
        }
    }

    /// Replace the stock operator registry.
    pub fn with_registry(mut self, registry: OperatorRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Register an event subscriber.
    pub fn subscribe(&mut self, subscriber: impl FnMut(&SessionEvent) + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    // ── Read access ──────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn test(&self) -> &Arc<AssessmentTest> {
        &self.test
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    /// The route item under the cursor while the session is active.
    pub fn current_item(&self) -> Option<&RouteItem> {
        match self.state {
            SessionState::Initial | SessionState::Closed => None,
            _ => self.route.get(self.position),
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Attempts taken on a route position so far.
    pub fn attempts_on(&self, position: usize) -> u32 {
        self.attempts.get(position).copied().unwrap_or(0)
    }

    /// A test-level outcome's current value.
    pub fn outcome(&self, identifier: &str) -> Option<&Value> {
        self.test_store.value(identifier)
    }

    /// An item variable's current value, first occurrence of the item.
    pub fn item_value(&self, item: &str, variable: &str) -> Option<&Value> {
        let position = self.route.position_of(item, 0)?;
        self.item_stores[position].value(variable)
    }

    /// Accumulated active time of a duration scope.
    pub fn duration(&self, scope: &str) -> Duration {
        self.durations.get(scope).copied().unwrap_or(Duration::ZERO)
    }

    // ── Lifecycle ────────────────────────────────────────────────────────

    /// Leave `Initial`: place the cursor on the first admissible item, or
    /// close immediately when no item is admissible.
    pub fn begin_test_session(&mut self) -> SessionResult<()> {
        if self.state != SessionState::Initial {
            return Err(self.invalid("begin the test session"));
        }
        self.last_tick = self.clock.now();
        match self.first_admissible(0, None)? {
            Some(position) => {
                self.set_state(SessionState::Interacting);
                self.enter(position);
                Ok(())
            }
            None => self.finish(),
        }
    }

    /// Open an attempt on the current item.
    ///
    /// Exhausted attempts are a typed error; an exceeded maximum time
    /// forces a skip to the next item instead of erroring.
    pub fn begin_attempt(&mut self) -> SessionResult<()> {
        self.tick();
        if self.state != SessionState::Interacting {
            return Err(self.invalid("begin an attempt"));
        }
        let position = self.position;
        if self.max_time_exceeded(position) {
            return self.advance(position, true);
        }
        let occurrence = &self.route.items()[position];
        let identifier = occurrence.identifier().to_string();
        let max_attempts = occurrence.session_control.max_attempts;
        if max_attempts != 0 && self.attempts[position] >= max_attempts {
            return Err(SessionError::AttemptsExhausted {
                item: identifier,
                max_attempts,
            });
        }
        self.attempts[position] += 1;
        self.attempt_open = true;
        let attempt = self.attempts[position];
        self.emit(SessionEvent::AttemptBegun {
            item: identifier,
            attempt,
        });
        Ok(())
    }

    /// Close the open attempt: store the responses, run the item's
    /// response processing, and in individual submission mode run
    /// test-level outcome processing.
    pub fn end_attempt(&mut self, responses: BTreeMap<String, Value>) -> SessionResult<()> {
        self.tick();
        if self.state != SessionState::Interacting || !self.attempt_open {
            return Err(self.invalid("end an attempt"));
        }
        let position = self.position;
        let identifier = self.route.items()[position].identifier().to_string();

        // A submission past the maximum time without the late allowance
        // closes the attempt with the responses dropped unprocessed.
        if self.max_time_exceeded(position) {
            self.attempt_open = false;
            self.emit(SessionEvent::AttemptEnded { item: identifier });
            return Ok(());
        }

        // A rejected response must not leave earlier entries committed.
        let before = self.item_stores[position].snapshot();
        for (name, value) in responses {
            if let Err(error) = self.item_stores[position].set_response(&name, value) {
                self.item_stores[position].restore(before);
                return Err(error.into());
            }
        }
        let flow = run_rules(
            &self.route.items()[position].item.response_processing,
            &mut self.item_stores[position],
            &self.registry,
            Some(&self.test_store),
        )?;
        self.attempt_open = false;
        if flow == RuleFlow::ExitedTest {
            self.emit(SessionEvent::AttemptEnded { item: identifier });
            return self.finish();
        }
        if self.route.items()[position].submission_mode == SubmissionMode::Individual {
            self.run_outcome_processing()?;
        }
        self.emit(SessionEvent::AttemptEnded { item: identifier });
        Ok(())
    }

    /// Advance the cursor.
    ///
    /// From `Interacting` this may instead surface a due modal feedback,
    /// holding the cursor; the next call then performs the advance. From
    /// the end-of-test feedback it closes the session.
    pub fn move_next(&mut self) -> SessionResult<()> {
        self.tick();
        match self.state {
            SessionState::Interacting => self.advance(self.position, false),
            SessionState::ModalFeedback => {
                if self.end_feedback {
                    self.close();
                    Ok(())
                } else {
                    self.advance(self.position, true)
                }
            }
            _ => Err(self.invalid("move next")),
        }
    }

    /// Retreat the cursor within a nonlinear test part.
    pub fn move_back(&mut self) -> SessionResult<()> {
        self.tick();
        if self.state != SessionState::Interacting {
            return Err(self.invalid("move back"));
        }
        let occurrence = &self.route.items()[self.position];
        if occurrence.navigation_mode != NavigationMode::Nonlinear {
            return Err(SessionError::BackwardNavigation(
                occurrence.part_identifier.clone(),
            ));
        }
        let part = occurrence.part_identifier.clone();
        let previous = self
            .position
            .checked_sub(1)
            .filter(|&p| self.route.items()[p].part_identifier == part);
        match previous {
            Some(position) => {
                self.attempt_open = false;
                self.enter(position);
                Ok(())
            }
            None => Err(self.invalid("move back past the first item")),
        }
    }

    /// Pause the session; time accounting stops until [`resume`].
    ///
    /// [`resume`]: TestSession::resume
    pub fn suspend(&mut self) -> SessionResult<()> {
        self.tick();
        match self.state {
            SessionState::Interacting | SessionState::ModalFeedback => {
                self.suspended_from = self.state;
                self.set_state(SessionState::Suspended);
                Ok(())
            }
            _ => Err(self.invalid("suspend")),
        }
    }

    /// Continue a suspended session in the state it was suspended from.
    pub fn resume(&mut self) -> SessionResult<()> {
        if self.state != SessionState::Suspended {
            return Err(self.invalid("resume"));
        }
        // Suspended time never counts.
        self.last_tick = self.clock.now();
        let to = self.suspended_from;
        self.set_state(to);
        Ok(())
    }

    /// Force the end of the session, running test-level outcome
    /// processing first.
    pub fn end_test_session(&mut self) -> SessionResult<()> {
        self.tick();
        if self.state == SessionState::Closed {
            return Err(self.invalid("end the test session"));
        }
        self.attempt_open = false;
        self.run_outcome_processing()?;
        self.close();
        Ok(())
    }

    // ── Snapshot ─────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            test_identifier: self.test.identifier.clone(),
            seed: self.seed,
            state: self.state,
            suspended_from: self.suspended_from,
            position: self.position,
            attempt_open: self.attempt_open,
            end_feedback: self.end_feedback,
            attempts: self.attempts.clone(),
            durations: self.durations.clone(),
            shown_feedbacks: self.shown_feedbacks.clone(),
            test_values: self.test_store.snapshot(),
            item_values: self.item_stores.iter().map(VariableStore::snapshot).collect(),
        }
    }

    /// Rebuild a session from a snapshot, timed by the system clock.
    pub fn restore(test: Arc<AssessmentTest>, snapshot: SessionSnapshot) -> SessionResult<Self> {
        Self::restore_with_clock(test, snapshot, Box::new(SystemClock::new()))
    }

    /// Rebuild a session from a snapshot with an explicit time source.
    /// The route is rebuilt from the recorded seed.
    pub fn restore_with_clock(
        test: Arc<AssessmentTest>,
        snapshot: SessionSnapshot,
        clock: Box<dyn SessionClock>,
    ) -> SessionResult<Self> {
        if snapshot.test_identifier != test.identifier {
            return Err(SessionError::SnapshotMismatch(test.identifier.clone()));
        }
        let mut session = Self::with_clock(test, snapshot.seed, clock);
        if snapshot.attempts.len() != session.route.len()
            || snapshot.item_values.len() != session.route.len()
        {
            return Err(SessionError::SnapshotMismatch(
                session.test.identifier.clone(),
            ));
        }
        session.state = snapshot.state;
        session.suspended_from = snapshot.suspended_from;
        session.position = snapshot.position;
        session.attempt_open = snapshot.attempt_open;
        session.end_feedback = snapshot.end_feedback;
        session.attempts = snapshot.attempts;
        session.durations = snapshot.durations;
        session.shown_feedbacks = snapshot.shown_feedbacks;
        session.test_store.restore(snapshot.test_values);
        for (store, values) in session.item_stores.iter_mut().zip(snapshot.item_values) {
            store.restore(values);
        }
        session.last_tick = session.clock.now();
        Ok(session)
    }

    // ── Navigation internals ─────────────────────────────────────────────

    fn advance(&mut self, from: usize, forced: bool) -> SessionResult<()> {
        if !forced {
            self.check_minimum_time(from)?;
            if self.show_due_feedback(from, FeedbackAccess::During)? {
                return Ok(());
            }
        }
        self.attempt_open = false;
        match self.branch_successor(from)? {
            Some(start) => match self.first_admissible(start, Some(from))? {
                Some(position) => {
                    self.boundary_outcome_processing(from, position)?;
                    self.set_state(SessionState::Interacting);
                    self.enter(position);
                    Ok(())
                }
                None => self.finish(),
            },
            None => self.finish(),
        }
    }

    /// Where the cursor goes after leaving a position, before
    /// preconditions: the first satisfied branch rule of the item and of
    /// every section/part whose subtree ends here, or the next position.
    /// `None` means the end of the route.
    fn branch_successor(&self, from: usize) -> SessionResult<Option<usize>> {
        let current = &self.route.items()[from];

        // Owners left by this move, innermost first. The exit-section
        // scope of an item owner is its innermost enclosing section.
        let mut owners: Vec<(String, Option<String>, &[BranchRule])> = vec![(
            current.identifier().to_string(),
            current.section_identifiers.last().cloned(),
            &current.item.branch_rules,
        )];
        let sections = self.test.sections();
        for section_id in current.section_identifiers.iter().rev() {
            if !self.route.last_of_section(from, section_id) {
                continue;
            }
            if let Some(section) = sections.iter().find(|s| &s.identifier == section_id) {
                owners.push((
                    section_id.clone(),
                    Some(section_id.clone()),
                    &section.branch_rules,
                ));
            }
        }
        if self.route.last_of_part(from, &current.part_identifier) {
            if let Some(part) = self
                .test
                .test_parts
                .iter()
                .find(|p| p.identifier == current.part_identifier)
            {
                owners.push((part.identifier.clone(), None, &part.branch_rules));
            }
        }

        for (owner, exit_section, rules) in owners {
            for rule in rules {
                let satisfied = match &rule.condition {
                    None => true,
                    Some(condition) => self.holds(condition, from)?,
                };
                if satisfied {
                    return self.resolve_target(from, &owner, exit_section.as_deref(), &rule.target);
                }
            }
        }

        let next = from + 1;
        Ok((next < self.route.len()).then_some(next))
    }

    fn resolve_target(
        &self,
        from: usize,
        owner: &str,
        exit_section: Option<&str>,
        target: &BranchTarget,
    ) -> SessionResult<Option<usize>> {
        match target {
            BranchTarget::ExitTest => Ok(None),
            BranchTarget::ExitTestPart => {
                let part = &self.route.items()[from].part_identifier;
                Ok(self.route.items()[from + 1..]
                    .iter()
                    .find(|r| &r.part_identifier != part)
                    .map(|r| r.position))
            }
            BranchTarget::ExitSection => {
                let Some(section) = exit_section else {
                    // A part has no section to exit; leave the part.
                    return self.resolve_target(from, owner, None, &BranchTarget::ExitTestPart);
                };
                Ok(self.route.items()[from + 1..]
                    .iter()
                    .find(|r| !r.section_identifiers.iter().any(|s| s == section))
                    .map(|r| r.position))
            }
            BranchTarget::Identifier(identifier) => {
                if identifier == owner {
                    return Err(BranchTargetError::RecursiveBranch(identifier.clone()).into());
                }
                let component = self.test.by_identifier(identifier).ok_or_else(|| {
                    BranchTargetError::UnknownTarget(identifier.clone())
                })?;
                let first = match self.test.first_item_under(component) {
                    Some(item) => item,
                    None => return Ok(None),
                };
                match self.route.position_of(&first.identifier, from + 1) {
                    Some(position) => Ok(Some(position)),
                    None if self.route.position_of(&first.identifier, 0).is_some() => {
                        Err(BranchTargetError::BackwardBranch {
                            from: owner.to_string(),
                            target: identifier.clone(),
                        }
                        .into())
                    }
                    None => Err(BranchTargetError::UnknownTarget(identifier.clone()).into()),
                }
            }
        }
    }

    /// The first position at or after `start` whose guards all hold.
    /// A failing part/section guard skips that whole subtree.
    fn first_admissible(&self, start: usize, prev: Option<usize>) -> SessionResult<Option<usize>> {
        let sections = self.test.sections();
        let mut position = start;
        'outer: while position < self.route.len() {
            let candidate = &self.route.items()[position];
            let prev_item = prev.map(|p| &self.route.items()[p]);

            let entering_part =
                prev_item.map_or(true, |r| r.part_identifier != candidate.part_identifier);
            if entering_part {
                if let Some(part) = self
                    .test
                    .test_parts
                    .iter()
                    .find(|p| p.identifier == candidate.part_identifier)
                {
                    for guard in &part.preconditions {
                        if !self.holds(&guard.condition, position)? {
                            while position < self.route.len()
                                && self.route.items()[position].part_identifier == part.identifier
                            {
                                position += 1;
                            }
                            continue 'outer;
                        }
                    }
                }
            }

            for section_id in &candidate.section_identifiers {
                let entering =
                    prev_item.map_or(true, |r| !r.section_identifiers.contains(section_id));
                if !entering {
                    continue;
                }
                let Some(section) = sections.iter().find(|s| &s.identifier == section_id) else {
                    continue;
                };
                for guard in &section.preconditions {
                    if !self.holds(&guard.condition, position)? {
                        while position < self.route.len()
                            && self.route.items()[position]
                                .section_identifiers
                                .iter()
                                .any(|s| s == section_id)
                        {
                            position += 1;
                        }
                        continue 'outer;
                    }
                }
            }

            for guard in &candidate.item.preconditions {
                if !self.holds(&guard.condition, position)? {
                    position += 1;
                    continue 'outer;
                }
            }

            return Ok(Some(position));
        }
        Ok(None)
    }

    /// End of the route: run outcome processing, surface the end-of-test
    /// feedback if one is due, otherwise close.
    fn finish(&mut self) -> SessionResult<()> {
        self.run_outcome_processing()?;
        if self.state != SessionState::Initial && self.route.get(self.position).is_some() {
            if self.show_due_feedback(self.position, FeedbackAccess::AtEnd)? {
                self.end_feedback = true;
                return Ok(());
            }
        }
        self.close();
        Ok(())
    }

    fn close(&mut self) {
        self.attempt_open = false;
        self.set_state(SessionState::Closed);
        self.emit(SessionEvent::Closed);
    }

    fn enter(&mut self, position: usize) {
        self.position = position;
        let item = self.route.items()[position].identifier().to_string();
        self.emit(SessionEvent::PositionChanged { position, item });
    }

    // ── Processing ───────────────────────────────────────────────────────

    fn run_outcome_processing(&mut self) -> SessionResult<()> {
        if self.test.outcome_processing.is_empty() {
            return Ok(());
        }
        let dotted = DottedLookup {
            route: &self.route,
            stores: &self.item_stores,
        };
        run_rules(
            &self.test.outcome_processing,
            &mut self.test_store,
            &self.registry,
            Some(&dotted),
        )?;
        Ok(())
    }

    /// In simultaneous submission mode, outcome processing is deferred to
    /// the test-part boundary.
    fn boundary_outcome_processing(&mut self, from: usize, to: usize) -> SessionResult<()> {
        let left = &self.route.items()[from];
        if left.submission_mode == SubmissionMode::Simultaneous
            && left.part_identifier != self.route.items()[to].part_identifier
        {
            self.run_outcome_processing()?;
        }
        Ok(())
    }

    /// Evaluate a guard or branch condition against the variables of a
    /// route position, falling back to test-level outcomes and dotted
    /// item references. NULL or a non-boolean result counts as false.
    fn holds(&self, condition: &Expr, position: usize) -> SessionResult<bool> {
        let dotted = DottedLookup {
            route: &self.route,
            stores: &self.item_stores,
        };
        let tail = ChainedLookup::new(&self.test_store, &dotted);
        let lookup = ChainedLookup::new(&self.item_stores[position], &tail);
        let value = Evaluator::new(&lookup, &self.registry).evaluate(condition)?;
        Ok(value.as_boolean() == Some(true))
    }

    // ── Feedback ─────────────────────────────────────────────────────────

    /// Surface triggered, not-yet-shown feedbacks of the given access.
    /// Returns true when the session moved to `ModalFeedback`.
    fn show_due_feedback(&mut self, from: usize, access: FeedbackAccess) -> SessionResult<bool> {
        let occurrence = &self.route.items()[from];
        if access == FeedbackAccess::During && !occurrence.session_control.show_feedback {
            return Ok(false);
        }
        let mut candidates: Vec<TestFeedback> = self.test.feedbacks.clone();
        if let Some(part) = self
            .test
            .test_parts
            .iter()
            .find(|p| p.identifier == occurrence.part_identifier)
        {
            candidates.extend(part.feedbacks.iter().cloned());
        }

        let due: Vec<String> = candidates
            .iter()
            .filter(|f| f.access == access)
            .filter(|f| !self.shown_feedbacks.contains(&(f.identifier.clone(), from)))
            .filter(|f| self.triggered(f))
            .map(|f| f.identifier.clone())
            .collect();
        if due.is_empty() {
            return Ok(false);
        }
        self.shown_feedbacks
            .extend(due.iter().map(|id| (id.clone(), from)));
        self.set_state(SessionState::ModalFeedback);
        self.emit(SessionEvent::FeedbackShown { identifiers: due });
        Ok(true)
    }

    /// A feedback triggers when the named outcome matches its identifier
    /// (or does not match, for hide-on-match feedbacks).
    fn triggered(&self, feedback: &TestFeedback) -> bool {
        let matched = match self.test_store.value(&feedback.outcome_identifier) {
            Some(Value::Single(Scalar::Identifier(v))) | Some(Value::Single(Scalar::String(v))) => {
                v == &feedback.identifier
            }
            _ => false,
        };
        match feedback.show_hide {
            ShowHide::Show => matched,
            ShowHide::Hide => !matched,
        }
    }

    // ── Time accounting ──────────────────────────────────────────────────

    /// Accrue active time onto every scope the cursor sits in.
    fn tick(&mut self) {
        let now = self.clock.now();
        let delta = now.saturating_sub(self.last_tick);
        self.last_tick = now;
        if delta.is_zero()
            || !matches!(
                self.state,
                SessionState::Interacting | SessionState::ModalFeedback
            )
        {
            return;
        }
        let scopes = self.active_scopes();
        for scope in scopes {
            *self.durations.entry(scope).or_default() += delta;
        }
    }

    fn active_scopes(&self) -> Vec<String> {
        let mut scopes = vec![TEST_SCOPE.to_string()];
        if let Some(occurrence) = self.route.get(self.position) {
            scopes.push(route::part_scope(&occurrence.part_identifier));
            scopes.extend(
                occurrence
                    .section_identifiers
                    .iter()
                    .map(|s| route::section_scope(s)),
            );
            scopes.push(occurrence.scope());
        }
        scopes
    }

    fn max_time_exceeded(&self, position: usize) -> bool {
        self.route.items()[position].time_limits.iter().any(|scoped| {
            !scoped.limits.allow_late_submission
                && scoped
                    .limits
                    .max_time
                    .is_some_and(|max| self.duration(&scoped.scope) > max)
        })
    }

    /// Block a premature advance out of any scope whose minimum time is
    /// not yet reached. Only scopes this move actually leaves count.
    fn check_minimum_time(&self, from: usize) -> SessionResult<()> {
        let occurrence = &self.route.items()[from];
        let own_scope = occurrence.scope();
        for scoped in &occurrence.time_limits {
            let Some(min) = scoped.limits.min_time else {
                continue;
            };
            let leaving = if scoped.scope == own_scope {
                true
            } else if let Some(section) = scoped.scope.strip_prefix("section:") {
                self.route.last_of_section(from, section)
            } else if let Some(part) = scoped.scope.strip_prefix("part:") {
                self.route.last_of_part(from, part)
            } else {
                false
            };
            if !leaving {
                continue;
            }
            let spent = self.duration(&scoped.scope);
            if spent < min {
                return Err(SessionError::MinimumTimeNotReached {
                    scope: scoped.scope.clone(),
                    remaining: min - spent,
                });
            }
        }
        Ok(())
    }

    // ── Plumbing ─────────────────────────────────────────────────────────

    fn set_state(&mut self, to: SessionState) {
        if self.state == to {
            return;
        }
        let from = self.state;
        self.state = to;
        self.emit(SessionEvent::StateChanged { from, to });
    }

    fn emit(&mut self, event: SessionEvent) {
        for subscriber in &mut self.subscribers {
            subscriber(&event);
        }
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            action,
            state: self.state,
        }
    }
}

/// Resolves dotted `ITEM.VARIABLE` references against the first route
/// occurrence of the named item.
struct DottedLookup<'a> {
    route: &'a Route,
    stores: &'a [VariableStore],
}

impl VariableLookup for DottedLookup<'_> {
    fn value(&self, identifier: &str) -> Option<&Value> {
        let (item, variable) = identifier.split_once('.')?;
        let position = self.route.position_of(item, 0)?;
        self.stores[position].value(variable)
    }

    fn default_value(&self, identifier: &str) -> Option<&Value> {
        let (item, variable) = identifier.split_once('.')?;
        let position = self.route.position_of(item, 0)?;
        self.stores[position]
            .declaration(variable)
            .map(|d| &d.default_value)
    }
}
