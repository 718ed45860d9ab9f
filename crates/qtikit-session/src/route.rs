//! The route builder.
//!
//! Flattens a test definition into the ordered sequence of item
//! occurrences a session traverses. Selection and ordering rules are
//! expanded here, once, from a per-session seed; the route never changes
//! after it is built.

use qtikit_types::testdef::{
    AssessmentItemRef, AssessmentSection, AssessmentTest, ItemSessionControl, NavigationMode,
    SectionPart, SubmissionMode, TestPart, TimeLimits,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// A time limit together with the duration-scope key it constrains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedLimits {
    pub scope: String,
    pub limits: TimeLimits,
}

/// The duration-scope key of the whole test.
pub const TEST_SCOPE: &str = "test";

pub fn part_scope(identifier: &str) -> String {
    format!("part:{identifier}")
}

pub fn section_scope(identifier: &str) -> String {
    format!("section:{identifier}")
}

pub fn item_scope(position: usize) -> String {
    format!("item:{position}")
}

/// One item occurrence on the route, with everything it inherited from
/// its ancestor chain already resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteItem {
    pub position: usize,
    pub item: AssessmentItemRef,
    pub part_identifier: String,
    /// Enclosing sections, outermost first.
    pub section_identifiers: Vec<String>,
    pub navigation_mode: NavigationMode,
    pub submission_mode: SubmissionMode,
    /// Innermost declared control wins; default when none is declared.
    /// The session enforces `max_attempts` and `show_feedback`;
    /// `validate_responses` and `allow_skipping` are carried for front
    /// ends.
    pub session_control: ItemSessionControl,
    /// Declared limits along the ancestor chain, outermost first.
    pub time_limits: Vec<ScopedLimits>,
}

impl RouteItem {
    pub fn identifier(&self) -> &str {
        &self.item.identifier
    }

    /// The duration-scope key of this occurrence.
    pub fn scope(&self) -> String {
        item_scope(self.position)
    }
}

/// The concrete, ordered sequence of item occurrences for one session.
#[derive(Debug, Clone, Default)]
pub struct Route {
    items: Vec<RouteItem>,
}

impl Route {
    /// Build the route for a test, expanding selection and ordering with
    /// a seeded generator so instantiation is reproducible.
    pub fn build(test: &AssessmentTest, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut route = Route::default();
        for part in &test.test_parts {
            for section in &part.sections {
                route.expand_section(test, part, section, &mut Vec::new(), &mut rng);
            }
        }
        route
    }

    pub fn items(&self) -> &[RouteItem] {
        &self.items
    }

    pub fn get(&self, position: usize) -> Option<&RouteItem> {
        self.items.get(position)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// First occurrence of an item at or after a position.
    pub fn position_of(&self, identifier: &str, from: usize) -> Option<usize> {
        self.items[from.min(self.items.len())..]
            .iter()
            .position(|r| r.identifier() == identifier)
            .map(|offset| from + offset)
    }

    /// Whether a position holds the last occurrence inside a section.
    pub fn last_of_section(&self, position: usize, section: &str) -> bool {
        self.items[position + 1..]
            .iter()
            .all(|r| !r.section_identifiers.iter().any(|s| s == section))
    }

    /// Whether a position holds the last occurrence inside a test part.
    pub fn last_of_part(&self, position: usize, part: &str) -> bool {
        self.items[position + 1..]
            .iter()
            .all(|r| r.part_identifier != part)
    }

    fn expand_section<'a>(
        &mut self,
        test: &AssessmentTest,
        part: &TestPart,
        section: &'a AssessmentSection,
        ancestors: &mut Vec<&'a AssessmentSection>,
        rng: &mut StdRng,
    ) {
        // Hidden sections never reach the candidate.
        if !section.visible {
            return;
        }
        ancestors.push(section);
        let parts = ordered_parts(section, rng);
        for child in parts {
            match child {
                SectionPart::ItemRef(item) => {
                    self.push_item(test, part, ancestors, item);
                }
                SectionPart::Section(sub) => {
                    self.expand_section(test, part, sub, ancestors, rng);
                }
            }
        }
        ancestors.pop();
    }

    fn push_item(
        &mut self,
        test: &AssessmentTest,
        part: &TestPart,
        ancestors: &[&AssessmentSection],
        item: &AssessmentItemRef,
    ) {
        let session_control = item
            .item_session_control
            .clone()
            .or_else(|| {
                ancestors
                    .iter()
                    .rev()
                    .find_map(|s| s.item_session_control.clone())
            })
            .or_else(|| part.item_session_control.clone())
            .unwrap_or_default();

        let position = self.items.len();
        let mut time_limits = Vec::new();
        if let Some(limits) = test.time_limits {
            time_limits.push(ScopedLimits {
                scope: TEST_SCOPE.to_string(),
                limits,
            });
        }
        if let Some(limits) = part.time_limits {
            time_limits.push(ScopedLimits {
                scope: part_scope(&part.identifier),
                limits,
            });
        }
        for section in ancestors {
            if let Some(limits) = section.time_limits {
                time_limits.push(ScopedLimits {
                    scope: section_scope(&section.identifier),
                    limits,
                });
            }
        }
        if let Some(limits) = item.time_limits {
            time_limits.push(ScopedLimits {
                scope: item_scope(position),
                limits,
            });
        }

        self.items.push(RouteItem {
            position,
            item: item.clone(),
            part_identifier: part.identifier.clone(),
            section_identifiers: ancestors.iter().map(|s| s.identifier.clone()).collect(),
            navigation_mode: part.navigation_mode,
            submission_mode: part.submission_mode,
            session_control,
            time_limits,
        });
    }
}

/// Apply a section's selection and ordering rules to its children.
///
/// Selection picks which children appear (duplicates allowed with
/// replacement); shuffling then permutes the picked children while fixed
/// items keep their slots.
fn ordered_parts<'a>(section: &'a AssessmentSection, rng: &mut StdRng) -> Vec<&'a SectionPart> {
    let mut picked: Vec<&SectionPart> = match section.selection {
        None => section.parts.iter().collect(),
        Some(selection) => {
            let len = section.parts.len();
            if len == 0 {
                return Vec::new();
            }
            let mut indices: Vec<usize> = if selection.with_replacement {
                (0..selection.select).map(|_| rng.gen_range(0..len)).collect()
            } else {
                rand::seq::index::sample(rng, len, selection.select.min(len)).into_vec()
            };
            // Picked children keep document order.
            indices.sort_unstable();
            indices.into_iter().map(|i| &section.parts[i]).collect()
        }
    };

    let shuffle = section.ordering.map(|o| o.shuffle).unwrap_or(false);
    if shuffle {
        let movable: Vec<usize> = picked
            .iter()
            .enumerate()
            .filter(|(_, p)| !matches!(p, SectionPart::ItemRef(i) if i.fixed))
            .map(|(i, _)| i)
            .collect();
        let mut values: Vec<&SectionPart> = movable.iter().map(|&i| picked[i]).collect();
        values.shuffle(rng);
        for (slot, value) in movable.into_iter().zip(values) {
            picked[slot] = value;
        }
    }
    picked
}
