//! Exclusive-choice detection and the final multiplicity relaxation.
//!
//! Choices are encoded while classes are populated; requiredness and
//! multiplicity are only adjusted by [`ConstraintHandler::relax`], which must
//! run after every class is complete.

use indexmap::IndexSet;
use tracing::debug;

use crate::source::{Group, Particle};
use crate::target::TargetModel;
use crate::types::SlotMode;

/// Slot names one alternative of a choice introduces.
type Branch = Vec<String>;

/// Collects choice membership across a run and applies it at the end.
#[derive(Debug, Default)]
pub struct ConstraintHandler {
    /// (class, slot) pairs governed by a choice.
    choice_members: IndexSet<(String, String)>,
    /// (class, slot) pairs reachable through a repeating choice.
    repeat_members: IndexSet<(String, String)>,
}

impl ConstraintHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the choices in `content` and record them against `class_name`.
    pub fn record_content(&mut self, model: &mut TargetModel, class_name: &str, content: &Group) {
        self.walk(model, class_name, content, false);
    }

    fn walk(
        &mut self,
        model: &mut TargetModel,
        class_name: &str,
        group: &Group,
        enclosing_repeats: bool,
    ) {
        let repeats = enclosing_repeats || group.occurs.is_repeating();
        if group.is_choice() {
            self.apply_choice(model, class_name, group, repeats);
            return;
        }
        for particle in &group.particles {
            if let Particle::Group(inner) = particle {
                self.walk(model, class_name, inner, repeats);
            }
        }
    }

    fn apply_choice(
        &mut self,
        model: &mut TargetModel,
        class_name: &str,
        choice: &Group,
        repeats: bool,
    ) {
        let mut branches = Vec::new();
        collect_branches(choice, &mut branches);
        branches.retain(|b| !b.is_empty());

        let mut members: IndexSet<&str> = IndexSet::new();
        for branch in &branches {
            members.extend(branch.iter().map(String::as_str));
        }

        if repeats {
            for slot in &members {
                self.repeat_members
                    .insert((class_name.to_string(), slot.to_string()));
            }
        }
        if branches.len() < 2 {
            return;
        }
        for slot in &members {
            self.choice_members
                .insert((class_name.to_string(), slot.to_string()));
        }

        let single_slot = branches.iter().all(|b| b.len() == 1) && members.len() == branches.len();
        if single_slot {
            let names: Vec<String> = members.iter().map(|s| s.to_string()).collect();
            model.ensure_class(class_name, None).add_exactly_one_of(&names);
        } else {
            debug!(
                class = class_name,
                branches = branches.len(),
                "choice with multi-slot branches left unenforced"
            );
        }
    }

    /// Clear independent requiredness of choice members and widen repeating
    /// choice members to multivalued.
    ///
    /// Only the class owning the choice is affected. With global slots the
    /// change is a `slot_usage` refinement, where an explicit `false` is needed
    /// to override the shared definition.
    pub fn relax(&self, model: &mut TargetModel) {
        let cleared = match model.slot_mode() {
            SlotMode::Inline => None,
            SlotMode::Global => Some(false),
        };
        for (class_name, slot_name) in &self.choice_members {
            if let Some(slot) = model.slot_override_mut(class_name, slot_name) {
                slot.required = cleared;
            }
        }
        for (class_name, slot_name) in &self.repeat_members {
            if let Some(slot) = model.slot_override_mut(class_name, slot_name) {
                slot.multivalued = Some(true);
            }
        }
    }
}

/// Split a choice into branches. Nested choices contribute their own
/// branches; a nested sequence or all group is one branch.
fn collect_branches(choice: &Group, branches: &mut Vec<Branch>) {
    for particle in &choice.particles {
        match particle {
            Particle::Element(el) => branches.push(el.name.iter().cloned().collect()),
            Particle::Group(inner) if inner.is_choice() => collect_branches(inner, branches),
            Particle::Group(inner) => branches.push(
                inner
                    .iter_elements()
                    .into_iter()
                    .filter_map(|el| el.name.clone())
                    .collect(),
            ),
            Particle::Any => {}
        }
    }
}
