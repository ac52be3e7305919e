// SPDX-License-Identifier: MPL-2.0

//! Build a report as clear as possible as to why dependency solving failed.

use std::fmt::{self, Display};
use std::sync::Arc;

use crate::{Map, Package, Term, VersionSet};

/// Reporter trait.
pub trait Reporter<P: Package, VS: VersionSet> {
    /// Output type of the report.
    type Output;

    /// Generate a report from the derivation tree describing the resolution failure.
    fn report(derivation_tree: &DerivationTree<P, VS>) -> Self::Output;
}

/// Derivation tree resulting in the impossibility to solve the dependencies of our
/// root package.
#[derive(Debug, Clone)]
pub enum DerivationTree<P: Package, VS: VersionSet> {
    /// External incompatibility.
    External(External<P, VS>),
    /// Incompatibility derived from two others.
    Derived(Derived<P, VS>),
}

/// Incompatibilities that are not derived from others, they have their own reason.
#[derive(Debug, Clone)]
pub enum External<P: Package, VS: VersionSet> {
    /// Initial incompatibility stating the root package must be selected.
    NotRoot(P, VS::V),
    /// There are no versions in the given set for this package.
    NoVersions(P, VS),
    /// The dependencies of this package version could not be retrieved.
    Unavailable(P, VS::V),
    /// Incompatibility coming from the dependencies of a given package.
    FromDependencyOf(P, VS, P, VS),
}

/// Incompatibility derived from two others.
#[derive(Debug, Clone)]
pub struct Derived<P: Package, VS: VersionSet> {
    /// Terms of the incompatibility, in clause order.
    pub terms: Vec<(P, Term<VS>)>,
    /// Indicate if the incompatibility is the cause of several others, in which
    /// case the report numbers it for back-reference.
    pub shared_id: Option<usize>,
    /// First cause.
    pub cause1: Arc<DerivationTree<P, VS>>,
    /// Second cause.
    pub cause2: Arc<DerivationTree<P, VS>>,
}

impl<P: Package, VS: VersionSet> DerivationTree<P, VS> {
    /// Merge the [NoVersions](External::NoVersions) external incompatibilities with
    /// the derived incompatibilities they are combined with.
    ///
    /// The transformed tree reads better: instead of explaining that versions
    /// outside a set do not exist, sentences talk about the versions that do.
    pub fn collapse_no_versions(&mut self) {
        let DerivationTree::Derived(derived) = self else {
            return;
        };
        Arc::make_mut(&mut derived.cause1).collapse_no_versions();
        Arc::make_mut(&mut derived.cause2).collapse_no_versions();
        let replacement = match (derived.cause1.as_ref(), derived.cause2.as_ref()) {
            (DerivationTree::External(External::NoVersions(p, set)), other)
            | (other, DerivationTree::External(External::NoVersions(p, set))) => {
                other.clone().merge_no_versions(p, set)
            }
            _ => None,
        };
        if let Some(tree) = replacement {
            *self = tree;
        }
    }

    /// Fold "no versions of `package` in `set`" into this node, if it talks about
    /// the same package.
    fn merge_no_versions(self, package: &P, set: &VS) -> Option<Self> {
        match self {
            // Derived trees keep their structure, the numbering logic relies on it.
            DerivationTree::Derived(_) => None,
            DerivationTree::External(External::NotRoot(..)) => None,
            DerivationTree::External(External::Unavailable(..)) => None,
            DerivationTree::External(External::NoVersions(p, s)) => {
                if &p == package {
                    let merged = s.union(set);
                    Some(DerivationTree::External(External::NoVersions(p, merged)))
                } else {
                    None
                }
            }
            DerivationTree::External(External::FromDependencyOf(p1, s1, p2, s2)) => {
                if &p1 == package {
                    let merged = s1.union(set);
                    Some(DerivationTree::External(External::FromDependencyOf(
                        p1, merged, p2, s2,
                    )))
                } else if &p2 == package {
                    let merged = s2.union(set);
                    Some(DerivationTree::External(External::FromDependencyOf(
                        p1, s1, p2, merged,
                    )))
                } else {
                    None
                }
            }
        }
    }
}

impl<P: Package, VS: VersionSet> Display for External<P, VS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRoot(package, version) => {
                write!(f, "we are solving dependencies of {package} {version}")
            }
            Self::NoVersions(package, set) => {
                if set == &VS::full() {
                    write!(f, "there is no available version for {package}")
                } else {
                    write!(f, "there is no version of {package} in {set}")
                }
            }
            Self::Unavailable(package, version) => {
                write!(f, "dependencies of {package} {version} are unavailable")
            }
            Self::FromDependencyOf(package, package_set, dependency, dependency_set) => {
                if package_set == &VS::full() && dependency_set == &VS::full() {
                    write!(f, "{package} depends on {dependency}")
                } else if package_set == &VS::full() {
                    write!(f, "{package} depends on {dependency} {dependency_set}")
                } else if dependency_set == &VS::full() {
                    write!(f, "{package} {package_set} depends on {dependency}")
                } else {
                    write!(
                        f,
                        "{package} {package_set} depends on {dependency} {dependency_set}"
                    )
                }
            }
        }
    }
}

/// Default reporter able to generate an explanation as a [String].
pub struct DefaultStringReporter {
    /// Number of explanations already with a line reference.
    ref_count: usize,
    /// Shared nodes that have already been marked with a line reference.
    /// The incompatibility ids are the keys, and the line references are the values.
    shared_with_ref: Map<usize, usize>,
    /// Accumulated lines of the report already generated.
    lines: Vec<String>,
}

impl DefaultStringReporter {
    /// Initialize the reporter.
    fn new() -> Self {
        Self {
            ref_count: 0,
            shared_with_ref: Map::default(),
            lines: Vec::new(),
        }
    }

    fn build_recursive<P: Package, VS: VersionSet>(&mut self, derived: &Derived<P, VS>) {
        self.build_recursive_helper(derived);
        if let Some(id) = derived.shared_id {
            if !self.shared_with_ref.contains_key(&id) {
                self.add_line_ref();
                self.shared_with_ref.insert(id, self.ref_count);
            }
        }
    }

    fn build_recursive_helper<P: Package, VS: VersionSet>(&mut self, current: &Derived<P, VS>) {
        match (current.cause1.as_ref(), current.cause2.as_ref()) {
            (DerivationTree::External(external1), DerivationTree::External(external2)) => {
                // Simplest case, we just combine two external incompatibilities.
                self.lines.push(Self::explain_both_external(
                    external1,
                    external2,
                    &current.terms,
                ));
            }
            (DerivationTree::Derived(derived), DerivationTree::External(external))
            | (DerivationTree::External(external), DerivationTree::Derived(derived)) => {
                // One cause is derived, so we explain this first, then we add the
                // external part, and finally conclude with the current incompatibility.
                self.report_one_each(derived, external, &current.terms);
            }
            (DerivationTree::Derived(derived1), DerivationTree::Derived(derived2)) => {
                match (
                    self.line_ref_of(derived1.shared_id),
                    self.line_ref_of(derived2.shared_id),
                ) {
                    // If both causes already have been referenced, simply mention them.
                    (Some(ref1), Some(ref2)) => {
                        self.lines.push(Self::explain_both_ref(
                            ref1,
                            derived1,
                            ref2,
                            derived2,
                            &current.terms,
                        ));
                    }
                    // If only one cause is referenced, explain the other one and
                    // then conclude with the reference.
                    (Some(ref1), None) => {
                        self.build_recursive(derived2);
                        self.lines
                            .push(Self::and_explain_ref(ref1, derived1, &current.terms));
                    }
                    (None, Some(ref2)) => {
                        self.build_recursive(derived1);
                        self.lines
                            .push(Self::and_explain_ref(ref2, derived2, &current.terms));
                    }
                    // If none is referenced, explain the first one, give it a line
                    // reference, explain the second one, and conclude.
                    (None, None) => {
                        self.build_recursive(derived1);
                        let ref1 = match self.line_ref_of(derived1.shared_id) {
                            Some(r) => r,
                            None => {
                                self.add_line_ref();
                                self.ref_count
                            }
                        };
                        // Explaining the first subtree may have numbered the second
                        // node if it is shared between them.
                        match self.line_ref_of(derived2.shared_id) {
                            Some(ref2) => {
                                self.lines.push(Self::explain_both_ref(
                                    ref1,
                                    derived1,
                                    ref2,
                                    derived2,
                                    &current.terms,
                                ));
                            }
                            None => {
                                self.build_recursive(derived2);
                                self.lines.push(Self::and_explain_ref(
                                    ref1,
                                    derived1,
                                    &current.terms,
                                ));
                            }
                        }
                    }
                }
            }
        }
    }

    /// Report a derived and an external incompatibility.
    ///
    /// The result will depend on the fact that the derived incompatibility has
    /// already been explained or not.
    fn report_one_each<P: Package, VS: VersionSet>(
        &mut self,
        derived: &Derived<P, VS>,
        external: &External<P, VS>,
        current_terms: &[(P, Term<VS>)],
    ) {
        match self.line_ref_of(derived.shared_id) {
            Some(ref_id) => self.lines.push(Self::explain_ref_and_external(
                ref_id,
                derived,
                external,
                current_terms,
            )),
            None => self.report_recurse_one_each(derived, external, current_terms),
        }
    }

    /// Report one derived (without a line ref yet) and one external.
    fn report_recurse_one_each<P: Package, VS: VersionSet>(
        &mut self,
        derived: &Derived<P, VS>,
        external: &External<P, VS>,
        current_terms: &[(P, Term<VS>)],
    ) {
        match (derived.cause1.as_ref(), derived.cause2.as_ref()) {
            // If the derived cause is itself one derived and one external, the
            // intermediate conclusion reads better left implicit.
            (DerivationTree::Derived(prior_derived), DerivationTree::External(prior_external))
            | (DerivationTree::External(prior_external), DerivationTree::Derived(prior_derived))
                if prior_derived.shared_id.is_none() =>
            {
                self.build_recursive(prior_derived);
                self.lines.push(Self::and_explain_prior_and_external(
                    prior_external,
                    external,
                    current_terms,
                ));
            }
            _ => {
                self.build_recursive(derived);
                self.lines
                    .push(Self::and_explain_external(external, current_terms));
            }
        }
    }

    // String explanations #####################################################

    /// Simplest case, two external incompatibilities.
    fn explain_both_external<P: Package, VS: VersionSet>(
        external1: &External<P, VS>,
        external2: &External<P, VS>,
        current_terms: &[(P, Term<VS>)],
    ) -> String {
        format!(
            "Because {} and {}, {}.",
            external1,
            external2,
            Self::string_terms(current_terms)
        )
    }

    /// Both causes have already been explained so we use their refs.
    fn explain_both_ref<P: Package, VS: VersionSet>(
        ref_id1: usize,
        derived1: &Derived<P, VS>,
        ref_id2: usize,
        derived2: &Derived<P, VS>,
        current_terms: &[(P, Term<VS>)],
    ) -> String {
        format!(
            "Because {} ({}) and {} ({}), {}.",
            Self::string_terms(&derived1.terms),
            ref_id1,
            Self::string_terms(&derived2.terms),
            ref_id2,
            Self::string_terms(current_terms)
        )
    }

    /// One cause is derived (already explained so one can refer to it), the other
    /// is external.
    fn explain_ref_and_external<P: Package, VS: VersionSet>(
        ref_id: usize,
        derived: &Derived<P, VS>,
        external: &External<P, VS>,
        current_terms: &[(P, Term<VS>)],
    ) -> String {
        format!(
            "Because {} ({}) and {}, {}.",
            Self::string_terms(&derived.terms),
            ref_id,
            external,
            Self::string_terms(current_terms)
        )
    }

    /// Add an external cause to the chain of explanations.
    fn and_explain_external<P: Package, VS: VersionSet>(
        external: &External<P, VS>,
        current_terms: &[(P, Term<VS>)],
    ) -> String {
        format!(
            "And because {}, {}.",
            external,
            Self::string_terms(current_terms)
        )
    }

    /// Add an already explained incompatibility to the chain of explanations.
    fn and_explain_ref<P: Package, VS: VersionSet>(
        ref_id: usize,
        derived: &Derived<P, VS>,
        current_terms: &[(P, Term<VS>)],
    ) -> String {
        format!(
            "And because {} ({}), {}.",
            Self::string_terms(&derived.terms),
            ref_id,
            Self::string_terms(current_terms)
        )
    }

    /// Add an already explained incompatibility and an external cause to the chain
    /// of explanations.
    fn and_explain_prior_and_external<P: Package, VS: VersionSet>(
        prior_external: &External<P, VS>,
        external: &External<P, VS>,
        current_terms: &[(P, Term<VS>)],
    ) -> String {
        format!(
            "And because {} and {}, {}.",
            prior_external,
            external,
            Self::string_terms(current_terms)
        )
    }

    /// Try to print terms of an incompatibility in a human-readable way.
    fn string_terms<P: Package, VS: VersionSet>(terms: &[(P, Term<VS>)]) -> String {
        match terms {
            [] => "version solving failed".into(),
            [(package, Term::Positive(set))] => format!("{package} {set} is forbidden"),
            [(package, Term::Negative(set))] => format!("{package} {set} is mandatory"),
            [(p_pos, Term::Positive(s_pos)), (p_neg, Term::Negative(s_neg))]
            | [(p_neg, Term::Negative(s_neg)), (p_pos, Term::Positive(s_pos))] => {
                External::FromDependencyOf(p_pos, s_pos.clone(), p_neg, s_neg.clone()).to_string()
            }
            slice => {
                let str_terms: Vec<_> = slice.iter().map(|(p, t)| format!("{p} {t}")).collect();
                str_terms.join(", ") + " are incompatible"
            }
        }
    }

    // Helper functions ########################################################

    fn add_line_ref(&mut self) {
        let new_count = self.ref_count + 1;
        self.ref_count = new_count;
        if let Some(line) = self.lines.last_mut() {
            *line = format!("{line} ({new_count})");
        }
    }

    fn line_ref_of(&self, shared_id: Option<usize>) -> Option<usize> {
        shared_id.and_then(|id| self.shared_with_ref.get(&id).copied())
    }
}

impl<P: Package, VS: VersionSet> Reporter<P, VS> for DefaultStringReporter {
    type Output = String;

    fn report(derivation_tree: &DerivationTree<P, VS>) -> Self::Output {
        match derivation_tree {
            DerivationTree::External(external) => external.to_string(),
            DerivationTree::Derived(derived) => {
                let mut reporter = Self::new();
                reporter.build_recursive(derived);
                reporter.lines.join("\n")
            }
        }
    }
}
