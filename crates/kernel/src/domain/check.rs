//! `AuthCheck`: the composable authorization-check DSL, and `AuthResponse`,
//! the record produced by executing one.
//!
//! `AuthCheck` is generic over `P`, the application's principal-override
//! type (the type passed to `.as_principal(..)`). Composition (`&`, `|`) and
//! flattening are pure; actually evaluating a check against a store and an
//! engine is the session runner's job.

use crate::domain::attribute::AttributeValue;
use crate::domain::entity::Entities;
use crate::domain::entity_uid::EntityUid;
use crate::domain::request::{Decision, ResourceRef};
use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;

/// A side-effect-free predicate, evaluated at most once per execution.
#[derive(Clone)]
pub struct Condition(Arc<dyn Fn() -> bool + Send + Sync>);

impl Condition {
    pub fn new(predicate: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    pub fn evaluate(&self) -> bool {
        (self.0)()
    }
}

impl std::fmt::Debug for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Condition(..)")
    }
}

/// The leaf of an `AuthCheck` tree: one principal/action/resource/context
/// tuple, plus an optional skip condition.
#[derive(Debug, Clone)]
pub struct Single<P> {
    pub principal: Option<P>,
    pub action: EntityUid,
    pub resource: ResourceRef,
    pub context: HashMap<String, AttributeValue>,
    pub condition: Option<Condition>,
}

/// A tagged sum of checks: a leaf, a conjunction, or a disjunction.
#[derive(Debug, Clone)]
pub enum AuthCheck<P> {
    Single(Single<P>),
    /// AND; empty list is vacuously true.
    All(Vec<AuthCheck<P>>),
    /// OR; empty list is vacuously false ("none granted").
    AnyOf(Vec<AuthCheck<P>>),
}

impl<P> AuthCheck<P> {
    pub fn single(action: EntityUid, resource: ResourceRef) -> Self {
        AuthCheck::Single(Single {
            principal: None,
            action,
            resource,
            context: HashMap::new(),
            condition: None,
        })
    }

    pub fn all(checks: impl IntoIterator<Item = AuthCheck<P>>) -> Self {
        AuthCheck::All(checks.into_iter().collect())
    }

    pub fn any_of(checks: impl IntoIterator<Item = AuthCheck<P>>) -> Self {
        AuthCheck::AnyOf(checks.into_iter().collect())
    }

    /// Overrides the principal this check runs as, instead of the session's
    /// default. No-op on non-`Single` checks.
    pub fn as_principal(mut self, principal: P) -> Self {
        if let AuthCheck::Single(single) = &mut self {
            single.principal = Some(principal);
        }
        self
    }

    /// Merges extra context attributes onto the leaf check (new values
    /// override). No-op on non-`Single` checks.
    pub fn with_context(mut self, context: HashMap<String, AttributeValue>) -> Self {
        if let AuthCheck::Single(single) = &mut self {
            single.context.extend(context);
        }
        self
    }

    /// Attaches a skip condition. No-op on non-`Single` checks.
    pub fn when(mut self, condition: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        if let AuthCheck::Single(single) = &mut self {
            single.condition = Some(Condition::new(condition));
        }
        self
    }
}

impl<P> std::ops::BitAnd for AuthCheck<P> {
    type Output = AuthCheck<P>;

    /// Flattens nested `All`s: `(a & b) & c` and `a & (b & c)` both yield a
    /// single flat `All([a, b, c])`.
    fn bitand(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (AuthCheck::All(mut lhs), AuthCheck::All(rhs)) => {
                lhs.extend(rhs);
                AuthCheck::All(lhs)
            }
            (AuthCheck::All(mut lhs), rhs) => {
                lhs.push(rhs);
                AuthCheck::All(lhs)
            }
            (lhs, AuthCheck::All(mut rhs)) => {
                rhs.insert(0, lhs);
                AuthCheck::All(rhs)
            }
            (lhs, rhs) => AuthCheck::All(vec![lhs, rhs]),
        }
    }
}

impl<P> std::ops::BitOr for AuthCheck<P> {
    type Output = AuthCheck<P>;

    /// Flattens nested `AnyOf`s the same way `BitAnd` flattens `All`.
    fn bitor(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (AuthCheck::AnyOf(mut lhs), AuthCheck::AnyOf(rhs)) => {
                lhs.extend(rhs);
                AuthCheck::AnyOf(lhs)
            }
            (AuthCheck::AnyOf(mut lhs), rhs) => {
                lhs.push(rhs);
                AuthCheck::AnyOf(lhs)
            }
            (lhs, AuthCheck::AnyOf(mut rhs)) => {
                rhs.insert(0, lhs);
                AuthCheck::AnyOf(rhs)
            }
            (lhs, rhs) => AuthCheck::AnyOf(vec![lhs, rhs]),
        }
    }
}

/// The record produced on every executed check.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthResponse {
    pub timestamp: OffsetDateTime,
    pub duration_nanos: u64,
    pub principal: EntityUid,
    pub principal_entities: Entities,
    pub action: EntityUid,
    pub resource: EntityUid,
    pub context: HashMap<String, AttributeValue>,
    pub entities: Entities,
    pub decision: Decision,
    pub errors: Vec<String>,
}

impl AuthResponse {
    pub fn is_allowed(&self) -> bool {
        self.decision.allow
    }
}
