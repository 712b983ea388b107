//! Change descriptors for the dependency-tracking walk.
//!
//! A [`Dependency`] names the downstream computation that must be
//! invalidated when an input changes ("entity E, member F"). The
//! dependency walk threads one descriptor through an expression tree;
//! every object value the walk touches records it, building the inverse
//! edges a caching layer needs for precise invalidation. Nothing in the
//! evaluator inspects a descriptor's contents — it only propagates it.

/// Opaque descriptor of a dependent computation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    entity: String,
    member: String,
}

impl Dependency {
    /// Descriptor for member `member` of entity `entity`.
    pub fn new(entity: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            member: member.into(),
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn member(&self) -> &str {
        &self.member
    }
}

/// One registration made during a dependency walk: the walk carrying
/// `dependency` touched `member` of some object (`None` = the object as a
/// whole).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRecord {
    pub member: Option<String>,
    pub dependency: Dependency,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors() {
        let dep = Dependency::new("card", "name");
        assert_eq!(dep.entity(), "card");
        assert_eq!(dep.member(), "name");
    }
}
