/// Church scope: the set of churches a caller may read or write
///
/// A scope is either unrestricted (superadmin/admin) or an explicit set of
/// church ids. Every scoped query pushes [`ChurchScope::push_filter`] onto its
/// `WHERE` clause, and every single-row access goes through
/// [`ChurchScope::contains`].

use std::collections::BTreeSet;

use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChurchScope {
    /// Every church
    All,

    /// Only the listed churches (possibly none)
    Churches(BTreeSet<Uuid>),
}

impl Default for ChurchScope {
    fn default() -> Self {
        ChurchScope::none()
    }
}

impl ChurchScope {
    /// The empty scope
    pub fn none() -> Self {
        ChurchScope::Churches(BTreeSet::new())
    }

    pub fn from_ids(ids: impl IntoIterator<Item = Uuid>) -> Self {
        ChurchScope::Churches(ids.into_iter().collect())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, ChurchScope::All)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ChurchScope::All => false,
            ChurchScope::Churches(ids) => ids.is_empty(),
        }
    }

    pub fn contains(&self, church_id: Uuid) -> bool {
        match self {
            ChurchScope::All => true,
            ChurchScope::Churches(ids) => ids.contains(&church_id),
        }
    }

    /// Explicit ids, or None for the unrestricted scope
    pub fn church_ids(&self) -> Option<Vec<Uuid>> {
        match self {
            ChurchScope::All => None,
            ChurchScope::Churches(ids) => Some(ids.iter().copied().collect()),
        }
    }

    /// Narrows the scope to a single requested church
    ///
    /// Returns the empty scope when the church is outside this scope, so a
    /// filter on a foreign church yields no rows instead of an error.
    pub fn restrict_to(&self, church_id: Option<Uuid>) -> ChurchScope {
        match church_id {
            None => self.clone(),
            Some(id) if self.contains(id) => ChurchScope::from_ids([id]),
            Some(_) => ChurchScope::none(),
        }
    }

    /// Appends ` AND <column> = ANY(...)` to a query whose WHERE clause is already open
    pub fn push_filter(&self, builder: &mut QueryBuilder<'_, Postgres>, column: &str) {
        match self.church_ids() {
            None => {}
            Some(ids) if ids.is_empty() => {
                builder.push(" AND FALSE");
            }
            Some(ids) => {
                builder.push(" AND ");
                builder.push(column);
                builder.push(" = ANY(");
                builder.push_bind(ids);
                builder.push(")");
            }
        }
    }
}
