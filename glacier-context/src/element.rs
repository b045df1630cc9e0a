use glacier_protocol::{OpaqueContextDTO, QueryContextEntryDTO};
use std::cmp::Ordering;

/// Single entry of query context cache.
///
/// Entry with id 0 is the main entry. Smaller priority value means more
/// important, entries with larger priority value are evicted first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryContextElement {
    id: i64,
    read_timestamp: i64,
    priority: i64,
    context: Option<String>,
}

impl QueryContextElement {
    #[inline]
    pub fn new(id: i64, read_timestamp: i64, priority: i64, context: Option<String>) -> Self {
        QueryContextElement {
            id,
            read_timestamp,
            priority,
            context,
        }
    }

    #[inline]
    pub fn id(&self) -> i64 {
        self.id
    }

    #[inline]
    pub fn read_timestamp(&self) -> i64 {
        self.read_timestamp
    }

    #[inline]
    pub fn priority(&self) -> i64 {
        self.priority
    }

    #[inline]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    #[inline]
    pub fn to_dto(&self) -> QueryContextEntryDTO {
        QueryContextEntryDTO {
            id: self.id,
            timestamp: self.read_timestamp,
            priority: self.priority,
            context: OpaqueContextDTO {
                base64_data: self.context.clone(),
            },
        }
    }
}

impl From<&QueryContextEntryDTO> for QueryContextElement {
    #[inline]
    fn from(src: &QueryContextEntryDTO) -> Self {
        QueryContextElement::new(
            src.id,
            src.timestamp,
            src.priority,
            src.context.base64_data.clone(),
        )
    }
}

/// Elements are ordered by priority.
/// The rest fields only keep the order total and consistent with equality.
impl Ord for QueryContextElement {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.id.cmp(&other.id))
            .then_with(|| self.read_timestamp.cmp(&other.read_timestamp))
            .then_with(|| self.context.cmp(&other.context))
    }
}

impl PartialOrd for QueryContextElement {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_element_order_by_priority() {
        let a = QueryContextElement::new(9, 1, 0, None);
        let b = QueryContextElement::new(1, 5, 3, Some("x".into()));
        let c = QueryContextElement::new(2, 0, 7, None);
        let mut v = vec![c.clone(), a.clone(), b.clone()];
        v.sort();
        assert_eq!(v, vec![a.clone(), b.clone(), c]);
        assert!(a < b);
    }

    #[test]
    fn test_element_equality() {
        let a = QueryContextElement::new(1, 1, 1, Some("x".into()));
        let b = QueryContextElement::new(1, 1, 1, Some("y".into()));
        assert_ne!(a, b);
        let mut set = HashSet::new();
        set.insert(a.clone());
        assert!(set.contains(&QueryContextElement::new(1, 1, 1, Some("x".into()))));
        assert!(!set.contains(&b));
        assert_eq!(QueryContextElement::from(&a.to_dto()), a);
    }
}
