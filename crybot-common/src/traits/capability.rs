use std::collections::HashSet;

/// Answers whether an actor may run admin-only commands.
/// Supplied once at startup; the dispatcher never mutates it.
pub trait CapabilityCheck: Send + Sync {
    fn is_admin(&self, actor_id: &str) -> bool;
}

impl<F> CapabilityCheck for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_admin(&self, actor_id: &str) -> bool {
        self(actor_id)
    }
}

/// Static list of admin actor ids, typically from `ADMIN_USER_IDS`.
#[derive(Debug, Clone, Default)]
pub struct AdminList {
    ids: HashSet<String>,
}

impl AdminList {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(|s| s.into().trim().to_string()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl CapabilityCheck for AdminList {
    fn is_admin(&self, actor_id: &str) -> bool {
        self.ids.contains(actor_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_list_trims_ids() {
        let admins = AdminList::new([" 42 ", "7"]);
        assert!(admins.is_admin("42"));
        assert!(admins.is_admin("7"));
        assert!(!admins.is_admin("8"));
        assert_eq!(admins.len(), 2);
    }

    #[test]
    fn closures_are_capability_checks() {
        let check = |actor: &str| actor.starts_with("admin");
        assert!(check.is_admin("admin-1"));
        assert!(!check.is_admin("guest"));
    }
}
