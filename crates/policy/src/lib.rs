use berth_contracts::{Lease, Paste, PolicyScope, Viewer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    View,
    Edit,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::View => "view",
            Capability::Edit => "edit",
        }
    }
}

/// The seam between records and the capability check: a record exposes
/// its owner and one scope per capability, nothing else.
pub trait Protected {
    fn owner_id(&self) -> i64;
    fn scope(&self, capability: Capability) -> PolicyScope;
}

impl Protected for Lease {
    fn owner_id(&self) -> i64 {
        self.owner_id
    }

    fn scope(&self, capability: Capability) -> PolicyScope {
        match capability {
            Capability::View => self.view_scope,
            Capability::Edit => self.edit_scope,
        }
    }
}

impl Protected for Paste {
    fn owner_id(&self) -> i64 {
        self.author_id
    }

    fn scope(&self, capability: Capability) -> PolicyScope {
        match capability {
            Capability::View => self.view_scope,
            Capability::Edit => self.edit_scope,
        }
    }
}

pub fn has_capability<R>(viewer: &Viewer, record: &R, capability: Capability) -> bool
where
    R: Protected + ?Sized,
{
    match record.scope(capability) {
        PolicyScope::Anyone => true,
        PolicyScope::OwnerOnly => viewer.id == record.owner_id() || viewer.is_admin,
        PolicyScope::AdminOnly => viewer.is_admin,
        PolicyScope::Nobody => false,
    }
}

/// Every listed capability must hold. An empty list is trivially satisfied.
pub fn require_capabilities<R>(viewer: &Viewer, record: &R, capabilities: &[Capability]) -> bool
where
    R: Protected + ?Sized,
{
    capabilities
        .iter()
        .all(|capability| has_capability(viewer, record, *capability))
}
