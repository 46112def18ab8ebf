use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
}

/// Who holds a capability on a record. Stored as a string column;
/// unrecognized values parse to `Nobody` so a bad row fails closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyScope {
    Anyone,
    OwnerOnly,
    AdminOnly,
    Nobody,
}

impl PolicyScope {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "anyone" => PolicyScope::Anyone,
            "owner_only" => PolicyScope::OwnerOnly,
            "admin_only" => PolicyScope::AdminOnly,
            _ => PolicyScope::Nobody,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PolicyScope::Anyone => "anyone",
            PolicyScope::OwnerOnly => "owner_only",
            PolicyScope::AdminOnly => "admin_only",
            PolicyScope::Nobody => "nobody",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaseStatus {
    Active,
    Released,
    Expired,
    Pending,
    Broken,
    Unknown,
}

impl LeaseStatus {
    /// Total over any stored string: unrecognized values map to `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "active" => LeaseStatus::Active,
            "released" => LeaseStatus::Released,
            "expired" => LeaseStatus::Expired,
            "pending" => LeaseStatus::Pending,
            "broken" => LeaseStatus::Broken,
            _ => LeaseStatus::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LeaseStatus::Active => "active",
            LeaseStatus::Released => "released",
            LeaseStatus::Expired => "expired",
            LeaseStatus::Pending => "pending",
            LeaseStatus::Broken => "broken",
            LeaseStatus::Unknown => "unknown",
        }
    }

    pub fn display_label(self) -> &'static str {
        match self {
            LeaseStatus::Active => "Active",
            LeaseStatus::Released => "Released",
            LeaseStatus::Expired => "Expired",
            LeaseStatus::Pending => "Pending",
            LeaseStatus::Broken => "Broken",
            LeaseStatus::Unknown => "Unknown",
        }
    }

    pub fn is_releasable(self) -> bool {
        matches!(self, LeaseStatus::Active | LeaseStatus::Pending)
    }
}

/// One key/value row of a lease's free-form attribute section. Attributes
/// are stored as a JSON array of these pairs; the order rows were written
/// in is the order they render in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseAttribute {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub id: i64,
    pub status: LeaseStatus,
    pub resource_type: String,
    pub resource_id: Option<i64>,
    pub until: Option<DateTime<Utc>>,
    pub attributes: Vec<LeaseAttribute>,
    pub owner_id: i64,
    pub view_scope: PolicyScope,
    pub edit_scope: PolicyScope,
}

impl Lease {
    pub fn can_release(&self) -> bool {
        self.status.is_releasable()
    }

    pub fn uri(&self) -> String {
        format!("/lease/{}", self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: i64,
    pub name: String,
    pub resource_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseLog {
    pub id: i64,
    pub lease_id: i64,
    pub event: String,
    pub detail: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paste {
    pub id: i64,
    pub title: String,
    pub language: String,
    pub file_id: Option<i64>,
    pub author_id: i64,
    pub parent_id: Option<i64>,
    pub view_scope: PolicyScope,
    pub edit_scope: PolicyScope,
}

impl Paste {
    pub fn uri(&self) -> String {
        format!("/paste/{}", self.id)
    }

    pub fn display_name(&self) -> String {
        if self.title.is_empty() {
            format!("Paste {}", self.id)
        } else {
            format!("Paste {}: {}", self.id, self.title)
        }
    }
}

/// Immutable content row backing a paste. Written once at creation and
/// never updated; `content_hash` is the sha-256 of `data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBlob {
    pub id: i64,
    pub name: String,
    pub content_hash: String,
    pub author_id: i64,
    pub data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_status_parse_is_total() {
        assert_eq!(LeaseStatus::parse("active"), LeaseStatus::Active);
        assert_eq!(LeaseStatus::parse("released"), LeaseStatus::Released);
        assert_eq!(LeaseStatus::parse("expired"), LeaseStatus::Expired);
        assert_eq!(LeaseStatus::parse("pending"), LeaseStatus::Pending);
        assert_eq!(LeaseStatus::parse("broken"), LeaseStatus::Broken);
        assert_eq!(LeaseStatus::parse("destroyed"), LeaseStatus::Unknown);
        assert_eq!(LeaseStatus::parse(""), LeaseStatus::Unknown);
    }

    #[test]
    fn lease_status_labels_are_distinct() {
        let labels = [
            LeaseStatus::Active,
            LeaseStatus::Released,
            LeaseStatus::Expired,
            LeaseStatus::Pending,
            LeaseStatus::Broken,
        ]
        .map(LeaseStatus::display_label);

        for (i, a) in labels.iter().enumerate() {
            for b in labels.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
        assert_eq!(LeaseStatus::Unknown.display_label(), "Unknown");
    }

    #[test]
    fn releasable_statuses() {
        assert!(LeaseStatus::Active.is_releasable());
        assert!(LeaseStatus::Pending.is_releasable());
        assert!(!LeaseStatus::Released.is_releasable());
        assert!(!LeaseStatus::Expired.is_releasable());
        assert!(!LeaseStatus::Broken.is_releasable());
        assert!(!LeaseStatus::Unknown.is_releasable());
    }

    #[test]
    fn policy_scope_parse_fails_closed() {
        assert_eq!(PolicyScope::parse("anyone"), PolicyScope::Anyone);
        assert_eq!(PolicyScope::parse("owner_only"), PolicyScope::OwnerOnly);
        assert_eq!(PolicyScope::parse("admin_only"), PolicyScope::AdminOnly);
        assert_eq!(PolicyScope::parse("nobody"), PolicyScope::Nobody);
        assert_eq!(PolicyScope::parse("everyone??"), PolicyScope::Nobody);
    }

    #[test]
    fn attributes_round_trip_in_order() {
        let attrs = vec![
            LeaseAttribute {
                key: "b".to_string(),
                value: "2".to_string(),
            },
            LeaseAttribute {
                key: "a".to_string(),
                value: "1".to_string(),
            },
        ];

        let json = serde_json::to_value(&attrs).expect("attributes should serialize");
        let back: Vec<LeaseAttribute> =
            serde_json::from_value(json).expect("attributes should deserialize");
        assert_eq!(back, attrs);
        assert_eq!(back[0].key, "b");
        assert_eq!(back[1].key, "a");
    }

    #[test]
    fn paste_display_name_falls_back_to_id() {
        let mut paste = Paste {
            id: 7,
            title: "Foo".to_string(),
            language: "python".to_string(),
            file_id: Some(1),
            author_id: 1,
            parent_id: None,
            view_scope: PolicyScope::Anyone,
            edit_scope: PolicyScope::OwnerOnly,
        };
        assert_eq!(paste.display_name(), "Paste 7: Foo");
        assert_eq!(paste.uri(), "/paste/7");

        paste.title.clear();
        assert_eq!(paste.display_name(), "Paste 7");
    }
}
