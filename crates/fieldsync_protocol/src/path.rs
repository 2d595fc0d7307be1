//! Tenant-scoped collection paths.

use std::fmt;

/// The remote collection for one entity type of one company.
///
/// Shaped as `tenants/{companyId}/entities/{entityType}/items`. This is
/// the only way a remote path is ever formed: the company id always comes
/// from the session of the current run, so a record can never address
/// another tenant's tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath {
    company_id: String,
    entity: String,
}

impl CollectionPath {
    /// Locate the collection for an entity type under a company.
    ///
    /// Pure: same inputs, same path, no ambient state.
    pub fn locate(company_id: &str, entity: &str) -> Self {
        Self {
            company_id: company_id.to_string(),
            entity: entity.to_string(),
        }
    }

    /// The owning company id.
    pub fn company_id(&self) -> &str {
        &self.company_id
    }

    /// The entity type segment.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// The full document path for one record in this collection.
    pub fn record_path(&self, record_id: i64) -> String {
        format!("{self}/{record_id}")
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tenants/{}/entities/{}/items",
            self.company_id, self.entity
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_shape() {
        let path = CollectionPath::locate("acme", "clients");
        assert_eq!(path.to_string(), "tenants/acme/entities/clients/items");
    }

    #[test]
    fn record_path_appends_id() {
        let path = CollectionPath::locate("acme", "contracts");
        assert_eq!(
            path.record_path(42),
            "tenants/acme/entities/contracts/items/42"
        );
    }

    #[test]
    fn locate_is_pure() {
        assert_eq!(
            CollectionPath::locate("acme", "clients"),
            CollectionPath::locate("acme", "clients")
        );
        assert_ne!(
            CollectionPath::locate("acme", "clients"),
            CollectionPath::locate("other", "clients")
        );
    }
}
