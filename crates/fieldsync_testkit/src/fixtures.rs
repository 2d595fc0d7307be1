//! Fixtures for a field-operations entity domain.
//!
//! The domain mirrors a route-based field service: routes and the
//! clients on them are scoped, the product catalog is company-wide,
//! contracts bill a client and payments settle a contract.

use std::sync::Arc;

use fieldsync_codec::{EntitySchema, FieldKind, FieldMap, FieldValue};
use fieldsync_engine::{
    EntityDescriptor, MemoryLocalStore, MemoryMetadataStore, StaticAssignments, SyncConfig,
    SyncRunner,
};
use fieldsync_protocol::{CollectionPath, EntityRecord, RemoteRecord};

use crate::remote::MemoryRemoteStore;

/// The route list itself. Scoped by its own id field and allowed to
/// bootstrap, so a first install can discover routes before any
/// assignment has landed.
pub fn routes_descriptor() -> EntityDescriptor {
    EntityDescriptor::new("routes", EntitySchema::new())
        .with_scope_field("routeId")
        .with_bootstrap()
}

/// Clients, scoped to the routes they sit on.
pub fn clients_descriptor() -> EntityDescriptor {
    let schema = EntitySchema::new().with_field("createdAt", FieldKind::TimestampMillis);
    EntityDescriptor::new("clients", schema)
        .with_scope_field("routeId")
        .with_dependency("routes")
}

/// The company-wide product catalog; every agent pulls all of it.
pub fn products_descriptor() -> EntityDescriptor {
    EntityDescriptor::new("products", EntitySchema::new())
}

/// Contracts, scoped like their clients and applied only once the
/// referenced client row exists locally.
pub fn contracts_descriptor() -> EntityDescriptor {
    let schema = EntitySchema::new()
        .with_field("signedAt", FieldKind::TimestampMillis)
        .with_field("dueDate", FieldKind::DateTime);
    EntityDescriptor::new("contracts", schema)
        .with_scope_field("routeId")
        .with_reference("clientId", "clients")
}

/// Payments, applied only once the referenced contract exists locally.
pub fn payments_descriptor() -> EntityDescriptor {
    let schema = EntitySchema::new().with_field("paidAt", FieldKind::TimestampMillis);
    EntityDescriptor::new("payments", schema).with_reference("contractId", "contracts")
}

/// The remote collection for a company's routes.
pub fn routes_collection(company: &str) -> CollectionPath {
    CollectionPath::locate(company, "routes")
}

/// The remote collection for a company's clients.
pub fn clients_collection(company: &str) -> CollectionPath {
    CollectionPath::locate(company, "clients")
}

/// The remote collection for a company's product catalog.
pub fn products_collection(company: &str) -> CollectionPath {
    CollectionPath::locate(company, "products")
}

/// The remote collection for a company's contracts.
pub fn contracts_collection(company: &str) -> CollectionPath {
    CollectionPath::locate(company, "contracts")
}

/// The remote collection for a company's payments.
pub fn payments_collection(company: &str) -> CollectionPath {
    CollectionPath::locate(company, "payments")
}

/// A route document in wire form. The route's own id doubles as its
/// scope field.
pub fn route_record(id: i64, modified: i64) -> RemoteRecord {
    let mut fields = FieldMap::new();
    fields.insert("name".to_string(), FieldValue::Text(format!("Route {id}")));
    fields.insert("routeId".to_string(), FieldValue::Integer(id));
    fields.insert("lastModified".to_string(), FieldValue::Integer(modified));
    RemoteRecord::new(id, fields)
}

/// A client document in wire form.
pub fn client_record(id: i64, route_id: i64, modified: i64) -> RemoteRecord {
    let mut fields = FieldMap::new();
    fields.insert("name".to_string(), FieldValue::Text(format!("Client {id}")));
    fields.insert("routeId".to_string(), FieldValue::Integer(route_id));
    fields.insert("lastModified".to_string(), FieldValue::Integer(modified));
    fields.insert(
        "createdAt".to_string(),
        FieldValue::from_epoch_millis(modified),
    );
    RemoteRecord::new(id, fields)
}

/// A product document in wire form.
pub fn product_record(id: i64, modified: i64) -> RemoteRecord {
    let mut fields = FieldMap::new();
    fields.insert("name".to_string(), FieldValue::Text(format!("Product {id}")));
    fields.insert("price".to_string(), FieldValue::Float(9.9 * id as f64));
    fields.insert("lastModified".to_string(), FieldValue::Integer(modified));
    RemoteRecord::new(id, fields)
}

/// A contract document in wire form.
pub fn contract_record(id: i64, client_id: i64, route_id: i64, modified: i64) -> RemoteRecord {
    let mut fields = FieldMap::new();
    fields.insert("clientId".to_string(), FieldValue::Integer(client_id));
    fields.insert("routeId".to_string(), FieldValue::Integer(route_id));
    fields.insert("value".to_string(), FieldValue::Float(250.0));
    fields.insert("lastModified".to_string(), FieldValue::Integer(modified));
    fields.insert(
        "signedAt".to_string(),
        FieldValue::from_epoch_millis(modified),
    );
    RemoteRecord::new(id, fields)
}

/// A payment document in wire form.
pub fn payment_record(id: i64, contract_id: i64, modified: i64, amount: f64) -> RemoteRecord {
    let mut fields = FieldMap::new();
    fields.insert("contractId".to_string(), FieldValue::Integer(contract_id));
    fields.insert("amount".to_string(), FieldValue::Float(amount));
    fields.insert("lastModified".to_string(), FieldValue::Integer(modified));
    fields.insert("paidAt".to_string(), FieldValue::from_epoch_millis(modified));
    RemoteRecord::new(id, fields)
}

/// A client row in local (decoded) form, for seeding push tests.
pub fn local_client_record(id: i64, route_id: i64, modified: i64) -> EntityRecord {
    let mut fields = FieldMap::new();
    fields.insert("name".to_string(), FieldValue::Text(format!("Client {id}")));
    fields.insert("routeId".to_string(), FieldValue::Integer(route_id));
    fields.insert("lastModified".to_string(), FieldValue::Integer(modified));
    fields.insert("createdAt".to_string(), FieldValue::Integer(modified));
    EntityRecord::new(id, fields)
}

/// Every store fake behind one handle, for end-to-end tests.
pub struct SyncFixture {
    /// The local relational store fake.
    pub local: Arc<MemoryLocalStore>,
    /// The query-evaluating remote store.
    pub remote: Arc<MemoryRemoteStore>,
    /// The metadata store fake.
    pub metadata: Arc<MemoryMetadataStore>,
    /// The route assignment provider fake.
    pub assignments: Arc<StaticAssignments>,
}

impl SyncFixture {
    /// Creates a fixture with empty stores.
    pub fn new() -> Self {
        Self {
            local: Arc::new(MemoryLocalStore::new()),
            remote: Arc::new(MemoryRemoteStore::new()),
            metadata: Arc::new(MemoryMetadataStore::new()),
            assignments: Arc::new(StaticAssignments::new()),
        }
    }

    /// A runner over the fixture stores with nothing registered.
    pub fn runner(&self, config: SyncConfig) -> SyncRunner {
        SyncRunner::new(
            config,
            self.local.clone(),
            self.remote.clone(),
            self.metadata.clone(),
            self.assignments.clone(),
        )
    }

    /// A runner with the whole field domain registered.
    pub fn field_runner(&self, config: SyncConfig) -> SyncRunner {
        let mut runner = self.runner(config);
        runner.register(routes_descriptor());
        runner.register(products_descriptor());
        runner.register(clients_descriptor());
        runner.register(contracts_descriptor());
        runner.register(payments_descriptor());
        runner
    }
}

impl Default for SyncFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Pre-seeded scenarios.
pub mod scenarios {
    use super::*;

    /// Seeds a company with two routes of clients and their contracts.
    ///
    /// Route 3 holds clients 1 and 2, route 7 holds client 3; contracts
    /// 10 through 12 follow their clients. Timestamps ascend with ids so
    /// cursor assertions stay readable.
    pub fn seeded_company(fixture: &SyncFixture, company: &str) {
        fixture.remote.seed_many(
            &routes_collection(company),
            [route_record(3, 10), route_record(7, 11)],
        );
        fixture.remote.seed_many(
            &clients_collection(company),
            [
                client_record(1, 3, 100),
                client_record(2, 3, 110),
                client_record(3, 7, 120),
            ],
        );
        fixture.remote.seed_many(
            &contracts_collection(company),
            [
                contract_record(10, 1, 3, 200),
                contract_record(11, 2, 3, 210),
                contract_record(12, 3, 7, 220),
            ],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_imply_dependencies() {
        let contracts = contracts_descriptor();
        assert_eq!(contracts.depends_on, vec!["clients".to_string()]);
        assert_eq!(contracts.references[0].field, "clientId");

        let payments = payments_descriptor();
        assert_eq!(payments.depends_on, vec!["contracts".to_string()]);
    }

    #[test]
    fn wire_records_expose_scope_and_modified() {
        let record = client_record(1, 3, 100);
        assert_eq!(record.route_id("routeId"), Some(3));
        assert_eq!(record.last_modified("lastModified"), Some(100));
    }

    #[test]
    fn field_runner_registers_the_domain() {
        let fixture = SyncFixture::new();
        let runner = fixture.field_runner(SyncConfig::new());
        assert_eq!(runner.entities().len(), 5);
    }

    #[test]
    fn seeded_company_is_consistent() {
        let fixture = SyncFixture::new();
        scenarios::seeded_company(&fixture, "acme");
        assert_eq!(fixture.remote.len(&clients_collection("acme")), 3);
        assert_eq!(fixture.remote.len(&contracts_collection("acme")), 3);
    }
}
