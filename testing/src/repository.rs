use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use errors::TenancyError;
use parking_lot::RwLock;
use tenant_core::{TenantFilter, TenantId, TenantScopedRepository};

use crate::tenant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRecord {
    pub id: String,
    pub tenant_id: TenantId
}

impl TestRecord {
    pub fn new(id: &str, tenant_id: &str) -> Self {
        Self {
            id: id.to_string(),
            tenant_id: tenant(tenant_id)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Tenancy(#[from] TenancyError)
}

/// Repository that counts every call reaching it. Clones share state.
#[derive(Clone)]
pub struct CountingRepository {
    name: String,
    records: Arc<RwLock<Vec<TestRecord>>>,
    calls: Arc<AtomicUsize>
}

impl CountingRepository {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            records: Arc::new(RwLock::new(Vec::new())),
            calls: Arc::new(AtomicUsize::new(0))
        }
    }

    /// Inserts without counting a call.
    pub fn seed(&self, record: TestRecord) {
        self.records.write().push(record);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn list_owned(
        &self,
        filter: TenantFilter
    ) -> Result<Vec<TestRecord>, RepositoryError> {
        self.list(&filter).await
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TenantScopedRepository for CountingRepository {
    type Record = TestRecord;
    type Error = RepositoryError;

    fn resource_name(&self) -> &str {
        &self.name
    }

    async fn list(&self, filter: &TenantFilter) -> Result<Vec<TestRecord>, RepositoryError> {
        self.hit();
        Ok(self
            .records
            .read()
            .iter()
            .filter(|r| filter.contains(&r.tenant_id))
            .cloned()
            .collect())
    }

    async fn get(
        &self,
        tenant_id: &TenantId,
        id: &str
    ) -> Result<Option<TestRecord>, RepositoryError> {
        self.hit();
        Ok(self
            .records
            .read()
            .iter()
            .find(|r| &r.tenant_id == tenant_id && r.id == id)
            .cloned())
    }

    async fn insert(
        &self,
        tenant_id: &TenantId,
        mut record: TestRecord
    ) -> Result<(), RepositoryError> {
        self.hit();
        record.tenant_id = tenant_id.clone();
        self.records.write().push(record);
        Ok(())
    }

    async fn delete(&self, tenant_id: &TenantId, id: &str) -> Result<bool, RepositoryError> {
        self.hit();
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|r| !(&r.tenant_id == tenant_id && r.id == id));
        Ok(records.len() != before)
    }
}
