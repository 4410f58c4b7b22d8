//! API integration tests infrastructure
//!
//! In-memory stand-ins for the hosted auth service, the profile table and
//! the budget items table.

pub mod http;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use semula_core::domain::{
    AuthenticatedUser, BudgetClassification, BudgetItem, BudgetItemPatch, BudgetStatus,
    FilterLevel, FilterSelection, FilterValue, IdentitySession, NewBudgetItemRow, Role,
    SignUpInput, UserProfile,
};
use semula_core::error::{AppError, Result};
use semula_core::identity::{AuthBackend, ProfileStore};
use semula_core::repository::{BudgetItemQuery, BudgetItemRepository};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

// ============================================================================
// Fixtures
// ============================================================================

pub fn sample_classification() -> BudgetClassification {
    BudgetClassification {
        program: "054.01.WA".to_string(),
        kegiatan: "2886".to_string(),
        output: "EBA".to_string(),
        komponen: "994".to_string(),
        sub_komponen: "A".to_string(),
        akun: "521211".to_string(),
    }
}

pub fn sample_item(created_by: Option<Uuid>) -> BudgetItem {
    BudgetItem {
        id: Uuid::new_v4(),
        classification: sample_classification(),
        uraian: "Belanja bahan rapat".to_string(),
        volume_semula: 10.0,
        satuan_semula: "OK".to_string(),
        harga_satuan_semula: 50_000,
        jumlah_semula: 500_000,
        volume_menjadi: 12.0,
        satuan_menjadi: "OK".to_string(),
        harga_satuan_menjadi: 50_000,
        jumlah_menjadi: 600_000,
        status: BudgetStatus::Berubah,
        is_approved: false,
        created_by,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

// ============================================================================
// Auth backend
// ============================================================================

/// Token table plus registered password accounts
pub struct TestAuthBackend {
    tokens: RwLock<HashMap<String, AuthenticatedUser>>,
    accounts: RwLock<HashMap<String, (String, Uuid)>>,
    revoked: RwLock<Vec<String>>,
}

impl TestAuthBackend {
    pub fn new() -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
            accounts: RwLock::new(HashMap::new()),
            revoked: RwLock::new(vec![]),
        }
    }

    pub async fn add_token(&self, token: &str, user_id: Uuid) {
        self.tokens.write().await.insert(
            token.to_string(),
            AuthenticatedUser {
                id: user_id,
                email: Some(format!("{}@example.go.id", &user_id.to_string()[..8])),
            },
        );
    }

    pub async fn add_account(&self, email: &str, password: &str, user_id: Uuid) {
        self.accounts
            .write()
            .await
            .insert(email.to_string(), (password.to_string(), user_id));
    }

    pub async fn revoked(&self) -> Vec<String> {
        self.revoked.read().await.clone()
    }
}

impl Default for TestAuthBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthBackend for TestAuthBackend {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<IdentitySession> {
        let accounts = self.accounts.read().await;
        let user_id = match accounts.get(email) {
            Some((stored, id)) if stored == password => *id,
            _ => {
                return Err(AppError::Unauthorized(
                    "Invalid email or password".to_string(),
                ))
            }
        };
        drop(accounts);

        let token = format!("token-{}", Uuid::new_v4());
        self.add_token(&token, user_id).await;
        Ok(IdentitySession {
            access_token: token,
            refresh_token: Some("refresh".to_string()),
            user_id,
            email: Some(email.to_string()),
            expires_at: Utc::now() + Duration::hours(1),
        })
    }

    async fn sign_up(&self, input: &SignUpInput) -> Result<Uuid> {
        if self.accounts.read().await.contains_key(&input.email) {
            return Err(AppError::BadRequest("User already registered".to_string()));
        }
        let id = Uuid::new_v4();
        self.add_account(&input.email, &input.password, id).await;
        Ok(id)
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        self.tokens.write().await.remove(access_token);
        self.revoked.write().await.push(access_token.to_string());
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<Option<AuthenticatedUser>> {
        Ok(self.tokens.read().await.get(access_token).cloned())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Profile store
// ============================================================================

pub struct TestProfileStore {
    profiles: RwLock<HashMap<Uuid, UserProfile>>,
}

impl TestProfileStore {
    pub fn new() -> Self {
        Self {
            profiles: RwLock::new(HashMap::new()),
        }
    }

    pub async fn add_profile(&self, user_id: Uuid, role: Role) {
        self.profiles
            .write()
            .await
            .insert(user_id, UserProfile::new(user_id, role));
    }
}

impl Default for TestProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileStore for TestProfileStore {
    async fn find_by_user_id(
        &self,
        _access_token: &str,
        user_id: Uuid,
    ) -> Result<Option<UserProfile>> {
        Ok(self.profiles.read().await.get(&user_id).cloned())
    }
}

// ============================================================================
// Budget item repository
// ============================================================================

pub struct TestBudgetItemRepository {
    items: RwLock<Vec<BudgetItem>>,
}

impl TestBudgetItemRepository {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(vec![]),
        }
    }

    pub async fn add_item(&self, item: BudgetItem) {
        self.items.write().await.push(item);
    }

    pub async fn items(&self) -> Vec<BudgetItem> {
        self.items.read().await.clone()
    }

    fn row_to_item(row: &NewBudgetItemRow) -> BudgetItem {
        BudgetItem {
            id: Uuid::new_v4(),
            classification: row.classification.clone(),
            uraian: row.uraian.clone(),
            volume_semula: row.volume_semula,
            satuan_semula: row.satuan_semula.clone(),
            harga_satuan_semula: row.harga_satuan_semula,
            jumlah_semula: row.jumlah_semula,
            volume_menjadi: row.volume_menjadi,
            satuan_menjadi: row.satuan_menjadi.clone(),
            harga_satuan_menjadi: row.harga_satuan_menjadi,
            jumlah_menjadi: row.jumlah_menjadi,
            status: row.status,
            is_approved: row.is_approved,
            created_by: row.created_by,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

impl Default for TestBudgetItemRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BudgetItemRepository for TestBudgetItemRepository {
    async fn list(
        &self,
        _access_token: &str,
        query: &BudgetItemQuery,
    ) -> Result<(Vec<BudgetItem>, u64)> {
        let needle = query.search.as_deref().map(str::to_lowercase);
        let items = self.items.read().await;
        let matching: Vec<BudgetItem> = items
            .iter()
            .filter(|i| query.filter.matches(&i.classification))
            .filter(|i| match &needle {
                Some(n) => i.uraian.to_lowercase().contains(n),
                None => true,
            })
            .cloned()
            .collect();
        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn list_all(
        &self,
        _access_token: &str,
        filter: &FilterSelection,
    ) -> Result<Vec<BudgetItem>> {
        let items = self.items.read().await;
        Ok(items
            .iter()
            .filter(|i| filter.matches(&i.classification))
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, _access_token: &str, id: Uuid) -> Result<Option<BudgetItem>> {
        Ok(self.items.read().await.iter().find(|i| i.id == id).cloned())
    }

    async fn create(&self, _access_token: &str, row: &NewBudgetItemRow) -> Result<BudgetItem> {
        let item = Self::row_to_item(row);
        self.items.write().await.push(item.clone());
        Ok(item)
    }

    async fn create_many(
        &self,
        _access_token: &str,
        rows: &[NewBudgetItemRow],
    ) -> Result<Vec<BudgetItem>> {
        let created: Vec<BudgetItem> = rows.iter().map(Self::row_to_item).collect();
        self.items.write().await.extend(created.iter().cloned());
        Ok(created)
    }

    async fn update(
        &self,
        _access_token: &str,
        id: Uuid,
        patch: &BudgetItemPatch,
    ) -> Result<BudgetItem> {
        let mut items = self.items.write().await;
        let item = items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Budget item {} not found", id)))?;

        if let Some(v) = &patch.uraian {
            item.uraian = v.clone();
        }
        if let Some(v) = patch.volume_semula {
            item.volume_semula = v;
        }
        if let Some(v) = &patch.satuan_semula {
            item.satuan_semula = v.clone();
        }
        if let Some(v) = patch.harga_satuan_semula {
            item.harga_satuan_semula = v;
        }
        if let Some(v) = patch.jumlah_semula {
            item.jumlah_semula = v;
        }
        if let Some(v) = patch.volume_menjadi {
            item.volume_menjadi = v;
        }
        if let Some(v) = &patch.satuan_menjadi {
            item.satuan_menjadi = v.clone();
        }
        if let Some(v) = patch.harga_satuan_menjadi {
            item.harga_satuan_menjadi = v;
        }
        if let Some(v) = patch.jumlah_menjadi {
            item.jumlah_menjadi = v;
        }
        if let Some(v) = patch.status {
            item.status = v;
        }
        if let Some(v) = patch.is_approved {
            item.is_approved = v;
        }
        if let Some(v) = patch.updated_at {
            item.updated_at = v;
        }
        Ok(item.clone())
    }

    async fn delete(&self, _access_token: &str, id: Uuid) -> Result<()> {
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|i| i.id != id);
        if items.len() == before {
            return Err(AppError::NotFound(format!("Budget item {} not found", id)));
        }
        Ok(())
    }

    async fn distinct_codes(
        &self,
        _access_token: &str,
        level: FilterLevel,
        filter: &FilterSelection,
    ) -> Result<Vec<String>> {
        let mut outer = filter.clone();
        for l in FilterLevel::ALL.iter().filter(|l| **l >= level) {
            outer.set(*l, FilterValue::All);
        }

        let items = self.items.read().await;
        let codes: BTreeSet<String> = items
            .iter()
            .filter(|i| outer.matches(&i.classification))
            .map(|i| i.classification.get(level).to_string())
            .collect();
        Ok(codes.into_iter().collect())
    }
}
