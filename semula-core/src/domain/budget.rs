//! Budget item domain model (Semula = before revision, Menjadi = after revision)

use super::filter::FilterLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Classification path of a budget line
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema, Validate)]
pub struct BudgetClassification {
    #[validate(length(min = 1, max = 32))]
    pub program: String,
    #[validate(length(min = 1, max = 32))]
    pub kegiatan: String,
    #[validate(length(min = 1, max = 32))]
    pub output: String,
    #[validate(length(min = 1, max = 32))]
    pub komponen: String,
    #[validate(length(min = 1, max = 32))]
    pub sub_komponen: String,
    #[validate(length(min = 1, max = 32))]
    pub akun: String,
}

impl BudgetClassification {
    pub fn get(&self, level: FilterLevel) -> &str {
        match level {
            FilterLevel::Program => &self.program,
            FilterLevel::Kegiatan => &self.kegiatan,
            FilterLevel::Output => &self.output,
            FilterLevel::Komponen => &self.komponen,
            FilterLevel::SubKomponen => &self.sub_komponen,
            FilterLevel::Akun => &self.akun,
        }
    }
}

/// Revision status label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BudgetStatus {
    /// Values unchanged
    #[default]
    Tetap,
    /// Values revised
    Berubah,
    /// Line added in the revision
    Baru,
    /// Line zeroed out in the revision
    Dihapus,
}

impl BudgetStatus {
    pub fn label(&self) -> &'static str {
        match self {
            BudgetStatus::Tetap => "Tetap",
            BudgetStatus::Berubah => "Berubah",
            BudgetStatus::Baru => "Baru",
            BudgetStatus::Dihapus => "Dihapus",
        }
    }
}

/// Largest volume accepted on one line
pub const MAX_VOLUME: f64 = 1_000_000_000.0;
/// Largest unit price accepted on one line, in rupiah
pub const MAX_HARGA_SATUAN: i64 = 1_000_000_000_000;
/// Largest amount (volume × unit price) of one line, in rupiah
pub const MAX_JUMLAH: i64 = 1_000_000_000_000_000;

/// Amount of a line does not fit in whole rupiah bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("jumlah must be a finite amount of at most Rp {}", MAX_JUMLAH)]
pub struct AmountOutOfRange;

/// Volume, unit and unit price of one side of the comparison
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema, Validate)]
#[validate(schema(function = "validate_jumlah"))]
pub struct BudgetValues {
    #[validate(range(min = 0.0, max = 1_000_000_000.0))]
    pub volume: f64,
    #[validate(length(max = 64))]
    pub satuan: String,
    #[validate(range(min = 0i64, max = 1_000_000_000_000i64))]
    pub harga_satuan: i64,
}

impl BudgetValues {
    /// Amount in whole rupiah
    pub fn jumlah(&self) -> Result<i64, AmountOutOfRange> {
        let amount = (self.volume * self.harga_satuan as f64).round();
        if amount.is_finite() && amount.abs() <= MAX_JUMLAH as f64 {
            Ok(amount as i64)
        } else {
            Err(AmountOutOfRange)
        }
    }
}

fn validate_jumlah(values: &BudgetValues) -> Result<(), ValidationError> {
    values
        .jumlah()
        .map(|_| ())
        .map_err(|_| ValidationError::new("jumlah_out_of_range"))
}

/// A persisted budget line as stored by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BudgetItem {
    pub id: Uuid,
    #[serde(flatten)]
    pub classification: BudgetClassification,
    #[serde(default)]
    pub uraian: String,
    #[serde(default)]
    pub volume_semula: f64,
    #[serde(default)]
    pub satuan_semula: String,
    #[serde(default)]
    pub harga_satuan_semula: i64,
    #[serde(default)]
    pub jumlah_semula: i64,
    #[serde(default)]
    pub volume_menjadi: f64,
    #[serde(default)]
    pub satuan_menjadi: String,
    #[serde(default)]
    pub harga_satuan_menjadi: i64,
    #[serde(default)]
    pub jumlah_menjadi: i64,
    #[serde(default)]
    pub status: BudgetStatus,
    #[serde(default)]
    pub is_approved: bool,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl BudgetItem {
    pub fn semula(&self) -> BudgetValues {
        BudgetValues {
            volume: self.volume_semula,
            satuan: self.satuan_semula.clone(),
            harga_satuan: self.harga_satuan_semula,
        }
    }

    pub fn menjadi(&self) -> BudgetValues {
        BudgetValues {
            volume: self.volume_menjadi,
            satuan: self.satuan_menjadi.clone(),
            harga_satuan: self.harga_satuan_menjadi,
        }
    }

    /// Difference menjadi − semula
    pub fn selisih(&self) -> i64 {
        self.jumlah_menjadi.saturating_sub(self.jumlah_semula)
    }

    /// Status implied by the stored amounts
    pub fn derive_status(&self) -> BudgetStatus {
        status_for(
            self.jumlah_semula,
            self.jumlah_menjadi,
            self.semula() != self.menjadi(),
        )
    }
}

/// Status implied by a pair of semula/menjadi values
pub fn derive_status(
    semula: &BudgetValues,
    menjadi: &BudgetValues,
) -> Result<BudgetStatus, AmountOutOfRange> {
    Ok(status_for(semula.jumlah()?, menjadi.jumlah()?, semula != menjadi))
}

fn status_for(before: i64, after: i64, changed: bool) -> BudgetStatus {
    if before == 0 && after > 0 {
        BudgetStatus::Baru
    } else if before > 0 && after == 0 {
        BudgetStatus::Dihapus
    } else if changed {
        BudgetStatus::Berubah
    } else {
        BudgetStatus::Tetap
    }
}

/// Ownership and approval facts about an item, as seen by one caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ItemOwnership {
    pub created_by_current_user: bool,
    pub is_approved: bool,
}

impl ItemOwnership {
    /// `user_id` is `None` for anonymous callers, who own nothing
    pub fn of(item: &BudgetItem, user_id: Option<Uuid>) -> Self {
        Self {
            created_by_current_user: matches!(
                (item.created_by, user_id),
                (Some(owner), Some(current)) if owner == current
            ),
            is_approved: item.is_approved,
        }
    }
}

/// Input for creating a budget line
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBudgetItemInput {
    #[validate(nested)]
    pub classification: BudgetClassification,
    #[validate(length(min = 1, max = 2000))]
    pub uraian: String,
    #[validate(nested)]
    #[serde(default)]
    pub semula: BudgetValues,
    #[validate(nested)]
    #[serde(default)]
    pub menjadi: BudgetValues,
}

/// Input for editing the numeric values of a line
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateBudgetValuesInput {
    #[validate(nested)]
    pub semula: Option<BudgetValues>,
    #[validate(nested)]
    pub menjadi: Option<BudgetValues>,
}

/// Input for editing the description of a line
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateUraianInput {
    #[validate(length(min = 1, max = 2000))]
    pub uraian: String,
}

/// Row written to the backend when a line is created
#[derive(Debug, Clone, Serialize)]
pub struct NewBudgetItemRow {
    #[serde(flatten)]
    pub classification: BudgetClassification,
    pub uraian: String,
    pub volume_semula: f64,
    pub satuan_semula: String,
    pub harga_satuan_semula: i64,
    pub jumlah_semula: i64,
    pub volume_menjadi: f64,
    pub satuan_menjadi: String,
    pub harga_satuan_menjadi: i64,
    pub jumlah_menjadi: i64,
    pub status: BudgetStatus,
    pub is_approved: bool,
    pub created_by: Option<Uuid>,
}

impl NewBudgetItemRow {
    pub fn from_input(
        input: &CreateBudgetItemInput,
        created_by: Option<Uuid>,
    ) -> Result<Self, AmountOutOfRange> {
        let semula = &input.semula;
        let menjadi = &input.menjadi;
        Ok(Self {
            classification: input.classification.clone(),
            uraian: input.uraian.trim().to_string(),
            volume_semula: semula.volume,
            satuan_semula: semula.satuan.clone(),
            harga_satuan_semula: semula.harga_satuan,
            jumlah_semula: semula.jumlah()?,
            volume_menjadi: menjadi.volume,
            satuan_menjadi: menjadi.satuan.clone(),
            harga_satuan_menjadi: menjadi.harga_satuan,
            jumlah_menjadi: menjadi.jumlah()?,
            status: derive_status(semula, menjadi)?,
            is_approved: false,
            created_by,
        })
    }
}

/// Partial update sent to the backend; unset fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BudgetItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uraian: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_semula: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub satuan_semula: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub harga_satuan_semula: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jumlah_semula: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_menjadi: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub satuan_menjadi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub harga_satuan_menjadi: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jumlah_menjadi: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<BudgetStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_approved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl BudgetItemPatch {
    /// Patch applying new values to `item`, recomputing amounts and status
    pub fn values(
        item: &BudgetItem,
        input: &UpdateBudgetValuesInput,
    ) -> Result<Self, AmountOutOfRange> {
        let semula = input.semula.clone().unwrap_or_else(|| item.semula());
        let menjadi = input.menjadi.clone().unwrap_or_else(|| item.menjadi());
        Ok(Self {
            volume_semula: Some(semula.volume),
            satuan_semula: Some(semula.satuan.clone()),
            harga_satuan_semula: Some(semula.harga_satuan),
            jumlah_semula: Some(semula.jumlah()?),
            volume_menjadi: Some(menjadi.volume),
            satuan_menjadi: Some(menjadi.satuan.clone()),
            harga_satuan_menjadi: Some(menjadi.harga_satuan),
            jumlah_menjadi: Some(menjadi.jumlah()?),
            status: Some(derive_status(&semula, &menjadi)?),
            updated_at: Some(Utc::now()),
            ..Default::default()
        })
    }

    pub fn uraian(uraian: &str) -> Self {
        Self {
            uraian: Some(uraian.trim().to_string()),
            updated_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn approval(approved: bool) -> Self {
        Self {
            is_approved: Some(approved),
            updated_at: Some(Utc::now()),
            ..Default::default()
        }
    }
}
