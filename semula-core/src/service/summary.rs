//! Before/after totals and the narrative shown above the comparison table

use crate::domain::{BudgetItem, BudgetStatus, FilterSelection};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatusCounts {
    pub tetap: usize,
    pub berubah: usize,
    pub baru: usize,
    pub dihapus: usize,
}

impl StatusCounts {
    fn record(&mut self, status: BudgetStatus) {
        match status {
            BudgetStatus::Tetap => self.tetap += 1,
            BudgetStatus::Berubah => self.berubah += 1,
            BudgetStatus::Baru => self.baru += 1,
            BudgetStatus::Dihapus => self.dihapus += 1,
        }
    }
}

/// Aggregate of the items under one filter selection
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BudgetSummary {
    pub filter: String,
    pub total_semula: i64,
    pub total_menjadi: i64,
    pub selisih: i64,
    /// Change relative to the semula total; absent when that total is zero
    pub percentage_change: Option<f64>,
    pub item_count: usize,
    pub status_counts: StatusCounts,
    pub approved_count: usize,
    pub narrative: String,
}

impl BudgetSummary {
    pub fn from_items(items: &[BudgetItem], filter: &FilterSelection) -> Self {
        let mut status_counts = StatusCounts::default();
        let mut total_semula = 0i64;
        let mut total_menjadi = 0i64;
        let mut approved_count = 0;

        for item in items {
            total_semula = total_semula.saturating_add(item.jumlah_semula);
            total_menjadi = total_menjadi.saturating_add(item.jumlah_menjadi);
            status_counts.record(item.derive_status());
            if item.is_approved {
                approved_count += 1;
            }
        }

        let selisih = total_menjadi.saturating_sub(total_semula);
        let percentage_change =
            (total_semula != 0).then(|| selisih as f64 / total_semula as f64 * 100.0);

        let mut summary = Self {
            filter: filter.describe(),
            total_semula,
            total_menjadi,
            selisih,
            percentage_change,
            item_count: items.len(),
            status_counts,
            approved_count,
            narrative: String::new(),
        };
        summary.narrative = summary.narrate();
        summary
    }

    fn narrate(&self) -> String {
        if self.item_count == 0 {
            return format!("Tidak ada item anggaran pada {}.", self.filter);
        }

        let mut text = format!(
            "Untuk {}, total anggaran semula Rp {} menjadi Rp {}. ",
            self.filter,
            format_thousands(self.total_semula),
            format_thousands(self.total_menjadi),
        );

        let direction = match self.selisih {
            d if d > 0 => Some("bertambah"),
            d if d < 0 => Some("berkurang"),
            _ => None,
        };
        match (direction, self.percentage_change) {
            (Some(direction), Some(pct)) => text.push_str(&format!(
                "Anggaran {} Rp {} ({}%). ",
                direction,
                format_thousands(self.selisih.saturating_abs()),
                format_percentage(pct.abs()),
            )),
            (Some(direction), None) => text.push_str(&format!(
                "Anggaran {} Rp {}. ",
                direction,
                format_thousands(self.selisih.saturating_abs()),
            )),
            (None, _) => text.push_str("Tidak ada perubahan total anggaran. "),
        }

        let counts = &self.status_counts;
        text.push_str(&format!(
            "Terdapat {} item: {} berubah, {} baru, {} dihapus, {} tetap; {} telah disetujui.",
            self.item_count,
            counts.berubah,
            counts.baru,
            counts.dihapus,
            counts.tetap,
            self.approved_count,
        ));
        text
    }
}

/// `1234567` → `1.234.567`
pub fn format_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    if value < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Two decimals with a decimal comma
fn format_percentage(value: f64) -> String {
    format!("{:.2}", value).replace('.', ",")
}
