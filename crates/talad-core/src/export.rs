//! # Export
//!
//! CSV and JSON exports of promotions with Thai column headers.
//!
//! ```text
//! Vec<Promotion> ──► export_rows(now) ──► Vec<ExportRow> ──┬─► to_csv  (BOM + quoted cells)
//!                                                          └─► to_json (Thai keys)
//! ```
//! Dates are rendered in Bangkok time as `dd/mm/yyyy` in the Buddhist era,
//! the way the back office prints them.

use chrono::{DateTime, Datelike, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::promotion::Promotion;

/// UTF-8 byte order mark, so spreadsheet apps pick the right encoding.
pub const UTF8_BOM: &str = "\u{feff}";

/// Shown instead of a usage limit for unlimited promotions.
pub const UNLIMITED_LABEL: &str = "ไม่จำกัด";

/// Column headers, in row order.
pub const CSV_HEADERS: [&str; 9] = [
    "ชื่อโปรโมชั่น",
    "ประเภท",
    "สถานะ",
    "วันเริ่มต้น",
    "วันสิ้นสุด",
    "จำนวนการใช้",
    "จำกัดการใช้",
    "ผู้สร้าง",
    "วันที่สร้าง",
];

const BANGKOK_OFFSET_SECS: i32 = 7 * 3600;
const BUDDHIST_ERA_OFFSET: i32 = 543;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

/// A finished export ready to hand to a download response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDocument {
    pub content: String,
    pub content_type: &'static str,
    pub file_name: String,
}

/// One exported promotion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    #[serde(rename = "ชื่อโปรโมชั่น")]
    pub name: String,
    #[serde(rename = "ประเภท")]
    pub type_label: String,
    #[serde(rename = "สถานะ")]
    pub status_label: String,
    #[serde(rename = "วันเริ่มต้น")]
    pub start_date: String,
    #[serde(rename = "วันสิ้นสุด")]
    pub end_date: String,
    #[serde(rename = "จำนวนการใช้")]
    pub usage_count: u32,
    #[serde(rename = "จำกัดการใช้")]
    pub usage_limit: String,
    #[serde(rename = "ผู้สร้าง")]
    pub created_by: String,
    #[serde(rename = "วันที่สร้าง")]
    pub created_at: String,
}

impl ExportRow {
    fn cells(&self) -> [String; 9] {
        [
            self.name.clone(),
            self.type_label.clone(),
            self.status_label.clone(),
            self.start_date.clone(),
            self.end_date.clone(),
            self.usage_count.to_string(),
            self.usage_limit.clone(),
            self.created_by.clone(),
            self.created_at.clone(),
        ]
    }
}

/// Formats a timestamp as a Thai calendar date, e.g. `17/10/2569`.
pub fn format_thai_date(at: DateTime<Utc>) -> String {
    let date = match FixedOffset::east_opt(BANGKOK_OFFSET_SECS) {
        Some(tz) => at.with_timezone(&tz).date_naive(),
        None => at.date_naive(),
    };
    format!(
        "{:02}/{:02}/{}",
        date.day(),
        date.month(),
        date.year() + BUDDHIST_ERA_OFFSET
    )
}

/// Flattens promotions into export rows, labelling status as of `now`.
pub fn export_rows(promotions: &[Promotion], now: DateTime<Utc>) -> Vec<ExportRow> {
    promotions
        .iter()
        .map(|p| ExportRow {
            name: p.name.clone(),
            type_label: p.promotion_type().label_th().to_string(),
            status_label: p.availability(now).label_th().to_string(),
            start_date: format_thai_date(p.start_date),
            end_date: format_thai_date(p.end_date),
            usage_count: p.usage_count,
            usage_limit: p
                .usage_limit
                .map_or_else(|| UNLIMITED_LABEL.to_string(), |l| l.to_string()),
            created_by: p.created_by.clone().unwrap_or_default(),
            created_at: format_thai_date(p.created_at),
        })
        .collect()
}

fn quote(cell: &str) -> String {
    format!("\"{}\"", cell.replace('"', "\"\""))
}

/// Renders rows as CSV with a BOM and a header line. Every cell is quoted.
pub fn to_csv(rows: &[ExportRow]) -> String {
    let mut out = String::from(UTF8_BOM);
    let header: Vec<String> = CSV_HEADERS.iter().map(|h| quote(h)).collect();
    out.push_str(&header.join(","));
    out.push('\n');
    for row in rows {
        let cells: Vec<String> = row.cells().iter().map(|c| quote(c)).collect();
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    out
}

pub fn to_json(rows: &[ExportRow]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(rows)
}

/// Builds a complete export document.
pub fn export_promotions(
    promotions: &[Promotion],
    format: ExportFormat,
    now: DateTime<Utc>,
) -> Result<ExportDocument, serde_json::Error> {
    let rows = export_rows(promotions, now);
    let stamp = now.format("%Y%m%d");
    Ok(match format {
        ExportFormat::Csv => ExportDocument {
            content: to_csv(&rows),
            content_type: "text/csv; charset=utf-8",
            file_name: format!("promotions-{}.csv", stamp),
        },
        ExportFormat::Json => ExportDocument {
            content: to_json(&rows)?,
            content_type: "application/json",
            file_name: format!("promotions-{}.json", stamp),
        },
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
