//! Typed view of the `invoice_amounts` index embedded in a booking document.
//!
//! The index is a projection of the invoice ledger rows kept on the booking
//! so totals can be shown without querying the ledger. It can always be
//! rebuilt from the Expense rows bound to invoice attachments.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Amount recorded for one invoice attachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceAmount {
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_amount: Option<Decimal>,
}

/// `invoice_amounts`: attachment id -> amount.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceAmounts(BTreeMap<Uuid, InvoiceAmount>);

impl InvoiceAmounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for an attachment.
    pub fn merge(&mut self, attachment_id: Uuid, entry: InvoiceAmount) -> Option<InvoiceAmount> {
        self.0.insert(attachment_id, entry)
    }

    /// Remove the entry for an attachment, returning it if it was present.
    pub fn remove(&mut self, attachment_id: Uuid) -> Option<InvoiceAmount> {
        self.0.remove(&attachment_id)
    }

    pub fn get(&self, attachment_id: Uuid) -> Option<&InvoiceAmount> {
        self.0.get(&attachment_id)
    }

    pub fn contains(&self, attachment_id: Uuid) -> bool {
        self.0.contains_key(&attachment_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Uuid, &InvoiceAmount)> {
        self.0.iter()
    }

    /// Sum of all recorded amounts.
    pub fn total(&self) -> Decimal {
        self.0.values().map(|e| e.amount).sum()
    }

    /// Read the index out of a free-form booking document.
    /// Entries that do not parse are dropped; a missing key yields an empty index.
    pub fn from_document(document: &serde_json::Value) -> Self {
        let Some(raw) = document.get("invoice_amounts").and_then(|v| v.as_object()) else {
            return Self::default();
        };

        let entries = raw
            .iter()
            .filter_map(|(key, value)| {
                let id = Uuid::parse_str(key).ok()?;
                let entry = serde_json::from_value::<InvoiceAmount>(value.clone()).ok()?;
                Some((id, entry))
            })
            .collect();

        Self(entries)
    }

    /// Write the index into a booking document, leaving other keys untouched.
    pub fn apply_to_document(&self, document: &mut serde_json::Value) {
        if !document.is_object() {
            *document = serde_json::Value::Object(serde_json::Map::new());
        }
        if let Some(map) = document.as_object_mut() {
            map.insert(
                "invoice_amounts".to_string(),
                serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({})),
            );
        }
    }
}

impl FromIterator<(Uuid, InvoiceAmount)> for InvoiceAmounts {
    fn from_iter<I: IntoIterator<Item = (Uuid, InvoiceAmount)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_and_remove_track_entries() {
        let id = Uuid::new_v4();
        let mut index = InvoiceAmounts::new();
        index.merge(
            id,
            InvoiceAmount {
                amount: Decimal::from(500),
                original_currency: Some("USD".into()),
                original_amount: Some(Decimal::from(185)),
            },
        );
        assert!(index.contains(id));
        assert_eq!(index.total(), Decimal::from(500));

        assert!(index.remove(id).is_some());
        assert!(index.remove(id).is_none());
        assert!(index.is_empty());
    }

    #[test]
    fn document_round_trip_preserves_other_keys() {
        let id = Uuid::new_v4();
        let mut document = serde_json::json!({ "hotel": { "name": "Rooms Tbilisi" } });
        let mut index = InvoiceAmounts::from_document(&document);
        assert!(index.is_empty());

        index.merge(
            id,
            InvoiceAmount {
                amount: Decimal::from(120),
                original_currency: None,
                original_amount: None,
            },
        );
        index.apply_to_document(&mut document);

        assert_eq!(document["hotel"]["name"], "Rooms Tbilisi");
        let reread = InvoiceAmounts::from_document(&document);
        assert_eq!(reread.get(id).map(|e| e.amount), Some(Decimal::from(120)));
    }

    #[test]
    fn unparsable_entries_are_skipped() {
        let document = serde_json::json!({
            "invoice_amounts": {
                "not-a-uuid": { "amount": "10" },
                "6a3c1d8e-2f43-4e55-9a4b-4f3f0f6a9c11": { "amount": "25.50" }
            }
        });
        let index = InvoiceAmounts::from_document(&document);
        assert_eq!(index.len(), 1);
    }
}
