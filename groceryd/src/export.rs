//! Shareable JSON export of one grocery list.
//!
//! Built from a read of the list; never writes to the store.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use grocery_domain::{ListId, ProductId};
use grocery_reservations::ListLine;

/// File name offered to clients saving the export.
pub const EXPORT_FILE_NAME: &str = "Boodschappen.json";

/// A list as shared with other people.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListExport {
    pub list_id: ListId,
    pub exported_at: DateTime<Utc>,
    pub items: Vec<ExportLine>,
    /// Sum of all line subtotals
    pub total: Decimal,
}

/// One product on an exported list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportLine {
    pub product_id: ProductId,
    pub name: String,
    pub amount: u32,
    pub price: Decimal,
    pub subtotal: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shelf_life: Option<NaiveDate>,
}

impl ListExport {
    /// Build the export from the joined rows of a list.
    pub fn from_lines(list_id: ListId, lines: &[ListLine], exported_at: DateTime<Utc>) -> Self {
        let items: Vec<ExportLine> = lines
            .iter()
            .map(|line| ExportLine {
                product_id: line.product.id,
                name: line.product.name.to_string(),
                amount: line.item.amount,
                price: line.product.price.as_decimal(),
                subtotal: line.subtotal(),
                shelf_life: line.product.shelf_life,
            })
            .collect();
        let total = items.iter().map(|i| i.subtotal).sum();

        Self {
            list_id,
            exported_at,
            items,
            total,
        }
    }

    /// Number of units across all lines.
    pub fn unit_count(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.amount)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grocery_domain::{ListItemId, NewListItem, NewProduct};
    use rust_decimal_macros::dec;

    fn line(id: i64, name: &str, price: Decimal, amount: u32) -> ListLine {
        ListLine {
            item: NewListItem::new(ListId(1), ProductId(id), amount).with_id(ListItemId(id)),
            product: NewProduct::from_form(name, 10, None, price)
                .unwrap()
                .with_id(ProductId(id)),
        }
    }

    #[test]
    fn test_export_totals() {
        let lines = vec![line(1, "Melk", dec!(0.95), 3), line(2, "Kaas", dec!(7.98), 1)];

        let export = ListExport::from_lines(ListId(1), &lines, Utc::now());

        assert_eq!(export.items.len(), 2);
        assert_eq!(export.items[0].subtotal, dec!(2.85));
        assert_eq!(export.total, dec!(10.83));
        assert_eq!(export.unit_count(), 4);
    }

    #[test]
    fn test_empty_export() {
        let export = ListExport::from_lines(ListId(7), &[], Utc::now());

        assert!(export.items.is_empty());
        assert_eq!(export.total, Decimal::ZERO);
    }

    #[test]
    fn test_export_omits_missing_shelf_life() {
        let export = ListExport::from_lines(ListId(1), &[line(1, "Melk", dec!(0.95), 1)], Utc::now());
        let json = serde_json::to_value(&export).unwrap();

        assert!(json["items"][0].get("shelf_life").is_none());
        assert_eq!(json["list_id"], 1);
    }
}
