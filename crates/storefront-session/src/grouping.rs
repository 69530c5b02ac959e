//! Display grouping for bundled cart lines.
//!
//! Lines that share a `group_key` are shown under one synthetic parent row
//! whose amounts are the sums of its children. The parent carries no
//! product or SKU since it is not purchasable on its own.

use crate::api::CartItem;
use rust_decimal::Decimal;

/// One row of a grouped cart view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLine {
    /// The line itself, or the synthetic parent of a group.
    pub line: CartItem,
    /// Grouped children; empty for an ungrouped line.
    pub children: Vec<CartItem>,
}

impl DisplayLine {
    /// Returns `true` for a synthetic group row.
    #[must_use]
    pub fn is_group(&self) -> bool {
        !self.children.is_empty()
    }
}

/// Groups `items` for display.
///
/// Rows appear in the order their first line appears in `items`.
///
/// ```
/// use storefront_session::api::CartItem;
/// use storefront_session::grouping::group_items;
///
/// let line = |id: &str, key: Option<&str>| CartItem {
///     id: id.into(),
///     quantity: 1,
///     group_key: key.map(Into::into),
///     ..CartItem::default()
/// };
/// let rows = group_items(&[line("a", Some("kit")), line("b", None), line("c", Some("kit"))]);
///
/// assert_eq!(rows.len(), 2);
/// assert_eq!(rows[0].line.quantity, 2);
/// assert_eq!(rows[0].children.len(), 2);
/// assert!(!rows[1].is_group());
/// ```
#[must_use]
pub fn group_items(items: &[CartItem]) -> Vec<DisplayLine> {
    let mut rows: Vec<DisplayLine> = Vec::new();

    for item in items {
        let Some(key) = item.group_key.as_deref() else {
            rows.push(DisplayLine {
                line: item.clone(),
                children: Vec::new(),
            });
            continue;
        };

        match rows
            .iter_mut()
            .find(|row| row.is_group() && row.line.group_key.as_deref() == Some(key))
        {
            Some(row) => {
                add_amounts(&mut row.line, item);
                row.children.push(item.clone());
            }
            None => {
                let mut parent = CartItem {
                    id: key.to_string(),
                    group_key: Some(key.to_string()),
                    price: Decimal::ZERO,
                    list_price: Decimal::ZERO,
                    discount: Decimal::ZERO,
                    quantity: 0,
                    ..CartItem::default()
                };
                add_amounts(&mut parent, item);
                rows.push(DisplayLine {
                    line: parent,
                    children: vec![item.clone()],
                });
            }
        }
    }

    rows
}

fn add_amounts(parent: &mut CartItem, child: &CartItem) {
    parent.quantity = parent.quantity.saturating_add(child.quantity);
    parent.price += child.price;
    parent.list_price += child.list_price;
    parent.discount += child.discount;
}
