//! Value objects for the order domain.

use chrono::{DateTime, Utc};
use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::inventory::Reservation;
use crate::money::{DiscountPercent, Money};
use crate::pricing;

use super::{OrderError, OrderStatus};

/// A frozen order line.
///
/// Captures the product's price and discount at reservation time; later
/// catalog changes never alter it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub slug: String,
    pub unit_price: Money,
    pub discount: DiscountPercent,
    pub quantity: u32,
    pub line_total: Money,
}

impl OrderLine {
    /// Prices a reservation.
    pub fn from_reservation(reservation: &Reservation) -> Result<Self, OrderError> {
        let line_total = pricing::line_price(
            reservation.unit_price,
            reservation.discount,
            reservation.quantity,
        )
        .ok_or_else(|| OrderError::PriceOverflow {
            slug: reservation.slug.clone(),
        })?;

        Ok(Self {
            product_id: reservation.product_id,
            slug: reservation.slug.clone(),
            unit_price: reservation.unit_price,
            discount: reservation.discount,
            quantity: reservation.quantity,
            line_total,
        })
    }
}

/// One requested line of a new order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRequest {
    pub slug: String,
    pub quantity: u32,
}

impl LineRequest {
    pub fn new(slug: impl Into<String>, quantity: u32) -> Self {
        Self {
            slug: slug.into(),
            quantity,
        }
    }
}

/// Validates requested lines and merges repeated slugs.
///
/// Quantities of a repeated slug are summed; lines keep the order in which
/// each slug first appeared.
pub fn merge_lines(lines: Vec<LineRequest>) -> Result<Vec<LineRequest>, OrderError> {
    if lines.is_empty() {
        return Err(OrderError::NoItems);
    }

    let mut merged: Vec<LineRequest> = Vec::with_capacity(lines.len());
    for line in lines {
        let slug = line.slug.trim();
        if slug.is_empty() {
            return Err(OrderError::BlankSlug);
        }
        if line.quantity == 0 {
            return Err(OrderError::InvalidQuantity {
                slug: slug.to_string(),
                quantity: 0,
            });
        }

        match merged.iter_mut().find(|existing| existing.slug == slug) {
            Some(existing) => {
                existing.quantity = existing.quantity.checked_add(line.quantity).ok_or(
                    OrderError::InvalidQuantity {
                        slug: slug.to_string(),
                        quantity: u32::MAX,
                    },
                )?;
            }
            None => merged.push(LineRequest::new(slug, line.quantity)),
        }
    }

    Ok(merged)
}

/// One entry of an order's status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    /// `None` for the placement entry.
    pub from: Option<OrderStatus>,
    pub to: OrderStatus,
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}
