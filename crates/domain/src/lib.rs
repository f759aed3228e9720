//! Domain layer of the order engine.
//!
//! - [`Aggregate`] / [`DomainEvent`] traits and the [`CommandHandler`]
//! - [`pricing`]: line price calculation
//! - [`inventory`]: product catalog and the stock ledger
//! - [`Order`]: the order aggregate and its status state machine
//! - [`OrderService`]: creation, transitions and payment reconciliation

pub mod access;
pub mod aggregate;
pub mod command;
pub mod error;
pub mod inventory;
pub mod money;
pub mod order;
pub mod pricing;
pub mod services;

pub use access::{AccessPolicy, Actor};
pub use aggregate::{Aggregate, DomainEvent};
pub use command::{CommandHandler, CommandResult};
pub use error::DomainError;
pub use inventory::{
    Category, InMemoryInventory, InventoryError, InventoryLedger, NewProduct, Product,
    ProductCatalog, ProductSearch, Reservation,
};
pub use money::{DiscountPercent, InvalidDiscount, Money};
pub use order::{
    CancelOrder, ChangeStatus, Collaborators, ConfirmPayment, LineRequest, Order, OrderError,
    OrderEvent, OrderLine, OrderService, OrderStatus, PaymentConfirmation, PlaceOrder,
    StatusHistoryEntry,
};
pub use services::{
    InMemoryNotificationSink, InMemoryPaymentProvider, LogNotificationSink, Notification,
    NotificationCategory, NotificationSink, PaymentError, PaymentProvider,
};
