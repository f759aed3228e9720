//! External collaborators the order service depends on.

mod notification;
mod payment;

pub use notification::{
    InMemoryNotificationSink, LogNotificationSink, Notification, NotificationCategory,
    NotificationError, NotificationSink,
};
pub use payment::{InMemoryPaymentProvider, PaymentError, PaymentProvider};
