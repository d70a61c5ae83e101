//! Data models for sharefeed

mod alert;
mod handle;
mod node;
mod payload;

pub use alert::{Alert, AlertId, PersistFlags};
pub use handle::{Handle, NODE_HANDLE_SIZE, USER_HANDLE_SIZE};
pub use node::{NodeEventKind, NodeKind, SharedNode};
pub use payload::{
    AlertKind, AlertPayload, ContactChange, DeletedShare, IncomingPendingContact, NewShare,
    NewSharedNodes, Payment, PaymentReminder, PendingContactUpdate, SharedNodeHandles, Takedown,
};
