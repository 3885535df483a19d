//! Domain models for commission-service.

mod commission;
mod commission_rule;
mod dashboard;
mod directory;
mod invoice;
mod invoice_item;

pub use commission::{
    Commission, CommissionStatus, CreateCommission, ListCommissionsFilter, UpdateCommission,
};
pub use commission_rule::{
    CommissionRule, CommissionType, CreateCommissionRule, RuleStatus, UpdateCommissionRule,
    normalize_rule_amounts,
};
pub use dashboard::{PartnerDashboard, StatusCount, StatusTotal};
pub use directory::{Partner, Project};
pub use invoice::{
    CreateInvoice, Invoice, InvoiceStatus, InvoiceWithItems, ListInvoicesFilter, UpdateInvoice,
};
pub use invoice_item::{InvoiceItem, NewInvoiceItem};
