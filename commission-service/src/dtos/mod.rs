//! Request/response DTOs for the HTTP API.

mod commissions;
mod invoices;
mod rules;

pub use commissions::{
    CommissionTotalsResponse, CreateCommissionRequest, ListCommissionsQuery,
    TotalsQuery, UpdateCommissionRequest, UpdateCommissionStatusRequest,
};
pub use invoices::{
    CreateInvoiceRequest, InvoiceItemRequest, ListInvoicesQuery, UpdateInvoiceRequest,
    UpdateInvoiceStatusRequest,
};
pub use rules::{
    CalculateRequest, CalculateResponse, CreateRuleRequest, ListRulesQuery, UpdateRuleRequest,
    UpdateRuleStatusRequest, UsableRulesQuery,
};
