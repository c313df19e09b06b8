use serde::{Deserialize, Serialize};

use crate::domain::quote::QuoteStatus;

/// Which closing flow owns the quote. Fixed once per quote by
/// `selected_by_prospect`; never re-branched on the boolean afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Digital,
    StaffAssisted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosingEvent {
    AuthorizeConfirmed,
    SignatureRequested,
    CancelRequested,
}

/// Side effects the caller must execute after a successful transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosingAction {
    ArchiveSiblingQuotes,
    UnarchiveSiblingQuotes,
    CreateEvent,
    AwaitSignature,
    DeleteClosingRecord,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: QuoteStatus,
    pub to: QuoteStatus,
    pub event: ClosingEvent,
    pub actions: Vec<ClosingAction>,
}

/// Snapshot of the closing record the guards evaluate against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosingContext {
    pub status: QuoteStatus,
    pub has_condition: bool,
    pub has_contract: bool,
    pub contract_signed: bool,
    pub has_payment: bool,
    /// Staff-assisted only: the user asked for a contract to be generated
    /// as part of the authorization.
    pub wants_contract: bool,
    pub missing_required_fields: Vec<String>,
}

impl ClosingContext {
    pub fn required_data_complete(&self) -> bool {
        self.missing_required_fields.is_empty()
    }
}

impl Default for ClosingContext {
    fn default() -> Self {
        Self {
            status: QuoteStatus::EnCierre,
            has_condition: false,
            has_contract: false,
            contract_signed: false,
            has_payment: false,
            wants_contract: false,
            missing_required_fields: Vec::new(),
        }
    }
}
