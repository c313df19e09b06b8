use std::fmt;

use serde::{Deserialize, Serialize};

pub const MISSING_CONDITION: &str = "La cotización debe tener condiciones comerciales asociadas";
pub const CONTRACT_NOT_SIGNED: &str =
    "El contrato debe estar firmado antes de autorizar la cotización";
pub const NO_PAYMENT_WARNING: &str =
    "No hay pago registrado; se autorizará con promesa de pago";
pub const NO_CONTRACT_WARNING: &str = "La cotización se autorizará sin contrato";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardIssue {
    pub message: String,
    /// Incomplete contact data opens the data-edit surface automatically.
    pub opens_data_editor: bool,
}

impl GuardIssue {
    pub fn blocking(message: impl Into<String>) -> Self {
        Self { message: message.into(), opens_data_editor: false }
    }

    pub fn missing_data(fields: &[String]) -> Self {
        Self {
            message: format!("Faltan datos requeridos: {}", fields.join(", ")),
            opens_data_editor: true,
        }
    }
}

/// Result of validating an authorization attempt. Errors block; warnings
/// let the user proceed after explicit confirmation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardOutcome {
    pub errors: Vec<GuardIssue>,
    pub warnings: Vec<GuardIssue>,
}

impl GuardOutcome {
    pub fn is_blocking(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn opens_data_editor(&self) -> bool {
        self.errors.iter().any(|issue| issue.opens_data_editor)
    }

    pub fn error(&mut self, issue: GuardIssue) {
        self.errors.push(issue);
    }

    pub fn warning(&mut self, issue: GuardIssue) {
        self.warnings.push(issue);
    }
}

impl fmt::Display for GuardOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> =
            self.errors.iter().map(|issue| issue.message.as_str()).collect();
        write!(f, "{}", messages.join("; "))
    }
}
