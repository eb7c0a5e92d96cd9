/// Types shared by receivables and payables
///
/// Receivables (owed to the tenant) and payables (owed by the tenant) are
/// separate tables with the same payment state machine:
///
/// ```text
/// pending ──► paid
///    │          ▲
///    ▼          │
/// overdue ──────┘
///
/// pending/overdue ──► cancelled
/// ```
///
/// A partial payment leaves the status untouched; only a payment that brings
/// the remaining amount to zero marks the invoice as paid.

use crate::error::{BillingError, BillingResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Invoice status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invoice_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the invoice can still receive payments
    pub fn is_open(&self) -> bool {
        matches!(self, InvoiceStatus::Pending | InvoiceStatus::Overdue)
    }

    /// Checks that an invoice in this status may be cancelled
    pub fn ensure_cancellable(&self, kind: InvoiceKind) -> BillingResult<()> {
        match self {
            InvoiceStatus::Paid => Err(BillingError::conflict(format!(
                "{} is already paid and cannot be cancelled",
                kind
            ))),
            InvoiceStatus::Cancelled => {
                Err(BillingError::conflict(format!("{} is already cancelled", kind)))
            }
            InvoiceStatus::Pending | InvoiceStatus::Overdue => Ok(()),
        }
    }
}

/// Which ledger an invoice belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceKind {
    Receivable,
    Payable,
}

impl fmt::Display for InvoiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvoiceKind::Receivable => f.write_str("Receivable"),
            InvoiceKind::Payable => f.write_str("Payable"),
        }
    }
}

/// How money changed hands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    CreditCard,
    DebitCard,
    Pix,
    BankTransfer,
    BankSlip,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::Pix => "pix",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::BankSlip => "bank_slip",
            PaymentMethod::Other => "other",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = BillingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "credit_card" => Ok(PaymentMethod::CreditCard),
            "debit_card" => Ok(PaymentMethod::DebitCard),
            "pix" => Ok(PaymentMethod::Pix),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "bank_slip" => Ok(PaymentMethod::BankSlip),
            "other" => Ok(PaymentMethod::Other),
            other => Err(BillingError::validation(
                "payment_method",
                format!("unknown payment method '{}'", other),
            )),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Original, discount and final amount of a new invoice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceAmounts {
    pub original: Decimal,
    pub discount: Decimal,
    pub final_amount: Decimal,
}

impl InvoiceAmounts {
    /// Applies a discount amount to a base amount
    ///
    /// The discount is clamped into `[0, original]` so the final amount is
    /// never negative.
    pub fn new(original: Decimal, discount: Decimal) -> Self {
        let discount = discount.max(Decimal::ZERO).min(original.max(Decimal::ZERO));
        InvoiceAmounts {
            original,
            discount,
            final_amount: original - discount,
        }
    }

    /// Status a new invoice starts in: paid when nothing is owed
    pub fn initial_status(&self) -> InvoiceStatus {
        if self.final_amount <= Decimal::ZERO {
            InvoiceStatus::Paid
        } else {
            InvoiceStatus::Pending
        }
    }
}

/// The payment-relevant slice of an invoice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceBalance {
    pub kind: InvoiceKind,
    pub final_amount: Decimal,
    pub paid_amount: Decimal,
    pub status: InvoiceStatus,
}

/// New balance after a payment has been applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Settlement {
    pub final_amount: Decimal,
    pub paid_amount: Decimal,
    pub remaining_amount: Decimal,
    pub status: InvoiceStatus,
}

impl InvoiceBalance {
    /// Applies a payment to the balance
    ///
    /// `adjustments` (late fee plus interest, payables only) is added to the
    /// final amount before the overpayment check.
    ///
    /// # Errors
    ///
    /// - Conflict if the invoice is already paid or cancelled
    /// - Validation if the amount is not positive or adjustments are negative
    /// - Conflict if the payment would exceed the final amount
    pub fn settle(&self, amount: Decimal, adjustments: Decimal) -> BillingResult<Settlement> {
        match self.status {
            InvoiceStatus::Paid => {
                return Err(BillingError::conflict(format!("{} is already paid", self.kind)))
            }
            InvoiceStatus::Cancelled => {
                return Err(BillingError::conflict(format!("{} is cancelled", self.kind)))
            }
            InvoiceStatus::Pending | InvoiceStatus::Overdue => {}
        }

        if amount <= Decimal::ZERO {
            return Err(BillingError::validation("amount", "must be greater than zero"));
        }
        if adjustments < Decimal::ZERO {
            return Err(BillingError::validation("adjustments", "late fee and interest cannot be negative"));
        }

        let final_amount = self.final_amount + adjustments;
        let paid_amount = self.paid_amount + amount;
        if paid_amount > final_amount {
            return Err(BillingError::conflict(format!(
                "Payment of {} exceeds the remaining amount of {}",
                amount,
                final_amount - self.paid_amount
            )));
        }

        let remaining_amount = final_amount - paid_amount;
        let status = if remaining_amount <= Decimal::ZERO {
            InvoiceStatus::Paid
        } else {
            self.status
        };

        Ok(Settlement {
            final_amount,
            paid_amount,
            remaining_amount,
            status,
        })
    }
}

/// A payment to be registered against a receivable or payable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Amount being paid now
    pub amount: Decimal,

    pub payment_method: PaymentMethod,

    /// When the money changed hands (defaults to now)
    pub paid_at: Option<DateTime<Utc>>,

    /// Late fee folded into a payable's final amount
    #[serde(default)]
    pub late_fee: Option<Decimal>,

    /// Interest folded into a payable's final amount
    #[serde(default)]
    pub interest: Option<Decimal>,

    /// Staff member registering the payment
    pub registered_by: Option<Uuid>,
}

impl PaymentIntent {
    /// Creates a plain payment with no adjustments
    pub fn new(amount: Decimal, payment_method: PaymentMethod) -> Self {
        PaymentIntent {
            amount,
            payment_method,
            paid_at: None,
            late_fee: None,
            interest: None,
            registered_by: None,
        }
    }

    /// Late fee plus interest
    pub fn adjustments(&self) -> Decimal {
        self.late_fee.unwrap_or(Decimal::ZERO) + self.interest.unwrap_or(Decimal::ZERO)
    }

    /// Validates the request fields that don't depend on the invoice
    pub fn validate(&self) -> BillingResult<()> {
        if self.amount <= Decimal::ZERO {
            return Err(BillingError::validation("amount", "must be greater than zero"));
        }
        if self.late_fee.is_some_and(|fee| fee < Decimal::ZERO) {
            return Err(BillingError::validation("late_fee", "cannot be negative"));
        }
        if self.interest.is_some_and(|interest| interest < Decimal::ZERO) {
            return Err(BillingError::validation("interest", "cannot be negative"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balance(final_amount: i64, paid: i64, status: InvoiceStatus) -> InvoiceBalance {
        InvoiceBalance {
            kind: InvoiceKind::Receivable,
            final_amount: Decimal::from(final_amount),
            paid_amount: Decimal::from(paid),
            status,
        }
    }

    #[test]
    fn test_discount_is_clamped_to_original() {
        let amounts = InvoiceAmounts::new(Decimal::from(100), Decimal::from(150));
        assert_eq!(amounts.discount, Decimal::from(100));
        assert_eq!(amounts.final_amount, Decimal::ZERO);
        assert_eq!(amounts.initial_status(), InvoiceStatus::Paid);

        let amounts = InvoiceAmounts::new(Decimal::from(100), Decimal::from(-5));
        assert_eq!(amounts.discount, Decimal::ZERO);
        assert_eq!(amounts.final_amount, Decimal::from(100));
        assert_eq!(amounts.initial_status(), InvoiceStatus::Pending);
    }

    #[test]
    fn test_overpayment_is_rejected() {
        let err = balance(100, 80, InvoiceStatus::Pending)
            .settle(Decimal::from(30), Decimal::ZERO)
            .unwrap_err();
        assert!(matches!(err, BillingError::Conflict(_)));
    }

    #[test]
    fn test_exact_payment_marks_paid() {
        let settlement = balance(100, 80, InvoiceStatus::Pending)
            .settle(Decimal::from(20), Decimal::ZERO)
            .unwrap();
        assert_eq!(settlement.paid_amount, Decimal::from(100));
        assert_eq!(settlement.remaining_amount, Decimal::ZERO);
        assert_eq!(settlement.status, InvoiceStatus::Paid);
    }

    #[test]
    fn test_partial_payment_keeps_status() {
        let settlement = balance(100, 0, InvoiceStatus::Overdue)
            .settle(Decimal::from(40), Decimal::ZERO)
            .unwrap();
        assert_eq!(settlement.remaining_amount, Decimal::from(60));
        assert_eq!(settlement.status, InvoiceStatus::Overdue);

        let settlement = balance(100, 0, InvoiceStatus::Pending)
            .settle(Decimal::from(40), Decimal::ZERO)
            .unwrap();
        assert_eq!(settlement.status, InvoiceStatus::Pending);
    }

    #[test]
    fn test_adjustments_raise_final_amount_before_check() {
        let inv = InvoiceBalance {
            kind: InvoiceKind::Payable,
            ..balance(100, 0, InvoiceStatus::Overdue)
        };
        let settlement = inv.settle(Decimal::from(110), Decimal::from(10)).unwrap();
        assert_eq!(settlement.final_amount, Decimal::from(110));
        assert_eq!(settlement.status, InvoiceStatus::Paid);

        assert!(inv.settle(Decimal::from(111), Decimal::from(10)).is_err());
    }

    #[test]
    fn test_paid_and_cancelled_reject_payments() {
        let err = balance(100, 100, InvoiceStatus::Paid)
            .settle(Decimal::ONE, Decimal::ZERO)
            .unwrap_err();
        assert_eq!(err.to_string(), "Receivable is already paid");

        let err = balance(100, 0, InvoiceStatus::Cancelled)
            .settle(Decimal::ONE, Decimal::ZERO)
            .unwrap_err();
        assert_eq!(err.to_string(), "Receivable is cancelled");
    }

    #[test]
    fn test_non_positive_amount_is_validation_error() {
        let err = balance(100, 0, InvoiceStatus::Pending)
            .settle(Decimal::ZERO, Decimal::ZERO)
            .unwrap_err();
        assert!(matches!(err, BillingError::Validation { ref field, .. } if field == "amount"));
    }

    #[test]
    fn test_cancellable_statuses() {
        assert!(InvoiceStatus::Pending.ensure_cancellable(InvoiceKind::Payable).is_ok());
        assert!(InvoiceStatus::Overdue.ensure_cancellable(InvoiceKind::Payable).is_ok());
        assert!(InvoiceStatus::Paid.ensure_cancellable(InvoiceKind::Payable).is_err());
        assert!(InvoiceStatus::Cancelled.ensure_cancellable(InvoiceKind::Receivable).is_err());
    }

    #[test]
    fn test_payment_method_parsing() {
        assert_eq!("pix".parse::<PaymentMethod>().unwrap(), PaymentMethod::Pix);
        assert_eq!(" Credit_Card ".parse::<PaymentMethod>().unwrap(), PaymentMethod::CreditCard);
        let err = "cheque".parse::<PaymentMethod>().unwrap_err();
        assert!(matches!(err, BillingError::Validation { ref field, .. } if field == "payment_method"));
    }

    #[test]
    fn test_invoice_amounts_clamp_discount() {
        let amounts = InvoiceAmounts::new(Decimal::from(100), Decimal::from(150));
        assert_eq!(amounts.final_amount, Decimal::ZERO);

        let amounts = InvoiceAmounts::new(Decimal::from(100), Decimal::from(-5));
        assert_eq!(amounts.discount, Decimal::ZERO);
        assert_eq!(amounts.final_amount, Decimal::from(100));
    }

    #[test]
    fn test_payment_intent_validation() {
        let mut intent = PaymentIntent::new(Decimal::from(10), PaymentMethod::Cash);
        assert!(intent.validate().is_ok());

        intent.late_fee = Some(Decimal::from(-1));
        assert!(intent.validate().is_err());

        intent.late_fee = Some(Decimal::from(2));
        intent.interest = Some(Decimal::ONE);
        assert_eq!(intent.adjustments(), Decimal::from(3));
    }
}
