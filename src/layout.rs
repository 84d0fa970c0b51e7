use std::sync::OnceLock;

use regex::Regex;

use crate::models::Cell;
use crate::normalize::normalize_date_text;
use crate::table::ResolvedColumns;

/// Canonical target of a source column. Each layout maps its native labels
/// onto a subset of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Date,
    Time,
    Description,
    Branch,
    User,
    Voucher,
    Reference,
    Amount,
    Debit,
    Credit,
    Itf,
    Balance,
    Details,
    Channel,
    CreditedAmount,
    OperationAmount,
    OperationCurrency,
    Narrative,
    Holder,
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub field: Field,
    /// Alternatives in priority order; the first one doubles as display label.
    pub alternatives: &'static [&'static str],
    pub required: bool,
}

impl ColumnSpec {
    pub fn label(&self) -> &'static str {
        self.alternatives[0]
    }
}

const fn col(field: Field, alternatives: &'static [&'static str]) -> ColumnSpec {
    ColumnSpec { field, alternatives, required: false }
}

const fn required(field: Field, alternatives: &'static [&'static str]) -> ColumnSpec {
    ColumnSpec { field, alternatives, required: true }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountStyle {
    /// One signed column: negative is a debit.
    Signed,
    /// Separate unsigned debit and credit columns.
    Split,
}

const BCP_COLUMNS: &[ColumnSpec] = &[
    required(Field::Date, &["Fecha"]),
    col(Field::Time, &["Hora"]),
    required(Field::Description, &["Glosa"]),
    col(Field::Branch, &["Suc. Age."]),
    col(Field::User, &["Usuario"]),
    col(Field::Amount, &["Importe"]),
    col(Field::Balance, &["Saldo"]),
    col(Field::Voucher, &["Nro. Operación", "Nro. Operacion"]),
    col(Field::Details, &["Adicionales"]),
];

const BNB_COLUMNS: &[ColumnSpec] = &[
    required(Field::Date, &["Fecha"]),
    col(Field::Time, &["Hora"]),
    col(Field::Branch, &["Oficina"]),
    col(Field::Description, &["Descripción", "Descripcion"]),
    col(Field::Reference, &["Referencia"]),
    col(Field::Voucher, &["Código de transacción", "Codigo de transaccion"]),
    col(Field::Itf, &["ITF"]),
    col(Field::Debit, &["Débitos", "Debitos"]),
    col(Field::Credit, &["Créditos", "Creditos"]),
    col(Field::Balance, &["Saldo"]),
    col(Field::Details, &["Adicionales"]),
];

const UNION_COLUMNS: &[ColumnSpec] = &[
    required(Field::Date, &["Fecha Movimiento", "FECHA MOVIMIENTO", "Fecha"]),
    col(Field::Branch, &["AG", "Agencia", "AGENCIA"]),
    required(Field::Description, &["Descripción", "DESCRIPCIÓN", "DESCRIPCION", "Glosa", "GLOSA"]),
    col(Field::Voucher, &["Nro Documento", "NRO DOCUMENTO", "NUM DOCUMENTO", "N° DOCUMENTO"]),
    col(Field::Amount, &["Monto", "MONTO", "Importe", "IMPORTE", "VALOR"]),
    col(Field::Balance, &["Saldo", "SALDO"]),
    col(Field::Details, &["Adicionales", "ADICIONALES", "Observaciones", "OBSERVACIONES"]),
];

const PAYMENT_REPORT_COLUMNS: &[ColumnSpec] = &[
    col(Field::Channel, &["CANAL"]),
    required(Field::Date, &["FECHA"]),
    col(Field::Time, &["HORA"]),
    required(Field::CreditedAmount, &["MONTO ABONADO"]),
    col(Field::OperationAmount, &["MONTO OP."]),
    col(Field::OperationCurrency, &["MONEDA OP."]),
    col(Field::Narrative, &["GLOSA"]),
    col(Field::Holder, &["TITULAR"]),
];

/// The closed set of spreadsheet layouts this tool understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    Bcp,
    Bnb,
    Union,
    PaymentReport,
    Unknown,
}

impl Layout {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Bcp => "bcp",
            Self::Bnb => "bnb",
            Self::Union => "union",
            Self::PaymentReport => "payments",
            Self::Unknown => "unknown",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Bcp => "BCP statement",
            Self::Bnb => "BNB statement",
            Self::Union => "Banco Unión statement",
            Self::PaymentReport => "BCP payment report",
            Self::Unknown => "Unknown layout",
        }
    }

    /// Header tokens, each given as its accepted spellings. Every token must
    /// appear within a single row for it to be the header.
    pub fn header_tokens(&self) -> &'static [&'static [&'static str]] {
        match self {
            Self::Bcp => &[&["Fecha"], &["Hora"]],
            Self::Bnb => &[&["Fecha"], &["Débitos", "Debitos"], &["Créditos", "Creditos"]],
            Self::Union => &[&["Fecha Movimiento"]],
            Self::PaymentReport => &[&["FECHA"], &["MONTO ABONADO"]],
            Self::Unknown => &[],
        }
    }

    pub fn header_case_sensitive(&self) -> bool {
        matches!(self, Self::Bcp)
    }

    pub fn columns(&self) -> &'static [ColumnSpec] {
        match self {
            Self::Bcp => BCP_COLUMNS,
            Self::Bnb => BNB_COLUMNS,
            Self::Union => UNION_COLUMNS,
            Self::PaymentReport => PAYMENT_REPORT_COLUMNS,
            Self::Unknown => &[],
        }
    }

    pub fn amount_style(&self) -> AmountStyle {
        match self {
            Self::Bnb => AmountStyle::Split,
            _ => AmountStyle::Signed,
        }
    }

    /// BNB exports list the most recent movement first.
    pub fn newest_first(&self) -> bool {
        matches!(self, Self::Bnb)
    }

    pub fn is_statement(&self) -> bool {
        matches!(self, Self::Bcp | Self::Bnb | Self::Union)
    }

    /// Layout-specific test separating genuine transactions from banners,
    /// batch totals and subtotal rows.
    pub fn is_transaction(&self, row: &[Cell], cols: &ResolvedColumns) -> bool {
        match self {
            Self::Bcp => is_bcp_transaction(row, cols),
            Self::Bnb => !cols.is_empty_at(row, Field::Date),
            Self::Union => is_union_transaction(row, cols),
            Self::PaymentReport | Self::Unknown => true,
        }
    }
}

impl std::fmt::Display for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn is_bcp_transaction(row: &[Cell], cols: &ResolvedColumns) -> bool {
    if cols.is_empty_at(row, Field::Date) {
        return false;
    }
    let glosa = cols.text_at(row, Field::Description).to_uppercase();
    if glosa.contains("SALDO AL CIERRE") {
        return false;
    }
    let batch_user = cols.text_at(row, Field::User).to_uppercase().contains("BATCH");
    let zero_operation = cols.text_at(row, Field::Voucher).trim() == "0";
    !(batch_user && zero_operation)
}

fn union_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{2}/\d{2}/\d{4}(\s|$)").expect("static regex"))
}

fn is_union_transaction(row: &[Cell], cols: &ResolvedColumns) -> bool {
    let raw = cols.text_at(row, Field::Date);
    let raw = raw.trim();
    if ["Total", "Tránsito", "Transito"].iter().any(|m| raw.contains(m)) {
        return false;
    }
    // Native date cells and serials are rendered before the pattern check.
    let date = match cols.cell(row, Field::Date) {
        Cell::Text(_) => raw.to_string(),
        cell => normalize_date_text(cell).unwrap_or_default(),
    };
    union_date_re().is_match(&date) && !cols.is_empty_at(row, Field::Description)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_statement_layout_has_a_required_date() {
        for layout in [Layout::Bcp, Layout::Bnb, Layout::Union, Layout::PaymentReport] {
            assert!(
                layout.columns().iter().any(|c| c.field == Field::Date && c.required),
                "{layout} has no mandatory date column"
            );
        }
    }

    #[test]
    fn test_amount_styles() {
        assert_eq!(Layout::Bcp.amount_style(), AmountStyle::Signed);
        assert_eq!(Layout::Union.amount_style(), AmountStyle::Signed);
        assert_eq!(Layout::Bnb.amount_style(), AmountStyle::Split);
        assert!(Layout::Bnb.newest_first());
        assert!(!Layout::Bcp.newest_first());
    }

    #[test]
    fn test_union_date_pattern() {
        assert!(union_date_re().is_match("30/05/2025"));
        assert!(union_date_re().is_match("30/05/2025 10:00:00"));
        assert!(!union_date_re().is_match("Total"));
        assert!(!union_date_re().is_match("3/5/2025"));
        assert!(!union_date_re().is_match("30/05/20251"));
    }
}
