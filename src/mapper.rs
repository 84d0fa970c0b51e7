use std::collections::HashSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::layout::{AmountStyle, Field, Layout};
use crate::models::{BankCode, Cell, CanonicalTransaction, PaymentReportEntry, TransactionType};
use crate::normalize::{normalize_amount, normalize_date, normalize_text, normalize_time};
use crate::table::{ExtractedTable, ResolvedColumns};

const TYPE_MARKERS: &[(TransactionType, &[&str])] = &[
    (TransactionType::Debit, &["CARGO", "DEBITO", "DÉBITO", "PAGO"]),
    (TransactionType::Transfer, &["TRANSFERENCIA", "TRF", "TRASPASO"]),
    (TransactionType::Credit, &["ABONO", "CREDITO", "CRÉDITO", "DEPOSITO", "DEPÓSITO"]),
];

/// Classify a narrative by keyword. The first bucket with a hit wins.
pub fn transaction_type(description: &str) -> TransactionType {
    let upper = description.to_uppercase();
    TYPE_MARKERS
        .iter()
        .find(|(_, markers)| markers.iter().any(|m| upper.contains(m)))
        .map(|(kind, _)| *kind)
        .unwrap_or(TransactionType::Other)
}

/// `{BANK}-{YYYYMMDD}-{VOUCHER}`, with `UNKNOWN` standing in for a missing
/// date and `NA` for a missing voucher.
pub fn company_voucher(bank_code: BankCode, date: Option<NaiveDate>, bank_voucher: Option<&str>) -> String {
    let voucher = bank_voucher.unwrap_or("NA");
    match date {
        Some(d) => format!("{bank_code}-{}-{voucher}", d.format("%Y%m%d")),
        None => format!("{bank_code}-UNKNOWN-{voucher}"),
    }
}

// The first row holding a key keeps it; later repeats take the lowest -N
// (N >= 2) that no other row in the batch holds.
fn dedupe_vouchers(transactions: &mut [CanonicalTransaction]) {
    let mut taken: HashSet<String> = transactions.iter().map(|t| t.company_voucher.clone()).collect();
    let mut kept: HashSet<String> = HashSet::new();
    for txn in transactions.iter_mut() {
        if kept.insert(txn.company_voucher.clone()) {
            continue;
        }
        let mut n = 2;
        let mut candidate = format!("{}-{n}", txn.company_voucher);
        while taken.contains(&candidate) {
            n += 1;
            candidate = format!("{}-{n}", txn.company_voucher);
        }
        debug!(voucher = %txn.company_voucher, renamed = %candidate, "duplicate company voucher");
        taken.insert(candidate.clone());
        txn.company_voucher = candidate;
    }
}

fn split_signed(amount: Option<Decimal>) -> (Option<Decimal>, Option<Decimal>) {
    match amount {
        Some(a) if a.is_sign_negative() => (Some(-a), Some(Decimal::ZERO)),
        Some(a) => (Some(Decimal::ZERO), Some(a)),
        None => (None, None),
    }
}

fn split_columns(debit: Option<Decimal>, credit: Option<Decimal>) -> (Option<Decimal>, Option<Decimal>) {
    let debit = debit.map(|d| d.abs());
    let credit = credit.map(|c| c.abs());
    match (debit, credit) {
        (Some(d), Some(c)) if d > Decimal::ZERO && c > Decimal::ZERO => {
            warn!(%d, %c, "row carries both a debit and a credit, netting them");
            split_signed(Some(c - d))
        }
        other => other,
    }
}

fn map_row(
    row: &[Cell],
    cols: &ResolvedColumns,
    layout: Layout,
    bank_code: BankCode,
    account_number: &str,
    batch_id: &str,
) -> CanonicalTransaction {
    let text = |field: Field| normalize_text(cols.cell(row, field), false);

    let transaction_date = normalize_date(cols.cell(row, Field::Date));
    if transaction_date.is_none() {
        debug!(raw = %cols.text_at(row, Field::Date), "unparseable transaction date");
    }
    let transaction_time = transaction_date.and_then(|_| normalize_time(cols.cell(row, Field::Time)));

    let bank_voucher = match layout {
        Layout::Bnb => normalize_text(cols.cell(row, Field::Voucher), true),
        _ => text(Field::Voucher),
    };

    let (debit_amount, credit_amount) = match layout.amount_style() {
        AmountStyle::Signed => split_signed(normalize_amount(cols.cell(row, Field::Amount))),
        AmountStyle::Split => split_columns(
            normalize_amount(cols.cell(row, Field::Debit)),
            normalize_amount(cols.cell(row, Field::Credit)),
        ),
    };

    let description = text(Field::Description);
    let transaction_type = description
        .as_deref()
        .map(transaction_type)
        .unwrap_or(TransactionType::Other);

    CanonicalTransaction {
        bank_code,
        account_number: account_number.to_string(),
        company_voucher: company_voucher(bank_code, transaction_date, bank_voucher.as_deref()),
        bank_voucher,
        transaction_date,
        transaction_time,
        description,
        transaction_type,
        reference_number: text(Field::Reference),
        debit_amount,
        credit_amount,
        balance: normalize_amount(cols.cell(row, Field::Balance)),
        itf_amount: normalize_amount(cols.cell(row, Field::Itf)).unwrap_or(Decimal::ZERO),
        branch_office: text(Field::Branch),
        additional_details: text(Field::Details),
        import_batch_id: batch_id.to_string(),
    }
}

/// Map the filtered statement rows onto the canonical schema, oldest first.
pub fn map_to_canonical(
    extracted: &ExtractedTable,
    bank_code: BankCode,
    account_number: &str,
    batch_id: &str,
) -> Vec<CanonicalTransaction> {
    let layout = extracted.layout;
    let mut out: Vec<CanonicalTransaction> = extracted
        .table
        .rows()
        .iter()
        .map(|row| map_row(row, &extracted.columns, layout, bank_code, account_number, batch_id))
        .collect();
    if layout.newest_first() {
        out.reverse();
    }
    dedupe_vouchers(&mut out);
    out
}

fn payment_details(holder: Option<&str>, narrative: Option<&str>) -> Option<String> {
    match (holder, narrative) {
        (Some(h), Some(n)) => Some(format!("{h} - {n}")),
        (Some(h), None) => Some(h.to_string()),
        (None, Some(n)) => Some(n.to_string()),
        (None, None) => None,
    }
}

/// Map payment-report rows, deriving the narrative used for enrichment.
/// Rows where none of the report's columns carry a value are skipped.
pub fn map_payment_entries(extracted: &ExtractedTable) -> Vec<PaymentReportEntry> {
    let cols = &extracted.columns;
    extracted
        .table
        .rows()
        .iter()
        .filter_map(|row| {
            let text = |field: Field| normalize_text(cols.cell(row, field), false);
            let narrative = text(Field::Narrative);
            let holder = text(Field::Holder);
            let entry = PaymentReportEntry {
                channel: text(Field::Channel),
                report_date: normalize_date(cols.cell(row, Field::Date)),
                report_time: normalize_time(cols.cell(row, Field::Time)),
                credited_amount: normalize_amount(cols.cell(row, Field::CreditedAmount)),
                operation_amount: normalize_amount(cols.cell(row, Field::OperationAmount)),
                operation_currency: text(Field::OperationCurrency),
                details: payment_details(holder.as_deref(), narrative.as_deref()),
                narrative,
                holder,
            };
            let blank = entry.channel.is_none()
                && entry.report_date.is_none()
                && entry.report_time.is_none()
                && entry.credited_amount.is_none()
                && entry.operation_amount.is_none()
                && entry.operation_currency.is_none()
                && entry.details.is_none();
            (!blank).then_some(entry)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::text_grid;
    use crate::table::extract_table;
    use chrono::NaiveTime;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn bnb_table() -> ExtractedTable {
        let grid = text_grid(&[
            &["Número De cuenta", "1000092297", "", "", "", "", "", "", "", "", ""],
            &[
                "Fecha", "Hora", "Oficina", "Descripción", "Referencia", "Código de transacción",
                "ITF", "Débitos", "Créditos", "Saldo", "Adicionales",
            ],
            &[
                "30/05/2025", "16:30:00", "SANTA CRUZ-CENTRAL", "Cargo por transferencia", "1041305634",
                "1O5T 377395", "1.50", "1,000.00", "0.00", "288,024.23", "Transferencia a cuenta 123456",
            ],
            &[
                "30/05/2025", "15:20:16", "LA PAZ-AGENCIA CENTRAL", "Abono Cta por ACH", "1041305633",
                "1O5T377394", "0.00", "0.00", "210.00", "289024.23",
                "Cuenta Origen: 1041305633. Nombre Originante: MANEJO INTEGRADO DE PLAGAS MIP S.R.L..",
            ],
        ]);
        extract_table(&grid, 1, Layout::Bnb).unwrap()
    }

    #[test]
    fn test_map_bnb_statement() {
        let txns = map_to_canonical(&bnb_table(), BankCode::Bnb1, "1000092297", "batch-1");
        assert_eq!(txns.len(), 2);

        // Source is newest-first; output is chronological.
        let credit = &txns[0];
        assert_eq!(credit.bank_code, BankCode::Bnb1);
        assert_eq!(credit.account_number, "1000092297");
        assert_eq!(credit.bank_voucher.as_deref(), Some("1O5T377394"));
        assert_eq!(credit.company_voucher, "BNB1-20250530-1O5T377394");
        assert_eq!(credit.transaction_date, NaiveDate::from_ymd_opt(2025, 5, 30));
        assert_eq!(credit.transaction_time, NaiveTime::from_hms_opt(15, 20, 16));
        assert_eq!(credit.description.as_deref(), Some("Abono Cta por ACH"));
        assert_eq!(credit.transaction_type, TransactionType::Credit);
        assert_eq!(credit.reference_number.as_deref(), Some("1041305633"));
        assert_eq!(credit.debit_amount, Some(Decimal::ZERO));
        assert_eq!(credit.credit_amount, Some(dec("210.00")));
        assert_eq!(credit.balance, Some(dec("289024.23")));
        assert_eq!(credit.itf_amount, Decimal::ZERO);
        assert_eq!(credit.branch_office.as_deref(), Some("LA PAZ-AGENCIA CENTRAL"));
        assert!(credit
            .additional_details
            .as_deref()
            .unwrap()
            .contains("MANEJO INTEGRADO DE PLAGAS MIP S.R.L."));
        assert_eq!(credit.import_batch_id, "batch-1");

        let debit = &txns[1];
        assert_eq!(debit.transaction_type, TransactionType::Debit);
        assert_eq!(debit.bank_voucher.as_deref(), Some("1O5T377395"));
        assert_eq!(debit.debit_amount, Some(dec("1000.00")));
        assert_eq!(debit.credit_amount, Some(Decimal::ZERO));
        assert_eq!(debit.itf_amount, dec("1.50"));
        assert_eq!(debit.balance, Some(dec("288024.23")));
    }

    #[test]
    fn test_mapping_is_idempotent() {
        let table = bnb_table();
        let a = map_to_canonical(&table, BankCode::Bnb1, "1000092297", "b");
        let b = map_to_canonical(&table, BankCode::Bnb1, "1000092297", "b");
        assert_eq!(a, b);
    }

    #[test]
    fn test_map_bcp_signed_amounts_roundtrip() {
        let grid = text_grid(&[
            &["201-0005751-3-23", "", "", "", "", "", "", ""],
            &["Fecha", "Hora", "Glosa", "Suc. Age.", "Usuario", "Importe", "Saldo", "Nro. Operación"],
            &["29/05/2025", "09:00:00", "DEPOSITO EFECTIVO", "LPZ", "JDOE", "1,250.75", "5000.00", "1001"],
            &["30/05/2025", "10:00:00", "PAGO PROVEEDOR", "LPZ", "JDOE", "-210.00", "4790.00", "1002"],
        ]);
        let extracted = extract_table(&grid, 1, Layout::Bcp).unwrap();
        let txns = map_to_canonical(&extracted, BankCode::Bcp, "201-0005751-3-23", "b");
        assert_eq!(txns.len(), 2);
        for (txn, row) in txns.iter().zip(extracted.table.rows()) {
            assert_eq!(txn.signed_amount(), normalize_amount(extracted.columns.cell(row, Field::Amount)));
            assert_eq!(txn.transaction_date, normalize_date(extracted.columns.cell(row, Field::Date)));
            assert_eq!(txn.bank_voucher, Some(extracted.columns.text_at(row, Field::Voucher)));
        }
        assert_eq!(txns[1].debit_amount, Some(dec("210.00")));
        assert_eq!(txns[1].company_voucher, "BCP-20250530-1002");
        assert_eq!(txns[0].transaction_type, TransactionType::Credit);
    }

    #[test]
    fn test_map_union_statement() {
        let grid = text_grid(&[
            &["Cuenta:", "10000123456", "", "", "", ""],
            &["Fecha Movimiento", "AG", "Descripción", "Nro Documento", "Monto", "Saldo"],
            &["30/05/2025", "01", "DEPOSITO EN EFECTIVO", "555", "1,200.50", "1200.50"],
            &["31/05/2025", "02", "PAGO SERVICIOS", "556", "-200.00", "1000.50"],
            &["Total", "", "Movimientos", "", "1000.50", ""],
        ]);
        let extracted = extract_table(&grid, 1, Layout::Union).unwrap();
        let txns = map_to_canonical(&extracted, BankCode::Union, "10000123456", "b");
        assert_eq!(txns.len(), 2);

        let deposit = &txns[0];
        assert_eq!(deposit.company_voucher, "UNION-20250530-555");
        assert_eq!(deposit.bank_voucher.as_deref(), Some("555"));
        assert_eq!(deposit.branch_office.as_deref(), Some("01"));
        assert_eq!(deposit.transaction_type, TransactionType::Credit);
        assert_eq!(deposit.debit_amount, Some(Decimal::ZERO));
        assert_eq!(deposit.credit_amount, Some(dec("1200.50")));
        assert_eq!(deposit.transaction_time, None);

        let payment = &txns[1];
        assert_eq!(payment.company_voucher, "UNION-20250531-556");
        assert_eq!(payment.branch_office.as_deref(), Some("02"));
        assert_eq!(payment.transaction_type, TransactionType::Debit);
        assert_eq!(payment.debit_amount, Some(dec("200.00")));
        assert_eq!(payment.credit_amount, Some(Decimal::ZERO));
        assert_eq!(payment.balance, Some(dec("1000.50")));
        assert_eq!(payment.signed_amount(), Some(dec("-200.00")));
    }

    #[test]
    fn test_unparseable_date_keeps_row() {
        let grid = text_grid(&[
            &["Fecha", "Hora", "Glosa", "Importe", "Nro. Operación"],
            &["sin fecha", "10:00:00", "PAGO", "-5.00", "77"],
        ]);
        let extracted = extract_table(&grid, 0, Layout::Bcp).unwrap();
        let txns = map_to_canonical(&extracted, BankCode::Bcp, "x", "b");
        assert_eq!(txns.len(), 1);
        assert_eq!(txns[0].transaction_date, None);
        assert_eq!(txns[0].transaction_time, None);
        assert_eq!(txns[0].company_voucher, "BCP-UNKNOWN-77");
    }

    #[test]
    fn test_duplicate_vouchers_get_suffix() {
        let grid = text_grid(&[
            &["Fecha", "Glosa", "Importe", "Nro. Operación"],
            &["30/05/2025", "ABONO", "5.00", "0"],
            &["30/05/2025", "ABONO", "6.00", "0"],
            &["30/05/2025", "ABONO", "7.00", ""],
        ]);
        let extracted = extract_table(&grid, 0, Layout::Bcp).unwrap();
        let txns = map_to_canonical(&extracted, BankCode::Bcp, "x", "b");
        let vouchers: Vec<&str> = txns.iter().map(|t| t.company_voucher.as_str()).collect();
        assert_eq!(vouchers, ["BCP-20250530-0", "BCP-20250530-0-2", "BCP-20250530-NA"]);
    }

    #[test]
    fn test_suffix_skips_keys_already_in_batch() {
        let grid = text_grid(&[
            &["Fecha", "Glosa", "Importe", "Nro. Operación"],
            &["30/05/2025", "ABONO", "5.00", "0"],
            &["30/05/2025", "ABONO", "6.00", "0"],
            &["30/05/2025", "ABONO", "7.00", "0-2"],
            &["30/05/2025", "ABONO", "8.00", "0"],
        ]);
        let extracted = extract_table(&grid, 0, Layout::Bcp).unwrap();
        let txns = map_to_canonical(&extracted, BankCode::Bcp, "x", "b");
        let vouchers: Vec<&str> = txns.iter().map(|t| t.company_voucher.as_str()).collect();
        assert_eq!(
            vouchers,
            ["BCP-20250530-0", "BCP-20250530-0-3", "BCP-20250530-0-2", "BCP-20250530-0-4"]
        );
        let unique: HashSet<&str> = vouchers.iter().copied().collect();
        assert_eq!(unique.len(), vouchers.len());
    }

    #[test]
    fn test_split_columns_never_both_positive() {
        let (d, c) = split_columns(Some(dec("10.00")), Some(dec("4.00")));
        assert_eq!((d, c), (Some(dec("6.00")), Some(Decimal::ZERO)));
        let (d, c) = split_columns(Some(dec("-3")), None);
        assert_eq!((d, c), (Some(dec("3")), None));
    }

    #[test]
    fn test_transaction_type() {
        assert_eq!(transaction_type("Abono Cta por ACH"), TransactionType::Credit);
        assert_eq!(transaction_type("Cargo por transferencia"), TransactionType::Debit);
        assert_eq!(transaction_type("TRANSFERENCIA ENTRE CUENTAS"), TransactionType::Transfer);
        assert_eq!(transaction_type("Depósito en efectivo"), TransactionType::Credit);
        assert_eq!(transaction_type("OTRO TIPO DE OPERACION"), TransactionType::Other);
    }

    #[test]
    fn test_company_voucher() {
        let d = NaiveDate::from_ymd_opt(2025, 5, 30);
        assert_eq!(company_voucher(BankCode::Bnb1, d, Some("1O5T377394")), "BNB1-20250530-1O5T377394");
        assert_eq!(company_voucher(BankCode::Union, None, Some("9")), "UNION-UNKNOWN-9");
    }

    #[test]
    fn test_map_payment_entries() {
        let grid = text_grid(&[
            &["CONSULTA DE ABONOS RECIBIDOS", "", "", "", "", "", "", ""],
            &["CANAL", "FECHA", "HORA", "MONTO ABONADO", "MONTO OP.", "MONEDA OP.", "GLOSA", "TITULAR"],
            &["ACH", "30/05/2025", "10:01:02", "210.00", "210.00", "BOB", "PAGO FACTURA 12", "ACME SRL"],
            &["QR", "30/05/2025", "", "1,500.00", "", "", "", "JUAN PEREZ"],
            &["", "", "", "", "", "", "REF", ""],
        ]);
        let extracted = extract_table(&grid, 1, Layout::PaymentReport).unwrap();
        let entries = map_payment_entries(&extracted);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].details.as_deref(), Some("ACME SRL - PAGO FACTURA 12"));
        assert_eq!(entries[0].credited_amount, Some(dec("210.00")));
        assert_eq!(entries[1].details.as_deref(), Some("JUAN PEREZ"));
        assert_eq!(entries[1].credited_amount, Some(dec("1500.00")));
        assert_eq!(entries[2].details.as_deref(), Some("REF"));
    }
}
