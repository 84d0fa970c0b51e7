use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use crate::models::{CanonicalTransaction, MatchStatus, PaymentReportEntry};

type MatchKey = (NaiveDate, Decimal);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MatchStats {
    pub total_statement: usize,
    pub total_report: usize,
    pub matched: usize,
    pub multi_matched: usize,
    pub unmatched: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledTransaction {
    pub transaction: CanonicalTransaction,
    pub status: MatchStatus,
}

// Scale-insensitive so that 210, 210.0 and 210.00 share a key.
fn amount_key(amount: Decimal) -> Decimal {
    amount.abs().round_dp(2).normalize()
}

fn index_entries(entries: &[PaymentReportEntry]) -> HashMap<MatchKey, Vec<&PaymentReportEntry>> {
    let mut index: HashMap<MatchKey, Vec<&PaymentReportEntry>> = HashMap::new();
    for entry in entries {
        if let (Some(date), Some(amount)) = (entry.report_date, entry.credited_amount) {
            index.entry((date, amount_key(amount))).or_default().push(entry);
        }
    }
    index
}

fn joined_details(matches: &[&PaymentReportEntry]) -> Option<String> {
    let mut seen: Vec<&str> = Vec::new();
    for details in matches.iter().filter_map(|e| e.details.as_deref()) {
        if !seen.contains(&details) {
            seen.push(details);
        }
    }
    if seen.is_empty() {
        None
    } else {
        Some(seen.join(" | "))
    }
}

/// Copy payment-report details onto statement transactions matched by
/// (date, absolute amount). A single candidate transfers its details as-is;
/// several candidates contribute their distinct details joined by ` | ` in
/// report order. Unmatched transactions keep whatever details they had.
pub fn reconcile(
    statement: &[CanonicalTransaction],
    report: &[PaymentReportEntry],
) -> (Vec<ReconciledTransaction>, MatchStats) {
    let index = index_entries(report);
    let mut stats = MatchStats {
        total_statement: statement.len(),
        total_report: report.len(),
        ..MatchStats::default()
    };

    let enriched = statement
        .iter()
        .map(|txn| {
            let mut transaction = txn.clone();
            let candidates = match (txn.transaction_date, txn.signed_amount()) {
                (Some(date), Some(amount)) => index.get(&(date, amount_key(amount))),
                _ => None,
            };
            let status = match candidates.map(Vec::as_slice) {
                Some([single]) => {
                    transaction.additional_details = single.details.clone();
                    stats.matched += 1;
                    MatchStatus::Matched
                }
                Some(group) if group.len() > 1 => {
                    debug!(
                        voucher = %txn.company_voucher,
                        candidates = group.len(),
                        "multiple payment entries for one transaction"
                    );
                    for candidate in group {
                        debug!(
                            voucher = %txn.company_voucher,
                            date = ?candidate.report_date,
                            amount = ?candidate.credited_amount,
                            details = candidate.details.as_deref().unwrap_or(""),
                            "multi-match candidate"
                        );
                    }
                    transaction.additional_details = joined_details(group);
                    stats.multi_matched += 1;
                    MatchStatus::MultiMatched
                }
                _ => {
                    stats.unmatched += 1;
                    MatchStatus::Unmatched
                }
            };
            ReconciledTransaction { transaction, status }
        })
        .collect();

    info!(
        total_statement = stats.total_statement,
        total_report = stats.total_report,
        matched = stats.matched,
        multi_matched = stats.multi_matched,
        unmatched = stats.unmatched,
        "reconciliation finished"
    );
    (enriched, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BankCode, TransactionType};

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn date(d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2025, 5, d)
    }

    fn txn(voucher: &str, day: u32, signed: &str, details: Option<&str>) -> CanonicalTransaction {
        let amount = dec(signed);
        let (debit, credit) = if amount.is_sign_negative() {
            (-amount, Decimal::ZERO)
        } else {
            (Decimal::ZERO, amount)
        };
        CanonicalTransaction {
            bank_code: BankCode::Bcp,
            account_number: "201-0005751-3-23".into(),
            company_voucher: voucher.into(),
            bank_voucher: None,
            transaction_date: date(day),
            transaction_time: None,
            description: None,
            transaction_type: TransactionType::Other,
            reference_number: None,
            debit_amount: Some(debit),
            credit_amount: Some(credit),
            balance: None,
            itf_amount: Decimal::ZERO,
            branch_office: None,
            additional_details: details.map(String::from),
            import_batch_id: "b".into(),
        }
    }

    fn entry(day: u32, amount: &str, details: Option<&str>) -> PaymentReportEntry {
        PaymentReportEntry {
            channel: None,
            report_date: date(day),
            report_time: None,
            credited_amount: Some(dec(amount)),
            operation_amount: None,
            operation_currency: None,
            narrative: None,
            holder: None,
            details: details.map(String::from),
        }
    }

    #[test]
    fn test_multi_match_joins_details() {
        let statement = vec![txn("BCP-1", 30, "-210.00", None)];
        let report = vec![entry(30, "210.00", Some("A")), entry(30, "210.00", Some("B"))];
        let (out, stats) = reconcile(&statement, &report);
        assert_eq!(out[0].status, MatchStatus::MultiMatched);
        assert_eq!(out[0].transaction.additional_details.as_deref(), Some("A | B"));
        assert_eq!(stats.multi_matched, 1);
        assert_eq!(stats.matched, 0);
        assert_eq!(stats.total_report, 2);
    }

    #[test]
    fn test_single_match_and_unmatched() {
        let statement = vec![
            txn("BCP-1", 30, "1500", Some("old")),
            txn("BCP-2", 30, "99.99", Some("keep me")),
            txn("BCP-3", 29, "1500", None),
        ];
        let report = vec![entry(30, "1500.00", Some("JUAN PEREZ"))];
        let (out, stats) = reconcile(&statement, &report);
        assert_eq!(out[0].status, MatchStatus::Matched);
        assert_eq!(out[0].transaction.additional_details.as_deref(), Some("JUAN PEREZ"));
        assert_eq!(out[1].status, MatchStatus::Unmatched);
        assert_eq!(out[1].transaction.additional_details.as_deref(), Some("keep me"));
        assert_eq!(out[2].status, MatchStatus::Unmatched);
        assert_eq!(
            stats,
            MatchStats {
                total_statement: 3,
                total_report: 1,
                matched: 1,
                multi_matched: 0,
                unmatched: 2,
            }
        );
    }

    #[test]
    fn test_duplicate_details_collapse_in_first_seen_order() {
        let statement = vec![txn("BCP-1", 30, "50", None)];
        let report = vec![
            entry(30, "50", Some("B")),
            entry(30, "50", None),
            entry(30, "50", Some("A")),
            entry(30, "50", Some("B")),
        ];
        let (out, _) = reconcile(&statement, &report);
        assert_eq!(out[0].transaction.additional_details.as_deref(), Some("B | A"));
    }

    #[test]
    fn test_stats_partition_statement() {
        let statement = vec![
            txn("a", 1, "10", None),
            txn("b", 2, "-20", None),
            txn("c", 3, "30", None),
            txn("d", 3, "30", None),
        ];
        let report = vec![entry(1, "10", Some("x")), entry(3, "30", Some("y")), entry(3, "30", Some("z"))];
        let (_, stats) = reconcile(&statement, &report);
        assert_eq!(stats.matched + stats.multi_matched + stats.unmatched, stats.total_statement);
        assert_eq!(stats.multi_matched, 2);
    }

    #[test]
    fn test_statement_order_does_not_change_outcome() {
        let statement = vec![txn("a", 1, "10", None), txn("b", 2, "-20", None), txn("c", 3, "30", None)];
        let report = vec![entry(2, "20", Some("p")), entry(3, "30", Some("q"))];
        let (forward, _) = reconcile(&statement, &report);

        let reversed: Vec<_> = statement.iter().rev().cloned().collect();
        let (backward, _) = reconcile(&reversed, &report);

        for r in &forward {
            let other = backward
                .iter()
                .find(|b| b.transaction.company_voucher == r.transaction.company_voucher)
                .unwrap();
            assert_eq!(r, other);
        }
    }

    #[test]
    fn test_report_order_does_not_change_status() {
        let statement = vec![txn("a", 1, "10", None), txn("b", 2, "-20", None), txn("c", 3, "30", None)];
        let report = vec![
            entry(2, "20", Some("p")),
            entry(3, "30", Some("q")),
            entry(3, "30.00", Some("r")),
            entry(9, "1", Some("s")),
        ];
        let (base, base_stats) = reconcile(&statement, &report);

        let mut permuted = report.clone();
        permuted.reverse();
        permuted.swap(0, 2);
        let (other, other_stats) = reconcile(&statement, &permuted);

        assert_eq!(base_stats, other_stats);
        let statuses = |rows: &[ReconciledTransaction]| rows.iter().map(|r| r.status).collect::<Vec<_>>();
        assert_eq!(statuses(&base), statuses(&other));
        assert_eq!(
            statuses(&base),
            vec![MatchStatus::Unmatched, MatchStatus::Matched, MatchStatus::MultiMatched]
        );
    }

    #[test]
    fn test_undated_transaction_never_matches() {
        let mut t = txn("a", 1, "10", None);
        t.transaction_date = None;
        let (out, stats) = reconcile(&[t], &[entry(1, "10", Some("x"))]);
        assert_eq!(out[0].status, MatchStatus::Unmatched);
        assert_eq!(stats.unmatched, 1);
    }
}
