use rust_decimal::Decimal;

/// Format an amount with thousands separators and two decimals: -1,234.56
pub fn amount(val: Decimal) -> String {
    let negative = val.is_sign_negative() && !val.is_zero();
    let cents = format!("{:.2}", val.abs().round_dp(2));
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    if negative {
        format!("-{with_commas}.{dec_part}")
    } else {
        format!("{with_commas}.{dec_part}")
    }
}

/// Blank for missing values, formatted amount otherwise.
pub fn opt_amount(val: Option<Decimal>) -> String {
    val.map(amount).unwrap_or_default()
}
