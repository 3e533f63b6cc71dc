/// Format an amount in yen with thousands separators: ¥1,234 (¥1,234.50 when fractional).
pub fn yen(val: f64) -> String {
    let negative = val < 0.0;
    let abs = val.abs();
    let fixed = if abs.fract() == 0.0 {
        format!("{abs:.0}")
    } else {
        format!("{abs:.2}")
    };
    let (int_part, dec_part) = match fixed.split_once('.') {
        Some((i, d)) => (i, Some(d)),
        None => (fixed.as_str(), None),
    };

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    let sign = if negative { "-" } else { "" };
    match dec_part {
        Some(d) => format!("{sign}¥{with_commas}.{d}"),
        None => format!("{sign}¥{with_commas}"),
    }
}
