//! Strike extraction from contract tickers and titles

/// Strike in dollars, rounded to whole dollars at or above $100 and to cents
/// below.
///
/// Tickers carry it as a trailing segment such as `-T99999.99` or `-B96000`;
/// titles as `$95,000`. Returns `None` when neither yields a positive number.
pub fn parse_strike(ticker: &str, title: &str) -> Option<f64> {
    from_ticker(ticker).or_else(|| from_title(title))
}

fn from_ticker(ticker: &str) -> Option<f64> {
    ticker.rsplit('-').find_map(|segment| {
        let rest = segment.strip_prefix(['T', 'A', 'B'])?;
        positive(rest.parse::<f64>().ok()?)
    })
}

fn from_title(title: &str) -> Option<f64> {
    let (_, after) = title.split_once('$')?;
    let digits: String = after
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .filter(|c| *c != ',')
        .collect();
    positive(digits.trim_end_matches('.').parse::<f64>().ok()?)
}

fn positive(value: f64) -> Option<f64> {
    if !value.is_finite() || value <= 0.0 {
        return None;
    }
    if value >= 100.0 {
        Some(value.round())
    } else {
        Some((value * 100.0).round() / 100.0)
    }
}
