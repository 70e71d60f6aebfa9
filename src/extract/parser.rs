//! Regex field extraction over scraped markdown, HTML or JSON text.
//!
//! Each field is read with an ordered list of patterns and the first
//! plausible match wins. Prices fall back to the median of every
//! currency-looking amount on the page when no labelled price is found.
//! HTML input is reduced to its visible text with `scraper` before the text
//! patterns run; meta tags and embedded JSON are matched on the raw input.
//!
//! Everything here is synchronous because `scraper` documents are `!Send`.

use super::AuctionSnapshot;
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use regex::{Captures, Regex};
use rust_decimal::Decimal;
use scraper::{Html, Selector};
use std::str::FromStr;
use std::sync::OnceLock;

/// A price read from text, with its currency when one was attached
#[derive(Debug, Clone, PartialEq)]
pub struct PriceMatch {
    pub amount: Decimal,
    pub currency: Option<String>,
}

// ── Patterns ────────────────────────────────────────────────────────────────

const AMOUNT: &str = r"(?P<amount>\d[\d,.]*\d|\d)";
const CODE: &str = r"(?P<code>US|AU|C|USD|EUR|GBP|CAD|AUD)";
const SYMBOL: &str = r"(?P<sym>[$£€¥])";
/// Longest countdown accepted from a page
pub const MAX_COUNTDOWN_DAYS: i64 = 365;

const UNITS: &str = r"(?:days?|d|hours?|hrs?|h|minutes?|mins?|m|seconds?|secs?|s)";

struct Patterns {
    labelled_prices: Vec<Regex>,
    currency_amount: Regex,
    code_amount: Regex,
    json_currency: Regex,
    markdown_heading: Regex,
    json_title: Regex,
    title_suffix: Regex,
    json_end_epoch: Regex,
    json_end_iso: Regex,
    text_end_iso: Regex,
    relative_end: Regex,
    trailing_left: Regex,
    duration_part: Regex,
}

fn compile(pattern: &str) -> Regex {
    // Patterns are constants; a failure here is a programming error caught by tests
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid pattern {pattern}: {e}"))
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        labelled_prices: vec![
            compile(&format!(
                r"(?i)(?:current|winning|starting|high)\s+bid\s*:?\s*(?:\[|\*\*)?\s*{CODE}?\s*{SYMBOL}?\s*{AMOUNT}"
            )),
            compile(&format!(
                r#""(?:currentPrice|currentBid|current_price|bidPrice)"\s*:\s*\{{[^{{}}]*?"value"\s*:\s*"?{AMOUNT}"#
            )),
            compile(&format!(
                r#""(?:currentPrice|currentBid|current_price|bidPrice|price)"\s*:\s*"?{AMOUNT}"#
            )),
            compile(&format!(
                r"(?i)(?:price|bid)\s*:?\s*(?:\*\*)?\s*{CODE}?\s*{SYMBOL}\s*{AMOUNT}"
            )),
        ],
        currency_amount: compile(&format!(r"(?:\b{CODE}\s?)?{SYMBOL}\s*{AMOUNT}")),
        code_amount: compile(r"\b(?P<code>USD|EUR|GBP|CAD|AUD)\s*(?P<amount>\d[\d,.]*\d|\d)"),
        json_currency: compile(r#""(?:currency|currencyId|priceCurrency)"\s*:\s*"(?P<code>[A-Z]{3})""#),
        markdown_heading: compile(r"(?m)^\s{0,3}#{1,2}\s+(?P<title>\S.*?)\s*#*\s*$"),
        json_title: compile(r#""(?:title|name)"\s*:\s*"(?P<title>[^"\\]{3,200})""#),
        title_suffix: compile(r"(?i)\s*[|\-–]\s*(?:ebay|ebay\.[a-z.]+)\s*$"),
        json_end_epoch: compile(
            r#""(?:endTime|end_time|endDate|auctionEnd|endsAt)"\s*:\s*"?(?P<epoch>\d{10,13})\b"#,
        ),
        json_end_iso: compile(
            r#""(?:endTime|end_time|endDate|auctionEnd|endsAt)"\s*:\s*"(?P<iso>\d{4}-\d{2}-\d{2}[T ][^"]+)""#,
        ),
        text_end_iso: compile(
            r"(?i)\b(?:ends?|ending|closes?)\b[^0-9\n]{0,20}(?P<iso>\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}(?::\d{2})?(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?)",
        ),
        relative_end: compile(&format!(
            r"(?i)(?:time\s+left|ends\s+in|ending\s+in|closes\s+in)\s*:?\s*(?:\*\*)?\s*(?P<dur>(?:\d+\s*{UNITS}[\s,]*)+)"
        )),
        trailing_left: compile(&format!(
            r"(?i)(?P<dur>(?:\d+\s*{UNITS}[\s,]*){{2,}})\s*left\b"
        )),
        duration_part: compile(&format!(r"(?i)(?P<n>\d+)\s*(?P<unit>{UNITS})")),
    })
}

// ── Public entry points ─────────────────────────────────────────────────────

/// Parse every field out of a fetched page.
///
/// Returns `None` when no plausible price can be found; title and end time
/// are best-effort.
pub fn parse_snapshot(
    raw: &str,
    max_plausible: Decimal,
    now: DateTime<Utc>,
    source: &str,
) -> Option<AuctionSnapshot> {
    let text = visible_text(raw);
    let price = extract_price(&text, max_plausible)
        .or_else(|| extract_price(raw, max_plausible))?;

    let currency = price
        .currency
        .or_else(|| json_currency(raw));

    Some(AuctionSnapshot {
        title: extract_title(raw).unwrap_or_default(),
        current_price: price.amount,
        currency,
        end_time: extract_end_time(raw, now).or_else(|| extract_end_time(&text, now)),
        source: source.to_string(),
    })
}

/// Listing title from `og:title`, `<title>`, a markdown heading, or a JSON
/// `title` field, in that order
pub fn extract_title(raw: &str) -> Option<String> {
    if looks_like_html(raw) {
        let document = Html::parse_document(raw);
        let from_meta = Selector::parse(r#"meta[property="og:title"]"#)
            .ok()
            .and_then(|sel| {
                document
                    .select(&sel)
                    .find_map(|el| el.value().attr("content").map(str::to_string))
            });
        let from_title_tag = || {
            Selector::parse("title").ok().and_then(|sel| {
                document
                    .select(&sel)
                    .next()
                    .map(|el| el.text().collect::<String>())
            })
        };
        if let Some(title) = from_meta
            .or_else(from_title_tag)
            .and_then(|t| clean_title(&t))
        {
            return Some(title);
        }
    }

    let p = patterns();
    p.markdown_heading
        .captures(raw)
        .and_then(|c| clean_title(&c["title"]))
        .or_else(|| {
            p.json_title
                .captures(raw)
                .and_then(|c| clean_title(&c["title"]))
        })
}

/// Current price: labelled patterns first, then the median of every
/// currency-looking amount
pub fn extract_price(text: &str, max_plausible: Decimal) -> Option<PriceMatch> {
    let p = patterns();
    let plausible = |amount: &Decimal| *amount > Decimal::ZERO && *amount <= max_plausible;

    for pattern in &p.labelled_prices {
        for caps in pattern.captures_iter(text) {
            if let Some(found) = price_from_captures(&caps) {
                if plausible(&found.amount) {
                    return Some(found);
                }
            }
        }
    }

    let mut candidates: Vec<PriceMatch> = p
        .currency_amount
        .captures_iter(text)
        .chain(p.code_amount.captures_iter(text))
        .filter_map(|caps| price_from_captures(&caps))
        .filter(|m| plausible(&m.amount))
        .collect();
    median_price(&mut candidates)
}

/// Auction close time from embedded JSON, an explicit timestamp next to an
/// "ends" keyword, or a relative countdown
pub fn extract_end_time(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let p = patterns();

    if let Some(caps) = p.json_end_epoch.captures(text) {
        if let Some(end) = parse_epoch(&caps["epoch"]) {
            return Some(end);
        }
    }
    for pattern in [&p.json_end_iso, &p.text_end_iso] {
        if let Some(end) = pattern
            .captures(text)
            .and_then(|caps| parse_timestamp(&caps["iso"]))
        {
            return Some(end);
        }
    }
    for pattern in [&p.relative_end, &p.trailing_left] {
        if let Some(end) = pattern
            .captures(text)
            .and_then(|caps| parse_countdown(&caps["dur"]))
            .and_then(|left| end_after(now, left))
        {
            return Some(end);
        }
    }
    None
}

/// Parse an amount such as `1,234.56`, `1.234,56` or `29,99`
pub fn parse_amount(text: &str) -> Option<Decimal> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        // Both present: the last one is the decimal separator
        (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(comma), None) => {
            let decimals = cleaned.len() - comma - 1;
            if decimals <= 2 && cleaned.matches(',').count() == 1 {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        (None, Some(_)) if cleaned.matches('.').count() > 1 => cleaned.replace('.', ""),
        _ => cleaned,
    };

    Decimal::from_str(&normalized).ok()
}

/// Parse an absolute timestamp: RFC 3339, or a naive date-time read as UTC
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    None
}

/// Parse a countdown such as `2d 3h 10m`, `4 hours 12 minutes` or `45s`.
///
/// Countdowns longer than [`MAX_COUNTDOWN_DAYS`] are rejected as parse noise.
pub fn parse_countdown(text: &str) -> Option<Duration> {
    let max = Duration::try_days(MAX_COUNTDOWN_DAYS)?;
    let mut total = Duration::zero();
    let mut matched = false;
    for caps in patterns().duration_part.captures_iter(text) {
        let n: i64 = caps["n"].parse().ok()?;
        let unit = caps["unit"].to_ascii_lowercase();
        let part = match unit.chars().next() {
            Some('d') => Duration::try_days(n)?,
            Some('h') => Duration::try_hours(n)?,
            Some('m') => Duration::try_minutes(n)?,
            Some('s') => Duration::try_seconds(n)?,
            _ => continue,
        };
        total = total.checked_add(&part)?;
        matched = true;
    }
    (matched && total <= max).then_some(total)
}

/// Close time for a countdown read at `now`
pub fn end_after(now: DateTime<Utc>, left: Duration) -> Option<DateTime<Utc>> {
    now.checked_add_signed(left)
}

/// Visible text of an HTML document; other input is returned unchanged
pub fn visible_text(raw: &str) -> String {
    if !looks_like_html(raw) {
        return raw.to_string();
    }
    let document = Html::parse_document(raw);
    let Ok(body) = Selector::parse("body") else {
        return raw.to_string();
    };
    let Some(root) = document.select(&body).next() else {
        return raw.to_string();
    };
    // Script and style contents are not visible text
    let skip = Selector::parse("script, style, noscript").ok();
    let hidden: Vec<_> = skip
        .map(|sel| root.select(&sel).map(|el| el.id()).collect())
        .unwrap_or_default();

    let mut out = String::new();
    for node in root.descendants() {
        if let Some(text) = node.value().as_text() {
            let inside_hidden = node.ancestors().any(|a| hidden.contains(&a.id()));
            if !inside_hidden {
                out.push_str(text);
                out.push(' ');
            }
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn looks_like_html(raw: &str) -> bool {
    let head = raw.chars().take(2048).collect::<String>().to_ascii_lowercase();
    ["<html", "<body", "<!doctype html", "<div", "<meta"]
        .iter()
        .any(|marker| head.contains(marker))
}

fn price_from_captures(caps: &Captures<'_>) -> Option<PriceMatch> {
    let amount = parse_amount(caps.name("amount")?.as_str())?;
    let currency = currency_code(
        caps.name("code").map(|m| m.as_str()),
        caps.name("sym").map(|m| m.as_str()),
    );
    Some(PriceMatch { amount, currency })
}

fn currency_code(code: Option<&str>, symbol: Option<&str>) -> Option<String> {
    let iso = match (code, symbol) {
        (Some("C"), _) | (Some("CAD"), _) => "CAD",
        (Some("AU"), _) | (Some("AUD"), _) => "AUD",
        (Some("US"), _) | (Some("USD"), _) => "USD",
        (Some("EUR"), _) => "EUR",
        (Some("GBP"), _) => "GBP",
        (_, Some("$")) => "USD",
        (_, Some("£")) => "GBP",
        (_, Some("€")) => "EUR",
        (_, Some("¥")) => "JPY",
        _ => return None,
    };
    Some(iso.to_string())
}

fn json_currency(raw: &str) -> Option<String> {
    patterns()
        .json_currency
        .captures(raw)
        .map(|c| c["code"].to_string())
}

/// Lower median, so the result is always an observed price
fn median_price(candidates: &mut [PriceMatch]) -> Option<PriceMatch> {
    if candidates.is_empty() {
        return None;
    }
    candidates.sort_by(|a, b| a.amount.cmp(&b.amount));
    Some(candidates[(candidates.len() - 1) / 2].clone())
}

fn clean_title(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let title = patterns().title_suffix.replace(&collapsed, "");
    let title = title.trim().trim_matches('*').trim();
    (!title.is_empty()).then(|| title.to_string())
}

fn parse_epoch(digits: &str) -> Option<DateTime<Utc>> {
    let value: i64 = digits.parse().ok()?;
    if digits.len() >= 13 {
        DateTime::from_timestamp_millis(value)
    } else {
        DateTime::from_timestamp(value, 0)
    }
}
