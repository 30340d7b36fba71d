use crate::types::{AnomalyEvent, AnomalyKind, RawAnomaly, Severity};

/// Map an upstream change category to an internal direction and severity.
/// Unknown labels default to (Rocket, Low) so new upstream categories surface
/// as low-noise surges instead of disappearing.
pub fn classify_label(label: &str) -> (AnomalyKind, Severity) {
    match label {
        "火箭发射" => (AnomalyKind::Rocket, Severity::High),
        "快速反弹" => (AnomalyKind::Rocket, Severity::Medium),
        "封涨停板" => (AnomalyKind::Rocket, Severity::High),
        "打开跌停板" => (AnomalyKind::Rocket, Severity::Medium),
        "竞价上涨" => (AnomalyKind::Rocket, Severity::Low),
        "加速下跌" => (AnomalyKind::Dive, Severity::High),
        "高台跳水" => (AnomalyKind::Dive, Severity::High),
        "封跌停板" => (AnomalyKind::Dive, Severity::High),
        "打开涨停板" => (AnomalyKind::Dive, Severity::High),
        "竞价下跌" => (AnomalyKind::Dive, Severity::Low),
        "大笔买入" => (AnomalyKind::BigOrderBuy, Severity::Medium),
        "有大买盘" => (AnomalyKind::BigOrderBuy, Severity::Medium),
        "大笔卖出" => (AnomalyKind::BigOrderSell, Severity::Medium),
        "有大卖盘" => (AnomalyKind::BigOrderSell, Severity::Medium),
        _ => (AnomalyKind::Rocket, Severity::Low),
    }
}

/// Fields recovered from the stream's comma-delimited detail record.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InfoFields {
    pub volume: f64,
    pub price: f64,
    pub change_pct: f64,
    pub amount: f64,
}

/// The detail record layout varies by category: most carry
/// `volume,price,change,amount`, board events carry `price,change`. The
/// change arrives as a decimal fraction and is scaled to percent here.
/// Placeholder `-` and unparseable fields read as zero.
pub fn parse_info(info: &str) -> InfoFields {
    let parts: Vec<&str> = info.split(',').collect();
    let mut fields = InfoFields::default();
    if parts.len() >= 4 {
        fields.volume = parse_field(parts[0]);
        fields.price = parse_field(parts[1]);
        fields.change_pct = parse_field(parts[2]) * 100.0;
        fields.amount = parse_field(parts[3]);
    } else if parts.len() >= 2 {
        fields.price = parse_field(parts[0]);
        fields.change_pct = parse_field(parts[1]) * 100.0;
    }
    fields
}

fn parse_field(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() || s == "-" {
        return 0.0;
    }
    s.parse().unwrap_or(0.0)
}

/// Human-readable alert line in the upstream's own terms, prefixed with the
/// direction emoji. Big-order amounts are shown in 万 (10k yuan).
pub fn render_message(
    kind: AnomalyKind,
    label: &str,
    name: &str,
    code: &str,
    fields: &InfoFields,
) -> String {
    let emoji = kind.emoji();
    match kind {
        AnomalyKind::Rocket => format!(
            "{emoji} {label}！{name}({code}) 涨幅 {:+.1}%，现价 ¥{}",
            fields.change_pct, fields.price
        ),
        AnomalyKind::Dive => format!(
            "{emoji} {label}！{name}({code}) 跌幅 {:+.1}%，现价 ¥{}",
            fields.change_pct, fields.price
        ),
        AnomalyKind::BigOrderBuy => format!(
            "{emoji} {label}！{name}({code}) 成交额 {:.0}万，涨幅 {:+.1}%",
            fields.amount / 10_000.0,
            fields.change_pct
        ),
        AnomalyKind::BigOrderSell => format!(
            "{emoji} {label}！{name}({code}) 成交额 {:.0}万，跌幅 {:+.1}%",
            fields.amount / 10_000.0,
            fields.change_pct
        ),
    }
}

/// Classify one raw stream row. Returns None when the row is missing its
/// mandatory identity fields; the batch continues without it.
pub fn classify(raw: &RawAnomaly, trade_date: &str) -> Option<AnomalyEvent> {
    if raw.code.is_empty() || raw.name.is_empty() || raw.raw_label.is_empty() {
        return None;
    }

    let (kind, severity) = classify_label(&raw.raw_label);
    let fields = parse_info(&raw.info);
    let message = render_message(kind, &raw.raw_label, &raw.name, &raw.code, &fields);

    Some(AnomalyEvent {
        code: raw.code.clone(),
        name: raw.name.clone(),
        kind,
        raw_label: raw.raw_label.clone(),
        severity,
        price: fields.price,
        change_pct: fields.change_pct,
        amount: fields.amount,
        message,
        event_time: raw.event_time.clone(),
        trade_date: trade_date.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(label: &str, info: &str) -> RawAnomaly {
        RawAnomaly {
            code: "600519".to_string(),
            name: "贵州茅台".to_string(),
            raw_label: label.to_string(),
            info: info.to_string(),
            event_time: "09:31:12".to_string(),
        }
    }

    #[test]
    fn known_labels_map_to_direction_and_severity() {
        assert_eq!(classify_label("火箭发射"), (AnomalyKind::Rocket, Severity::High));
        assert_eq!(classify_label("高台跳水"), (AnomalyKind::Dive, Severity::High));
        // Reopened boards flip direction: an opened limit-up is a dive.
        assert_eq!(classify_label("打开涨停板"), (AnomalyKind::Dive, Severity::High));
        assert_eq!(classify_label("打开跌停板"), (AnomalyKind::Rocket, Severity::Medium));
        assert_eq!(classify_label("有大卖盘"), (AnomalyKind::BigOrderSell, Severity::Medium));
        assert_eq!(classify_label("竞价下跌"), (AnomalyKind::Dive, Severity::Low));
    }

    #[test]
    fn unknown_label_defaults_to_low_rocket() {
        assert_eq!(classify_label("神秘新类别"), (AnomalyKind::Rocket, Severity::Low));
        assert_eq!(classify_label("8999"), (AnomalyKind::Rocket, Severity::Low));
    }

    #[test]
    fn four_field_info_scales_change_to_percent() {
        let f = parse_info("120500,35.80,0.0512,4310000");
        assert_eq!(f.volume, 120500.0);
        assert_eq!(f.price, 35.8);
        assert!((f.change_pct - 5.12).abs() < 1e-9);
        assert_eq!(f.amount, 4_310_000.0);
    }

    #[test]
    fn two_field_info_is_price_and_change() {
        let f = parse_info("19.95,0.1001");
        assert_eq!(f.price, 19.95);
        assert!((f.change_pct - 10.01).abs() < 1e-9);
        assert_eq!(f.volume, 0.0);
        assert_eq!(f.amount, 0.0);
    }

    #[test]
    fn placeholders_and_garbage_read_as_zero() {
        let f = parse_info("-,12.30,abc,-");
        assert_eq!(f.volume, 0.0);
        assert_eq!(f.price, 12.3);
        assert_eq!(f.change_pct, 0.0);
        assert_eq!(f.amount, 0.0);

        assert_eq!(parse_info(""), InfoFields::default());
        assert_eq!(parse_info("7.77"), InfoFields::default());
    }

    #[test]
    fn rocket_message_carries_price_and_change() {
        let event = classify(&raw("火箭发射", "1000,35.80,0.0512,4310000"), "20260823")
            .expect("classifiable row");
        assert_eq!(event.kind, AnomalyKind::Rocket);
        assert!(event.message.starts_with("🚀 火箭发射！贵州茅台(600519)"));
        assert!(event.message.contains("+5.1%"));
        assert!(event.message.contains("¥35.8"));
    }

    #[test]
    fn big_order_message_shows_amount_in_wan() {
        let event = classify(&raw("大笔卖出", "1000,8.00,-0.021,25000000"), "20260823")
            .expect("classifiable row");
        assert_eq!(event.kind, AnomalyKind::BigOrderSell);
        assert!(event.message.contains("💸"));
        assert!(event.message.contains("2500万"));
        assert!(event.message.contains("-2.1%"));
    }

    #[test]
    fn rows_without_identity_are_skipped() {
        let mut r = raw("火箭发射", "1,2,0.03,4");
        r.code = String::new();
        assert!(classify(&r, "20260823").is_none());

        let mut r = raw("火箭发射", "1,2,0.03,4");
        r.raw_label = String::new();
        assert!(classify(&r, "20260823").is_none());
    }

    #[test]
    fn event_keeps_source_time_and_date() {
        let event = classify(&raw("快速反弹", "1,2,0.03,4"), "20260823").expect("row");
        assert_eq!(event.event_time, "09:31:12");
        assert_eq!(event.trade_date, "20260823");
        assert_eq!(event.raw_label, "快速反弹");
    }
}
