//! Trade attribute registry
//!
//! Maps every column name a combination or strategy can reference to a
//! typed accessor on [`TradeRecord`]. The table is built once and shared
//! read-only by all workers.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::types::{Direction, TradeRecord};

/// Storage type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Bool,
    Number,
    Integer,
    Text,
}

impl AttributeKind {
    pub fn label(&self) -> &'static str {
        match self {
            AttributeKind::Bool => "boolean",
            AttributeKind::Number | AttributeKind::Integer => "number",
            AttributeKind::Text => "text",
        }
    }
}

/// Borrowed view of one attribute of one trade
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttributeValue<'a> {
    Bool(bool),
    Number(f64),
    Text(&'a str),
}

impl AttributeValue<'_> {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// Owned value written into a trade while loading
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

pub struct Attribute {
    pub name: &'static str,
    pub kind: AttributeKind,
    get: fn(&TradeRecord) -> AttributeValue<'_>,
    set: fn(&mut TradeRecord, FieldValue),
}

impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

impl Attribute {
    pub fn get<'a>(&self, trade: &'a TradeRecord) -> AttributeValue<'a> {
        (self.get)(trade)
    }

    /// Values of the wrong kind are ignored
    pub fn set(&self, trade: &mut TradeRecord, value: FieldValue) {
        (self.set)(trade, value)
    }

    /// Parse a raw cell into a value of this attribute's kind.
    ///
    /// Empty cells read as `false`, `0` or an empty string. Numbers accept a
    /// comma as the decimal separator.
    pub fn parse_cell(&self, raw: &str) -> Result<FieldValue, String> {
        let raw = raw.trim();
        match self.kind {
            AttributeKind::Bool => parse_bool(raw)
                .map(FieldValue::Bool)
                .ok_or_else(|| format!("'{}' is not a boolean for {}", raw, self.name)),
            AttributeKind::Number | AttributeKind::Integer => parse_number(raw)
                .map(FieldValue::Number)
                .ok_or_else(|| format!("'{}' is not a number for {}", raw, self.name)),
            AttributeKind::Text => Ok(FieldValue::Text(raw.to_string())),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "" | "false" | "0" | "no" | "n" => Some(false),
        "true" | "1" | "yes" | "y" => Some(true),
        _ => None,
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    if raw.is_empty() {
        return Some(0.0);
    }
    raw.replace(',', ".").parse().ok()
}

macro_rules! attribute_table {
    ($($name:literal => $field:ident: $kind:ident),* $(,)?) => {
        &[$(attribute_table!(@entry $name, $field, $kind)),*]
    };
    (@entry $name:literal, $field:ident, bool) => {
        Attribute {
            name: $name,
            kind: AttributeKind::Bool,
            get: |t| AttributeValue::Bool(t.$field),
            set: |t, v| {
                if let FieldValue::Bool(b) = v {
                    t.$field = b;
                }
            },
        }
    };
    (@entry $name:literal, $field:ident, number) => {
        Attribute {
            name: $name,
            kind: AttributeKind::Number,
            get: |t| AttributeValue::Number(t.$field),
            set: |t, v| {
                if let FieldValue::Number(n) = v {
                    t.$field = n;
                }
            },
        }
    };
    (@entry $name:literal, $field:ident, integer) => {
        Attribute {
            name: $name,
            kind: AttributeKind::Integer,
            get: |t| AttributeValue::Number(t.$field as f64),
            set: |t, v| {
                if let FieldValue::Number(n) = v {
                    t.$field = n.round() as i64;
                }
            },
        }
    };
    (@entry $name:literal, $field:ident, text) => {
        Attribute {
            name: $name,
            kind: AttributeKind::Text,
            get: |t| AttributeValue::Text(t.$field.as_str()),
            set: |t, v| {
                if let FieldValue::Text(s) = v {
                    t.$field = s;
                }
            },
        }
    };
}

static ATTRIBUTES: &[Attribute] = attribute_table! {
    "Date" => date: text,
    "Setup" => setup: text,
    "Entered" => entered: bool,
    "Canceled_After_Candles" => canceled_after_candles: integer,
    "Breakout_Candle_Count" => breakout_candle_count: integer,
    "Candle_Size" => candle_size: number,
    "Breakout_Distance" => breakout_distance: number,
    "Entry_Distance" => entry_distance: number,
    "Entry_Candle_Has_Wick" => entry_candle_has_wick: bool,
    "Setup_Candle_Has_Wick" => setup_candle_has_wick: bool,
    "Closed_In_LTA" => closed_in_lta: bool,
    "S2_Previous_Support_Distance" => s2_previous_support_distance: number,
    "S2_Previous_Resistance_Distance" => s2_previous_resistance_distance: number,
    "Gaussian_Trend_1" => gaussian_trend_1: bool,
    "Gaussian_Trend_2" => gaussian_trend_2: bool,
    "Gaussian_Trend_3" => gaussian_trend_3: bool,
    "Gaussian_Trend_4" => gaussian_trend_4: bool,
    "Gaussian_Trend_5" => gaussian_trend_5: bool,
    "Gaussian_Trend_6" => gaussian_trend_6: bool,
    "Gaussian_Trend_7" => gaussian_trend_7: bool,
    "TP_1RR_PW_WIN" => tp_1rr_pw_win: bool,
    "TP_1RR_STR_WIN" => tp_1rr_str_win: bool,
    "TP_SR_LTA_SL_PW_WIN" => tp_sr_lta_sl_pw_win: bool,
    "TP_SR_LTA_SL_STR_WIN" => tp_sr_lta_sl_str_win: bool,
    "TP_SR_NEAREST_SL_PW_WIN" => tp_sr_nearest_sl_pw_win: bool,
    "TP_SR_NEAREST_SL_STR_WIN" => tp_sr_nearest_sl_str_win: bool,
    "TP_SR_STATIC_SL_PW_WIN" => tp_sr_static_sl_pw_win: bool,
    "TP_SR_STATIC_SL_STR_WIN" => tp_sr_static_sl_str_win: bool,
    "TP_SR_CURRENT_PW_WIN" => tp_sr_current_pw_win: bool,
    "TP_SR_CURRENT_STR_WIN" => tp_sr_current_str_win: bool,
    "TP_1RR_PW_PIPS" => tp_1rr_pw_pips: number,
    "TP_1RR_STR_PIPS" => tp_1rr_str_pips: number,
    "TP_SR_LTA_PIPS" => tp_sr_lta_pips: number,
    "TP_SR_NEAREST_PIPS" => tp_sr_nearest_pips: number,
    "TP_SR_STATIC_PIPS" => tp_sr_static_pips: number,
    "TP_SR_CURRENT_PIPS" => tp_sr_current_pips: number,
    "SL_PW_PIPS" => sl_pw_pips: number,
    "SL_STR_PIPS" => sl_str_pips: number,
    "LTA_Range_Breakout" => lta_range_breakout: bool,
    "Nearest_Range_Breakout" => nearest_range_breakout: bool,
    "Static_Range_Breakout" => static_range_breakout: bool,
    "Current_Range_Breakout" => current_range_breakout: bool,
    "M10_Candle" => m10_candle: bool,
    "M15_Candle" => m15_candle: bool,
    "M30_Candle" => m30_candle: bool,
    "H1_Candle" => h1_candle: bool,
    "H4_Candle" => h4_candle: bool,
    "D1_Candle" => d1_candle: bool,
    "M10_Candle_Open" => m10_candle_open: bool,
    "M15_Candle_Open" => m15_candle_open: bool,
    "M30_Candle_Open" => m30_candle_open: bool,
    "H1_Candle_Open" => h1_candle_open: bool,
    "H4_Candle_Open" => h4_candle_open: bool,
    "D1_Candle_Open" => d1_candle_open: bool,
};

/// `Time` and `Direction` carry derived state, so they are not table-generated
static TIME: Attribute = Attribute {
    name: "Time",
    kind: AttributeKind::Text,
    get: |t| AttributeValue::Text(t.time.as_str()),
    set: |t, v| {
        if let FieldValue::Text(s) = v {
            t.set_time(s);
        }
    },
};

static DIRECTION: Attribute = Attribute {
    name: "Direction",
    kind: AttributeKind::Text,
    get: |t| AttributeValue::Text(t.direction.as_str()),
    set: |t, v| {
        if let FieldValue::Text(s) = v {
            t.direction = Direction::from_label(&s);
        }
    },
};

fn registry() -> &'static HashMap<&'static str, &'static Attribute> {
    static REGISTRY: OnceLock<HashMap<&'static str, &'static Attribute>> = OnceLock::new();
    REGISTRY.get_or_init(|| all().map(|a| (a.name, a)).collect())
}

/// Look up an attribute by column name
pub fn lookup(name: &str) -> Option<&'static Attribute> {
    registry().get(name).copied()
}

/// Every attribute, in a stable column order
pub fn all() -> impl Iterator<Item = &'static Attribute> {
    [&TIME, &DIRECTION].into_iter().chain(ATTRIBUTES.iter())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_and_unknown() {
        let attr = lookup("Candle_Size").unwrap();
        assert_eq!(attr.kind, AttributeKind::Number);
        assert!(lookup("Candle_Sizes").is_none());
        assert!(lookup("").is_none());
    }

    #[test]
    fn test_names_are_unique() {
        let count = all().count();
        assert_eq!(registry().len(), count);
    }

    #[test]
    fn test_get_and_set_roundtrip_through_table() {
        let mut trade = TradeRecord::default();
        lookup("Breakout_Candle_Count")
            .unwrap()
            .set(&mut trade, FieldValue::Number(3.0));
        lookup("Gaussian_Trend_4")
            .unwrap()
            .set(&mut trade, FieldValue::Bool(true));
        lookup("Direction")
            .unwrap()
            .set(&mut trade, FieldValue::Text("sell".into()));

        assert_eq!(trade.breakout_candle_count, 3);
        assert!(trade.gaussian_trend_4);
        assert_eq!(trade.direction, Direction::Sell);
        assert_eq!(
            lookup("Direction").unwrap().get(&trade),
            AttributeValue::Text("SELL")
        );
    }

    #[test]
    fn test_time_setter_updates_minute_of_day() {
        let mut trade = TradeRecord::default();
        lookup("Time")
            .unwrap()
            .set(&mut trade, FieldValue::Text("09:45".into()));
        assert_eq!(trade.minute_of_day, Some(585));
    }

    #[test]
    fn test_mismatched_value_is_ignored() {
        let mut trade = TradeRecord::default();
        lookup("Entered")
            .unwrap()
            .set(&mut trade, FieldValue::Number(1.0));
        assert!(!trade.entered);
    }

    #[test]
    fn test_parse_cell() {
        let size = lookup("Candle_Size").unwrap();
        assert_eq!(size.parse_cell("1,5"), Ok(FieldValue::Number(1.5)));
        assert_eq!(size.parse_cell(""), Ok(FieldValue::Number(0.0)));
        assert!(size.parse_cell("big").is_err());

        let entered = lookup("Entered").unwrap();
        assert_eq!(entered.parse_cell("TRUE"), Ok(FieldValue::Bool(true)));
        assert_eq!(entered.parse_cell(""), Ok(FieldValue::Bool(false)));
        assert!(entered.parse_cell("maybe").is_err());
    }
}
