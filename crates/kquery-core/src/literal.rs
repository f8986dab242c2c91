//! Constant values embedded in statement text

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// A constant value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    /// Decimal kept in its textual form to preserve scale.
    Decimal(String),
    String(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    Bytes(Vec<u8>),
}

impl Literal {
    pub fn to_ksql(&self) -> String {
        match self {
            Literal::Null => "NULL".to_string(),
            Literal::Bool(b) => b.to_string(),
            Literal::Int(i) => i.to_string(),
            Literal::Double(d) => format_double(*d),
            Literal::Decimal(d) => d.clone(),
            Literal::String(s) => quote_string(s),
            Literal::Date(d) => quote_string(&d.format("%Y-%m-%d").to_string()),
            Literal::Time(t) => quote_string(&t.format("%H:%M:%S%.f").to_string()),
            Literal::Timestamp(ts) => {
                quote_string(&ts.format("%Y-%m-%dT%H:%M:%S%.3f").to_string())
            }
            Literal::Bytes(b) => format!("TO_BYTES({}, 'base64')", quote_string(&BASE64.encode(b))),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Literal::Null)
    }
}

/// Single-quote a string, doubling embedded quotes.
pub fn quote_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Doubles always carry a fractional part so the server does not infer INT.
pub fn format_double(value: f64) -> String {
    let text = format!("{:?}", value);
    if text.contains('.') || text.contains('e') || text.contains("inf") || text.contains("NaN") {
        text
    } else {
        format!("{}.0", text)
    }
}

impl From<bool> for Literal {
    fn from(v: bool) -> Self {
        Literal::Bool(v)
    }
}

macro_rules! int_literal {
    ($($t:ty),*) => {
        $(impl From<$t> for Literal {
            fn from(v: $t) -> Self {
                Literal::Int(i64::from(v))
            }
        })*
    };
}

int_literal!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Literal {
    fn from(v: f32) -> Self {
        Literal::Double(f64::from(v))
    }
}

impl From<f64> for Literal {
    fn from(v: f64) -> Self {
        Literal::Double(v)
    }
}

impl From<&str> for Literal {
    fn from(v: &str) -> Self {
        Literal::String(v.to_string())
    }
}

impl From<String> for Literal {
    fn from(v: String) -> Self {
        Literal::String(v)
    }
}

impl From<NaiveDate> for Literal {
    fn from(v: NaiveDate) -> Self {
        Literal::Date(v)
    }
}

impl From<NaiveTime> for Literal {
    fn from(v: NaiveTime) -> Self {
        Literal::Time(v)
    }
}

impl From<NaiveDateTime> for Literal {
    fn from(v: NaiveDateTime) -> Self {
        Literal::Timestamp(v)
    }
}

impl From<DateTime<Utc>> for Literal {
    fn from(v: DateTime<Utc>) -> Self {
        Literal::Timestamp(v.naive_utc())
    }
}

impl From<Vec<u8>> for Literal {
    fn from(v: Vec<u8>) -> Self {
        Literal::Bytes(v)
    }
}

impl<T: Into<Literal>> From<Option<T>> for Literal {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Literal::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_quoting() {
        assert_eq!(Literal::from("it's").to_ksql(), "'it''s'");
    }

    #[test]
    fn test_numbers() {
        assert_eq!(Literal::from(42).to_ksql(), "42");
        assert_eq!(Literal::from(1.5).to_ksql(), "1.5");
        assert_eq!(Literal::from(3.0).to_ksql(), "3.0");
        assert_eq!(Literal::Decimal("1.10".to_string()).to_ksql(), "1.10");
    }

    #[test]
    fn test_temporal_literals() {
        let date = NaiveDate::from_ymd_opt(2021, 10, 14).unwrap();
        assert_eq!(Literal::from(date).to_ksql(), "'2021-10-14'");

        let ts = date.and_hms_milli_opt(8, 5, 3, 120).unwrap();
        assert_eq!(Literal::from(ts).to_ksql(), "'2021-10-14T08:05:03.120'");

        let time = NaiveTime::from_hms_opt(13, 45, 0).unwrap();
        assert_eq!(Literal::from(time).to_ksql(), "'13:45:00'");
    }

    #[test]
    fn test_bytes_literal() {
        assert_eq!(
            Literal::from(b"hi".to_vec()).to_ksql(),
            "TO_BYTES('aGk=', 'base64')"
        );
    }

    #[test]
    fn test_option_maps_to_null() {
        assert_eq!(Literal::from(None::<i32>).to_ksql(), "NULL");
        assert_eq!(Literal::from(Some(7)).to_ksql(), "7");
    }
}
