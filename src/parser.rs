//! Parser seam: turns a byte stream into profiles plus flush/complete
//! signals.
//!
//! The connection pulls [`ParseEvent`]s one at a time and buffers
//! profiles until a `Flush`, so the parser decides batching. `Complete`
//! marks the logical end of one full snapshot pass; live sources fire it
//! explicitly and keep streaming, static sources may omit it (the
//! connection synthesizes it at end of stream).

use crate::error::Result;
use crate::types::InstrumentProfile;
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read};

/// One event pulled from a parse session.
#[derive(Debug)]
pub enum ParseEvent {
    /// Next profile in the stream.
    Profile(InstrumentProfile),
    /// Apply everything buffered so far.
    Flush,
    /// Logical end of one full snapshot pass.
    Complete,
}

/// Lazy, finite-per-attempt event sequence over one response body.
pub trait ParseSession {
    /// Pull the next event. `Ok(None)` is end of stream.
    fn next_event(&mut self) -> Result<Option<ParseEvent>>;
}

/// Factory opening a [`ParseSession`] over a response body.
pub trait Parser: Send {
    fn open(&self, body: Box<dyn Read + Send>) -> Result<Box<dyn ParseSession + Send>>;
}

/// Line-delimited JSON parser.
///
/// Each line is one JSON object; `type` and `symbol` are required,
/// remaining string fields become attributes. Directive lines `##FLUSH`
/// and `##COMPLETE` map to the corresponding signals. Blank lines are
/// skipped.
#[derive(Debug, Default)]
pub struct JsonLineParser;

impl Parser for JsonLineParser {
    fn open(&self, body: Box<dyn Read + Send>) -> Result<Box<dyn ParseSession + Send>> {
        Ok(Box::new(JsonLineSession {
            lines: BufReader::new(body),
        }))
    }
}

struct JsonLineSession {
    lines: BufReader<Box<dyn Read + Send>>,
}

impl ParseSession for JsonLineSession {
    fn next_event(&mut self) -> Result<Option<ParseEvent>> {
        loop {
            let mut line = String::new();
            if self.lines.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            let line = line.trim();
            match line {
                "" => continue,
                "##FLUSH" => return Ok(Some(ParseEvent::Flush)),
                "##COMPLETE" => return Ok(Some(ParseEvent::Complete)),
                _ => return Ok(Some(ParseEvent::Profile(parse_profile(line)?))),
            }
        }
    }
}

fn parse_profile(line: &str) -> Result<InstrumentProfile> {
    let fields: BTreeMap<String, serde_json::Value> = serde_json::from_str(line)?;

    let field = |name: &str| -> Result<String> {
        match fields.get(name) {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Ok(s.clone()),
            _ => Err(crate::FeedError::Parse(format!(
                "profile line missing field `{}`: {}",
                name, line
            ))),
        }
    };

    let profile_type = field("type")?;
    let symbol = field("symbol")?;

    let attributes = fields
        .iter()
        .filter(|(name, _)| name.as_str() != "type" && name.as_str() != "symbol")
        .map(|(name, value)| {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (name.clone(), value)
        })
        .collect();

    Ok(InstrumentProfile {
        profile_type,
        symbol,
        attributes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(input: &str) -> Box<dyn ParseSession + Send> {
        JsonLineParser
            .open(Box::new(std::io::Cursor::new(input.as_bytes().to_vec())))
            .unwrap()
    }

    fn collect(input: &str) -> Vec<ParseEvent> {
        let mut session = session(input);
        let mut events = Vec::new();
        while let Some(event) = session.next_event().unwrap() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_profiles_and_directives() {
        let events = collect(concat!(
            "{\"type\":\"STOCK\",\"symbol\":\"AAPL\",\"CURRENCY\":\"USD\"}\n",
            "\n",
            "##FLUSH\n",
            "{\"type\":\"REMOVED\",\"symbol\":\"MSFT\"}\n",
            "##COMPLETE\n",
        ));

        assert_eq!(events.len(), 4);
        match &events[0] {
            ParseEvent::Profile(p) => {
                assert_eq!(p.profile_type, "STOCK");
                assert_eq!(p.symbol, "AAPL");
                assert_eq!(p.attributes.get("CURRENCY").unwrap(), "USD");
            }
            other => panic!("expected profile, got {:?}", other),
        }
        assert!(matches!(events[1], ParseEvent::Flush));
        match &events[2] {
            ParseEvent::Profile(p) => assert!(p.is_removed()),
            other => panic!("expected tombstone, got {:?}", other),
        }
        assert!(matches!(events[3], ParseEvent::Complete));
    }

    #[test]
    fn test_numeric_attributes_are_stringified() {
        let events = collect("{\"type\":\"STOCK\",\"symbol\":\"AAPL\",\"MULTIPLIER\":100}\n");
        match &events[0] {
            ParseEvent::Profile(p) => assert_eq!(p.attributes.get("MULTIPLIER").unwrap(), "100"),
            other => panic!("expected profile, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_symbol_is_parse_error() {
        let mut session = session("{\"type\":\"STOCK\"}\n");
        assert!(matches!(
            session.next_event(),
            Err(crate::FeedError::Parse(_))
        ));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let mut session = session("{not json\n");
        assert!(matches!(
            session.next_event(),
            Err(crate::FeedError::Parse(_))
        ));
    }

    #[test]
    fn test_empty_stream() {
        assert!(collect("").is_empty());
    }
}
