//! Rule DSL parser.
//!
//! Recursive descent parser for the rule grammar. Converts text to AST with
//! meaningful error messages including character offset, expected/found tokens.
//!
//! ```text
//! rule      := leaf | AND(rule, rule, ...) | OR(rule, rule, ...) | NOT(rule)
//!            | CONSECUTIVE(rule, n) | ANY_OF(rule, n)
//! leaf      := BREAKOUT(w[, occ]) | MACD_CROSS[(f, s, g)[, ABOVE_ZERO][, occ]]
//!            | SMA_CROSS(a, b[, occ]) | SMA_STACK(w, w, ...)
//!            | VOLUME_SPIKE(w, m) | VOLUME_RISE(m) | MIN_VOLUME(n) | MIN_CLOSE(p)
//!            | ATR_BAND(w, lo, hi) | BOX_BREAKOUT(n, cap[, VOLUME_RISE])
//!            | TREND_COUNT(w, k)
//! occ       := FIRST | CURRENT
//! ```

use crate::domain::error::ParseError;
use crate::domain::indicator::macd::{DEFAULT_FAST, DEFAULT_SIGNAL, DEFAULT_SLOW};
use crate::domain::rule::{Occurrence, Rule};

const FIRST: &str = "FIRST";
const CURRENT: &str = "CURRENT";
const ABOVE_ZERO: &str = "ABOVE_ZERO";
const VOLUME_RISE: &str = "VOLUME_RISE";

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(ParseError {
                message: format!("expected '{}', found '{}'", expected, ch),
                position: self.pos,
            }),
            None => Err(ParseError {
                message: format!("expected '{}', found end of input", expected),
                position: self.pos,
            }),
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        let remaining = self.remaining();
        remaining.starts_with(keyword)
            && (remaining.len() == keyword.len()
                || !remaining[keyword.len()..]
                    .chars()
                    .next()
                    .map(|c| c.is_alphanumeric() || c == '_')
                    .unwrap_or(false))
    }

    fn consume_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        self.skip_whitespace();
        if self.consume_keyword(keyword) {
            Ok(())
        } else {
            let found = self.peek_word();
            Err(ParseError {
                message: format!("expected '{}', found '{}'", keyword, found),
                position: self.pos,
            })
        }
    }

    fn peek_word(&self) -> String {
        let mut word = String::new();
        for ch in self.remaining().chars() {
            if ch.is_alphanumeric() || ch == '_' {
                word.push(ch);
            } else {
                break;
            }
        }
        if word.is_empty() {
            self.peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".to_string())
        } else {
            word
        }
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        if self.peek() == Some('-') {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: "expected number".to_string(),
                position: start,
            });
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<f64>().map_err(|_| ParseError {
            message: format!("invalid number: {}", num_str),
            position: start,
        })
    }

    fn parse_integer(&mut self) -> Result<usize, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut digits = 0;

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: "expected integer".to_string(),
                position: start,
            });
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<usize>().map_err(|_| ParseError {
            message: format!("invalid integer: {}", num_str),
            position: start,
        })
    }

    /// Consumes `, FLAG` pairs up to and including the closing parenthesis.
    fn parse_flags(&mut self, allowed: &[&'static str]) -> Result<Vec<&'static str>, ParseError> {
        self.parse_flag_list(allowed, true)
    }

    fn parse_flag_list(
        &mut self,
        allowed: &[&'static str],
        leading_comma: bool,
    ) -> Result<Vec<&'static str>, ParseError> {
        let mut flags: Vec<&'static str> = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some(')') {
                self.advance();
                return Ok(flags);
            }
            if leading_comma || !flags.is_empty() {
                self.expect_char(',')?;
            }
            self.skip_whitespace();
            let position = self.pos;
            let word = self.peek_word();
            match allowed.iter().find(|flag| **flag == word) {
                Some(flag) if flags.contains(flag) => {
                    return Err(ParseError {
                        message: format!("duplicate flag '{}'", word),
                        position,
                    });
                }
                Some(flag) => {
                    self.pos += word.len();
                    flags.push(*flag);
                }
                None => {
                    return Err(ParseError {
                        message: format!(
                            "expected one of {}, found '{}'",
                            allowed.join(", "),
                            word
                        ),
                        position,
                    });
                }
            }
        }
    }

    fn occurrence(&self, flags: &[&str], position: usize) -> Result<Occurrence, ParseError> {
        match (flags.contains(&FIRST), flags.contains(&CURRENT)) {
            (true, true) => Err(ParseError {
                message: "FIRST and CURRENT are mutually exclusive".to_string(),
                position,
            }),
            (_, true) => Ok(Occurrence::Current),
            _ => Ok(Occurrence::First),
        }
    }

    fn parse_breakout(&mut self) -> Result<Rule, ParseError> {
        let start = self.pos;
        self.expect_keyword("BREAKOUT")?;
        self.expect_char('(')?;
        let window = self.parse_integer()?;
        let flags = self.parse_flags(&[FIRST, CURRENT])?;
        Ok(Rule::Breakout {
            window,
            occurrence: self.occurrence(&flags, start)?,
        })
    }

    fn parse_macd_cross(&mut self) -> Result<Rule, ParseError> {
        let start = self.pos;
        self.expect_keyword("MACD_CROSS")?;
        self.skip_whitespace();

        let (mut fast, mut slow, mut signal) = (DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL);
        let mut flags = Vec::new();
        if self.peek() == Some('(') {
            self.advance();
            self.skip_whitespace();
            if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                fast = self.parse_integer()?;
                self.expect_char(',')?;
                slow = self.parse_integer()?;
                self.expect_char(',')?;
                signal = self.parse_integer()?;
                flags = self.parse_flags(&[ABOVE_ZERO, FIRST, CURRENT])?;
            } else {
                flags = self.parse_flag_list(&[ABOVE_ZERO, FIRST, CURRENT], false)?;
            }
        }

        Ok(Rule::MacdCross {
            fast,
            slow,
            signal,
            above_zero: flags.contains(&ABOVE_ZERO),
            occurrence: self.occurrence(&flags, start)?,
        })
    }

    fn parse_sma_cross(&mut self) -> Result<Rule, ParseError> {
        let start = self.pos;
        self.expect_keyword("SMA_CROSS")?;
        self.expect_char('(')?;
        let fast = self.parse_integer()?;
        self.expect_char(',')?;
        let slow = self.parse_integer()?;
        let flags = self.parse_flags(&[FIRST, CURRENT])?;
        Ok(Rule::SmaCross {
            fast,
            slow,
            occurrence: self.occurrence(&flags, start)?,
        })
    }

    fn parse_sma_stack(&mut self) -> Result<Rule, ParseError> {
        self.expect_keyword("SMA_STACK")?;
        self.expect_char('(')?;

        let mut windows = vec![self.parse_integer()?];
        loop {
            self.skip_whitespace();
            if self.peek() == Some(')') {
                self.advance();
                break;
            }
            self.expect_char(',')?;
            windows.push(self.parse_integer()?);
        }

        if windows.len() < 2 {
            return Err(ParseError {
                message: "SMA_STACK requires at least 2 windows".to_string(),
                position: self.pos,
            });
        }
        Ok(Rule::SmaStack(windows))
    }

    fn parse_volume_spike(&mut self) -> Result<Rule, ParseError> {
        self.expect_keyword("VOLUME_SPIKE")?;
        self.expect_char('(')?;
        let window = self.parse_integer()?;
        self.expect_char(',')?;
        let multiplier = self.parse_number()?;
        self.expect_char(')')?;
        Ok(Rule::VolumeSpike { window, multiplier })
    }

    fn parse_volume_rise(&mut self) -> Result<Rule, ParseError> {
        self.expect_keyword(VOLUME_RISE)?;
        self.expect_char('(')?;
        let multiplier = self.parse_number()?;
        self.expect_char(')')?;
        Ok(Rule::VolumeRise { multiplier })
    }

    fn parse_min_volume(&mut self) -> Result<Rule, ParseError> {
        self.expect_keyword("MIN_VOLUME")?;
        self.expect_char('(')?;
        let volume = self.parse_integer()?;
        self.expect_char(')')?;
        Ok(Rule::MinVolume(volume as u64))
    }

    fn parse_min_close(&mut self) -> Result<Rule, ParseError> {
        self.expect_keyword("MIN_CLOSE")?;
        self.expect_char('(')?;
        let price = self.parse_number()?;
        self.expect_char(')')?;
        Ok(Rule::MinClose(price))
    }

    fn parse_atr_band(&mut self) -> Result<Rule, ParseError> {
        self.expect_keyword("ATR_BAND")?;
        self.expect_char('(')?;
        let window = self.parse_integer()?;
        self.expect_char(',')?;
        let lower = self.parse_number()?;
        self.expect_char(',')?;
        let upper = self.parse_number()?;
        self.expect_char(')')?;
        Ok(Rule::VolatilityBand {
            window,
            lower,
            upper,
        })
    }

    fn parse_box_breakout(&mut self) -> Result<Rule, ParseError> {
        self.expect_keyword("BOX_BREAKOUT")?;
        self.expect_char('(')?;
        let lookback = self.parse_integer()?;
        self.expect_char(',')?;
        let cap = self.parse_number()?;
        let flags = self.parse_flags(&[VOLUME_RISE])?;
        Ok(Rule::BoxBreakout {
            lookback,
            cap,
            volume_rise: flags.contains(&VOLUME_RISE),
        })
    }

    fn parse_trend_count(&mut self) -> Result<Rule, ParseError> {
        self.expect_keyword("TREND_COUNT")?;
        self.expect_char('(')?;
        let window = self.parse_integer()?;
        self.expect_char(',')?;
        let threshold = self.parse_integer()?;
        self.expect_char(')')?;
        Ok(Rule::TrendCount { window, threshold })
    }

    fn parse_rule(&mut self) -> Result<Rule, ParseError> {
        self.skip_whitespace();

        if self.peek_keyword("BREAKOUT") {
            return self.parse_breakout();
        }
        if self.peek_keyword("MACD_CROSS") {
            return self.parse_macd_cross();
        }
        if self.peek_keyword("SMA_CROSS") {
            return self.parse_sma_cross();
        }
        if self.peek_keyword("SMA_STACK") {
            return self.parse_sma_stack();
        }
        if self.peek_keyword("VOLUME_SPIKE") {
            return self.parse_volume_spike();
        }
        if self.peek_keyword(VOLUME_RISE) {
            return self.parse_volume_rise();
        }
        if self.peek_keyword("MIN_VOLUME") {
            return self.parse_min_volume();
        }
        if self.peek_keyword("MIN_CLOSE") {
            return self.parse_min_close();
        }
        if self.peek_keyword("ATR_BAND") {
            return self.parse_atr_band();
        }
        if self.peek_keyword("BOX_BREAKOUT") {
            return self.parse_box_breakout();
        }
        if self.peek_keyword("TREND_COUNT") {
            return self.parse_trend_count();
        }

        if self.peek_keyword("AND") {
            return self.parse_and();
        }
        if self.peek_keyword("OR") {
            return self.parse_or();
        }
        if self.peek_keyword("NOT") {
            return self.parse_not();
        }

        if self.peek_keyword("CONSECUTIVE") {
            return self.parse_consecutive();
        }
        if self.peek_keyword("ANY_OF") {
            return self.parse_any_of();
        }

        let word = self.peek_word();
        Err(ParseError {
            message: format!("expected rule, found '{}'", word),
            position: self.pos,
        })
    }

    fn parse_rule_list(&mut self, keyword: &str) -> Result<Vec<Rule>, ParseError> {
        self.expect_keyword(keyword)?;
        self.expect_char('(')?;

        let mut rules = Vec::new();
        rules.push(self.parse_rule()?);

        loop {
            self.skip_whitespace();
            if self.peek() == Some(')') {
                self.advance();
                break;
            }
            self.expect_char(',')?;
            rules.push(self.parse_rule()?);
        }

        if rules.len() < 2 {
            return Err(ParseError {
                message: format!("{} requires at least 2 rules", keyword),
                position: self.pos,
            });
        }
        Ok(rules)
    }

    fn parse_and(&mut self) -> Result<Rule, ParseError> {
        Ok(Rule::And(self.parse_rule_list("AND")?))
    }

    fn parse_or(&mut self) -> Result<Rule, ParseError> {
        Ok(Rule::Or(self.parse_rule_list("OR")?))
    }

    fn parse_not(&mut self) -> Result<Rule, ParseError> {
        self.expect_keyword("NOT")?;
        self.expect_char('(')?;
        let rule = self.parse_rule()?;
        self.expect_char(')')?;
        Ok(Rule::Not(Box::new(rule)))
    }

    fn parse_consecutive(&mut self) -> Result<Rule, ParseError> {
        self.expect_keyword("CONSECUTIVE")?;
        self.expect_char('(')?;
        let rule = self.parse_rule()?;
        self.expect_char(',')?;
        let count = self.parse_integer()?;
        self.expect_char(')')?;
        Ok(Rule::Consecutive {
            rule: Box::new(rule),
            count,
        })
    }

    fn parse_any_of(&mut self) -> Result<Rule, ParseError> {
        self.expect_keyword("ANY_OF")?;
        self.expect_char('(')?;
        let rule = self.parse_rule()?;
        self.expect_char(',')?;
        let count = self.parse_integer()?;
        self.expect_char(')')?;
        Ok(Rule::AnyOf {
            rule: Box::new(rule),
            count,
        })
    }

    fn parse(&mut self) -> Result<Rule, ParseError> {
        let rule = self.parse_rule()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(ParseError {
                message: format!("unexpected input after rule: '{}'", self.remaining()),
                position: self.pos,
            });
        }
        Ok(rule)
    }
}

pub fn parse(input: &str) -> Result<Rule, ParseError> {
    let mut parser = Parser::new(input);
    parser.parse()
}
