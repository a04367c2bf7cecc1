use crate::attributes::BoundedAttributes;
use crate::error::FormatError;
use crate::event::LogEvent;
use crate::extract::extract_attributes;
use crate::record::LogRecord;
use crate::resource::Resource;
use crate::severity::Severity;
use crate::trace_context::{OtelContextProvider, TraceContextProvider};
use crate::value::AttributeValue;
use crate::INTERNAL_TARGET;
use chrono::Utc;
use std::iter::Peekable;
use std::str::Chars;
use std::sync::Arc;

/// Turns [`LogEvent`]s into [`LogRecord`]s.
///
/// Translation is pure apart from reading the clock and the ambient trace
/// context; it never performs I/O.
#[derive(Clone)]
pub struct Translator {
    resource: Arc<Resource>,
    attribute_limit: Option<usize>,
    provider: Arc<dyn TraceContextProvider>,
}

impl Translator {
    /// Translator reading trace context from OpenTelemetry, with no
    /// attribute limit.
    pub fn new(resource: Arc<Resource>) -> Self {
        Translator {
            resource,
            attribute_limit: None,
            provider: Arc::new(OtelContextProvider),
        }
    }

    pub fn with_attribute_limit(mut self, limit: Option<usize>) -> Self {
        self.attribute_limit = limit;
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn TraceContextProvider>) -> Self {
        self.provider = provider;
        self
    }

    pub fn resource(&self) -> &Arc<Resource> {
        &self.resource
    }

    pub fn translate(&self, event: LogEvent) -> LogRecord {
        let mut attributes = BoundedAttributes::new(self.attribute_limit);
        attributes.extend(extract_attributes(&event));

        let trace = self.provider.current().unwrap_or_default();

        let (body, err) = render_body(event.body, &event.args);
        if let Some(e) = err {
            tracing::debug!(target: INTERNAL_TARGET, error = %e, "message formatting failed, keeping raw template");
        }

        let observed = Utc::now().max(event.timestamp);

        LogRecord {
            timestamp: event.timestamp,
            observed_timestamp: observed,
            severity: Severity::from_native(event.level.name(), event.level.ordinal()),
            body,
            attributes,
            trace,
            resource: Arc::clone(&self.resource),
            source: event.location,
            thread: event.thread,
        }
    }
}

/// Substitute positional arguments into a string body.
///
/// Returns the body unchanged when there are no arguments. On failure the
/// raw template is returned together with the error.
pub fn render_body(
    body: AttributeValue,
    args: &[AttributeValue],
) -> (AttributeValue, Option<FormatError>) {
    if args.is_empty() {
        return (body, None);
    }
    let substituted = match &body {
        AttributeValue::Str(template) => substitute(template, args),
        _ => Err(FormatError::NonStringTemplate),
    };
    match substituted {
        Ok(s) => (AttributeValue::Str(s), None),
        Err(e) => (body, Some(e)),
    }
}

#[derive(Default)]
struct Directive {
    left: bool,
    zero: bool,
    plus: bool,
    space: bool,
    alternate: bool,
    width: usize,
    precision: Option<usize>,
}

impl Directive {
    fn sign(&self, negative: bool) -> &'static str {
        if negative {
            "-"
        } else if self.plus {
            "+"
        } else if self.space {
            " "
        } else {
            ""
        }
    }
}

/// A converted argument before padding. Zero padding goes between
/// `sign`/`prefix` and `body`.
struct Rendered {
    sign: &'static str,
    prefix: &'static str,
    body: String,
    numeric: bool,
}

impl Rendered {
    fn text(body: String) -> Self {
        Rendered { sign: "", prefix: "", body, numeric: false }
    }

    fn number(sign: &'static str, prefix: &'static str, body: String) -> Self {
        Rendered { sign, prefix, body, numeric: true }
    }
}

/// printf-style substitution; arguments are consumed in order.
///
/// Supported conversions: `%s`, `%r`, `%c`, `%d`, `%i`, `%u`, `%o`,
/// `%x`, `%X`, `%e`, `%E`, `%f`, `%F`, `%g`, `%G` and `%%`, with the
/// `-`, `0`, `+`, space and `#` flags, width and precision.
pub fn substitute(template: &str, args: &[AttributeValue]) -> Result<String, FormatError> {
    let mut out = String::with_capacity(template.len() + 16 * args.len());
    let mut chars = template.chars().peekable();
    let mut next = 0usize;

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let mut directive = Directive::default();
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => directive.left = true,
                '0' => directive.zero = true,
                '+' => directive.plus = true,
                ' ' => directive.space = true,
                '#' => directive.alternate = true,
                _ => break,
            }
            chars.next();
        }
        directive.width = take_number(&mut chars).unwrap_or(0);
        if chars.peek() == Some(&'.') {
            chars.next();
            directive.precision = Some(take_number(&mut chars).unwrap_or(0));
        }

        let conversion = chars.next().ok_or(FormatError::Incomplete)?;
        if conversion == '%' {
            out.push('%');
            continue;
        }

        let arg = args.get(next).ok_or(FormatError::MissingArgument(next))?;
        next += 1;
        let rendered = convert(conversion, arg, &directive)?;
        pad(&mut out, &rendered, &directive);
    }

    if next < args.len() {
        return Err(FormatError::UnusedArguments { unused: args.len() - next });
    }
    Ok(out)
}

fn take_number(chars: &mut Peekable<Chars<'_>>) -> Option<usize> {
    let mut n: Option<usize> = None;
    while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
        n = Some(n.unwrap_or(0).saturating_mul(10).saturating_add(d as usize));
        chars.next();
    }
    n
}

/// Integer argument for `%d`-like conversions; floats are truncated.
fn as_integer(conversion: char, arg: &AttributeValue) -> Result<i64, FormatError> {
    match arg {
        AttributeValue::Int(i) => Ok(*i),
        AttributeValue::Float(f) => Ok(f.trunc() as i64),
        AttributeValue::Bool(b) => Ok(i64::from(*b)),
        other => Err(FormatError::NotANumber { conversion, found: other.kind() }),
    }
}

/// Integer argument for `%o`/`%x`, which reject floats.
fn as_exact_integer(conversion: char, arg: &AttributeValue) -> Result<i64, FormatError> {
    match arg {
        AttributeValue::Int(i) => Ok(*i),
        AttributeValue::Bool(b) => Ok(i64::from(*b)),
        other => Err(FormatError::NotANumber { conversion, found: other.kind() }),
    }
}

fn as_float(conversion: char, arg: &AttributeValue) -> Result<f64, FormatError> {
    match arg {
        AttributeValue::Int(i) => Ok(*i as f64),
        AttributeValue::Float(f) => Ok(*f),
        AttributeValue::Bool(b) => Ok(f64::from(u8::from(*b))),
        other => Err(FormatError::NotANumber { conversion, found: other.kind() }),
    }
}

fn as_char(arg: &AttributeValue) -> Result<char, FormatError> {
    match arg {
        AttributeValue::Int(i) => u32::try_from(*i)
            .ok()
            .and_then(char::from_u32)
            .ok_or(FormatError::InvalidCharacter),
        AttributeValue::Str(s) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(c),
                _ => Err(FormatError::InvalidCharacter),
            }
        }
        _ => Err(FormatError::InvalidCharacter),
    }
}

/// Left-pad integer digits with zeros up to the precision.
fn with_min_digits(digits: String, precision: Option<usize>) -> String {
    match precision {
        Some(p) if p > digits.len() => format!("{}{}", "0".repeat(p - digits.len()), digits),
        _ => digits,
    }
}

/// `d.dddddde+XX`: at least two exponent digits, always signed.
fn exponent_notation(value: f64, precision: usize) -> String {
    let raw = format!("{:.*e}", precision, value);
    let (mantissa, exp) = raw.split_once('e').unwrap_or((raw.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{}e{}{:02}", mantissa, sign, exp.unsigned_abs())
}

fn strip_fraction_zeros(number: &str) -> String {
    let (mantissa, exp) = match number.find('e') {
        Some(at) => number.split_at(at),
        None => (number, ""),
    };
    let mantissa = if mantissa.contains('.') {
        mantissa.trim_end_matches('0').trim_end_matches('.')
    } else {
        mantissa
    };
    format!("{}{}", mantissa, exp)
}

/// `%g`: fixed notation for exponents in `-4..precision`, exponent
/// notation otherwise; trailing zeros dropped unless `#` is given.
fn general_notation(value: f64, precision: Option<usize>, alternate: bool) -> String {
    let p = match precision {
        Some(0) => 1,
        Some(p) => p,
        None => 6,
    };
    let exp = if value == 0.0 {
        0
    } else {
        let raw = format!("{:.*e}", p - 1, value);
        raw.split_once('e').and_then(|(_, e)| e.parse::<i32>().ok()).unwrap_or(0)
    };
    let out = if exp < -4 || exp >= p as i32 {
        exponent_notation(value, p - 1)
    } else {
        format!("{:.*}", (p as i32 - 1 - exp) as usize, value)
    };
    if alternate {
        out
    } else {
        strip_fraction_zeros(&out)
    }
}

fn convert(conversion: char, arg: &AttributeValue, directive: &Directive) -> Result<Rendered, FormatError> {
    match conversion {
        's' => {
            let s = arg.to_string();
            Ok(Rendered::text(match directive.precision {
                Some(p) => s.chars().take(p).collect(),
                None => s,
            }))
        }
        'r' => Ok(Rendered::text(arg.to_json_string())),
        'c' => Ok(Rendered::text(as_char(arg)?.to_string())),
        'd' | 'i' | 'u' => {
            let i = as_integer(conversion, arg)?;
            let digits = with_min_digits(i.unsigned_abs().to_string(), directive.precision);
            Ok(Rendered::number(directive.sign(i < 0), "", digits))
        }
        'o' | 'x' | 'X' => {
            let i = as_exact_integer(conversion, arg)?;
            let (digits, prefix) = match conversion {
                'o' => (format!("{:o}", i.unsigned_abs()), "0o"),
                'x' => (format!("{:x}", i.unsigned_abs()), "0x"),
                _ => (format!("{:X}", i.unsigned_abs()), "0X"),
            };
            let prefix = if directive.alternate { prefix } else { "" };
            let digits = with_min_digits(digits, directive.precision);
            Ok(Rendered::number(directive.sign(i < 0), prefix, digits))
        }
        'e' | 'E' | 'f' | 'F' | 'g' | 'G' => {
            let f = as_float(conversion, arg)?;
            let upper = conversion.is_ascii_uppercase();
            if !f.is_finite() {
                let body = if f.is_nan() { "nan" } else { "inf" };
                let body = if upper { body.to_uppercase() } else { body.to_string() };
                let sign = directive.sign(f.is_infinite() && f < 0.0);
                return Ok(Rendered { sign, prefix: "", body, numeric: false });
            }
            let magnitude = f.abs();
            let body = match conversion.to_ascii_lowercase() {
                'e' => exponent_notation(magnitude, directive.precision.unwrap_or(6)),
                'f' => format!("{:.*}", directive.precision.unwrap_or(6), magnitude),
                _ => general_notation(magnitude, directive.precision, directive.alternate),
            };
            let body = if upper { body.to_uppercase() } else { body };
            Ok(Rendered::number(directive.sign(f.is_sign_negative()), "", body))
        }
        other => Err(FormatError::UnsupportedConversion(other)),
    }
}

fn pad(out: &mut String, rendered: &Rendered, directive: &Directive) {
    let len = rendered.sign.len() + rendered.prefix.len() + rendered.body.chars().count();
    let fill = directive.width.saturating_sub(len);
    if directive.left {
        out.push_str(rendered.sign);
        out.push_str(rendered.prefix);
        out.push_str(&rendered.body);
        out.extend(std::iter::repeat(' ').take(fill));
    } else if directive.zero && rendered.numeric {
        out.push_str(rendered.sign);
        out.push_str(rendered.prefix);
        out.extend(std::iter::repeat('0').take(fill));
        out.push_str(&rendered.body);
    } else {
        out.extend(std::iter::repeat(' ').take(fill));
        out.push_str(rendered.sign);
        out.push_str(rendered.prefix);
        out.push_str(&rendered.body);
    }
}
