use std::collections::HashMap;

use dd_core::DriverError;
use regex::Regex;
use scraper::Selector;

use crate::document::ParsedDocument;

pub mod math;
pub mod template;
pub mod value;

pub use template::Template;
pub use value::Value;

/// Fields of the offer evaluated so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: HashMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.values.insert(field.into(), value);
    }
}

/// What a driver can see while it runs.
pub struct EvalContext<'a> {
    pub document: &'a ParsedDocument,
    pub record: &'a Record,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegexMethod {
    FindAll,
    Search,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastTarget {
    Float,
    Int,
    Str,
}

#[derive(Debug, Clone)]
pub enum DriverKind {
    /// Constant output
    String(String),
    /// First element matching a CSS query
    Html {
        selector: Selector,
        query: String,
        attribute: Option<String>,
    },
    /// Template over earlier fields of the record
    Format(Template),
    Regex {
        regex: Regex,
        method: RegexMethod,
        group_index: i64,
        join: Option<String>,
    },
    Cast(CastTarget),
    /// Arithmetic over `{input}` and earlier fields
    Math(Template),
    Money {
        currency: String,
        shorten: bool,
        prepend: bool,
    },
}

/// One step of a chain.
#[derive(Debug, Clone)]
pub struct Driver {
    pub kind: DriverKind,
    pub ignore_errors: bool,
}

impl Driver {
    pub fn new(kind: DriverKind) -> Self {
        Self {
            kind,
            ignore_errors: false,
        }
    }

    pub fn ignoring_errors(mut self) -> Self {
        self.ignore_errors = true;
        self
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            DriverKind::String(_) => "string",
            DriverKind::Html { .. } => "html",
            DriverKind::Format(_) => "format",
            DriverKind::Regex { .. } => "regex",
            DriverKind::Cast(_) => "cast",
            DriverKind::Math(_) => "math",
            DriverKind::Money { .. } => "money",
        }
    }

    pub fn evaluate(&self, ctx: &EvalContext<'_>, input: Value) -> Result<Value, DriverError> {
        match &self.kind {
            DriverKind::String(s) => Ok(Value::Str(s.clone())),

            DriverKind::Html { selector, query, attribute } => {
                let element = ctx
                    .document
                    .query(selector)
                    .ok_or_else(|| DriverError::NotFound(format!("query {:?}", query)))?;
                match attribute {
                    Some(name) => element
                        .attributes
                        .get(name)
                        .cloned()
                        .map(Value::Str)
                        .ok_or_else(|| DriverError::NotFound(format!("attribute {:?} of {:?}", name, query))),
                    None => Ok(Value::Str(element.text)),
                }
            }

            DriverKind::Format(template) => template
                .render(|field| ctx.record.get(field).map(Value::to_string))
                .map(Value::Str),

            DriverKind::Regex { regex, method, group_index, join } => {
                extract(regex, *method, *group_index, join.as_deref(), &input.to_string())
            }

            DriverKind::Cast(target) => cast(input, *target),

            DriverKind::Math(template) => {
                let expression = template.render(|field| match field {
                    "input" => Some(input.to_math_literal()),
                    other => ctx.record.get(other).map(Value::to_math_literal),
                })?;
                math::eval(&expression)
            }

            DriverKind::Money { currency, shorten, prepend } => {
                let amount = format_amount(to_float(&input)?, *shorten);
                Ok(Value::Str(if *prepend {
                    format!("{}{}", currency, amount)
                } else {
                    format!("{} {}", amount, currency)
                }))
            }
        }
    }
}

fn to_float(input: &Value) -> Result<f64, DriverError> {
    match input {
        Value::Int(i) => Ok(*i as f64),
        Value::Float(v) => Ok(*v),
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| DriverError::InvalidNumber(s.clone())),
    }
}

fn cast(input: Value, target: CastTarget) -> Result<Value, DriverError> {
    match target {
        CastTarget::Str => Ok(Value::Str(input.to_string())),
        CastTarget::Float => to_float(&input).map(Value::Float),
        CastTarget::Int => match input {
            Value::Int(i) => Ok(Value::Int(i)),
            Value::Float(v) if v.is_finite() && v.abs() < i64::MAX as f64 => Ok(Value::Int(v.trunc() as i64)),
            Value::Float(v) => Err(DriverError::InvalidNumber(v.to_string())),
            Value::Str(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| DriverError::InvalidNumber(s)),
        },
    }
}

fn format_amount(amount: f64, shorten: bool) -> String {
    if !shorten {
        return format!("{:.2}", amount);
    }
    if amount.fract() == 0.0 && amount.abs() < i64::MAX as f64 {
        return format!("{}", amount as i64);
    }
    Value::Float(amount).to_string()
}

fn extract(
    regex: &Regex,
    method: RegexMethod,
    group_index: i64,
    join: Option<&str>,
    input: &str,
) -> Result<Value, DriverError> {
    let no_match = || DriverError::NoMatch(regex.as_str().to_string());
    let groups = regex.captures_len() - 1;

    match method {
        RegexMethod::FindAll => {
            let mut items = Vec::new();
            for caps in regex.captures_iter(input) {
                if groups == 0 {
                    items.push(caps[0].to_string());
                } else if join.is_some() {
                    items.extend((1..=groups).map(|i| caps.get(i).map_or("", |m| m.as_str()).to_string()));
                } else {
                    items.push(caps.get(1).map_or("", |m| m.as_str()).to_string());
                }
            }
            if items.is_empty() {
                return Err(no_match());
            }
            if let Some(sep) = join {
                return Ok(Value::Str(items.join(sep)));
            }
            let index = if group_index < 0 {
                items.len() as i64 + group_index
            } else {
                group_index
            };
            usize::try_from(index)
                .ok()
                .and_then(|i| items.get(i).cloned())
                .map(Value::Str)
                .ok_or_else(no_match)
        }
        RegexMethod::Search => {
            let caps = regex.captures(input).ok_or_else(no_match)?;
            if let Some(sep) = join {
                let parts: Vec<&str> = (1..=groups).map(|i| caps.get(i).map_or("", |m| m.as_str())).collect();
                return Ok(Value::Str(parts.join(sep)));
            }
            usize::try_from(group_index)
                .ok()
                .and_then(|i| caps.get(i))
                .map(|m| Value::Str(m.as_str().to_string()))
                .ok_or_else(no_match)
        }
    }
}

/// Drivers run in order, each output feeding the next input.
#[derive(Debug, Clone, Default)]
pub struct Chain {
    drivers: Vec<Driver>,
}

impl Chain {
    pub fn new(drivers: Vec<Driver>) -> Self {
        Self { drivers }
    }

    pub fn drivers(&self) -> &[Driver] {
        &self.drivers
    }

    /// Runs the chain from an empty string seed. A failing driver aborts the
    /// chain unless it ignores errors, in which case it yields `""`.
    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Value, DriverError> {
        let mut value = Value::empty();
        for driver in &self.drivers {
            value = match driver.evaluate(ctx, value) {
                Ok(value) => value,
                Err(e) if driver.ignore_errors => {
                    tracing::debug!("ignoring {} driver error: {}", driver.name(), e);
                    Value::empty()
                }
                Err(e) => return Err(e),
            };
        }
        Ok(value)
    }
}

impl From<Vec<Driver>> for Chain {
    fn from(drivers: Vec<Driver>) -> Self {
        Self::new(drivers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse_selector;

    const PAGE: &str = r#"
        <div class="deal">
            <h1 class="title">Kaffeemaschine</h1>
            <a class="buy" href="https://shop.example/deal">Kaufen</a>
            <span class="stock">Noch 42 Stück</span>
            <span class="price">CHF 22.90</span>
        </div>
    "#;

    fn html(query: &str) -> Driver {
        Driver::new(DriverKind::Html {
            selector: parse_selector(query).unwrap(),
            query: query.to_string(),
            attribute: None,
        })
    }

    fn regex(pattern: &str, method: RegexMethod, group_index: i64, join: Option<&str>) -> Driver {
        Driver::new(DriverKind::Regex {
            regex: Regex::new(pattern).unwrap(),
            method,
            group_index,
            join: join.map(str::to_string),
        })
    }

    fn money(currency: &str, shorten: bool, prepend: bool) -> Driver {
        Driver::new(DriverKind::Money {
            currency: currency.to_string(),
            shorten,
            prepend,
        })
    }

    fn run(drivers: Vec<Driver>) -> Result<Value, DriverError> {
        let document = ParsedDocument::parse(PAGE);
        let record = Record::new();
        Chain::new(drivers).evaluate(&EvalContext { document: &document, record: &record })
    }

    fn run_one(driver: Driver, input: Value) -> Result<Value, DriverError> {
        let document = ParsedDocument::parse(PAGE);
        let record = Record::new();
        driver.evaluate(&EvalContext { document: &document, record: &record }, input)
    }

    #[test]
    fn test_html_text_and_attribute() {
        assert_eq!(run(vec![html(".title")]).unwrap(), Value::from("Kaffeemaschine"));

        let link = Driver::new(DriverKind::Html {
            selector: parse_selector(".buy").unwrap(),
            query: ".buy".to_string(),
            attribute: Some("href".to_string()),
        });
        assert_eq!(run(vec![link]).unwrap(), Value::from("https://shop.example/deal"));
    }

    #[test]
    fn test_missing_element() {
        assert!(matches!(run(vec![html("#missing")]), Err(DriverError::NotFound(_))));
        assert_eq!(run(vec![html("#missing").ignoring_errors()]).unwrap(), Value::from(""));
    }

    #[test]
    fn test_missing_attribute() {
        let title_href = || {
            Driver::new(DriverKind::Html {
                selector: parse_selector(".title").unwrap(),
                query: ".title".to_string(),
                attribute: Some("href".to_string()),
            })
        };
        assert!(matches!(run(vec![title_href()]), Err(DriverError::NotFound(msg)) if msg.contains("href")));
        assert_eq!(run(vec![title_href().ignoring_errors()]).unwrap(), Value::from(""));
    }

    #[test]
    fn test_ignored_error_keeps_chain_running() {
        let chain = vec![
            html("#missing").ignoring_errors(),
            Driver::new(DriverKind::String("7".to_string())),
            Driver::new(DriverKind::Cast(CastTarget::Int)),
        ];
        assert_eq!(run(chain).unwrap(), Value::Int(7));

        let chain = vec![html("#missing"), Driver::new(DriverKind::String("7".to_string()))];
        assert!(run(chain).is_err());
    }

    #[test]
    fn test_regex_findall() {
        let chain = vec![html(".stock"), regex(r"\d+", RegexMethod::FindAll, 0, None)];
        assert_eq!(run(chain).unwrap(), Value::from("42"));

        let input = Value::from("12 of 40 left, 3 days");
        assert_eq!(
            run_one(regex(r"\d+", RegexMethod::FindAll, -1, None), input.clone()).unwrap(),
            Value::from("3")
        );
        assert_eq!(
            run_one(regex(r"\d+", RegexMethod::FindAll, 0, Some("/")), input.clone()).unwrap(),
            Value::from("12/40/3")
        );
        assert_eq!(
            run_one(regex(r"(\d+) of", RegexMethod::FindAll, 0, None), input.clone()).unwrap(),
            Value::from("12")
        );
        assert!(matches!(
            run_one(regex(r"\d+", RegexMethod::FindAll, 5, None), input),
            Err(DriverError::NoMatch(_))
        ));
        assert!(matches!(
            run_one(regex(r"\d+", RegexMethod::FindAll, 0, None), Value::from("keine")),
            Err(DriverError::NoMatch(_))
        ));
    }

    #[test]
    fn test_regex_search() {
        let input = Value::from("CHF 1'299.90");
        let driver = regex(r"(\d+)'(\d+)\.(\d+)", RegexMethod::Search, 2, None);
        assert_eq!(run_one(driver, input.clone()).unwrap(), Value::from("299"));

        let driver = regex(r"(\d+)'(\d+)\.(\d+)", RegexMethod::Search, 0, Some(""));
        assert_eq!(run_one(driver, input).unwrap(), Value::from("129990"));
    }

    #[test]
    fn test_cast() {
        let int = |v: Value| run_one(Driver::new(DriverKind::Cast(CastTarget::Int)), v);
        assert_eq!(int(Value::from(" 100 ")).unwrap(), Value::Int(100));
        assert_eq!(int(Value::Float(4.7)).unwrap(), Value::Int(4));
        assert!(matches!(int(Value::from("4.7")), Err(DriverError::InvalidNumber(_))));

        let float = |v: Value| run_one(Driver::new(DriverKind::Cast(CastTarget::Float)), v);
        assert_eq!(float(Value::from("22.90")).unwrap(), Value::Float(22.9));
        assert!(matches!(float(Value::from("abc")), Err(DriverError::InvalidNumber(_))));

        let string = run_one(Driver::new(DriverKind::Cast(CastTarget::Str)), Value::Float(22.0));
        assert_eq!(string.unwrap(), Value::from("22.0"));
    }

    #[test]
    fn test_money() {
        assert_eq!(run_one(money("CHF", true, false), Value::Float(22.0)).unwrap(), Value::from("22 CHF"));
        assert_eq!(run_one(money("CHF", true, false), Value::Float(22.9)).unwrap(), Value::from("22.9 CHF"));
        assert_eq!(run_one(money("CHF", false, false), Value::Float(22.0)).unwrap(), Value::from("22.00 CHF"));
        assert_eq!(run_one(money("£", true, true), Value::from("40.00")).unwrap(), Value::from("£40"));
        assert!(matches!(
            run_one(money("CHF", true, false), Value::from("gratis")),
            Err(DriverError::InvalidNumber(_))
        ));
    }

    #[test]
    fn test_math_and_format_see_the_record() {
        let document = ParsedDocument::parse(PAGE);
        let mut record = Record::new();
        record.insert("available_total", Value::Int(50));
        record.insert("title", Value::from("Lampe"));
        let ctx = EvalContext { document: &document, record: &record };

        let math = Driver::new(DriverKind::Math(Template::parse("{input} * 100 / {available_total}").unwrap()));
        assert_eq!(math.evaluate(&ctx, Value::Int(10)).unwrap(), Value::Float(20.0));

        let stars = Driver::new(DriverKind::Math(Template::parse("{input} * 3").unwrap()));
        assert_eq!(stars.evaluate(&ctx, Value::from("★")).unwrap(), Value::from("★★★"));

        let format = Driver::new(DriverKind::Format(Template::parse("{title}!").unwrap()));
        assert_eq!(format.evaluate(&ctx, Value::empty()).unwrap(), Value::from("Lampe!"));

        let missing = Driver::new(DriverKind::Format(Template::parse("{summary}").unwrap()));
        assert!(matches!(missing.evaluate(&ctx, Value::empty()), Err(DriverError::MissingField(_))));
    }
}
